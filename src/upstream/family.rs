//! JSON shape of decoded metrics.
//!
//! [`decode`] runs the exposition text through `prometheus-parse` and
//! regroups the flat sample list into [`MetricFamily`] values: one entry
//! per metric name, in order of first appearance, with the `_sum` and
//! `_count` series of summaries and histograms folded into their family.
//! Numbers are rendered as strings so non-finite values survive JSON.
//!
//! The parser skips lines it cannot read, so every line is checked against
//! the text format first and every named series must come out of the parse.

use std::collections::{BTreeMap, HashMap, HashSet};

use prometheus_parse::{Sample, Scrape, Value};
use serde::{Deserialize, Serialize};

pub type LabelSet = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFamily {
    pub name: String,
    #[serde(default)]
    pub help: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub metrics: Vec<MetricSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricKind {
    Counter,
    Gauge,
    Summary,
    Histogram,
    Untyped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricSample {
    Histogram {
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        labels: LabelSet,
        buckets: BTreeMap<String, String>,
        count: String,
        sum: String,
    },
    Summary {
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        labels: LabelSet,
        quantiles: BTreeMap<String, String>,
        count: String,
        sum: String,
    },
    Scalar {
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        labels: LabelSet,
        value: String,
    },
}

impl MetricSample {
    #[must_use]
    pub fn labels(&self) -> &LabelSet {
        match self {
            Self::Histogram { labels, .. }
            | Self::Summary { labels, .. }
            | Self::Scalar { labels, .. } => labels,
        }
    }

    fn empty_aggregate(kind: MetricKind, labels: LabelSet) -> Self {
        let zero = || format_value(0.0);
        if kind == MetricKind::Histogram {
            Self::Histogram {
                labels,
                buckets: BTreeMap::new(),
                count: zero(),
                sum: zero(),
            }
        } else {
            Self::Summary {
                labels,
                quantiles: BTreeMap::new(),
                count: zero(),
                sum: zero(),
            }
        }
    }
}

/// Decode an exposition-format payload into metric families.
///
/// Every line is checked before parsing; one malformed line fails the
/// whole payload.
pub fn decode(text: &str) -> std::io::Result<Vec<MetricFamily>> {
    check_exposition(text)?;
    let scrape = Scrape::parse(text.lines().map(|line| Ok(line.to_owned())))?;
    if let Some(name) = first_dropped_series(text, &scrape) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("samples of '{name}' could not be decoded"),
        ));
    }
    Ok(group(scrape))
}

/// A series named in `text` that produced no sample at all.
fn first_dropped_series<'t>(text: &'t str, scrape: &Scrape) -> Option<&'t str> {
    let decoded: HashSet<&str> = scrape.samples.iter().map(|s| s.metric.as_str()).collect();
    let covered = |name: &str| {
        decoded.contains(name)
            || ["_bucket", "_sum", "_count"]
                .iter()
                .filter_map(|suffix| name.strip_suffix(suffix))
                .any(|base| decoded.contains(base))
    };

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(sample_name)
        .find(|&name| !covered(name))
}

fn sample_name(line: &str) -> &str {
    let end = line
        .find(|c: char| c == '{' || c.is_whitespace())
        .unwrap_or(line.len());
    &line[..end]
}

fn check_exposition(text: &str) -> std::io::Result<()> {
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        let outcome = if line.is_empty() {
            Ok(())
        } else if let Some(comment) = line.strip_prefix('#') {
            check_comment(comment)
        } else {
            check_sample(line)
        };
        if let Err(reason) = outcome {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("line {}: {reason}", idx + 1),
            ));
        }
    }
    Ok(())
}

/// Only `# TYPE` lines carry structure; other comments are free text.
fn check_comment(comment: &str) -> Result<(), String> {
    let mut fields = comment.split_whitespace();
    if fields.next() != Some("TYPE") {
        return Ok(());
    }
    let name = fields.next().ok_or("TYPE line without metric name")?;
    if !is_metric_name(name) {
        return Err(format!("invalid metric name '{name}'"));
    }
    match fields.next() {
        Some("counter" | "gauge" | "histogram" | "summary" | "untyped") => {}
        Some(other) => return Err(format!("unknown metric type '{other}'")),
        None => return Err(format!("TYPE line for '{name}' has no type")),
    }
    match fields.next() {
        Some(extra) => Err(format!("unexpected token '{extra}'")),
        None => Ok(()),
    }
}

/// `name[{label="value",...}] value [timestamp]`
fn check_sample(line: &str) -> Result<(), String> {
    let name = sample_name(line);
    if !is_metric_name(name) {
        return Err(format!("invalid metric name '{name}'"));
    }

    let mut rest = &line[name.len()..];
    if let Some(labels) = rest.strip_prefix('{') {
        rest = skip_labels(labels)?;
    }

    let mut fields = rest.split_whitespace();
    let value = fields
        .next()
        .ok_or_else(|| format!("sample '{name}' has no value"))?;
    if value.parse::<f64>().is_err() {
        return Err(format!("invalid value '{value}' for '{name}'"));
    }
    if let Some(ts) = fields.next() {
        if ts.parse::<i64>().is_err() {
            return Err(format!("invalid timestamp '{ts}' for '{name}'"));
        }
    }
    match fields.next() {
        Some(extra) => Err(format!("unexpected token '{extra}'")),
        None => Ok(()),
    }
}

/// Consume a label set up to and including the closing brace.
fn skip_labels(mut s: &str) -> Result<&str, String> {
    loop {
        s = s.trim_start();
        if let Some(rest) = s.strip_prefix('}') {
            return Ok(rest);
        }

        let name_end = s
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .ok_or("unterminated label set")?;
        let name = &s[..name_end];
        if !is_label_name(name) {
            return Err(format!("invalid label name '{name}'"));
        }

        s = s[name_end..]
            .trim_start()
            .strip_prefix('=')
            .ok_or_else(|| format!("label '{name}' has no value"))?;
        s = s
            .trim_start()
            .strip_prefix('"')
            .ok_or_else(|| format!("value of label '{name}' is not quoted"))?;
        s = skip_quoted(s).ok_or_else(|| format!("value of label '{name}' is not terminated"))?;

        s = s.trim_start();
        if let Some(rest) = s.strip_prefix(',') {
            s = rest;
        } else if !s.starts_with('}') {
            return Err("expected ',' or '}' in label set".into());
        }
    }
}

/// Rest of `s` after the closing quote, honouring backslash escapes.
fn skip_quoted(s: &str) -> Option<&str> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(&s[i + 1..]),
            _ => {}
        }
    }
    None
}

fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Clone, Copy)]
enum Aggregate {
    Sum,
    Count,
}

struct FamilyBuilder<'a> {
    docs: &'a HashMap<String, String>,
    families: Vec<MetricFamily>,
    index: HashMap<String, usize>,
}

impl<'a> FamilyBuilder<'a> {
    fn new(docs: &'a HashMap<String, String>) -> Self {
        Self {
            docs,
            families: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn family(&mut self, name: &str, kind: MetricKind) -> &mut MetricFamily {
        let idx = if let Some(&idx) = self.index.get(name) {
            idx
        } else {
            self.families.push(MetricFamily {
                name: name.to_string(),
                help: self.docs.get(name).cloned().unwrap_or_default(),
                kind,
                metrics: Vec::new(),
            });
            self.index.insert(name.to_string(), self.families.len() - 1);
            self.families.len() - 1
        };
        &mut self.families[idx]
    }

    /// The summary or histogram entry of `name` for `labels`, created on first use.
    fn aggregate(&mut self, name: &str, kind: MetricKind, labels: LabelSet) -> &mut MetricSample {
        let family = self.family(name, kind);
        let pos = if let Some(pos) = family.metrics.iter().position(|m| *m.labels() == labels) {
            pos
        } else {
            family
                .metrics
                .push(MetricSample::empty_aggregate(family.kind, labels));
            family.metrics.len() - 1
        };
        &mut family.metrics[pos]
    }
}

fn group(scrape: Scrape) -> Vec<MetricFamily> {
    let compound: HashMap<String, MetricKind> = scrape
        .samples
        .iter()
        .filter_map(|s| match s.value {
            Value::Histogram(_) => Some((histogram_base(&s.metric).to_string(), MetricKind::Histogram)),
            Value::Summary(_) => Some((s.metric.clone(), MetricKind::Summary)),
            _ => None,
        })
        .collect();

    let mut builder = FamilyBuilder::new(&scrape.docs);

    for sample in &scrape.samples {
        let labels = label_set(sample);
        match &sample.value {
            Value::Histogram(counts) => {
                let entry = builder.aggregate(
                    histogram_base(&sample.metric),
                    MetricKind::Histogram,
                    labels,
                );
                if let MetricSample::Histogram { buckets, .. } = entry {
                    for bucket in counts {
                        buckets.insert(format_value(bucket.less_than), format_value(bucket.count));
                    }
                }
            }
            Value::Summary(counts) => {
                let entry = builder.aggregate(&sample.metric, MetricKind::Summary, labels);
                if let MetricSample::Summary { quantiles, .. } = entry {
                    for quantile in counts {
                        quantiles.insert(format_value(quantile.quantile), format_value(quantile.count));
                    }
                }
            }
            Value::Counter(v) | Value::Gauge(v) | Value::Untyped(v) => {
                if let Some((base, part, kind)) = split_aggregate(&sample.metric, &compound) {
                    match (builder.aggregate(base, kind, labels), part) {
                        (
                            MetricSample::Histogram { sum, .. } | MetricSample::Summary { sum, .. },
                            Aggregate::Sum,
                        ) => *sum = format_value(*v),
                        (
                            MetricSample::Histogram { count, .. }
                            | MetricSample::Summary { count, .. },
                            Aggregate::Count,
                        ) => *count = format_value(*v),
                        (MetricSample::Scalar { .. }, _) => {}
                    }
                    continue;
                }
                let kind = match sample.value {
                    Value::Counter(_) => MetricKind::Counter,
                    Value::Gauge(_) => MetricKind::Gauge,
                    _ => MetricKind::Untyped,
                };
                builder
                    .family(&sample.metric, kind)
                    .metrics
                    .push(MetricSample::Scalar {
                        labels,
                        value: format_value(*v),
                    });
            }
        }
    }

    builder.families
}

fn histogram_base(metric: &str) -> &str {
    metric.strip_suffix("_bucket").unwrap_or(metric)
}

fn split_aggregate<'m>(
    metric: &'m str,
    compound: &HashMap<String, MetricKind>,
) -> Option<(&'m str, Aggregate, MetricKind)> {
    [("_sum", Aggregate::Sum), ("_count", Aggregate::Count)]
        .into_iter()
        .find_map(|(suffix, part)| {
            let base = metric.strip_suffix(suffix)?;
            compound.get(base).map(|kind| (base, part, *kind))
        })
}

fn label_set(sample: &Sample) -> LabelSet {
    sample
        .labels
        .iter()
        .filter(|(name, _)| name.as_str() != "le" && name.as_str() != "quantile")
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Render a sample value the way the exposition format spells it.
#[must_use]
pub fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = "\
# HELP http_requests_total The total number of HTTP requests.
# TYPE http_requests_total counter
http_requests_total{method=\"post\",code=\"200\"} 1027
http_requests_total{method=\"post\",code=\"400\"} 3
# HELP process_open_fds Number of open file descriptors.
# TYPE process_open_fds gauge
process_open_fds 12
";

    #[test]
    fn families_keep_exposition_order() {
        let families = decode(BASIC).unwrap();
        assert_eq!(families.len(), 2);

        assert_eq!(families[0].name, "http_requests_total");
        assert_eq!(families[0].help, "The total number of HTTP requests.");
        assert_eq!(families[0].kind, MetricKind::Counter);
        assert_eq!(families[0].metrics.len(), 2);

        assert_eq!(families[1].name, "process_open_fds");
        assert_eq!(families[1].kind, MetricKind::Gauge);
        assert_eq!(
            families[1].metrics,
            vec![MetricSample::Scalar {
                labels: LabelSet::new(),
                value: "12".into(),
            }]
        );
    }

    #[test]
    fn labels_are_carried_per_sample() {
        let families = decode(BASIC).unwrap();
        let labels = families[0].metrics[1].labels();
        assert_eq!(labels.get("method").map(String::as_str), Some("post"));
        assert_eq!(labels.get("code").map(String::as_str), Some("400"));
    }

    #[test]
    fn summary_folds_sum_and_count() {
        let text = "\
# HELP rpc_duration_seconds RPC latency.
# TYPE rpc_duration_seconds summary
rpc_duration_seconds{quantile=\"0.5\"} 0.05
rpc_duration_seconds{quantile=\"0.99\"} 0.2
rpc_duration_seconds_sum 17.5
rpc_duration_seconds_count 200
";
        let families = decode(text).unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].name, "rpc_duration_seconds");
        assert_eq!(families[0].kind, MetricKind::Summary);

        let MetricSample::Summary {
            quantiles,
            count,
            sum,
            ..
        } = &families[0].metrics[0]
        else {
            panic!("expected a summary sample");
        };
        assert_eq!(quantiles.get("0.5").map(String::as_str), Some("0.05"));
        assert_eq!(quantiles.get("0.99").map(String::as_str), Some("0.2"));
        assert_eq!(count, "200");
        assert_eq!(sum, "17.5");
    }

    #[test]
    fn histogram_folds_buckets_sum_and_count() {
        let text = "\
# HELP request_seconds Request latency.
# TYPE request_seconds histogram
request_seconds_bucket{le=\"0.1\"} 2
request_seconds_bucket{le=\"1\"} 3
request_seconds_bucket{le=\"+Inf\"} 4
request_seconds_sum 2.5
request_seconds_count 4
";
        let families = decode(text).unwrap();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].name, "request_seconds");
        assert_eq!(families[0].help, "Request latency.");
        assert_eq!(families[0].kind, MetricKind::Histogram);

        let MetricSample::Histogram {
            buckets,
            count,
            sum,
            labels,
        } = &families[0].metrics[0]
        else {
            panic!("expected a histogram sample");
        };
        assert!(labels.is_empty());
        assert_eq!(buckets.get("+Inf").map(String::as_str), Some("4"));
        assert_eq!(buckets.get("0.1").map(String::as_str), Some("2"));
        assert_eq!(count, "4");
        assert_eq!(sum, "2.5");
    }

    #[test]
    fn json_round_trips() {
        let families = decode(BASIC).unwrap();
        let json = serde_json::to_string(&families).unwrap();
        let back: Vec<MetricFamily> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, families);
    }

    #[test]
    fn empty_labels_are_omitted() {
        let families = decode("up 1\n").unwrap();
        let json = serde_json::to_value(&families).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "name": "up",
                "help": "",
                "type": "UNTYPED",
                "metrics": [{"value": "1"}]
            }])
        );
    }

    #[test]
    fn comments_only_payload_is_empty() {
        assert!(decode("# just a comment\n\n").unwrap().is_empty());
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn non_exposition_payload_is_rejected() {
        assert!(decode("<html><body>Not Found</body></html>\n").is_err());
    }

    #[test]
    fn one_garbage_line_fails_the_payload() {
        let err = decode("up 1\nthis is { garbage line\n").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        assert!(err.to_string().starts_with("line 2:"));
    }

    #[test]
    fn unparseable_value_fails_the_payload() {
        let err = decode("up notanumber\nother 2\n").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("notanumber"));
    }

    #[test]
    fn malformed_label_sets_are_rejected() {
        assert!(decode("up{job=\"node\" 1\n").is_err());
        assert!(decode("up{job=node} 1\n").is_err());
        assert!(decode("up{9job=\"node\"} 1\n").is_err());
        assert!(decode("up{job=\"node\"} 1 notatimestamp\n").is_err());
        assert!(decode("# TYPE up bogus\nup 1\n").is_err());
    }

    #[test]
    fn sample_check_accepts_exposition_corners() {
        assert!(check_sample(r#"cpu_seconds_total{mode="idle",path="C:\\dir \"x\""} 1.5e3"#).is_ok());
        assert!(check_sample(r#"up{job="node",} 1 1712345678000"#).is_ok());
        assert!(check_sample("node:ratio +Inf").is_ok());
        assert!(check_sample("temperature -Inf").is_ok());
        assert!(check_sample("ratio NaN").is_ok());
        assert!(check_sample("up{} 1").is_ok());
        assert!(check_sample("up 1 2 3").is_err());
        assert!(check_sample("up").is_err());
    }

    #[test]
    fn non_finite_samples_decode() {
        let families = decode("hits +Inf\nmisses NaN\n").unwrap();
        assert_eq!(families.len(), 2);
        assert_eq!(
            families[0].metrics[0],
            MetricSample::Scalar {
                labels: LabelSet::new(),
                value: "+Inf".into(),
            }
        );
    }

    #[test]
    fn non_finite_values_use_exposition_spelling() {
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(0.25), "0.25");
        assert_eq!(format_value(1027.0), "1027");
    }
}
