use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = prom2json_gateway::cli::Cli::parse();
    if let Err(e) = prom2json_gateway::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
