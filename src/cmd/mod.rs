//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`] or [`validate`]. Each handler lives in its
//! own submodule.

pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::GatewayError;

pub async fn dispatch(cli: Cli) -> Result<(), GatewayError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(args).await,
        Some(Commands::Validate(ref args)) => validate::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  prom2json-gateway v{version}: Prometheus metrics as JSON\n\n  \
         No command provided. To get started:\n\n    \
         prom2json-gateway run                        Start with ./config.yaml\n    \
         prom2json-gateway run -c gateway.yaml        Start with a specific config file\n    \
         prom2json-gateway validate gateway.yaml      Check a config file\n    \
         prom2json-gateway --help                     See all commands and options\n"
    );
}
