//! CLI entry point.
//!
//! Parses arguments, composes the context via bootstrap, and dispatches to
//! handlers. Handlers report failures as `CliError` where the exit code
//! matters; anything else exits with 1.

use clap::Parser;

use espbridge_cli::{Cli, CliConfig, CliContext, CliError, Commands, bootstrap, handlers};

async fn dispatch(ctx: &CliContext, command: Commands) -> anyhow::Result<i32> {
    match command {
        Commands::Run { tool, args } => handlers::run::execute(ctx, &tool, &args).await,
        Commands::Resolve { tool, platform } => {
            handlers::resolve::execute(ctx, &tool, platform);
            Ok(0)
        }
        Commands::Ports => {
            handlers::ports::execute();
            Ok(0)
        }
        Commands::Monitor { serial, hex, reset } => {
            handlers::monitor::execute(ctx, &serial, hex, reset).await?;
            Ok(0)
        }
        Commands::Reset { serial, bootloader } => {
            handlers::reset::execute(ctx, &serial, bootloader).await?;
            Ok(0)
        }
    }
}

fn report_error(err: &anyhow::Error) -> i32 {
    eprintln!("Error: {err:#}");
    err.downcast_ref::<CliError>().map_or(1, CliError::exit_code)
}

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    espbridge_cli::init_tracing(cli.verbose);

    let code = match CliConfig::from_env() {
        Ok(config) => {
            let ctx = bootstrap(config);
            dispatch(&ctx, cli.command)
                .await
                .unwrap_or_else(|err| report_error(&err))
        }
        Err(err) => report_error(&err.into()),
    };

    // Exit right away: a blocking stdin read from `monitor` would otherwise
    // hold up runtime shutdown
    std::process::exit(code);
}
