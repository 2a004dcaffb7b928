//! CLI entry point - the composition root.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use buttontalk_cli::console::shared_output;
use buttontalk_cli::{Cli, CliError, Commands, bootstrap, handlers, load_settings};
use buttontalk_voice::TurnOutcome;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli, command: &Commands) -> anyhow::Result<i32> {
    if matches!(command, Commands::Config) {
        handlers::config::execute(&load_settings(cli)?)?;
        return Ok(0);
    }

    let ctx = bootstrap(
        cli,
        shared_output(std::io::stdout()),
        shared_output(std::io::stderr()),
    )?;

    match command {
        Commands::Ask { prompt } => {
            let outcome = handlers::ask::execute(&ctx, prompt).await?;
            Ok(i32::from(matches!(outcome, TurnOutcome::Aborted(_))))
        }
        Commands::Chat => {
            handlers::chat::execute(&ctx).await?;
            Ok(0)
        }
        Commands::Config => Ok(0),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables (API keys, BUTTONTALK_*)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let code = match run(&cli, command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            e.downcast_ref::<CliError>().map_or(1, CliError::exit_code)
        }
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
