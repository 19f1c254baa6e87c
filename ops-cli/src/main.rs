use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use claims_service::summarize_claim;
use config_engine::EngineSettings;
use logger_redacted::init_logging;
use ops_cli::{check_approval, classify, load_settings, quote, render, Cli, Command, Scenario};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_logging(&settings.logging) {
        eprintln!("warning: {}", err);
    }

    match run(cli, settings).await {
        Ok(code) => code,
        Err(err) => {
            match classify(&err) {
                Some(engine_err) => eprintln!("error: {}", engine_err),
                None => eprintln!("error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, settings: EngineSettings) -> Result<ExitCode> {
    match cli.command {
        Command::Quote { scenario, summary } => {
            let scenario = Scenario::load(&scenario)?;
            let currency = settings.currency.clone();
            let (_, claim) = quote(settings, &scenario).await?;
            let output = if summary {
                render(&summarize_claim(&claim, &currency), cli.format)?
            } else {
                render(&claim, cli.format)?
            };
            println!("{}", output);
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckApproval { scenario } => {
            let scenario = Scenario::load(&scenario)?;
            let report = check_approval(settings, &scenario).await?;
            println!("{}", render(&report, cli.format)?);
            Ok(if report.approvable { ExitCode::SUCCESS } else { ExitCode::from(2) })
        }
        Command::Settings => {
            println!("{}", render(&settings, cli.format)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
