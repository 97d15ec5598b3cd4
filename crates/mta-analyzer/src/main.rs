use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use mta_analyzer::{
    build_cli_args, validate_configuration, AnalysisOrchestrator, AnalyzerSettings, LogReporter,
    RunOutcome,
};
use mta_config::{Configuration, SessionRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Configuration record (JSON)")
}

fn settings_arg() -> Arg {
    Arg::new("settings")
        .long("settings")
        .value_parser(value_parser!(PathBuf))
        .help("Analyzer settings (TOML)")
}

fn cli() -> Command {
    Command::new("mta-assist")
        .version(mta_analyzer::VERSION)
        .about("Migration analysis assistant")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("args")
                .about("Print the analyzer command line for a configuration")
                .arg(config_arg())
                .arg(settings_arg()),
        )
        .subcommand(
            Command::new("validate")
                .about("Check that a configuration can be analyzed")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("analyze")
                .about("Run one analysis and wait for it to finish")
                .arg(config_arg())
                .arg(settings_arg()),
        )
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn load_config(args: &ArgMatches) -> Result<Configuration> {
    let path = args
        .get_one::<PathBuf>("config")
        .context("--config is required")?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn load_settings(args: &ArgMatches) -> Result<AnalyzerSettings> {
    match args.get_one::<PathBuf>("settings") {
        Some(path) => AnalyzerSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(AnalyzerSettings::default()),
    }
}

async fn analyze(config: Configuration, settings: AnalyzerSettings) -> Result<bool> {
    let registry = SessionRegistry::in_memory();
    let manager = registry.open(config);
    let id = manager.id();
    let orchestrator = AnalysisOrchestrator::new(settings);

    let run = orchestrator.analyze(manager, Arc::new(LogReporter));
    tokio::pin!(run);
    let outcome = tokio::select! {
        outcome = &mut run => outcome,
        _ = tokio::signal::ctrl_c() => {
            orchestrator.cancel(id).await;
            run.await
        }
    }?;

    match &outcome {
        RunOutcome::Completed {
            results,
            report_path,
        } => {
            println!("Findings: {}", results.finding_count());
            println!("Effort: {}", results.effort());
            println!("Report: {}", report_path.display());
        }
        RunOutcome::Cancelled => println!("Analysis cancelled"),
        RunOutcome::Failed(failure) => println!("Analysis failed: {failure}"),
    }
    Ok(outcome.is_completed())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("args", args)) => {
            let config = load_config(args)?;
            let settings = load_settings(args)?;
            let argv = build_cli_args(&config, &settings.default_target);
            println!("{}", serde_json::to_string_pretty(&argv)?);
        }
        Some(("validate", args)) => {
            let config = load_config(args)?;
            match validate_configuration(&config).await {
                Ok(()) => println!("Configuration '{}' is ready", config.name),
                Err(err) => {
                    println!("Configuration '{}' is not ready: {err}", config.name);
                    std::process::exit(1);
                }
            }
        }
        Some(("analyze", args)) => {
            let config = load_config(args)?;
            let settings = load_settings(args)?;
            let completed = analyze(config, settings).await?;
            std::process::exit(i32::from(!completed));
        }
        _ => {}
    }
    Ok(())
}
