use anyhow::Context;
use canvass_cli::{telemetry, App, CliConfig, DEFAULT_CONFIG_FILE};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

fn form_arg() -> Arg {
    Arg::new("form")
        .long("form")
        .required(true)
        .help("Local form id")
}

fn cli() -> Command {
    Command::new("canvass")
        .version(canvass_cli::VERSION)
        .about("Canvassing data sync, export and legacy conversion")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .default_value(DEFAULT_CONFIG_FILE)
                .value_parser(value_parser!(PathBuf))
                .help("Configuration file"),
        )
        .subcommand(
            Command::new("sync")
                .about("Upload this device's data and merge everyone else's")
                .arg(form_arg()),
        )
        .subcommand(
            Command::new("export")
                .about("Sync, then upload the survey results as CSV")
                .arg(form_arg()),
        )
        .subcommand(
            Command::new("turf")
                .about("Refresh the turf overlay without uploading")
                .arg(form_arg()),
        )
        .subcommand(
            Command::new("settings")
                .about("Change canvass settings")
                .arg(form_arg())
                .arg(
                    Arg::new("my-turf")
                        .long("my-turf")
                        .value_parser(value_parser!(bool))
                        .help("Show only this device's turf"),
                )
                .arg(
                    Arg::new("share-progress")
                        .long("share-progress")
                        .value_parser(value_parser!(bool))
                        .help("Copy the aggregate into sub-group folders"),
                ),
        )
        .subcommand(
            Command::new("convert")
                .about("Move legacy data onto a new organization")
                .arg(
                    Arg::new("accept-terms")
                        .long("accept-terms")
                        .action(ArgAction::SetTrue)
                        .help("Accept the canvassing guidelines"),
                ),
        )
}

fn form_id(args: &ArgMatches) -> anyhow::Result<&str> {
    args.get_one::<String>("form")
        .map(String::as_str)
        .context("--form is required")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = CliConfig::load(&path)?;
    telemetry::init(&config.log_filter);
    let app = App::open(config)?;

    match matches.subcommand() {
        Some(("sync", args)) => {
            let outcome = app.sync(form_id(args)?).await?;
            if let Some(notice) = outcome.notice {
                println!("{}", notice.message());
            }
            let report = outcome.result.context("sync failed")?;
            println!("Synced at: {}", report.synced_at);
            println!("Turf nodes: {}", report.turf_nodes);
            if report.aggregate.is_some() {
                println!("Sources: {}", report.sources);
                println!("Distributed: {}", report.distributed.len());
                println!("Retracted: {}", report.retracted.len());
            }
        }
        Some(("export", args)) => {
            let report = app.export(form_id(args)?).await?;
            println!("Exported {} rows to {}", report.rows, report.path);
        }
        Some(("turf", args)) => {
            let nodes = app.turf(form_id(args)?).await?;
            println!("Turf nodes: {nodes}");
        }
        Some(("settings", args)) => {
            let settings = app
                .settings(
                    form_id(args)?,
                    args.get_one::<bool>("my-turf").copied(),
                    args.get_one::<bool>("share-progress").copied(),
                )
                .await?;
            println!("Show only my turf: {}", settings.show_only_my_turf);
            println!("Share progress: {}", settings.share_progress);
        }
        Some(("convert", args)) => {
            let report = app.convert(args.get_flag("accept-terms")).await?;
            println!("Organization: {}", report.org_id);
            println!("Forms converted: {}", report.forms.len());
            for skipped in &report.skipped_forms {
                println!("  skipped {}: {}", skipped.form_id, skipped.reason);
            }
        }
        _ => {}
    }
    Ok(())
}
