use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use polis_report_manager::api::HttpApiClient;
use polis_report_manager::app::App;
use polis_report_manager::assoc::open_store;
use polis_report_manager::cache::{CachePolicies, EntityCache};
use polis_report_manager::config::ConfigLoader;
use polis_report_manager::domain::CountryId;
use polis_report_manager::error::PolisError;
use polis_report_manager::output::{JsonOutput, OutputMode, TextProgress};
use polis_report_manager::reference::GeographyTable;
use polis_report_manager::status::InMemoryStatusFeed;

#[derive(Parser)]
#[command(name = "polis-rm")]
#[command(about = "Policy simulation report manager: view, save and share simulation reports")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Work with saved reports")]
    Report(ReportArgs),
}

#[derive(Args)]
struct ReportArgs {
    #[command(subcommand)]
    command: ReportCommand,
}

#[derive(Subcommand)]
enum ReportCommand {
    #[command(about = "Resolve and display a saved report")]
    View(ViewArgs),
    #[command(about = "Save a resolved report graph for this user")]
    Save(SaveArgs),
    #[command(about = "Show the calculation status of a saved report")]
    Status(ViewArgs),
    #[command(about = "List saved reports")]
    List(ListArgs),
}

#[derive(Args)]
struct ViewArgs {
    association_id: String,
}

#[derive(Args)]
struct SaveArgs {
    association_id: String,

    #[arg(long)]
    share_token: Option<String>,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long)]
    country: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(polis) = report.downcast_ref::<PolisError>() {
            return ExitCode::from(map_exit_code(polis));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PolisError) -> u8 {
    match error {
        PolisError::NotFound { .. }
        | PolisError::AssociationNotFound(_)
        | PolisError::MissingConfig => 2,
        PolisError::ApiHttp(_)
        | PolisError::ApiStatus { .. }
        | PolisError::Storage(_)
        | PolisError::StorageStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?;
    let store = open_store(&config).into_diagnostic()?;
    let cache = EntityCache::with_policies(CachePolicies::with_staleness(config.staleness));
    let api = HttpApiClient::new(&config.api_base_url).into_diagnostic()?;
    // The CLI has no calculation engine in-session; the feed stays empty and
    // statuses fall back to the persisted records.
    let feed = InMemoryStatusFeed::new();
    let app = App::new(
        store,
        cache,
        api,
        feed,
        GeographyTable::builtin(),
        &config.user_id,
    );

    let Commands::Report(args) = cli.command;
    match args.command {
        ReportCommand::View(view) => {
            let result = app
                .view_report(&view.association_id, sink(output_mode))
                .into_diagnostic()?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_view(&result).into_diagnostic()?,
                OutputMode::Interactive => print_view_summary(&result),
            }
        }
        ReportCommand::Save(save) => {
            let result = app
                .save_report(
                    &save.association_id,
                    save.share_token.as_deref(),
                    sink(output_mode),
                )
                .into_diagnostic()?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_save(&result).into_diagnostic()?,
                OutputMode::Interactive => print_save_summary(&result),
            }
        }
        ReportCommand::Status(status) => {
            let result = app
                .calculation_status(&status.association_id, sink(output_mode))
                .into_diagnostic()?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_status(&result).into_diagnostic()?,
                OutputMode::Interactive => {
                    println!("report {}: {:?}", result.report_id, result.status.state)
                }
            }
        }
        ReportCommand::List(list) => {
            let country = list
                .country
                .map(|value| value.parse::<CountryId>())
                .transpose()
                .into_diagnostic()?;
            let result = app
                .list_reports(country.as_ref(), sink(output_mode))
                .into_diagnostic()?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_list(&result).into_diagnostic()?,
                OutputMode::Interactive => print_list_summary(&result),
            }
        }
    }

    Ok(())
}

fn sink(mode: OutputMode) -> &'static dyn polis_report_manager::app::ProgressSink {
    match mode {
        OutputMode::Interactive => &TextProgress,
        OutputMode::NonInteractive => &JsonOutput,
    }
}

fn print_view_summary(result: &polis_report_manager::app::ReportView) {
    let report = &result.resolved.report;
    println!(
        "report {} ({}) — {:?}",
        report.id, report.country_id, result.status.state
    );
    for sim in &result.resolved.simulations {
        println!("  simulation {} policy={}", sim.id, sim.policy_id);
    }
    for policy in &result.resolved.policies {
        println!(
            "  policy {} {}",
            policy.id,
            policy.label.as_deref().unwrap_or("(unlabeled)")
        );
    }
    for household in &result.resolved.households {
        println!("  household {}", household.id);
    }
    for geography in &result.resolved.geographies {
        println!(
            "  geography {} {}",
            geography.id,
            geography.label.as_deref().unwrap_or("(unknown region)")
        );
    }
}

fn print_save_summary(result: &polis_report_manager::share::SaveOutcome) {
    println!(
        "{:?}: report association {} ({} ingredient(s) created, {} failed)",
        result.classification,
        result.report_association.id,
        result.created,
        result.failed.len()
    );
    for failure in &result.failed {
        println!("  failed {} {}: {}", failure.kind, failure.entity_id, failure.error);
    }
}

fn print_list_summary(result: &polis_report_manager::app::ListResult) {
    if result.reports.is_empty() {
        println!("no saved reports");
        return;
    }
    for entry in &result.reports {
        println!(
            "{} report={} country={} {}",
            entry.association_id,
            entry.report_id,
            entry.country_id,
            entry.label.as_deref().unwrap_or("")
        );
    }
}
