//! Alias mapper entry point.

use std::process::ExitCode;

use chrono::Utc;
use tracing::{error, info, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use alias_mapper::{Dependencies, LogFormat, MapperError, Settings};
use alias_mapper_pipeline::{GroupOutcome, RunReport};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn run(settings: &Settings) -> Result<RunReport, MapperError> {
    let deps = Dependencies::new(settings).await?;

    let entities = deps.entities.load_entities().await?;
    info!(entities = entities.len(), "Loaded entities");

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => {
                warn!(error = %e, "Cannot listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    };

    Ok(deps.orchestrator.run_until(entities, shutdown).await)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(settings.log_format);

    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("run", run_id = %run_id);
    info!(parent: &span, started_at = %Utc::now().to_rfc3339(), "Starting alias mapper");

    let report = match run(&settings).instrument(span.clone()).await {
        Ok(report) => report,
        Err(e) => {
            error!(parent: &span, error = %e, "Alias mapper failed");
            return ExitCode::FAILURE;
        }
    };

    for group in report
        .groups
        .iter()
        .filter(|g| matches!(g.outcome, GroupOutcome::Incomplete | GroupOutcome::Failed))
    {
        match serde_json::to_string(group) {
            Ok(json) => warn!(parent: &span, group = %json, "Group left for the next run"),
            Err(e) => warn!(parent: &span, group_id = %group.group_id, error = %e, "Group left for the next run"),
        }
    }

    let min_ratio = settings.pipeline.min_success_ratio;
    if report.meets(min_ratio) {
        info!(
            parent: &span,
            success_ratio = report.success_ratio(),
            finished_at = %Utc::now().to_rfc3339(),
            "Alias mapper finished"
        );
        ExitCode::SUCCESS
    } else {
        error!(
            parent: &span,
            success_ratio = report.success_ratio(),
            min_success_ratio = min_ratio,
            "Too few groups completed"
        );
        ExitCode::FAILURE
    }
}
