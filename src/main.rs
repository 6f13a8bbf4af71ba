use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wildfi_pipeline::common::AppState;
use wildfi_pipeline::config::Config;
use wildfi_pipeline::wildfi::report;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,wildfi_pipeline=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Starting wildfi-pipeline...");

    // Load configuration (fail-fast)
    let config = Config::from_env()?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        tag_meta_file = %config.tag_meta_file.display(),
        merge_gps_points = config.import.merge_gps_points,
        parse_acc = config.import.parse_acc,
        convert_to_tz = ?config.import.convert_to_tz,
        "Configuration loaded"
    );

    let state = AppState::new(config);
    let datasets = state.datasets.load().await?;

    let problems = datasets
        .bad_rows
        .iter()
        .filter(|b| b.flags.any_problems)
        .count();
    tracing::info!(
        observations = datasets.main.len(),
        edges = datasets.edges.len(),
        tags = datasets.tags.len(),
        bad_rows = problems,
        "Datasets ready"
    );

    for tag in datasets.tags.iter() {
        tracing::debug!(
            tag_id = %tag.tag_id,
            location = ?tag.location_category,
            total_rows = tag.total_rows,
            prox_and_gps_rows = tag.prox_and_gps_rows,
            only_prox_rows = tag.only_prox_rows,
            "Tag summary"
        );
    }

    if let Some(path) = &state.config.bad_rows_export {
        let path = path.clone();
        let bad_rows = datasets.bad_rows.clone();
        tokio::task::spawn_blocking(move || report::write_csv(&bad_rows, &path)).await??;
    }

    Ok(())
}
