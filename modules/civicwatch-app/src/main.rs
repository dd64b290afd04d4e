use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use civicwatch_app::dashboard::{cluster_pins, map_pins, prioritized, CLUSTER_PRECISION};
use civicwatch_app::App;
use civicwatch_common::{Config, ReportStatus};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("civicwatch=info".parse()?))
        .init();

    info!("CivicWatch starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    // Optional initial fragment, e.g. `civicwatch '#public_reports'`
    let fragment = std::env::args().nth(1);

    let mut app = App::from_config(&config);
    let readiness = app.boot(fragment.as_deref()).await;
    info!(readiness = ?readiness, view = ?app.navigator().current(), "Startup complete");

    let analytics = app.analytics();
    info!(
        total = analytics.total,
        new = analytics.count(ReportStatus::New),
        in_progress = analytics.count(ReportStatus::InProgress),
        resolved = analytics.count(ReportStatus::Resolved),
        resolution_rate = %format!("{:.1}%", analytics.resolution_rate * 100.0),
        average_progress = %format!("{:.0}", analytics.average_progress),
        unassigned_open = analytics.unassigned_open,
        "Report summary"
    );
    for (category, count) in analytics.top_categories(5) {
        info!(category = category.as_str(), count, "Top category");
    }

    let reports = &app.state().reports;
    for report in prioritized(reports).into_iter().take(5) {
        info!(
            id = report.id.as_str(),
            severity = %report.severity,
            status = %report.status,
            score = report.community_score(),
            title = report.title.as_str(),
            "Priority"
        );
    }

    let clusters = cluster_pins(&map_pins(reports), CLUSTER_PRECISION);
    if let Some(densest) = clusters.first() {
        info!(
            geohash = densest.geohash.as_str(),
            reports = densest.report_ids.len(),
            lat = densest.center_lat,
            lng = densest.center_lng,
            "Densest area"
        );
    }

    Ok(())
}
