use anyhow::Context;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use laplens::aggregator::{LapSummary, SessionSummary};
use laplens::format::{format_lap_time, lap_pace_category};
use laplens::vehicle::parse_vehicle_id;
use laplens::{load_rows, AnalysisConfig, ProcessedSession, SessionProcessor, Story};

#[derive(Serialize)]
struct Report<'a> {
    vehicle: String,
    summary: SessionSummary,
    session: &'a ProcessedSession,
    story: Story,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let session_path = std::env::args()
        .nth(1)
        .context("usage: laplens <session.json>")?;
    let track = std::env::var("LAPLENS_TRACK").unwrap_or_else(|_| "default".to_string());
    let vehicle_id = std::env::var("LAPLENS_VEHICLE").unwrap_or_else(|_| "Unknown Vehicle".to_string());

    let config = match std::env::var("LAPLENS_CONFIG") {
        Ok(path) => AnalysisConfig::load(&path).with_context(|| format!("loading config {}", path))?,
        Err(_) => AnalysisConfig::default(),
    };

    let rows = load_rows(&session_path).with_context(|| format!("loading session {}", session_path))?;
    tracing::info!("loaded {} rows from {}", rows.len(), session_path);

    let processor = SessionProcessor::new(&config, &track);
    let session = processor.process(rows);
    let story = processor.story(&session, &vehicle_id);

    if let Some(best) = session.lap_times.iter().filter_map(|l| l.lap_time).reduce(f64::min) {
        tracing::info!("best lap {}", format_lap_time(Some(best)));
        for lap in &session.lap_times {
            let Some(t) = lap.lap_time else { continue };
            let detail = session.lap_summary(lap.lap, &config);
            let speed = |f: fn(&LapSummary) -> Option<f64>| {
                detail.as_ref().and_then(f).map_or_else(|| "-".to_string(), |v| format!("{:.1}", v))
            };
            tracing::debug!(
                "lap {:>3} {} {} avg {} max {} km/h",
                lap.lap,
                format_lap_time(Some(t)),
                lap_pace_category(t, best),
                speed(|s| s.avg_speed),
                speed(|s| s.max_speed)
            );
        }
    }

    let report = Report {
        vehicle: parse_vehicle_id(&vehicle_id).display_name(),
        summary: session.summary(),
        session: &session,
        story,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
