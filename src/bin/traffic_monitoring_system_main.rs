use std::path::PathBuf;
use traffic_signal_sim::config::SimulationConfig;
use traffic_signal_sim::global_variables::{DEFAULT_MONITOR_CSV, QUEUE_ROUND_RESULTS};
use traffic_signal_sim::monitoring::traffic_monitoring_system::{
    generate_report_summary, listen_round_results, print_report_summary,
};

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        // `summary [file]` prints aggregates of a recorded CSV and exits.
        Some("summary") => {
            let path = args
                .next()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MONITOR_CSV));
            match generate_report_summary(&path) {
                Ok(summary) => print_report_summary(&summary),
                Err(e) => eprintln!("Error reading {}: {}", path.display(), e),
            }
        }
        other => {
            let csv_path = other
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MONITOR_CSV));
            // Same broker resolution as the simulation's AMQP reporter.
            let mut config = SimulationConfig::default();
            if let Err(e) = config.apply_env_overrides() {
                eprintln!("Configuration error: {}", e);
                return;
            }
            if let Err(e) = listen_round_results(
                config.reporting.amqp_url,
                QUEUE_ROUND_RESULTS.to_string(),
                csv_path,
            )
            .await
            {
                eprintln!("Error in round results listener: {}", e);
            }
        }
    }
}
