// simulation_main.rs
use std::path::PathBuf;
use std::process::ExitCode;
use traffic_signal_sim::config::SimulationConfig;
use traffic_signal_sim::simulation_engine::SimulationDriver;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    // Config file from the first argument or TRAFFIC_CONFIG; defaults otherwise.
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TRAFFIC_CONFIG").ok())
        .map(PathBuf::from);

    let config = match SimulationConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(2);
        }
    };

    println!(
        "Starting simulation: {} rounds, {:.1}s deadline, {:.1}s window per round",
        config.rounds, config.round_deadline_secs, config.window_length_secs
    );
    let mut driver = SimulationDriver::from_config(&config);
    match driver
        .run(
            config.rounds,
            config.round_deadline_secs,
            config.window_length_secs,
        )
        .await
    {
        Ok(summary) => {
            println!("\nGreen lights over {} rounds:", summary.rounds.len());
            for (direction, count) in &summary.green_counts {
                println!("  {:<8} {}", direction, count);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Simulation error: {}", e);
            ExitCode::FAILURE
        }
    }
}
