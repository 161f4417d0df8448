// monitoring/mod.rs
//
// Presentation sinks. The driver hands every finished round to each reporter; a
// failing reporter is logged and skipped.

pub mod chart;
pub mod console;
pub mod csv_log;
pub mod traffic_monitoring_system;

use crate::config::ReportingConfig;
use crate::error::ReportError;
use crate::global_variables::QUEUE_ROUND_RESULTS;
use crate::shared_data::RoundResult;

pub use chart::ChartReporter;
pub use console::ConsoleReporter;
pub use csv_log::{CsvReporter, RoundRecord};
pub use traffic_monitoring_system::AmqpReporter;

pub trait RoundReporter: Send {
    fn name(&self) -> &str;
    fn report(&mut self, round: &RoundResult) -> Result<(), ReportError>;
}

/// Reporters enabled in the configuration, console first.
pub fn reporters_from_config(config: &ReportingConfig) -> Vec<Box<dyn RoundReporter>> {
    let mut reporters: Vec<Box<dyn RoundReporter>> = Vec::new();
    if config.console {
        reporters.push(Box::new(ConsoleReporter::stdout()));
    }
    if let Some(path) = &config.csv_path {
        reporters.push(Box::new(CsvReporter::new(path.clone())));
    }
    if let Some(dir) = &config.chart_dir {
        reporters.push(Box::new(ChartReporter::new(dir.clone())));
    }
    if config.amqp {
        reporters.push(Box::new(AmqpReporter::new(
            config.amqp_url.clone(),
            QUEUE_ROUND_RESULTS,
        )));
    }
    reporters
}
