use super::csv_log::{log_to_csv, read_round_records, RoundRecord};
use super::RoundReporter;
use crate::error::ReportError;
use crate::shared_data::RoundResult;
use amiquip::{Connection, ConsumerMessage, ConsumerOptions, Exchange, Publish, QueueDeclareOptions};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Publishes every round as JSON on a RabbitMQ queue for the monitoring system.
pub struct AmqpReporter {
    url: String,
    queue: String,
}

impl AmqpReporter {
    pub fn new(url: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: queue.into(),
        }
    }
}

impl RoundReporter for AmqpReporter {
    fn name(&self) -> &str {
        "amqp"
    }

    // Connects per round; rounds are seconds apart.
    fn report(&mut self, round: &RoundResult) -> Result<(), ReportError> {
        let payload = serde_json::to_string(round)?;
        let mut connection = Connection::insecure_open(&self.url)?;
        let channel = connection.open_channel(None)?;
        let exchange = Exchange::direct(&channel);
        channel.queue_declare(self.queue.as_str(), QueueDeclareOptions::default())?;
        exchange.publish(Publish::new(payload.as_bytes(), self.queue.as_str()))?;
        log::debug!(
            "Published round {} to '{}'",
            round.round_index + 1,
            self.queue
        );
        connection.close()?;
        Ok(())
    }
}

// Listens to the round results queue and logs each incoming round to CSV.
pub async fn listen_round_results(
    url: String,
    queue: String,
    csv_path: PathBuf,
) -> Result<(), ReportError> {
    tokio::task::spawn_blocking(move || -> Result<(), ReportError> {
        let mut connection = Connection::insecure_open(&url)?;
        let channel = connection.open_channel(None)?;
        let rounds = channel.queue_declare(queue.as_str(), QueueDeclareOptions::default())?;
        let consumer = rounds.consume(ConsumerOptions::default())?;
        println!("[Monitor] Waiting for round results on '{}'...", queue);

        for message in consumer.receiver() {
            match message {
                ConsumerMessage::Delivery(delivery) => {
                    match serde_json::from_slice::<RoundResult>(&delivery.body) {
                        Ok(round) => {
                            println!(
                                "[Monitor] Round {}: {} green ({})",
                                round.round_index + 1,
                                round.decision.direction,
                                round.decision.reason
                            );
                            if let Err(e) = log_to_csv(&csv_path, &RoundRecord::from_round(&round)) {
                                eprintln!("Error logging round result: {}", e);
                            }
                        }
                        Err(e) => log::warn!("[Monitor] Ignoring malformed round result: {}", e),
                    }
                    consumer.ack(delivery)?;
                }
                other => {
                    println!("[Monitor] Round results consumer ended: {:?}", other);
                    break;
                }
            }
        }
        connection.close()?;
        Ok(())
    })
    .await
    .map_err(|e| ReportError::Listener(e.to_string()))?
}

/// Aggregates over a round results CSV.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportSummary {
    pub rounds: usize,
    pub green_lights: BTreeMap<String, usize>,
    pub average_vehicles: BTreeMap<String, f64>,
    pub emergency_rounds: usize,
    pub cut_off_workers: usize,
}

pub fn generate_report_summary(path: &Path) -> Result<ReportSummary, ReportError> {
    let records = read_round_records(path)?;
    let mut summary = ReportSummary::default();
    let mut totals: BTreeMap<String, (u64, usize)> = BTreeMap::new();
    let mut rounds_seen = Vec::new();

    for record in &records {
        let key = (record.round, record.timestamp);
        if !rounds_seen.contains(&key) {
            rounds_seen.push(key);
            if record.decision_reason == "emergency-preemption" {
                summary.emergency_rounds += 1;
            }
        }
        if record.traffic_light == "Green" {
            *summary
                .green_lights
                .entry(record.direction.clone())
                .or_insert(0) += 1;
        }
        if !record.completed {
            summary.cut_off_workers += 1;
        }
        let entry = totals.entry(record.direction.clone()).or_insert((0, 0));
        entry.0 += record.vehicle_count as u64;
        entry.1 += 1;
    }

    summary.rounds = rounds_seen.len();
    summary.average_vehicles = totals
        .into_iter()
        .map(|(direction, (sum, n))| (direction, sum as f64 / n as f64))
        .collect();
    Ok(summary)
}

pub fn print_report_summary(summary: &ReportSummary) {
    println!("Report Summary:");
    println!("Rounds recorded: {}", summary.rounds);
    println!("Rounds decided by emergency preemption: {}", summary.emergency_rounds);
    println!("Workers cut off at the deadline: {}", summary.cut_off_workers);
    for (direction, avg) in &summary.average_vehicles {
        let greens = summary.green_lights.get(direction).copied().unwrap_or(0);
        println!(
            "{:<8} average vehicles {:>6.2}, green {} time(s)",
            direction, avg, greens
        );
    }
}
