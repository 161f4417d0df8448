use super::RoundReporter;
use crate::error::ReportError;
use crate::shared_data::RoundResult;
use plotters::prelude::*;
use std::error::Error;
use std::path::{Path, PathBuf};

/// Saves a vehicle-count bar chart per round; the green bar is the direction that
/// got the light.
pub struct ChartReporter {
    dir: PathBuf,
}

impl ChartReporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn chart_path(&self, round: &RoundResult) -> PathBuf {
        self.dir
            .join(format!("round_{}_vehicle_counts.png", round.round_index + 1))
    }
}

fn render_chart(path: &Path, round: &RoundResult) -> Result<(), Box<dyn Error>> {
    let labels: Vec<String> = round
        .results
        .iter()
        .map(|r| r.direction.to_string())
        .collect();
    let bars = round.results.len() as u32;
    let max_count = round
        .results
        .iter()
        .map(|r| r.vehicle_count)
        .max()
        .unwrap_or(0)
        .max(1);

    let root = BitMapBackend::new(path, (640, 480)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Vehicle Count, Round {}", round.round_index + 1),
            ("sans-serif", 20),
        )
        .margin(20)
        .x_label_area_size(35)
        .y_label_area_size(40)
        .build_cartesian_2d((0u32..bars).into_segmented(), 0u32..(max_count + 1))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Vehicles")
        .x_label_formatter(&|v: &SegmentValue<u32>| match v {
            SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
                labels.get(*i as usize).cloned().unwrap_or_default()
            }
            SegmentValue::Last => String::new(),
        })
        .draw()?;

    let winner = round.decision.direction;
    let counts = || {
        round
            .results
            .iter()
            .enumerate()
            .map(|(i, r)| (i as u32, r.direction, r.vehicle_count))
    };
    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.filled())
            .margin(10)
            .data(counts().filter(|(_, d, _)| *d != winner).map(|(i, _, c)| (i, c))),
    )?;
    chart.draw_series(
        Histogram::vertical(&chart)
            .style(GREEN.filled())
            .margin(10)
            .data(counts().filter(|(_, d, _)| *d == winner).map(|(i, _, c)| (i, c))),
    )?;

    root.present()?;
    Ok(())
}

impl RoundReporter for ChartReporter {
    fn name(&self) -> &str {
        "chart"
    }

    fn report(&mut self, round: &RoundResult) -> Result<(), ReportError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.chart_path(round);
        render_chart(&path, round).map_err(|e| ReportError::Chart(e.to_string()))?;
        log::debug!("Vehicle count chart saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_data::{Decision, DecisionReason, DirectionId};

    #[test]
    fn one_chart_file_per_round() {
        let reporter = ChartReporter::new("charts");
        let round = RoundResult {
            round_index: 1,
            window_offset_secs: 10.0,
            timestamp: 0,
            elapsed_ms: 0,
            results: vec![],
            decision: Decision {
                direction: DirectionId::North,
                reason: DecisionReason::MaxTraffic,
            },
            failed_directions: vec![],
        };
        assert_eq!(
            reporter.chart_path(&round),
            PathBuf::from("charts").join("round_2_vehicle_counts.png")
        );
    }
}
