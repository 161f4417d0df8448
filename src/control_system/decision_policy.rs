use crate::shared_data::{Decision, DecisionReason, WorkerResult};

/// Picks the direction that gets the green light.
///
/// Results must be in canonical direction order. The first direction reporting an
/// emergency vehicle wins outright; otherwise the busiest direction wins, with ties
/// going to the earliest in canonical order. Returns `None` only for empty input.
pub fn decide<'a, I>(results: I) -> Option<Decision>
where
    I: IntoIterator<Item = &'a WorkerResult>,
{
    let mut busiest: Option<&WorkerResult> = None;

    for result in results {
        if result.emergency_present {
            return Some(Decision {
                direction: result.direction,
                reason: DecisionReason::EmergencyPreemption,
            });
        }
        // strictly greater keeps the first occurrence on ties
        match busiest {
            Some(best) if result.vehicle_count <= best.vehicle_count => {}
            _ => busiest = Some(result),
        }
    }

    busiest.map(|best| Decision {
        direction: best.direction,
        reason: DecisionReason::MaxTraffic,
    })
}
