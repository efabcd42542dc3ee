use chrono::{DateTime, Duration, Local};

use crate::google::RawRoute;

/// What we keep from one raw upstream route. Any field the payload omitted
/// stays `None`; absence is never papered over with a default time.
#[derive(Debug, Clone)]
pub struct ExtractedRoute {
    pub bus_number: Option<String>,
    pub pickup_time: Option<DateTime<Local>>,
    pub arrival_time: Option<DateTime<Local>>,
    pub duration_seconds: Option<i64>,
}

/// Walks legs in order, then steps in order. The first transit line seen
/// names the bus (short name, falling back to full name); the first stop
/// departure time seen is the pickup. Arrival is pickup plus total duration,
/// computed only when both are known.
pub fn extract(route: &RawRoute) -> ExtractedRoute {
    let duration_seconds = route.duration.as_deref().and_then(parse_duration_seconds);

    let mut bus_number = None;
    let mut pickup_time = None;
    for leg in &route.legs {
        for step in &leg.steps {
            let Some(td) = &step.transit_details else {
                continue;
            };
            if bus_number.is_none() {
                if let Some(line) = &td.transit_line {
                    bus_number = line.name_short.clone().or_else(|| line.name.clone());
                }
            }
            if pickup_time.is_none() {
                if let Some(sd) = &td.stop_details {
                    pickup_time = sd.departure_time.map(|t| t.with_timezone(&Local));
                }
            }
        }
    }

    let arrival_time = match (pickup_time, duration_seconds) {
        (Some(pickup), Some(secs)) => Some(pickup + Duration::seconds(secs)),
        _ => None,
    };

    ExtractedRoute {
        bus_number,
        pickup_time,
        arrival_time,
        duration_seconds,
    }
}

// "1620s" -> 1620
fn parse_duration_seconds(raw: &str) -> Option<i64> {
    raw.strip_suffix('s')?.parse().ok()
}
