use chrono::{DateTime, Duration, Local, Utc};
use futures_util::future::join_all;
use std::collections::HashSet;

use crate::coords::Coordinate;
use crate::error::AppError;
use crate::extract::{self, ExtractedRoute};
use crate::google::GoogleClient;

const MAX_RESULTS: usize = 3;

/// Finds up to 3 candidate bus routes. Without a target arrival time this is
/// a single soonest-departure query; with one, several departure times are
/// tried against the upstream API and the merged results are ranked by how
/// close they land to the target.
pub async fn find_routes(
    google: &GoogleClient,
    origin: Coordinate,
    destination: Coordinate,
    target_arrival: Option<DateTime<Local>>,
    now: DateTime<Local>,
) -> Result<Vec<ExtractedRoute>, AppError> {
    match target_arrival {
        Some(target) => Ok(closest_arrival(google, origin, destination, target, now).await),
        None => soonest_departure(google, origin, destination, now).await,
    }
}

async fn soonest_departure(
    google: &GoogleClient,
    origin: Coordinate,
    destination: Coordinate,
    now: DateTime<Local>,
) -> Result<Vec<ExtractedRoute>, AppError> {
    let raw = google
        .compute_routes(origin, destination, Some(now.with_timezone(&Utc)))
        .await?;
    log::info!("soonest-departure query returned {} raw routes", raw.len());

    let extracted = raw.iter().map(extract::extract).collect();
    Ok(rank_soonest(extracted, now))
}

async fn closest_arrival(
    google: &GoogleClient,
    origin: Coordinate,
    destination: Coordinate,
    target: DateTime<Local>,
    now: DateTime<Local>,
) -> Vec<ExtractedRoute> {
    let departures = candidate_departures(now, target);
    if departures.is_empty() {
        log::warn!(
            "target arrival {} is not ahead of now; no departure candidates",
            target.format("%H:%M")
        );
        return Vec::new();
    }

    // Issue all queries concurrently; one failing must not drag down the rest.
    let queries = departures
        .iter()
        .map(|dep| google.compute_routes(origin, destination, Some(dep.with_timezone(&Utc))));

    let mut extracted = Vec::new();
    for (dep, outcome) in departures.iter().zip(join_all(queries).await) {
        match outcome {
            Ok(raw) => {
                log::info!(
                    "departure {} query returned {} raw routes",
                    dep.format("%H:%M"),
                    raw.len()
                );
                extracted.extend(raw.iter().map(extract::extract));
            }
            Err(err) => {
                log::warn!("departure {} query failed: {err}", dep.format("%H:%M"));
            }
        }
    }

    rank_closest(extracted, target, now)
}

/// The upstream API only takes forward departure times, so we probe a fixed
/// set working back from the target: {now, target-30min, target-60min},
/// keeping only instants still ahead of now and before the target. A known
/// approximation: buses departing well before target-60 are never seen.
fn candidate_departures(now: DateTime<Local>, target: DateTime<Local>) -> Vec<DateTime<Local>> {
    let mut candidates = Vec::new();
    if now < target {
        candidates.push(now);
    }
    for offset_min in [60, 30] {
        let dep = target - Duration::minutes(offset_min);
        if dep > now && dep < target && !candidates.contains(&dep) {
            candidates.push(dep);
        }
    }
    candidates
}

/// Drops routes with no bus or whose bus already left, then orders by pickup
/// time ascending, soonest first.
fn rank_soonest(routes: Vec<ExtractedRoute>, now: DateTime<Local>) -> Vec<ExtractedRoute> {
    let mut routes: Vec<ExtractedRoute> = routes
        .into_iter()
        .filter(|r| r.bus_number.is_some())
        .filter(|r| matches!(r.pickup_time, Some(p) if p > now))
        .collect();

    // missing pickup sorts last; the filter above already requires one
    routes.sort_by_key(|r| r.pickup_time.map_or(i64::MAX, |p| p.timestamp_millis()));
    routes.truncate(MAX_RESULTS);
    routes
}

/// Merged multi-query ranking: drop departed/incomplete routes, collapse
/// duplicate (bus, pickup) departures, rank by distance to the target
/// arrival, then present the 3 winners in chronological order.
fn rank_closest(
    routes: Vec<ExtractedRoute>,
    target: DateTime<Local>,
    now: DateTime<Local>,
) -> Vec<ExtractedRoute> {
    let mut seen: HashSet<(Option<String>, Option<DateTime<Local>>)> = HashSet::new();
    let mut candidates: Vec<ExtractedRoute> = routes
        .into_iter()
        .filter(|r| r.bus_number.is_some())
        .filter(|r| matches!(r.pickup_time, Some(p) if p > now))
        .filter(|r| seen.insert((r.bus_number.clone(), r.pickup_time)))
        .filter(|r| r.arrival_time.is_some())
        .collect();

    // stable on extraction order for ties
    candidates.sort_by_key(|r| {
        r.arrival_time
            .map_or(i64::MAX, |a| (a - target).num_seconds().abs())
    });
    candidates.truncate(MAX_RESULTS);
    candidates.sort_by_key(|r| r.arrival_time);
    candidates
}
