use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// One entry of the `routes` array, exactly as the HTTP response carries it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResult {
    pub bus_number: Option<String>,
    pub pickup_arrival_time: Option<String>,
    pub duration_min: Option<i64>,
}

/// What lands on disk after each successful search. The display bridge reads
/// these files; `routes` must match the HTTP response body byte-for-byte.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRouteBatch {
    pub origin: String,
    pub destination: String,
    pub arrival_time: Option<String>,
    pub generated_at: String,
    pub routes: Vec<RouteResult>,
}

/// Writes the batch to a fresh, sortably named file. Files are never
/// rewritten; the bridge takes latest-by-mtime as current.
pub fn write_batch(
    dir: &Path,
    batch: &PersistedRouteBatch,
    generated_at: DateTime<Local>,
) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let body = serde_json::to_string_pretty(batch)?;
    let stamp = generated_at.format("%Y%m%d_%H%M%S_%3f").to_string();

    // create_new keeps every batch on a fresh file even when two searches
    // land in the same millisecond; collisions get a sequence suffix
    let mut path = dir.join(format!("routes_{stamp}.json"));
    let mut seq = 0u32;
    loop {
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(body.as_bytes())?;
                return Ok(path);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                seq += 1;
                path = dir.join(format!("routes_{stamp}_{seq}.json"));
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_batch() -> PersistedRouteBatch {
        PersistedRouteBatch {
            origin: "43.65,-79.38".to_owned(),
            destination: "43.70,-79.40".to_owned(),
            arrival_time: Some("08:30".to_owned()),
            generated_at: "2026-08-30T07:00:00-04:00".to_owned(),
            routes: vec![
                RouteResult {
                    bus_number: Some("52".to_owned()),
                    pickup_arrival_time: Some("07:45".to_owned()),
                    duration_min: Some(32),
                },
                RouteResult {
                    bus_number: Some("29".to_owned()),
                    pickup_arrival_time: Some("08:00".to_owned()),
                    duration_min: None,
                },
            ],
        }
    }

    #[test]
    fn wire_shape_is_camel_case() {
        let value = serde_json::to_value(sample_batch()).unwrap();
        assert_eq!(value["arrivalTime"], json!("08:30"));
        assert_eq!(value["generatedAt"], json!("2026-08-30T07:00:00-04:00"));
        assert_eq!(value["routes"][0]["busNumber"], json!("52"));
        assert_eq!(value["routes"][0]["pickupArrivalTime"], json!("07:45"));
        assert_eq!(value["routes"][1]["durationMin"], json!(null));
    }

    fn fresh_dir(slug: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("peakroute-persist-{slug}"));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn written_file_carries_the_same_routes_array() {
        let dir = fresh_dir("roundtrip");
        let batch = sample_batch();
        let stamp = Local.with_ymd_and_hms(2026, 8, 30, 7, 0, 0).unwrap();

        let path = write_batch(&dir, &batch, stamp).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["routes"], serde_json::to_value(&batch.routes).unwrap());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn file_name_is_sortable() {
        let dir = fresh_dir("naming");
        let stamp = Local.with_ymd_and_hms(2026, 8, 30, 7, 5, 9).unwrap();

        let path = write_batch(&dir, &sample_batch(), stamp).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, "routes_20260830_070509_000.json");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn same_instant_writes_land_on_distinct_files() {
        let dir = fresh_dir("collide");
        let stamp = Local.with_ymd_and_hms(2026, 8, 30, 7, 0, 0).unwrap();

        let first = write_batch(&dir, &sample_batch(), stamp).unwrap();
        let second = write_batch(&dir, &sample_batch(), stamp).unwrap();
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());

        // the suffixed name still matches the routes_*.json pattern the
        // display bridge scans for
        let name = second.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("routes_") && name.ends_with(".json"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
