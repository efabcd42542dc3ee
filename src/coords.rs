use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Parses a "lat,lng" string. Both components must be finite numbers;
    /// no range check beyond that.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let mut parts = raw.splitn(2, ',');
        let lat = parts.next().unwrap_or("").trim();
        let lng = parts.next().unwrap_or("").trim();

        let latitude: f64 = lat.parse().map_err(|_| invalid(raw))?;
        let longitude: f64 = lng.parse().map_err(|_| invalid(raw))?;
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(invalid(raw));
        }

        Ok(Coordinate {
            latitude,
            longitude,
        })
    }
}

fn invalid(raw: &str) -> AppError {
    AppError::InvalidInput(format!("invalid lat,lng: \"{raw}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_pair() {
        let c = Coordinate::parse("43.65,-79.38").unwrap();
        assert_eq!(c.latitude, 43.65);
        assert_eq!(c.longitude, -79.38);
    }

    #[test]
    fn trims_whitespace() {
        let c = Coordinate::parse(" 43.7 , -79.4 ").unwrap();
        assert_eq!(c.latitude, 43.7);
        assert_eq!(c.longitude, -79.4);
    }

    #[test]
    fn rejects_missing_component() {
        assert!(Coordinate::parse("43.65").is_err());
        assert!(Coordinate::parse("43.65,").is_err());
        assert!(Coordinate::parse(",-79.38").is_err());
        assert!(Coordinate::parse("").is_err());
    }

    #[test]
    fn rejects_non_numeric() {
        assert!(Coordinate::parse("abc,-79.38").is_err());
        assert!(Coordinate::parse("43.65,def").is_err());
    }

    #[test]
    fn rejects_non_finite() {
        assert!(Coordinate::parse("NaN,-79.38").is_err());
        assert!(Coordinate::parse("43.65,inf").is_err());
        assert!(Coordinate::parse("-inf,0").is_err());
    }
}
