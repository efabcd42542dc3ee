use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub google_maps_api_key: String,
    pub port: u16,
    pub routes_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let google_maps_api_key =
            env::var("GOOGLE_MAPS_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            Err(_) => 3001,
        };

        let routes_dir = env::var("ROUTES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("routes"));

        Ok(Config {
            google_maps_api_key,
            port,
            routes_dir,
        })
    }
}
