//! Server configuration, read once at startup from a JSON file.

use crate::error::ServerError;
use crate::persistence::DataFiles;
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_buffer_size() -> usize {
    1024
}

fn default_exit_message() -> String {
    "EXIT".to_string()
}

fn default_ranking_interval() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub port: u16,
    /// Read chunk size for client sockets.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Request body that closes a connection without a reply.
    #[serde(default = "default_exit_message")]
    pub exit_message: String,
    pub hotels_file: PathBuf,
    pub users_file: PathBuf,
    pub reviews_file: PathBuf,
    pub multicast_address: Ipv4Addr,
    pub multicast_port: u16,
    /// Milliseconds between ranking recomputations.
    #[serde(default = "default_ranking_interval")]
    pub ranking_interval: u64,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ServerError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&contents).map_err(|reason| ServerError::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, String> {
        let config: ServerConfig = serde_json::from_str(contents).map_err(|e| e.to_string())?;
        if config.buffer_size == 0 {
            return Err("bufferSize must be positive".to_string());
        }
        if !config.multicast_address.is_multicast() {
            return Err(format!(
                "{} is not a multicast address",
                config.multicast_address
            ));
        }
        Ok(config)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn multicast_group(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(
            self.multicast_address,
            self.multicast_port,
        ))
    }

    pub fn ranking_interval(&self) -> Duration {
        Duration::from_millis(self.ranking_interval.max(1))
    }

    pub fn data_files(&self) -> DataFiles {
        DataFiles {
            hotels: self.hotels_file.clone(),
            users: self.users_file.clone(),
            reviews: self.reviews_file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "port": 8080,
        "bufferSize": 2048,
        "exitMessage": "QUIT",
        "hotelsFile": "data/hotels.json",
        "usersFile": "data/users.json",
        "reviewsFile": "data/reviews.json",
        "multicastAddress": "239.0.0.1",
        "multicastPort": 4000,
        "rankingInterval": 5000
    }"#;

    #[test]
    fn test_parse_full_config() {
        let config = ServerConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.buffer_size, 2048);
        assert_eq!(config.exit_message, "QUIT");
        assert_eq!(config.ranking_interval(), Duration::from_secs(5));
        assert_eq!(config.multicast_group().to_string(), "239.0.0.1:4000");
        assert_eq!(config.listen_addr().port(), 8080);
        assert_eq!(config.data_files().users, PathBuf::from("data/users.json"));
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let json = r#"{
            "port": 9000,
            "hotelsFile": "h.json",
            "usersFile": "u.json",
            "reviewsFile": "r.json",
            "multicastAddress": "239.255.0.7",
            "multicastPort": 4446
        }"#;
        let config = ServerConfig::from_json(json).unwrap();
        assert_eq!(config.buffer_size, 1024);
        assert_eq!(config.exit_message, "EXIT");
        assert_eq!(config.ranking_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_unicast_group() {
        let json = SAMPLE.replace("239.0.0.1", "10.0.0.1");
        assert!(ServerConfig::from_json(&json).is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ServerConfig::load(Path::new("/nonexistent/server.json")).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
