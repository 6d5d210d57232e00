//! Configuration types for the relay server

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServerConfig>,

    /// Looping VP8 video source (IVF container)
    pub video_source: PathBuf,

    /// Looping Opus audio source (Ogg container)
    pub audio_source: PathBuf,

    /// Audio pacing interval in milliseconds, one Ogg page per tick
    /// (default: 20, range: 10-120)
    pub audio_page_ms: u64,

    /// Directory served as static files at the HTTP root (optional)
    pub static_dir: Option<PathBuf>,
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnServerConfig {
    /// TURN server URL (turn: or turns:)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
            ],
            turn_servers: Vec::new(),
            video_source: PathBuf::from("assets/video.ivf"),
            audio_source: PathBuf::from("assets/audio.ogg"),
            audio_page_ms: 20,
            static_dir: None,
        }
    }
}

impl RelayConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `stun_servers` is empty
    /// - `audio_page_ms` is not in range 10-120
    /// - a media source path is empty
    /// - a TURN server URL does not start with turn: or turns:
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        if self.audio_page_ms < 10 || self.audio_page_ms > 120 {
            return Err(Error::InvalidConfig(format!(
                "audio_page_ms must be in range 10-120, got {}",
                self.audio_page_ms
            )));
        }

        if self.video_source.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "video_source path must not be empty".to_string(),
            ));
        }

        if self.audio_source.as_os_str().is_empty() {
            return Err(Error::InvalidConfig(
                "audio_source path must not be empty".to_string(),
            ));
        }

        for turn in &self.turn_servers {
            if !turn.url.starts_with("turn:") && !turn.url.starts_with("turns:") {
                return Err(Error::InvalidConfig(format!(
                    "TURN server URL must start with turn: or turns:, got {}",
                    turn.url
                )));
            }
        }

        Ok(())
    }

    /// Add TURN servers to this configuration
    ///
    /// Useful for chaining onto `default()`.
    pub fn with_turn_servers(mut self, turn_servers: Vec<TurnServerConfig>) -> Self {
        self.turn_servers = turn_servers;
        self
    }

    /// Set the media source paths
    pub fn with_sources(
        mut self,
        video_source: impl Into<PathBuf>,
        audio_source: impl Into<PathBuf>,
    ) -> Self {
        self.video_source = video_source.into();
        self.audio_source = audio_source.into();
        self
    }

    /// Set the static file directory
    pub fn with_static_dir(mut self, static_dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(static_dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_stun_servers_fails() {
        let mut config = RelayConfig::default();
        config.stun_servers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_audio_page_ms_fails() {
        let mut config = RelayConfig::default();
        config.audio_page_ms = 9;
        assert!(config.validate().is_err());

        config.audio_page_ms = 121;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_source_path_fails() {
        let mut config = RelayConfig::default();
        config.video_source = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_turn_url_fails() {
        let config = RelayConfig::default().with_turn_servers(vec![TurnServerConfig {
            url: "http://turn.example.com:3478".to_string(),
            username: "user".to_string(),
            credential: "pass".to_string(),
        }]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_chain() {
        let config = RelayConfig::default()
            .with_sources("media/loop.ivf", "media/loop.ogg")
            .with_static_dir("./static")
            .with_turn_servers(vec![TurnServerConfig {
                url: "turn:turn.example.com:3478".to_string(),
                username: "user".to_string(),
                credential: "pass".to_string(),
            }]);
        assert!(config.validate().is_ok());
        assert_eq!(config.video_source, PathBuf::from("media/loop.ivf"));
        assert_eq!(config.turn_servers.len(), 1);
        assert_eq!(config.static_dir, Some(PathBuf::from("./static")));
    }

    #[test]
    fn test_config_serialization() {
        let config = RelayConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: RelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.stun_servers, deserialized.stun_servers);
        assert_eq!(config.audio_page_ms, deserialized.audio_page_ms);
    }
}
