//! Client configuration.
//!
//! Defaults suit a local development server; each field can be overridden
//! through a `WORLDVIEW_*` environment variable.

use crate::error::{ClientError, Result};

use std::env;
use std::path::PathBuf;

pub const SERVER_URL_VAR: &str = "WORLDVIEW_SERVER_URL";
pub const USERNAME_VAR: &str = "WORLDVIEW_USERNAME";
pub const WORLD_SIZE_VAR: &str = "WORLDVIEW_WORLD_SIZE";
pub const BACKGROUND_VAR: &str = "WORLDVIEW_BACKGROUND";
pub const NPC_COUNT_VAR: &str = "WORLDVIEW_NPC_COUNT";

const MAX_NPCS: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// WebSocket endpoint, `ws://` or `wss://`.
    pub server_url: String,
    pub username: String,
    /// Side length of the square world, in world pixels.
    pub world_size: f32,
    /// World background image; `None` draws a flat fill.
    pub background: Option<PathBuf>,
    pub npc_count: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080/ws".into(),
            username: "wanderer".into(),
            world_size: 2000.0,
            background: Some(PathBuf::from("assets/world.png")),
            npc_count: 8,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when a variable is set but invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when a value is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(SERVER_URL_VAR) {
            let url = url.trim();
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ClientError::Config {
                    var: SERVER_URL_VAR,
                    reason: format!("expected a ws:// or wss:// URL, got {url:?}"),
                });
            }
            config.server_url = url.to_owned();
        }

        if let Some(name) = lookup(USERNAME_VAR) {
            let name = name.trim();
            if name.is_empty() {
                return Err(ClientError::Config {
                    var: USERNAME_VAR,
                    reason: "must not be empty".into(),
                });
            }
            config.username = name.to_owned();
        }

        if let Some(raw) = lookup(WORLD_SIZE_VAR) {
            config.world_size = match raw.trim().parse::<f32>() {
                Ok(size) if size.is_finite() && size > 0.0 => size,
                _ => {
                    return Err(ClientError::Config {
                        var: WORLD_SIZE_VAR,
                        reason: format!("expected a positive number, got {raw:?}"),
                    });
                }
            };
        }

        if let Some(path) = lookup(BACKGROUND_VAR) {
            let path = path.trim();
            config.background = (!path.is_empty()).then(|| PathBuf::from(path));
        }

        if let Some(raw) = lookup(NPC_COUNT_VAR) {
            config.npc_count = match raw.trim().parse::<usize>() {
                Ok(count) if count <= MAX_NPCS => count,
                _ => {
                    return Err(ClientError::Config {
                        var: NPC_COUNT_VAR,
                        reason: format!("expected 0..={MAX_NPCS}, got {raw:?}"),
                    });
                }
            };
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |var| {
            pairs
                .iter()
                .find(|(k, _)| k == var)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = ClientConfig::from_lookup(|_| None).expect("defaults are valid");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (SERVER_URL_VAR, "wss://example.net/play"),
            (USERNAME_VAR, "  ada "),
            (WORLD_SIZE_VAR, "4096"),
            (BACKGROUND_VAR, ""),
            (NPC_COUNT_VAR, "3"),
        ]))
        .expect("valid overrides");

        assert_eq!(config.server_url, "wss://example.net/play");
        assert_eq!(config.username, "ada");
        assert!((config.world_size - 4096.0).abs() < f32::EPSILON);
        assert_eq!(config.background, None);
        assert_eq!(config.npc_count, 3);
    }

    #[test]
    fn rejects_bad_values() {
        for (var, value) in [
            (SERVER_URL_VAR, "http://example.net"),
            (USERNAME_VAR, "   "),
            (WORLD_SIZE_VAR, "-5"),
            (WORLD_SIZE_VAR, "big"),
            (NPC_COUNT_VAR, "100000"),
        ] {
            let result = ClientConfig::from_lookup(lookup_from(&[(var, value)]));
            assert!(
                matches!(result, Err(ClientError::Config { .. })),
                "{var}={value:?} should be rejected"
            );
        }
    }
}
