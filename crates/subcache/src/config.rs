use std::{env, time::Duration};

use subcache_core::document::DestinationKey;

use crate::cache::CacheOptions;

/// Configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Queries span every destination by default (default: false)
    pub search_in_all: bool,
    /// Destinations the demo subscription cycles through (default: "s1,s2")
    pub destinations: Vec<DestinationKey>,
    /// Demo tick interval in milliseconds (default: 500)
    pub tick_ms: u64,
    /// Upper bound on demo parent documents (default: 20)
    pub max_documents: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SUBCACHE_SEARCH_IN_ALL` - Search all destinations by default (default: false)
    /// - `SUBCACHE_DESTINATIONS` - Comma-separated destination keys (default: "s1,s2")
    /// - `SUBCACHE_TICK_MS` - Demo tick interval in milliseconds (default: 500)
    /// - `SUBCACHE_MAX_DOCUMENTS` - Demo parent size bound (default: 20)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            search_in_all: lookup("SUBCACHE_SEARCH_IN_ALL")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(false),
            destinations: lookup("SUBCACHE_DESTINATIONS")
                .map(|v| parse_destinations(&v))
                .filter(|keys| !keys.is_empty())
                .unwrap_or_else(|| vec!["s1".into(), "s2".into()]),
            tick_ms: lookup("SUBCACHE_TICK_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            max_documents: lookup("SUBCACHE_MAX_DOCUMENTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
        }
    }

    /// Get the tick interval as a Duration.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions::default().with_search_in_all(self.search_in_all)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Splits a comma-separated list, dropping blanks and repeats.
pub fn parse_destinations(value: &str) -> Vec<DestinationKey> {
    let mut keys: Vec<DestinationKey> = Vec::new();
    for key in value.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        let key = DestinationKey::from(key);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}
