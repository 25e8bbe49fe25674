//! Configuration management for the reservation server.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::aggregates::fair::DEFAULT_VENDOR_QUOTA;
use crate::types::{Money, StallSize};
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Halls seeded when `BOOKFAIR_HALLS` is not set
pub const DEFAULT_HALLS: [&str; 7] = [
    "Hall A", "Hall B", "Hall C", "Hall D", "Hall E", "Hall F", "Hall G",
];

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application server configuration
    pub server: ServerConfig,
    /// Booking rules
    pub booking: BookingConfig,
    /// Initial stall inventory
    pub inventory: InventoryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
    /// Capacity of the store's action broadcast channel
    pub broadcast_capacity: usize,
}

/// Booking rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Maximum PENDING or CONFIRMED reservations per vendor
    pub vendor_quota: usize,
}

/// Stall inventory seeded at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Hall names, in map order
    pub halls: Vec<String>,
    /// Stalls created in every hall
    pub stalls_per_hall: usize,
    /// Price of a small stall, in cents
    pub price_small: u64,
    /// Price of a medium stall, in cents
    pub price_medium: u64,
    /// Price of a large stall, in cents
    pub price_large: u64,
}

/// A stall to create at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StallSeed {
    /// Stall code, e.g. `B-03`
    pub code: String,
    /// Hall name
    pub hall: String,
    /// Size class
    pub size: StallSize,
    /// Initial price
    pub price: Money,
}

/// Invalid configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The vendor quota must allow at least one reservation
    #[error("BOOKFAIR_VENDOR_QUOTA must be at least 1")]
    ZeroQuota,
    /// Hall names must be unique and non-empty
    #[error("Invalid hall list: {0}")]
    InvalidHalls(String),
    /// Stall codes use two digits
    #[error("BOOKFAIR_STALLS_PER_HALL must be between 1 and 99, got {0}")]
    StallsPerHall(usize),
    /// Seeded stalls must cost something
    #[error("Price for {0} stalls must be greater than zero")]
    ZeroPrice(StallSize),
    /// A broadcast channel needs room for at least one message
    #[error("BOOKFAIR_BROADCAST_CAPACITY must be at least 1")]
    ZeroBroadcastCapacity,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values fall back to their defaults; call
    /// [`Config::validate`] before using the result.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8080),
                log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
                shutdown_timeout: env::var("SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
                broadcast_capacity: env::var("BOOKFAIR_BROADCAST_CAPACITY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(bookfair_runtime::store::DEFAULT_BROADCAST_CAPACITY),
            },
            booking: BookingConfig {
                vendor_quota: env::var("BOOKFAIR_VENDOR_QUOTA")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_VENDOR_QUOTA),
            },
            inventory: InventoryConfig {
                halls: env::var("BOOKFAIR_HALLS")
                    .ok()
                    .map(|s| parse_halls(&s))
                    .unwrap_or_else(|| DEFAULT_HALLS.iter().map(ToString::to_string).collect()),
                stalls_per_hall: env::var("BOOKFAIR_STALLS_PER_HALL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(12),
                price_small: env::var("BOOKFAIR_PRICE_SMALL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(25_000),
                price_medium: env::var("BOOKFAIR_PRICE_MEDIUM")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(40_000),
                price_large: env::var("BOOKFAIR_PRICE_LARGE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60_000),
            },
        }
    }

    /// Check the values that `from_env` cannot reject on its own
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.booking.vendor_quota == 0 {
            return Err(ConfigError::ZeroQuota);
        }
        if self.server.broadcast_capacity == 0 {
            return Err(ConfigError::ZeroBroadcastCapacity);
        }
        self.inventory.validate()
    }

    /// `host:port` to bind the HTTP listener to
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                log_level: "info".to_string(),
                shutdown_timeout: 30,
                broadcast_capacity: bookfair_runtime::store::DEFAULT_BROADCAST_CAPACITY,
            },
            booking: BookingConfig {
                vendor_quota: DEFAULT_VENDOR_QUOTA,
            },
            inventory: InventoryConfig {
                halls: DEFAULT_HALLS.iter().map(ToString::to_string).collect(),
                stalls_per_hall: 12,
                price_small: 25_000,
                price_medium: 40_000,
                price_large: 60_000,
            },
        }
    }
}

impl InventoryConfig {
    /// Price configured for a size class
    #[must_use]
    pub const fn price_for(&self, size: StallSize) -> Money {
        match size {
            StallSize::Small => Money::from_cents(self.price_small),
            StallSize::Medium => Money::from_cents(self.price_medium),
            StallSize::Large => Money::from_cents(self.price_large),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.halls.is_empty() {
            return Err(ConfigError::InvalidHalls("no halls configured".to_string()));
        }
        if self.halls.len() > 26 {
            return Err(ConfigError::InvalidHalls(format!(
                "at most 26 halls are supported, got {}",
                self.halls.len()
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for hall in &self.halls {
            if hall.trim().is_empty() {
                return Err(ConfigError::InvalidHalls("empty hall name".to_string()));
            }
            if !seen.insert(hall.trim()) {
                return Err(ConfigError::InvalidHalls(format!("duplicate hall '{hall}'")));
            }
        }
        if !(1..=99).contains(&self.stalls_per_hall) {
            return Err(ConfigError::StallsPerHall(self.stalls_per_hall));
        }
        for size in StallSize::ALL {
            if self.price_for(size).is_zero() {
                return Err(ConfigError::ZeroPrice(size));
            }
        }
        Ok(())
    }

    /// Stalls to create at startup
    ///
    /// The n-th hall gets letter `A + n`, stalls are numbered from `01` and
    /// size classes cycle small, medium, large within each hall.
    #[must_use]
    pub fn seed_stalls(&self) -> Vec<StallSeed> {
        self.halls
            .iter()
            .zip('A'..='Z')
            .flat_map(|(hall, letter)| {
                (1..=self.stalls_per_hall).map(move |n| {
                    let size = StallSize::ALL[(n - 1) % StallSize::ALL.len()];
                    StallSeed {
                        code: format!("{letter}-{n:02}"),
                        hall: hall.trim().to_string(),
                        size,
                        price: self.price_for(size),
                    }
                })
            })
            .collect()
    }
}

fn parse_halls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.booking.vendor_quota, 3);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn seeds_codes_per_hall() {
        let inventory = InventoryConfig {
            halls: vec!["Hall A".to_string(), "Hall B".to_string()],
            stalls_per_hall: 4,
            price_small: 100,
            price_medium: 200,
            price_large: 300,
        };
        let seeds = inventory.seed_stalls();
        assert_eq!(seeds.len(), 8);
        assert_eq!(seeds[0].code, "A-01");
        assert_eq!(seeds[0].size, StallSize::Small);
        assert_eq!(seeds[3].size, StallSize::Small);
        assert_eq!(seeds[6].code, "B-03");
        assert_eq!(seeds[6].hall, "Hall B");
        assert_eq!(seeds[6].price, Money::from_cents(300));
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config::default();
        config.booking.vendor_quota = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroQuota));

        let mut config = Config::default();
        config.inventory.halls = vec!["Hall A".to_string(), "Hall A ".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHalls(_))));

        let mut config = Config::default();
        config.inventory.stalls_per_hall = 100;
        assert_eq!(config.validate(), Err(ConfigError::StallsPerHall(100)));

        let mut config = Config::default();
        config.inventory.price_large = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroPrice(StallSize::Large)));
    }

    #[test]
    fn parses_comma_separated_halls() {
        assert_eq!(
            parse_halls(" North , South,,East "),
            vec!["North", "South", "East"]
        );
    }
}
