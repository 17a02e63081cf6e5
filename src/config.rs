//! Configuration module for the recent-orders bridge

use std::collections::HashMap;
use std::env;

use crate::error::{BridgeError, Result};
use crate::venue::BrandHandle;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Fixed instance key every request must use (or omit)
    pub override_instance_key: Option<String>,

    /// brandRegKey -> brand handle table used to normalize amounts
    pub brands: HashMap<String, BrandHandle>,

    /// Address for the websocket and health check server
    pub listen_addr: String,

    /// Optional JSON fixture seeding the in-memory venue
    pub venue_fixture: Option<String>,

    /// Outbound queue size per channel
    pub channel_buffer: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let brands = match env::var("BRANDS") {
            Ok(raw) => parse_brands(&raw)?,
            Err(_) => HashMap::new(),
        };

        Ok(Self {
            override_instance_key: env::var("OVERRIDE_INSTANCE_KEY")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            brands,
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            venue_fixture: env::var("VENUE_FIXTURE").ok().filter(|s| !s.is_empty()),
            channel_buffer: env::var("CHANNEL_BUFFER")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .unwrap_or(256),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            override_instance_key: None,
            brands: HashMap::new(),
            listen_addr: "0.0.0.0:8000".to_string(),
            venue_fixture: None,
            channel_buffer: 256,
        }
    }
}

/// Parse `moola=brand-1,simolean=brand-2` into a brand table
pub fn parse_brands(raw: &str) -> Result<HashMap<String, BrandHandle>> {
    let mut brands = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (reg_key, handle) = entry.split_once('=').ok_or_else(|| {
            BridgeError::Configuration(format!("brand entry {:?} must be regKey=handle", entry))
        })?;
        let (reg_key, handle) = (reg_key.trim(), handle.trim());
        if reg_key.is_empty() || handle.is_empty() {
            return Err(BridgeError::Configuration(format!(
                "brand entry {:?} has an empty side",
                entry
            )));
        }
        if brands
            .insert(reg_key.to_string(), BrandHandle::new(handle))
            .is_some()
        {
            return Err(BridgeError::Configuration(format!(
                "brand {:?} configured twice",
                reg_key
            )));
        }
    }
    Ok(brands)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_brands() {
        let brands = parse_brands("moola=b1, simolean = b2,").unwrap();
        assert_eq!(brands.len(), 2);
        assert_eq!(brands["moola"], BrandHandle::new("b1"));
        assert_eq!(brands["simolean"], BrandHandle::new("b2"));
    }

    #[test]
    fn test_parse_brands_rejects_malformed() {
        assert!(parse_brands("moola").unwrap_err().is_configuration());
        assert!(parse_brands("=b1").is_err());
        assert!(parse_brands("moola=b1,moola=b2").is_err());
    }

    #[test]
    fn test_default_has_no_override() {
        let config = Config::default();
        assert!(config.override_instance_key.is_none());
        assert_eq!(config.channel_buffer, 256);
    }
}
