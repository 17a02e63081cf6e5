//! Amount normalization
//!
//! Venue amounts carry an opaque brand handle. Clients only know brands by
//! their registry key, so every amount leaving the bridge is rewritten to
//! `{extent, brandRegKey}` using the configured brand table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::venue::{BrandHandle, RawAmount};

/// JSON-safe amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub extent: u64,
    /// Absent when the brand is not in the configured table
    #[serde(rename = "brandRegKey", default, skip_serializing_if = "Option::is_none")]
    pub brand_reg_key: Option<String>,
}

/// Brand handle -> brand registry key lookup
#[derive(Debug, Clone, Default)]
pub struct AmountNormalizer {
    reg_keys: HashMap<BrandHandle, String>,
}

impl AmountNormalizer {
    /// Build from a brandRegKey -> brand handle table
    pub fn new(brands: &HashMap<String, BrandHandle>) -> Self {
        let reg_keys = brands
            .iter()
            .map(|(reg_key, brand)| (brand.clone(), reg_key.clone()))
            .collect();
        Self { reg_keys }
    }

    pub fn brand_reg_key(&self, brand: &BrandHandle) -> Option<&str> {
        self.reg_keys.get(brand).map(String::as_str)
    }

    pub fn normalize(&self, amount: &RawAmount) -> Amount {
        Amount {
            extent: amount.extent,
            brand_reg_key: self.brand_reg_key(&amount.brand).map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> AmountNormalizer {
        let mut brands = HashMap::new();
        brands.insert("moola".to_string(), BrandHandle::new("b1"));
        brands.insert("simolean".to_string(), BrandHandle::new("b2"));
        AmountNormalizer::new(&brands)
    }

    #[test]
    fn test_normalize_known_brand() {
        let normalizer = normalizer();
        let raw = RawAmount {
            extent: 7,
            brand: BrandHandle::new("b2"),
        };
        let amount = normalizer.normalize(&raw);
        assert_eq!(amount.extent, 7);
        assert_eq!(amount.brand_reg_key.as_deref(), Some("simolean"));
        assert_eq!(normalizer.normalize(&raw), amount);
    }

    #[test]
    fn test_unknown_brand_omits_reg_key() {
        let raw = RawAmount {
            extent: 3,
            brand: BrandHandle::new("nope"),
        };
        let amount = normalizer().normalize(&raw);
        assert_eq!(amount.brand_reg_key, None);
        assert_eq!(
            serde_json::to_value(&amount).unwrap(),
            serde_json::json!({"extent": 3})
        );
    }

    #[test]
    fn test_serialized_shape() {
        let amount = Amount {
            extent: 5,
            brand_reg_key: Some("moola".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&amount).unwrap(),
            serde_json::json!({"extent": 5, "brandRegKey": "moola"})
        );
    }
}
