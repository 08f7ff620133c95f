//! Per-lot monitoring configuration.
//!
//! Lots are described in TOML:
//!
//! ```toml
//! id = "downtown"
//! name = "Downtown Garage"
//! price_per_hour = 6000
//! ticks_per_minute = 1
//! vehicle_classes = ["car", "truck"]
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use lot_monitor_occupancy_models::LotId;
use serde::{Deserialize, Serialize};

use crate::ConfigurationError;
use crate::invoice::calc_invoice;

/// Monitoring configuration for a single lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotConfig {
    /// Unique lot identifier.
    pub id: LotId,
    /// Human-readable lot name.
    #[serde(default)]
    pub name: Option<String>,
    /// Hourly parking rate. Required; kept optional here so a missing
    /// value is reported as a configuration error rather than a parse
    /// error.
    #[serde(default)]
    pub price_per_hour: Option<f64>,
    /// Frames processed per billed minute.
    #[serde(default = "default_ticks_per_minute")]
    pub ticks_per_minute: u32,
    /// Detection labels that can occupy a space. Empty means every label.
    #[serde(default)]
    pub vehicle_classes: BTreeSet<String>,
}

const fn default_ticks_per_minute() -> u32 {
    1
}

impl LotConfig {
    /// Creates a configuration with the default tick rate and no class
    /// filter.
    #[must_use]
    pub fn new(id: impl Into<LotId>, price_per_hour: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            price_per_hour: Some(price_per_hour),
            ticks_per_minute: default_ticks_per_minute(),
            vehicle_classes: BTreeSet::new(),
        }
    }

    /// Parses a lot configuration from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Toml`] if the TOML is malformed.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::de::from_str(toml_str)?)
    }

    /// Reads a lot configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// The lot name, falling back to its id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }

    /// Validates the pricing fields.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the price is missing, not
    /// positive or not finite, or if `ticks_per_minute` is zero.
    pub fn billing_policy(&self) -> Result<BillingPolicy, ConfigurationError> {
        let price = self
            .price_per_hour
            .ok_or_else(|| ConfigurationError::MissingPrice {
                lot_id: self.id.clone(),
            })?;
        BillingPolicy::new(price, self.ticks_per_minute)
    }
}

/// Validated pricing rules for one lot, fixed for the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillingPolicy {
    price_per_hour: f64,
    ticks_per_minute: u32,
}

impl BillingPolicy {
    /// Creates a policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPrice`] unless the price is a
    /// positive finite number, and [`ConfigurationError::InvalidTickRate`]
    /// if `ticks_per_minute` is zero.
    pub fn new(price_per_hour: f64, ticks_per_minute: u32) -> Result<Self, ConfigurationError> {
        if !price_per_hour.is_finite() || price_per_hour <= 0.0 {
            return Err(ConfigurationError::InvalidPrice {
                price: price_per_hour,
            });
        }
        if ticks_per_minute == 0 {
            return Err(ConfigurationError::InvalidTickRate);
        }

        Ok(Self {
            price_per_hour,
            ticks_per_minute,
        })
    }

    /// Hourly rate.
    #[must_use]
    pub const fn price_per_hour(&self) -> f64 {
        self.price_per_hour
    }

    /// Frames per billed minute.
    #[must_use]
    pub const fn ticks_per_minute(&self) -> u32 {
        self.ticks_per_minute
    }

    /// Whole minutes billed after `ticks` occupied frames.
    #[must_use]
    pub fn billed_minutes(&self, ticks: u64) -> u64 {
        ticks / u64::from(self.ticks_per_minute)
    }

    /// Unrounded invoice for `minutes` at this policy's rate.
    #[must_use]
    pub fn invoice(&self, minutes: u64) -> f64 {
        calc_invoice(minutes, self.price_per_hour)
    }
}
