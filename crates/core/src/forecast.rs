//! Duration and output-size forecasts carried by a process definition.
//!
//! Forecasts are operator-entered strings: durations like `"10min"` or
//! `"2h"`, sizes either absolute (`"512m"`, `"2g"`) or relative to the
//! total input size (`"*1"`, `"*2.5"`). They inform scheduling and quota
//! decisions upstream; the engine itself only parses and carries them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// DurationForecast
// ---------------------------------------------------------------------------

/// Expected wall-clock duration of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationForecast(pub Duration);

impl DurationForecast {
    /// Parse a forecast like `"30s"`, `"10min"`, `"2h"` or `"1d"`.
    pub fn parse(spec: &str) -> Result<Self, CoreError> {
        let spec = spec.trim();
        let unit_start = spec
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| invalid_duration(spec))?;
        let (amount, unit) = spec.split_at(unit_start);
        let amount: u64 = amount.parse().map_err(|_| invalid_duration(spec))?;
        let seconds = match unit.trim() {
            "s" | "sec" => amount,
            "m" | "min" => amount * 60,
            "h" | "hour" | "hours" => amount * 3600,
            "d" | "day" | "days" => amount * 86_400,
            _ => return Err(invalid_duration(spec)),
        };
        Ok(Self(Duration::from_secs(seconds)))
    }

    pub fn expected(self) -> Duration {
        self.0
    }
}

fn invalid_duration(spec: &str) -> CoreError {
    CoreError::Validation(format!(
        "Invalid duration forecast '{spec}'. Expected forms like '30s', '10min', '2h', '1d'"
    ))
}

// ---------------------------------------------------------------------------
// SizeForecast
// ---------------------------------------------------------------------------

/// Expected total output size of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SizeForecast {
    /// Fixed number of bytes, whatever the input size.
    Absolute(u64),
    /// Multiplier applied to the total input size.
    PerInputMultiplier(f64),
}

impl SizeForecast {
    /// Parse a forecast like `"1024"`, `"512k"`, `"20m"`, `"2g"` (absolute,
    /// powers of 1024) or `"*1"`, `"*2.5"` (relative to input size).
    pub fn parse(spec: &str) -> Result<Self, CoreError> {
        let spec = spec.trim();
        if let Some(multiplier) = spec.strip_prefix('*') {
            let factor: f64 = multiplier.trim().parse().map_err(|_| invalid_size(spec))?;
            if !factor.is_finite() || factor <= 0.0 {
                return Err(invalid_size(spec));
            }
            return Ok(Self::PerInputMultiplier(factor));
        }

        let (amount, unit) = match spec.find(|c: char| !c.is_ascii_digit()) {
            Some(idx) => spec.split_at(idx),
            None => (spec, ""),
        };
        let amount: u64 = amount.parse().map_err(|_| invalid_size(spec))?;
        let bytes = match unit.trim() {
            "" | "b" => amount,
            "k" => amount * 1024,
            "m" => amount * 1024 * 1024,
            "g" => amount * 1024 * 1024 * 1024,
            _ => return Err(invalid_size(spec)),
        };
        Ok(Self::Absolute(bytes))
    }

    /// Expected output bytes for an execution whose inputs total
    /// `total_input_bytes`.
    pub fn expected_bytes(self, total_input_bytes: u64) -> u64 {
        match self {
            Self::Absolute(bytes) => bytes,
            Self::PerInputMultiplier(factor) => (total_input_bytes as f64 * factor).ceil() as u64,
        }
    }
}

fn invalid_size(spec: &str) -> CoreError {
    CoreError::Validation(format!(
        "Invalid size forecast '{spec}'. Expected forms like '512m', '2g' or '*1', '*2.5'"
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
