//! User-editable settings.
//!
//! Settings are created with defaults on first run and overwritten
//! wholesale on save. Persistence lives in `ecotokens-store`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::impact::WaterIntensity;

/// User preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct Settings {
    /// Show eco tips and nudges.
    pub eco_mode: bool,
    /// Whether daily limits are evaluated.
    pub limits_enabled: bool,
    /// Daily token limit.
    pub token_limit: u64,
    /// Daily water limit in US fluid ounces.
    pub oz_limit: f64,
    /// Block further prompts once a limit is hit (advisory only, never enforced).
    pub hard_block: bool,
    /// Water usage rate used for impact figures.
    pub water_intensity: WaterIntensity,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            eco_mode: true,
            limits_enabled: false,
            token_limit: 15_000,
            oz_limit: 16.9,
            hard_block: false,
            water_intensity: WaterIntensity::Typical,
        }
    }
}

impl Settings {
    /// Setting keys accepted by [`Settings::set_field`].
    pub const KEYS: &'static [&'static str] = &[
        "ecoMode",
        "limitsEnabled",
        "tokenLimit",
        "ozLimit",
        "hardBlock",
        "waterIntensity",
    ];

    /// Validates value ranges.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.oz_limit.is_finite() || self.oz_limit < 0.0 {
            return Err(CoreError::InvalidSetting {
                field: "ozLimit",
                reason: format!("must be a non-negative number, got {}", self.oz_limit),
            });
        }
        Ok(())
    }

    /// Sets a single field from its textual form.
    ///
    /// Keys use the persisted camelCase names; snake_case is accepted too.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let value = value.trim();
        let mut next = self.clone();
        match key {
            "ecoMode" | "eco_mode" => next.eco_mode = parse_bool("ecoMode", value)?,
            "limitsEnabled" | "limits_enabled" => {
                next.limits_enabled = parse_bool("limitsEnabled", value)?;
            }
            "tokenLimit" | "token_limit" => {
                next.token_limit = value.parse().map_err(|_| CoreError::InvalidSetting {
                    field: "tokenLimit",
                    reason: format!("expected a non-negative integer, got {value:?}"),
                })?;
            }
            "ozLimit" | "oz_limit" => {
                next.oz_limit = value.parse().map_err(|_| CoreError::InvalidSetting {
                    field: "ozLimit",
                    reason: format!("expected a number, got {value:?}"),
                })?;
            }
            "hardBlock" | "hard_block" => next.hard_block = parse_bool("hardBlock", value)?,
            "waterIntensity" | "water_intensity" => {
                next.water_intensity = value.parse()?;
            }
            other => return Err(CoreError::UnknownSetting(other.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, CoreError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(CoreError::InvalidSetting {
            field,
            reason: format!("expected true/false, got {value:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.eco_mode);
        assert!(!s.limits_enabled);
        assert_eq!(s.token_limit, 15_000);
        assert!((s.oz_limit - 16.9).abs() < f64::EPSILON);
        assert!(!s.hard_block);
        assert_eq!(s.water_intensity, WaterIntensity::Typical);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{"limitsEnabled": true, "waterIntensity": "high"}"#).unwrap();
        assert!(s.limits_enabled);
        assert_eq!(s.water_intensity, WaterIntensity::High);
        assert_eq!(s.token_limit, 15_000);
    }

    #[test]
    fn test_set_field() {
        let mut s = Settings::default();
        s.set_field("tokenLimit", "500").unwrap();
        s.set_field("hard_block", "on").unwrap();
        s.set_field("waterIntensity", "low").unwrap();
        assert_eq!(s.token_limit, 500);
        assert!(s.hard_block);
        assert_eq!(s.water_intensity, WaterIntensity::Low);
    }

    #[test]
    fn test_set_field_rejects_bad_values() {
        let mut s = Settings::default();
        assert!(s.set_field("tokenLimit", "-1").is_err());
        assert!(s.set_field("ozLimit", "-2.5").is_err());
        assert!(s.set_field("ecoMode", "maybe").is_err());
        assert!(matches!(
            s.set_field("theme", "dark"),
            Err(CoreError::UnknownSetting(_))
        ));
    }
}
