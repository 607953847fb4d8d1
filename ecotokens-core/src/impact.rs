//! Environmental impact figures derived from token counts.
//!
//! All figures are illustrative: fixed per-unit rates applied to token
//! counts, not measurements.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Millilitres per US fluid ounce.
pub const ML_PER_OZ: f64 = 29.5735;

/// Fluid ounces in a standard 500 mL water bottle.
pub const OZ_PER_BOTTLE: f64 = 16.9;

/// Grams of CO2 attributed to a single token.
pub const GRAMS_CO2_PER_TOKEN: f64 = 0.01;

/// Grams of CO2 per mile driven in an average passenger car.
pub const GRAMS_CO2_PER_MILE_DRIVING: f64 = 400.0;

/// Grams of CO2 a tree absorbs per year.
pub const GRAMS_CO2_PER_TREE_YEAR: f64 = 21_000.0;

// ============================================================================
// Water
// ============================================================================

/// Water usage rate, in millilitres per 1000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WaterIntensity {
    /// 0.5 mL per 1000 tokens.
    Low,
    /// 2.0 mL per 1000 tokens.
    #[default]
    Typical,
    /// 6.0 mL per 1000 tokens.
    High,
}

impl WaterIntensity {
    /// Returns the rate in mL per 1000 tokens.
    pub fn ml_per_1k_tokens(self) -> f64 {
        match self {
            Self::Low => 0.5,
            Self::Typical => 2.0,
            Self::High => 6.0,
        }
    }

    /// Returns the lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Typical => "typical",
            Self::High => "high",
        }
    }
}

impl fmt::Display for WaterIntensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WaterIntensity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "typical" => Ok(Self::Typical),
            "high" => Ok(Self::High),
            other => Err(CoreError::InvalidSetting {
                field: "waterIntensity",
                reason: format!("expected low, typical or high, got {other:?}"),
            }),
        }
    }
}

/// Water consumed for a number of tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct WaterUsage {
    /// Millilitres.
    pub ml: f64,
    /// US fluid ounces.
    pub oz: f64,
    /// 16.9 oz water bottles.
    pub bottles: f64,
}

/// Computes the water attributed to `tokens` at the given intensity.
#[allow(clippy::cast_precision_loss)]
pub fn compute_water(tokens: u64, intensity: WaterIntensity) -> WaterUsage {
    let ml = (tokens as f64 / 1000.0) * intensity.ml_per_1k_tokens();
    let oz = ml / ML_PER_OZ;
    WaterUsage {
        ml,
        oz,
        bottles: oz / OZ_PER_BOTTLE,
    }
}

// ============================================================================
// CO2
// ============================================================================

/// Grams of CO2 attributed to `tokens`.
#[allow(clippy::cast_precision_loss)]
pub fn co2_grams(tokens: u64) -> f64 {
    tokens as f64 * GRAMS_CO2_PER_TOKEN
}

/// Formats grams of CO2 as `"N g"` or `"N.NN kg"`.
pub fn format_co2(grams: f64) -> String {
    if grams < 1000.0 {
        format!("{} g", format_number(grams))
    } else {
        format!("{:.2} kg", grams / 1000.0)
    }
}

/// Describes grams of CO2 as a driving distance or tree offset time.
pub fn co2_equivalence(grams: f64) -> String {
    if grams < 1.0 {
        return "-".to_string();
    }
    let miles = grams / GRAMS_CO2_PER_MILE_DRIVING;
    if miles < 0.01 {
        return "~10 m driven".to_string();
    }
    if miles < 1.0 {
        return format!("~{:.0} ft driven", miles * 5280.0);
    }
    if miles < 10.0 {
        return format!("~{miles:.1} mi driven");
    }
    let tree_years = grams / GRAMS_CO2_PER_TREE_YEAR;
    if tree_years >= 0.01 {
        return format!("~{:.0} days to offset", tree_years * 365.0);
    }
    format!("~{miles:.1} mi driven")
}

/// Formats a number rounded to an integer with thousands separators.
#[allow(clippy::cast_possible_truncation)]
pub fn format_number(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// Everyday Equivalences
// ============================================================================

/// A unit used to express an amount in everyday terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquivalenceTier {
    /// Singular name ("water bottle").
    pub singular: &'static str,
    /// Plural name ("water bottles").
    pub plural: &'static str,
    /// Amount per unit (litres or miles, depending on the table).
    pub unit_value: f64,
}

/// Water tiers, in litres per unit.
pub const WATER_TIERS: &[EquivalenceTier] = &[
    EquivalenceTier { singular: "soda can", plural: "soda cans", unit_value: 0.355 },
    EquivalenceTier { singular: "water bottle", plural: "water bottles", unit_value: 0.5 },
    EquivalenceTier { singular: "gallon jug", plural: "gallon jugs", unit_value: 3.785 },
    EquivalenceTier { singular: "bathtub", plural: "bathtubs", unit_value: 150.0 },
    EquivalenceTier { singular: "backyard pool", plural: "backyard pools", unit_value: 50_000.0 },
    EquivalenceTier { singular: "olympic pool", plural: "olympic pools", unit_value: 2_500_000.0 },
];

/// Distance tiers, in miles per unit.
pub const MILES_TIERS: &[EquivalenceTier] = &[
    EquivalenceTier {
        singular: "football field length",
        plural: "football fields",
        unit_value: 0.0568,
    },
    EquivalenceTier { singular: "5K run", plural: "5K runs", unit_value: 3.107 },
    EquivalenceTier { singular: "marathon", plural: "marathons", unit_value: 26.2 },
    EquivalenceTier { singular: "road trip", plural: "road trips", unit_value: 100.0 },
    EquivalenceTier {
        singular: "cross-country drive",
        plural: "cross-country drives",
        unit_value: 2800.0,
    },
];

/// An amount expressed as a count of some tier's unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Equivalence {
    /// Chosen tier.
    pub tier: EquivalenceTier,
    /// How many units of the tier.
    pub count: f64,
}

impl Equivalence {
    /// Renders as e.g. `"8.0 water bottles"`.
    pub fn label(&self) -> String {
        let name = if (self.count - 1.0).abs() < f64::EPSILON {
            self.tier.singular
        } else {
            self.tier.plural
        };
        format!("{:.1} {}", self.count, name)
    }
}

const PREFERRED_MIN: f64 = 1.0;
const PREFERRED_MAX: f64 = 30.0;
const PREFERRED_TARGET: f64 = 8.0;

/// Picks the tier that expresses `value` most readably.
///
/// Among tiers giving a count in `[1, 30]` the one closest to 8 wins;
/// otherwise the tier whose count lands nearest that range. Returns `None`
/// only for an empty tier table.
pub fn best_equivalence(value: f64, tiers: &[EquivalenceTier]) -> Option<Equivalence> {
    let first = *tiers.first()?;
    if value == 0.0 {
        return Some(Equivalence { tier: first, count: 0.0 });
    }

    let candidates = tiers.iter().map(|tier| Equivalence {
        tier: *tier,
        count: value / tier.unit_value,
    });

    let in_range = candidates
        .clone()
        .filter(|e| (PREFERRED_MIN..=PREFERRED_MAX).contains(&e.count))
        .reduce(|best, e| {
            if (e.count - PREFERRED_TARGET).abs() < (best.count - PREFERRED_TARGET).abs() {
                e
            } else {
                best
            }
        });
    if in_range.is_some() {
        return in_range;
    }

    let distance = |count: f64| {
        if count < PREFERRED_MIN {
            PREFERRED_MIN - count
        } else if count > PREFERRED_MAX {
            count - PREFERRED_MAX
        } else {
            0.0
        }
    };
    candidates.reduce(|best, e| if distance(e.count) < distance(best.count) { e } else { best })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_compute_water_typical() {
        let w = compute_water(1000, WaterIntensity::Typical);
        assert!(approx(w.ml, 2.0, 1e-9));
        assert!(approx(w.oz, 0.0676, 1e-4));
        assert!(approx(w.bottles, 0.004, 1e-4));
    }

    #[test]
    fn test_compute_water_rates() {
        assert!(approx(compute_water(1000, WaterIntensity::Low).ml, 0.5, 1e-9));
        assert!(approx(compute_water(1000, WaterIntensity::High).ml, 6.0, 1e-9));
        assert!(approx(compute_water(0, WaterIntensity::High).ml, 0.0, 1e-9));
    }

    #[test]
    fn test_water_intensity_parse() {
        assert_eq!("HIGH".parse::<WaterIntensity>().unwrap(), WaterIntensity::High);
        assert!("extreme".parse::<WaterIntensity>().is_err());
    }

    #[test]
    fn test_co2() {
        assert!(approx(co2_grams(1000), 10.0, 1e-9));
        assert_eq!(format_co2(10.0), "10 g");
        assert_eq!(format_co2(2500.0), "2.50 kg");
    }

    #[test]
    fn test_co2_equivalence_bands() {
        assert_eq!(co2_equivalence(0.5), "-");
        assert_eq!(co2_equivalence(2.0), "~10 m driven");
        assert_eq!(co2_equivalence(200.0), "~2640 ft driven");
        assert_eq!(co2_equivalence(2000.0), "~5.0 mi driven");
        assert_eq!(co2_equivalence(21_000.0), "~365 days to offset");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999.4), "999");
        assert_eq!(format_number(1234.0), "1,234");
        assert_eq!(format_number(1_234_567.0), "1,234,567");
    }

    #[test]
    fn test_best_equivalence_prefers_count_near_eight() {
        // 4 litres: 11.3 cans, 8 bottles, 1.06 jugs
        let eq = best_equivalence(4.0, WATER_TIERS).unwrap();
        assert_eq!(eq.tier.singular, "water bottle");
        assert!(approx(eq.count, 8.0, 1e-9));
        assert_eq!(eq.label(), "8.0 water bottles");
    }

    #[test]
    fn test_best_equivalence_out_of_range() {
        // 0.01 litres: every tier gives a count below 1; soda can is closest
        let eq = best_equivalence(0.01, WATER_TIERS).unwrap();
        assert_eq!(eq.tier.singular, "soda can");
    }

    #[test]
    fn test_best_equivalence_zero_and_empty() {
        let eq = best_equivalence(0.0, MILES_TIERS).unwrap();
        assert!(approx(eq.count, 0.0, 1e-12));
        assert!(best_equivalence(1.0, &[]).is_none());
    }
}
