//! Conversion between stored metric quantities and the user's display units.
//!
//! Everything is stored in kg, cm and km. Display conversions round to one
//! decimal (weight, length) or two (distance); conversions back to metric for
//! storage round to two decimals. `None` always maps to `None`.

use crate::config::Units;

pub const KG_TO_LBS: f64 = 2.20462;
pub const CM_TO_INCHES: f64 = 0.393_701;
pub const KM_TO_MILES: f64 = 0.621_371;

/// Rendered for a missing or zero quantity.
pub const EMPTY_VALUE: &str = "—";

/// Rounds half away from zero to `decimals` places.
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl Units {
    #[must_use]
    pub const fn weight_unit(self) -> &'static str {
        match self {
            Self::Metric => "kg",
            Self::Imperial => "lbs",
        }
    }

    #[must_use]
    pub const fn length_unit(self) -> &'static str {
        match self {
            Self::Metric => "cm",
            Self::Imperial => "in",
        }
    }

    #[must_use]
    pub const fn distance_unit(self) -> &'static str {
        match self {
            Self::Metric => "km",
            Self::Imperial => "mi",
        }
    }

    // --- metric -> display ---

    #[must_use]
    pub fn convert_weight(self, kg: Option<f64>) -> Option<f64> {
        kg.map(|kg| match self {
            Self::Metric => kg,
            Self::Imperial => round_to(kg * KG_TO_LBS, 1),
        })
    }

    #[must_use]
    pub fn convert_length(self, cm: Option<f64>) -> Option<f64> {
        cm.map(|cm| match self {
            Self::Metric => cm,
            Self::Imperial => round_to(cm * CM_TO_INCHES, 1),
        })
    }

    #[must_use]
    pub fn convert_distance(self, km: Option<f64>) -> Option<f64> {
        km.map(|km| match self {
            Self::Metric => km,
            Self::Imperial => round_to(km * KM_TO_MILES, 2),
        })
    }

    // --- display -> metric (for storage) ---

    #[must_use]
    pub fn to_metric_weight(self, value: Option<f64>) -> Option<f64> {
        value.map(|v| match self {
            Self::Metric => v,
            Self::Imperial => round_to(v / KG_TO_LBS, 2),
        })
    }

    #[must_use]
    pub fn to_metric_length(self, value: Option<f64>) -> Option<f64> {
        value.map(|v| match self {
            Self::Metric => v,
            Self::Imperial => round_to(v / CM_TO_INCHES, 2),
        })
    }

    #[must_use]
    pub fn to_metric_distance(self, value: Option<f64>) -> Option<f64> {
        value.map(|v| match self {
            Self::Metric => v,
            Self::Imperial => round_to(v / KM_TO_MILES, 2),
        })
    }

    // --- formatting with unit suffix ---

    #[must_use]
    pub fn format_weight(self, kg: Option<f64>) -> String {
        match self.convert_weight(non_zero(kg)) {
            Some(v) => format!("{v}{}", self.weight_unit()),
            None => EMPTY_VALUE.to_string(),
        }
    }

    #[must_use]
    pub fn format_length(self, cm: Option<f64>) -> String {
        match self.convert_length(non_zero(cm)) {
            Some(v) => format!("{v}{}", self.length_unit()),
            None => EMPTY_VALUE.to_string(),
        }
    }

    #[must_use]
    pub fn format_distance(self, km: Option<f64>) -> String {
        match self.convert_distance(non_zero(km)) {
            Some(v) => format!("{v}{}", self.distance_unit()),
            None => EMPTY_VALUE.to_string(),
        }
    }

    /// Aggregated volume (weight x reps), abbreviated above one thousand.
    #[must_use]
    pub fn format_volume(self, kg: f64) -> String {
        let converted = self.convert_weight(Some(kg)).unwrap_or(0.0);
        let unit = self.weight_unit();
        if converted >= 1000.0 {
            format!("{:.1}k {unit}", converted / 1000.0)
        } else {
            format!("{converted} {unit}")
        }
    }
}

// Zero is a "no value" sentinel for display purposes.
fn non_zero(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0)
}
