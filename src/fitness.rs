// src/fitness.rs
//! Strength math: Epley one-rep-max estimates and barbell plate loading.
use crate::config::{PlateSet, StandardColor};
use crate::units::round_to;
use serde::Serialize;

/// Standard metric plates in kg, largest first.
pub const METRIC_PLATES: [f64; 7] = [25.0, 20.0, 15.0, 10.0, 5.0, 2.5, 1.25];

/// 45, 25, 15, 10, 5 and 2.5 lb plates expressed in kg, largest first.
pub const IMPERIAL_PLATES_IN_KG: [f64; 6] = [20.41, 11.34, 6.80, 4.54, 2.27, 1.13];

// Guards `floor(remaining / plate)` against binary float drift (e.g. 2.2699999 / 2.27).
const PLATE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrainingPercentage {
    pub percent: u32,
    pub description: &'static str,
}

pub const TRAINING_PERCENTAGES: [TrainingPercentage; 9] = [
    TrainingPercentage { percent: 100, description: "1RM (max single)" },
    TrainingPercentage { percent: 95, description: "~2 reps" },
    TrainingPercentage { percent: 90, description: "~3-4 reps" },
    TrainingPercentage { percent: 85, description: "~5-6 reps" },
    TrainingPercentage { percent: 80, description: "~7-8 reps" },
    TrainingPercentage { percent: 75, description: "~10 reps" },
    TrainingPercentage { percent: 70, description: "~12 reps" },
    TrainingPercentage { percent: 65, description: "~15 reps" },
    TrainingPercentage { percent: 60, description: "~20 reps" },
];

/// Plates of one denomination loaded on each side of the bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateInfo {
    pub weight: f64,
    pub count: u32,
    pub color: StandardColor,
}

impl PlateSet {
    #[must_use]
    pub const fn plates(self) -> &'static [f64] {
        match self {
            Self::Metric => &METRIC_PLATES,
            Self::Imperial => &IMPERIAL_PLATES_IN_KG,
        }
    }
}

/// Olympic colour coding for a plate denomination (kg).
#[must_use]
pub fn plate_color(weight_kg: f64) -> StandardColor {
    // Keyed on hundredths so 6.8 and 6.80 match.
    match (weight_kg * 100.0).round() as i64 {
        2500 => StandardColor::Red,
        2000 | 2041 => StandardColor::Blue,
        1500 | 680 => StandardColor::Yellow,
        1000 | 1134 => StandardColor::Green,
        500 | 454 => StandardColor::White,
        250 => StandardColor::DarkRed,
        125 | 227 => StandardColor::Grey,
        _ => StandardColor::DarkGrey,
    }
}

/// Estimated one-rep max using the Epley formula, rounded to the nearest integer.
///
/// Returns 0 for non-positive inputs and the weight itself for a single rep.
#[must_use]
pub fn calculate_1rm(weight: f64, reps: i64) -> f64 {
    if weight <= 0.0 || reps <= 0 {
        return 0.0;
    }
    if reps == 1 {
        return weight;
    }
    (weight * (1.0 + reps as f64 / 30.0)).round()
}

#[must_use]
pub fn calculate_percentage_weight(one_rm: f64, percent: f64) -> f64 {
    (one_rm * percent / 100.0).round()
}

/// Rounds to the nearest loadable increment (2.5 kg is the usual choice).
#[must_use]
pub fn round_to_nearest_plate(value: f64, nearest: f64) -> f64 {
    if nearest <= 0.0 {
        return value;
    }
    (value / nearest).round() * nearest
}

/// Greedy per-side plate decomposition, largest denomination first.
///
/// `plates` must be sorted descending. Returns an empty list when the target
/// does not exceed the bar. The greedy walk never backtracks, so with unusual
/// denomination sets the result can leave a remainder that a different
/// combination would have covered; compare with [`calculate_actual_weight`].
#[must_use]
pub fn calculate_plates_needed(target_weight: f64, bar_weight: f64, plates: &[f64]) -> Vec<PlateInfo> {
    if target_weight <= bar_weight {
        return Vec::new();
    }

    let mut remaining = (target_weight - bar_weight) / 2.0;
    let mut result = Vec::new();

    for &plate in plates {
        if plate <= 0.0 {
            continue;
        }
        let count = ((remaining + PLATE_EPSILON) / plate).floor();
        if count >= 1.0 {
            result.push(PlateInfo {
                weight: plate,
                count: count as u32,
                color: plate_color(plate),
            });
            remaining -= count * plate;
        }
    }

    result
}

/// Total load of the bar with `plates` on each side, rounded to hundredths.
#[must_use]
pub fn calculate_actual_weight(plates: &[PlateInfo], bar_weight: f64) -> f64 {
    let plates_weight: f64 = plates
        .iter()
        .map(|p| p.weight * f64::from(p.count) * 2.0)
        .sum();
    round_to(bar_weight + plates_weight, 2)
}
