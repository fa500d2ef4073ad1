use chrono::{Duration, FixedOffset, TimeZone, Utc};
use gym_tracker_lib::fitness::{
    calculate_1rm, calculate_actual_weight, calculate_percentage_weight, calculate_plates_needed,
    plate_color, round_to_nearest_plate, IMPERIAL_PLATES_IN_KG, METRIC_PLATES,
};
use gym_tracker_lib::time_format::{
    day_name, format_duration, format_relative_date, format_time, is_within_days, start_of_day,
};
use gym_tracker_lib::{StandardColor, Units};

#[test]
fn test_weight_conversion() {
    assert_eq!(Units::Metric.convert_weight(Some(100.0)), Some(100.0));
    assert_eq!(Units::Imperial.convert_weight(Some(100.0)), Some(220.5));
    assert_eq!(Units::Imperial.convert_weight(None), None);
    assert_eq!(Units::Imperial.to_metric_weight(Some(220.5)), Some(100.02));
    assert_eq!(Units::Metric.to_metric_weight(Some(42.0)), Some(42.0));
}

#[test]
fn test_length_and_distance_conversion() {
    assert_eq!(Units::Imperial.convert_length(Some(100.0)), Some(39.4));
    assert_eq!(Units::Imperial.convert_distance(Some(5.0)), Some(3.11));
    assert_eq!(Units::Metric.convert_distance(Some(5.0)), Some(5.0));
    assert_eq!(Units::Imperial.length_unit(), "in");
    assert_eq!(Units::Imperial.distance_unit(), "mi");
}

#[test]
fn test_formatting_with_units() {
    assert_eq!(Units::Metric.format_weight(Some(80.0)), "80kg");
    assert_eq!(Units::Imperial.format_weight(Some(80.0)), "176.4lbs");
    // Zero and missing values render as a dash.
    assert_eq!(Units::Metric.format_weight(Some(0.0)), "—");
    assert_eq!(Units::Metric.format_length(None), "—");

    assert_eq!(Units::Metric.format_volume(850.0), "850 kg");
    assert_eq!(Units::Metric.format_volume(12_500.0), "12.5k kg");
}

#[test]
fn test_one_rep_max() {
    assert_eq!(calculate_1rm(100.0, 1), 100.0);
    assert_eq!(calculate_1rm(100.0, 10), 133.0);
    assert_eq!(calculate_1rm(60.0, 5), 70.0);
    assert_eq!(calculate_1rm(0.0, 5), 0.0);
    assert_eq!(calculate_1rm(100.0, 0), 0.0);

    assert_eq!(calculate_percentage_weight(133.0, 80.0), 106.0);
    assert_eq!(round_to_nearest_plate(103.0, 2.5), 102.5);
}

#[test]
fn test_plate_breakdown() {
    let plates = calculate_plates_needed(140.0, 20.0, &METRIC_PLATES);
    let loaded: Vec<(f64, u32)> = plates.iter().map(|p| (p.weight, p.count)).collect();
    assert_eq!(loaded, vec![(25.0, 2), (10.0, 1)]);
    assert_eq!(plates[0].color, StandardColor::Red);
    assert_eq!(calculate_actual_weight(&plates, 20.0), 140.0);

    // At or below the bar nothing is loaded.
    assert!(calculate_plates_needed(20.0, 20.0, &METRIC_PLATES).is_empty());
    assert!(calculate_plates_needed(15.0, 20.0, &METRIC_PLATES).is_empty());
}

#[test]
fn test_unreachable_remainder_is_dropped() {
    // 21 kg per side: 20 + 1 left over that no plate covers.
    let plates = calculate_plates_needed(62.0, 20.0, &METRIC_PLATES);
    let loaded: Vec<(f64, u32)> = plates.iter().map(|p| (p.weight, p.count)).collect();
    assert_eq!(loaded, vec![(20.0, 1)]);
    assert_eq!(calculate_actual_weight(&plates, 20.0), 60.0);
}

#[test]
fn test_imperial_plates_survive_float_drift() {
    // 45 lb bar plus one 45 lb plate per side, all in kg.
    let target = 20.41 * 3.0;
    let plates = calculate_plates_needed(target, 20.41, &IMPERIAL_PLATES_IN_KG);
    assert_eq!(plates.len(), 1);
    assert_eq!(plates[0].count, 1);
    assert_eq!(plates[0].color, StandardColor::Blue);
    assert_eq!(plate_color(1.25), StandardColor::Grey);
}

#[test]
fn test_time_formatting() {
    assert_eq!(format_time(0), "0:00");
    assert_eq!(format_time(65), "1:05");
    assert_eq!(format_time(3725), "62:05");

    assert_eq!(format_duration(45), "45s");
    assert_eq!(format_duration(45 * 60), "45 min");
    assert_eq!(format_duration(3600), "1h");
    assert_eq!(format_duration(5400), "1h 30min");
}

#[test]
fn test_relative_dates() {
    let now = Utc.with_ymd_and_hms(2024, 6, 12, 12, 0, 0).unwrap();
    assert_eq!(format_relative_date(now - Duration::minutes(20), now), "Just now");
    assert_eq!(format_relative_date(now - Duration::hours(5), now), "5h ago");
    assert_eq!(format_relative_date(now - Duration::days(3), now), "3d ago");

    assert!(is_within_days(now - Duration::days(6), 7, now));
    assert!(!is_within_days(now - Duration::days(8), 7, now));
}

#[test]
fn test_bar_plus_twenty_per_side() {
    let plates = calculate_plates_needed(60.0, 20.0, &METRIC_PLATES);
    let loaded: Vec<(f64, u32)> = plates.iter().map(|p| (p.weight, p.count)).collect();
    assert_eq!(loaded, vec![(20.0, 1)]);
}

#[test]
fn test_imperial_round_trip_stays_close() {
    let lbs = Units::Imperial.convert_weight(Some(85.0));
    let back = Units::Imperial.to_metric_weight(lbs).unwrap();
    assert!((back - 85.0).abs() <= 1.0, "{back}");
}

#[test]
fn test_start_of_day_and_day_name() {
    let date = Utc.with_ymd_and_hms(2024, 6, 12, 15, 42, 7).unwrap();
    assert_eq!(start_of_day(&date), Utc.with_ymd_and_hms(2024, 6, 12, 0, 0, 0).unwrap());
    assert_eq!(day_name(&date), "Wednesday");

    // Midnight is taken in the value's own offset.
    let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
    let late = tokyo.with_ymd_and_hms(2024, 6, 16, 23, 30, 0).unwrap();
    assert_eq!(start_of_day(&late), tokyo.with_ymd_and_hms(2024, 6, 16, 0, 0, 0).unwrap());
    assert_eq!(day_name(&late), "Sunday");
}
