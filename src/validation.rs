// Validation for vehicles and fuel entries before they reach the store
//
// Field rules: positive quantities, no future dates, bounded text with markup
// stripped. Odometer rules: a reading must sit strictly between its
// neighbours in the vehicle's timeline and above the initial odometer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entities::fuel_entry::{FUEL_BRAND_MAX, FUEL_GRADE_MAX, NOTES_MAX, STATION_NAME_MAX};
use crate::entities::vehicle::{FUEL_TYPE_MAX, MAKE_MAX, MODEL_MAX, NAME_MAX};
use crate::entities::{FuelEntry, Vehicle};
use crate::error::{FuelError, Result};
use crate::metrics::{next_entry, previous_entry};

// ============================================================================
// ISSUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: &str, code: &str, message: impl Into<String>) -> Self {
        ValidationIssue {
            field: field.to_string(),
            code: code.to_string(),
            message: message.into(),
        }
    }
}

fn into_result(issues: Vec<ValidationIssue>) -> Result<()> {
    if issues.is_empty() {
        Ok(())
    } else {
        Err(FuelError::Validation(issues))
    }
}

// ============================================================================
// TEXT
// ============================================================================

/// Drop HTML tags (keeping their text content) and trim surrounding whitespace.
/// A `<` only opens a tag when followed by a letter, `/` or `!` and closed
/// by a later `>`; anything else is ordinary text.
pub fn sanitize_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let opens_tag = after
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!');

        match after.find('>') {
            Some(end) if opens_tag => rest = &after[end + 1..],
            _ => {
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

fn clean_field(
    value: &mut String,
    field: &str,
    max: usize,
    required: bool,
    issues: &mut Vec<ValidationIssue>,
) {
    *value = sanitize_text(value);
    if required && value.is_empty() {
        issues.push(ValidationIssue::new(field, "required", format!("{} is required.", field)));
    }
    if value.chars().count() > max {
        issues.push(ValidationIssue::new(
            field,
            "max_length",
            format!("{} must be at most {} characters.", field, max),
        ));
    }
}

// ============================================================================
// VEHICLE
// ============================================================================

/// Sanitises text fields in place and checks limits
pub fn validate_vehicle(vehicle: &mut Vehicle) -> Result<()> {
    let mut issues = Vec::new();

    clean_field(&mut vehicle.name, "name", NAME_MAX, true, &mut issues);
    clean_field(&mut vehicle.make, "make", MAKE_MAX, false, &mut issues);
    clean_field(&mut vehicle.model, "model", MODEL_MAX, false, &mut issues);
    clean_field(&mut vehicle.fuel_type, "fuel_type", FUEL_TYPE_MAX, false, &mut issues);

    if vehicle.initial_odometer < 0 {
        issues.push(ValidationIssue::new(
            "initial_odometer",
            "negative",
            "Initial odometer cannot be negative.",
        ));
    }

    into_result(issues)
}

/// A new initial odometer may not exceed the lowest recorded reading
pub fn check_initial_odometer(new_initial: i64, entries: &[FuelEntry]) -> Result<()> {
    match entries.iter().map(|e| e.odometer).min() {
        Some(min) if new_initial > min => Err(FuelError::Validation(vec![ValidationIssue::new(
            "initial_odometer",
            "initial_gt_entry",
            format!(
                "Initial odometer cannot be greater than the smallest existing fuel entry odometer reading ({} km).",
                min
            ),
        )])),
        _ => Ok(()),
    }
}

// ============================================================================
// FUEL ENTRY
// ============================================================================

/// Field-level checks; sanitises text fields in place
pub fn validate_entry(entry: &mut FuelEntry, today: NaiveDate) -> Result<()> {
    let mut issues = Vec::new();

    if entry.entry_date > today {
        issues.push(ValidationIssue::new(
            "entry_date",
            "future_date",
            "Entry date cannot be in the future.",
        ));
    }
    if !entry.liters.is_finite() {
        issues.push(ValidationIssue::new("liters", "not_finite", "Liters must be a finite number."));
    } else if entry.liters <= 0.0 {
        issues.push(ValidationIssue::new(
            "liters",
            "not_positive",
            "Liters must be greater than zero.",
        ));
    }
    if !entry.total_amount.is_finite() {
        issues.push(ValidationIssue::new(
            "total_amount",
            "not_finite",
            "Total amount must be a finite number.",
        ));
    } else if entry.total_amount <= 0.0 {
        issues.push(ValidationIssue::new(
            "total_amount",
            "not_positive",
            "Total amount must be greater than zero.",
        ));
    }
    if entry.odometer <= 0 {
        issues.push(ValidationIssue::new(
            "odometer",
            "not_positive",
            "Odometer reading must be greater than zero.",
        ));
    }

    clean_field(&mut entry.station_name, "station_name", STATION_NAME_MAX, true, &mut issues);
    clean_field(&mut entry.fuel_brand, "fuel_brand", FUEL_BRAND_MAX, true, &mut issues);
    clean_field(&mut entry.fuel_grade, "fuel_grade", FUEL_GRADE_MAX, true, &mut issues);
    clean_field(&mut entry.notes, "notes", NOTES_MAX, false, &mut issues);

    into_result(issues)
}

/// Odometer must be above the vehicle's initial reading, above the previous
/// entry and below the next one. `existing` may contain other vehicles.
pub fn check_odometer(vehicle: &Vehicle, existing: &[FuelEntry], candidate: &FuelEntry) -> Result<()> {
    let odometer = candidate.odometer;

    if odometer <= vehicle.initial_odometer {
        return Err(FuelError::Validation(vec![ValidationIssue::new(
            "odometer",
            "odometer_le_initial",
            format!(
                "Odometer reading must be greater than the vehicle's initial odometer ({} km).",
                vehicle.initial_odometer
            ),
        )]));
    }

    if let Some(prev) = previous_entry(existing, vehicle.id, candidate.entry_date, candidate.id) {
        if odometer <= prev.odometer {
            return Err(FuelError::Validation(vec![ValidationIssue::new(
                "odometer",
                "odometer_le_previous",
                format!(
                    "Odometer reading must be greater than the previous entry ({} km on {}).",
                    prev.odometer, prev.entry_date
                ),
            )]));
        }
    }

    if let Some(next) = next_entry(existing, vehicle.id, candidate.entry_date, candidate.id) {
        if odometer >= next.odometer {
            return Err(FuelError::Validation(vec![ValidationIssue::new(
                "odometer",
                "odometer_ge_next",
                format!(
                    "Odometer reading must be less than the next entry ({} km on {}).",
                    next.odometer, next.entry_date
                ),
            )]));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn valid_entry() -> FuelEntry {
        FuelEntry::new(1, date(2024, 6, 1), 10_500, 40.0, 60.0)
            .with_station("Shell Main St")
            .with_fuel("Shell", "95")
    }

    fn codes(err: FuelError) -> Vec<String> {
        match err {
            FuelError::Validation(issues) => issues.into_iter().map(|i| i.code).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("  <b>Shell</b> "), "Shell");
        assert_eq!(sanitize_text("<script>alert(1)</script>Station"), "alert(1)Station");
        assert_eq!(sanitize_text("plain"), "plain");
        assert_eq!(sanitize_text("a > b"), "a > b");
    }

    #[test]
    fn test_sanitize_keeps_bare_angle_brackets() {
        assert_eq!(sanitize_text("a < b"), "a < b");
        assert_eq!(sanitize_text("price < yesterday, cheaper"), "price < yesterday, cheaper");
        assert_eq!(sanitize_text("1<2 and 3>2"), "1<2 and 3>2");
        assert_eq!(sanitize_text("<!-- note -->kept"), "kept");
        // unterminated tag stays as text
        assert_eq!(sanitize_text("see <b"), "see <b");
    }

    #[test]
    fn test_valid_entry_passes() {
        let mut e = valid_entry();
        assert!(validate_entry(&mut e, date(2024, 6, 1)).is_ok());
    }

    #[test]
    fn test_entry_field_rules() {
        let mut e = valid_entry();
        e.liters = 0.0;
        e.total_amount = -1.0;
        e.odometer = 0;
        e.entry_date = date(2024, 6, 2);

        let codes = codes(validate_entry(&mut e, date(2024, 6, 1)).unwrap_err());
        assert!(codes.contains(&"future_date".to_string()));
        assert_eq!(codes.iter().filter(|c| *c == "not_positive").count(), 3);
    }

    #[test]
    fn test_entry_rejects_non_finite_amounts() {
        let mut e = valid_entry();
        e.liters = f64::INFINITY;
        e.total_amount = f64::NAN;

        let codes = codes(validate_entry(&mut e, date(2024, 6, 1)).unwrap_err());
        assert_eq!(codes, vec!["not_finite", "not_finite"]);
    }

    #[test]
    fn test_entry_text_limits() {
        let mut e = valid_entry();
        e.fuel_grade = "x".repeat(FUEL_GRADE_MAX + 1);
        e.station_name = "<i></i>".to_string();

        let err = validate_entry(&mut e, date(2024, 6, 1)).unwrap_err();
        let codes = codes(err);
        assert!(codes.contains(&"max_length".to_string()));
        assert!(codes.contains(&"required".to_string()));
        assert!(e.station_name.is_empty());
    }

    #[test]
    fn test_vehicle_validation() {
        let mut v = Vehicle::new("  <b>Daily</b>  ");
        assert!(validate_vehicle(&mut v).is_ok());
        assert_eq!(v.name, "Daily");

        let mut blank = Vehicle::new("   ");
        assert_eq!(codes(validate_vehicle(&mut blank).unwrap_err()), vec!["required"]);
    }

    #[test]
    fn test_odometer_rules() {
        let mut vehicle = Vehicle::new("Daily").with_initial_odometer(9_000);
        vehicle.id = 1;

        let existing = vec![
            FuelEntry::new(1, date(2024, 5, 1), 10_000, 40.0, 60.0).with_id(1),
            FuelEntry::new(1, date(2024, 5, 20), 11_000, 40.0, 60.0).with_id(2),
        ];

        let mut candidate = FuelEntry::new(1, date(2024, 5, 10), 10_400, 30.0, 45.0);
        assert!(check_odometer(&vehicle, &existing, &candidate).is_ok());

        candidate.odometer = 9_000;
        assert_eq!(codes(check_odometer(&vehicle, &existing, &candidate).unwrap_err()), vec!["odometer_le_initial"]);

        candidate.odometer = 10_000;
        assert_eq!(codes(check_odometer(&vehicle, &existing, &candidate).unwrap_err()), vec!["odometer_le_previous"]);

        candidate.odometer = 11_000;
        assert_eq!(codes(check_odometer(&vehicle, &existing, &candidate).unwrap_err()), vec!["odometer_ge_next"]);
    }

    #[test]
    fn test_odometer_edit_ignores_itself() {
        let mut vehicle = Vehicle::new("Daily");
        vehicle.id = 1;
        let existing = vec![
            FuelEntry::new(1, date(2024, 5, 1), 10_000, 40.0, 60.0).with_id(1),
            FuelEntry::new(1, date(2024, 5, 20), 11_000, 40.0, 60.0).with_id(2),
        ];

        let mut edited = existing[1].clone();
        edited.odometer = 11_200;
        assert!(check_odometer(&vehicle, &existing, &edited).is_ok());
    }

    #[test]
    fn test_initial_odometer_bound() {
        let existing = vec![FuelEntry::new(1, date(2024, 5, 1), 10_000, 40.0, 60.0).with_id(1)];
        assert!(check_initial_odometer(10_000, &existing).is_ok());
        assert_eq!(codes(check_initial_odometer(10_001, &existing).unwrap_err()), vec!["initial_gt_entry"]);
        assert!(check_initial_odometer(50_000, &[]).is_ok());
    }
}
