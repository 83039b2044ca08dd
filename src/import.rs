// CSV import and export of fuel entries
//
// Import accepts odometer and volume in any supported unit and converts to
// canonical km / litres before anything is stored. Export writes display
// units for a given preference, with derived metrics alongside.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use crate::entities::{FuelEntry, Vehicle};
use crate::format::parse_iso_date;
use crate::metrics::{IntervalStatus, MeteredEntry};
use crate::preferences::UnitPreference;
use crate::units::{convert_distance, convert_volume, DistanceUnit, VolumeUnit};

// ============================================================================
// IMPORT
// ============================================================================

/// One CSV row as written by a user
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CsvFuelRow {
    pub date: String,
    pub vehicle: String,
    pub odometer: f64,
    #[serde(default)]
    pub station: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub grade: String,
    /// Fuel volume in the import's volume unit
    pub volume: f64,
    pub total: f64,
    #[serde(default)]
    pub notes: String,
}

/// Units the CSV values are written in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub distance_unit: DistanceUnit,
    pub volume_unit: VolumeUnit,
}

pub fn load_csv(csv_path: &Path) -> Result<Vec<CsvFuelRow>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    read_csv(file)
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<CsvFuelRow>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut rows = Vec::new();
    for (index, result) in rdr.deserialize().enumerate() {
        // header is line 1
        let row: CsvFuelRow = result.with_context(|| format!("Failed to parse CSV line {}", index + 2))?;
        rows.push(row);
    }
    debug!(rows = rows.len(), "csv loaded");
    Ok(rows)
}

/// Map rows to canonical entries. Vehicles are matched by name.
pub fn rows_to_entries(rows: &[CsvFuelRow], vehicles: &[Vehicle], options: ImportOptions) -> Result<Vec<FuelEntry>> {
    let by_name: HashMap<&str, i64> = vehicles.iter().map(|v| (v.name.as_str(), v.id)).collect();

    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            let line = index + 2;
            let vehicle_id = *by_name
                .get(row.vehicle.trim())
                .ok_or_else(|| anyhow!("Line {}: unknown vehicle '{}'", line, row.vehicle))?;
            let entry_date = parse_iso_date(&row.date).with_context(|| format!("Line {}", line))?;
            if !row.odometer.is_finite() || !row.volume.is_finite() || !row.total.is_finite() {
                bail!("Line {}: odometer, volume and total must be finite numbers", line);
            }

            let odometer_km = convert_distance(row.odometer, options.distance_unit, DistanceUnit::Kilometers);
            let liters = convert_volume(row.volume, options.volume_unit, VolumeUnit::Liters);

            Ok(FuelEntry {
                id: 0,
                vehicle_id,
                entry_date,
                odometer: odometer_km.round() as i64,
                station_name: row.station.clone(),
                fuel_brand: row.brand.clone(),
                fuel_grade: row.grade.clone(),
                liters,
                total_amount: row.total,
                notes: row.notes.clone(),
            })
        })
        .collect()
}

// ============================================================================
// EXPORT
// ============================================================================

/// One exported row, in the preference's display units
#[derive(Debug, Clone, Serialize)]
struct CsvExportRow {
    id: i64,
    vehicle_id: i64,
    date: String,
    odometer: f64,
    distance_unit: &'static str,
    station: String,
    brand: String,
    grade: String,
    volume: f64,
    volume_unit: &'static str,
    total: f64,
    currency: String,
    unit_price: Option<f64>,
    distance_since_last: Option<f64>,
    consumption: Option<f64>,
    consumption_unit: &'static str,
    cost_per_distance: Option<f64>,
    status: &'static str,
}

fn status_code(status: &IntervalStatus) -> &'static str {
    match status {
        IntervalStatus::Baseline => "baseline",
        IntervalStatus::Measured => "measured",
        IntervalStatus::NoDistance => "no_distance",
        IntervalStatus::OdometerRollback { .. } => "odometer_rollback",
    }
}

pub fn export_csv<W: Write>(writer: W, entries: &[MeteredEntry], preference: &UnitPreference) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    for m in entries {
        let e = &m.entry;
        let metrics = &m.metrics;
        let row = CsvExportRow {
            id: e.id,
            vehicle_id: e.vehicle_id,
            date: e.entry_date.format("%Y-%m-%d").to_string(),
            odometer: preference.distance_for_display(e.odometer as f64),
            distance_unit: preference.distance_unit.code(),
            station: e.station_name.clone(),
            brand: e.fuel_brand.clone(),
            grade: e.fuel_grade.clone(),
            volume: preference.volume_for_display(e.liters),
            volume_unit: preference.volume_unit.code(),
            total: e.total_amount,
            currency: preference.currency.to_string(),
            unit_price: metrics.unit_price.map(|p| preference.unit_price_for_display(p)),
            distance_since_last: metrics
                .distance_since_last
                .map(|km| preference.distance_for_display(km as f64)),
            // consumption is only ever Some for a positive value
            consumption: metrics
                .consumption_l_100km
                .and_then(|c| preference.consumption_for_display(c).ok()),
            consumption_unit: preference.consumption_unit().code(),
            cost_per_distance: metrics
                .cost_per_km
                .map(|c| preference.cost_per_distance_for_display(c)),
            status: status_code(&metrics.status),
        };
        wtr.serialize(row).context("Failed to write CSV row")?;
    }

    wtr.flush()?;
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::CurrencyCode;
    use crate::metrics::compute_history;
    use std::io::Write as _;

    const SAMPLE: &str = "\
date,vehicle,odometer,station,brand,grade,volume,total,notes
2024-06-01,Daily,6213.71,Main St,Shell,95,10.0,60.00,
2024-06-10, Daily ,6524.4,Main St,BP,95,10.5,63.00,highway
";

    fn vehicles() -> Vec<Vehicle> {
        let mut v = Vehicle::new("Daily");
        v.id = 7;
        vec![v]
    }

    #[test]
    fn test_read_and_convert_imperial_rows() {
        let rows = read_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);

        let options = ImportOptions {
            distance_unit: DistanceUnit::Miles,
            volume_unit: VolumeUnit::Gallons,
        };
        let entries = rows_to_entries(&rows, &vehicles(), options).unwrap();

        assert_eq!(entries[0].vehicle_id, 7);
        // 6213.71 mi is 10000 km
        assert_eq!(entries[0].odometer, 10_000);
        assert!((entries[0].liters - 37.8541).abs() < 1e-9);
        assert_eq!(entries[1].notes, "highway");
        assert_eq!(entries[1].fuel_brand, "BP");
    }

    #[test]
    fn test_metric_rows_pass_through() {
        let rows = read_csv(SAMPLE.as_bytes()).unwrap();
        let entries = rows_to_entries(&rows, &vehicles(), ImportOptions::default()).unwrap();
        assert_eq!(entries[0].odometer, 6_214);
        assert_eq!(entries[0].liters, 10.0);
    }

    #[test]
    fn test_unknown_vehicle_fails() {
        let rows = read_csv(SAMPLE.as_bytes()).unwrap();
        let err = rows_to_entries(&rows, &[], ImportOptions::default()).unwrap_err();
        assert!(err.to_string().contains("unknown vehicle"));
    }

    #[test]
    fn test_bad_row_reports_line() {
        let bad = "date,vehicle,odometer,station,brand,grade,volume,total,notes\n2024-06-01,Daily,abc,S,B,G,1,1,\n";
        let err = read_csv(bad.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let rows = read_csv(
            "date,vehicle,odometer,station,brand,grade,volume,total,notes\n2024-06-01,Daily,inf,S,B,G,10,15,\n".as_bytes(),
        )
        .unwrap();
        let err = rows_to_entries(&rows, &vehicles(), ImportOptions::default()).unwrap_err();
        assert!(err.to_string().contains("finite"));
    }

    #[test]
    fn test_load_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let rows = load_csv(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_export_display_units() {
        let rows = read_csv(SAMPLE.as_bytes()).unwrap();
        let entries = rows_to_entries(&rows, &vehicles(), ImportOptions::default()).unwrap();
        let metered = compute_history(&entries);

        let mut out = Vec::new();
        let written = export_csv(&mut out, &metered, &UnitPreference::imperial(CurrencyCode::USD)).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,vehicle_id,date,odometer,distance_unit"));
        assert!(lines[1].contains(",mi,"));
        assert!(lines[1].ends_with(",baseline"));
        assert!(lines[2].ends_with(",measured"));
        assert!(lines[2].contains(",mpg,"));
    }
}
