// SQLite store for vehicles and fuel entries
// Only canonical metric values are persisted; derived metrics are recomputed on read

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::entities::{FuelEntry, Vehicle};
use crate::metrics::{compute_history, MeteredEntry};
use crate::validation::{check_initial_odometer, check_odometer, validate_entry, validate_vehicle};

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Vehicles
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS vehicles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            make TEXT NOT NULL DEFAULT '',
            model TEXT NOT NULL DEFAULT '',
            year INTEGER,
            initial_odometer INTEGER NOT NULL DEFAULT 0,
            fuel_type TEXT NOT NULL DEFAULT '',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Fuel entries (km, litres)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS fuel_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vehicle_id INTEGER NOT NULL REFERENCES vehicles(id) ON DELETE CASCADE,
            entry_date TEXT NOT NULL,
            odometer INTEGER NOT NULL,
            station_name TEXT NOT NULL,
            fuel_brand TEXT NOT NULL,
            fuel_grade TEXT NOT NULL,
            liters REAL NOT NULL,
            total_amount REAL NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (vehicle_id, entry_date, odometer)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_vehicle_date ON fuel_entries(vehicle_id, entry_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_vehicle_odometer ON fuel_entries(vehicle_id, odometer)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_date ON fuel_entries(entry_date)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn vehicle_from_row(row: &Row) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: row.get(0)?,
        name: row.get(1)?,
        make: row.get(2)?,
        model: row.get(3)?,
        year: row.get(4)?,
        initial_odometer: row.get(5)?,
        fuel_type: row.get(6)?,
        is_active: row.get(7)?,
    })
}

fn entry_from_row(row: &Row) -> rusqlite::Result<FuelEntry> {
    let date_text: String = row.get(2)?;
    let entry_date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(FuelEntry {
        id: row.get(0)?,
        vehicle_id: row.get(1)?,
        entry_date,
        odometer: row.get(3)?,
        station_name: row.get(4)?,
        fuel_brand: row.get(5)?,
        fuel_grade: row.get(6)?,
        liters: row.get(7)?,
        total_amount: row.get(8)?,
        notes: row.get(9)?,
    })
}

const VEHICLE_COLUMNS: &str = "id, name, make, model, year, initial_odometer, fuel_type, is_active";
const ENTRY_COLUMNS: &str =
    "id, vehicle_id, entry_date, odometer, station_name, fuel_brand, fuel_grade, liters, total_amount, notes";

// ============================================================================
// VEHICLES
// ============================================================================

/// Validates and inserts, returning the vehicle with its new id
pub fn insert_vehicle(conn: &Connection, vehicle: &Vehicle) -> Result<Vehicle> {
    let mut vehicle = vehicle.clone();
    validate_vehicle(&mut vehicle)?;

    conn.execute(
        "INSERT INTO vehicles (name, make, model, year, initial_odometer, fuel_type, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            vehicle.name,
            vehicle.make,
            vehicle.model,
            vehicle.year,
            vehicle.initial_odometer,
            vehicle.fuel_type,
            vehicle.is_active,
        ],
    )
    .with_context(|| format!("Failed to insert vehicle '{}'", vehicle.name))?;

    vehicle.id = conn.last_insert_rowid();
    info!(vehicle_id = vehicle.id, name = %vehicle.name, "vehicle added");
    Ok(vehicle)
}

pub fn get_vehicles(conn: &Connection) -> Result<Vec<Vehicle>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM vehicles ORDER BY created_at DESC, id DESC",
        VEHICLE_COLUMNS
    ))?;
    let vehicles = stmt
        .query_map([], vehicle_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(vehicles)
}

pub fn get_vehicle(conn: &Connection, vehicle_id: i64) -> Result<Option<Vehicle>> {
    let vehicle = conn
        .query_row(
            &format!("SELECT {} FROM vehicles WHERE id = ?1", VEHICLE_COLUMNS),
            params![vehicle_id],
            vehicle_from_row,
        )
        .optional()?;
    Ok(vehicle)
}

pub fn find_vehicle_by_name(conn: &Connection, name: &str) -> Result<Option<Vehicle>> {
    let vehicle = conn
        .query_row(
            &format!("SELECT {} FROM vehicles WHERE name = ?1", VEHICLE_COLUMNS),
            params![name.trim()],
            vehicle_from_row,
        )
        .optional()?;
    Ok(vehicle)
}

/// Changes the starting odometer; rejected when above the lowest recorded reading
pub fn update_initial_odometer(conn: &Connection, vehicle_id: i64, initial_odometer: i64) -> Result<()> {
    if initial_odometer < 0 {
        bail!("Initial odometer cannot be negative");
    }
    let entries = get_entries_for_vehicle(conn, vehicle_id)?;
    check_initial_odometer(initial_odometer, &entries)?;

    let updated = conn.execute(
        "UPDATE vehicles SET initial_odometer = ?1 WHERE id = ?2",
        params![initial_odometer, vehicle_id],
    )?;
    if updated == 0 {
        bail!("Vehicle {} not found", vehicle_id);
    }
    info!(vehicle_id, initial_odometer, "initial odometer updated");
    Ok(())
}

/// Updates every editable field. The initial odometer may not exceed the
/// lowest recorded reading for the vehicle.
pub fn update_vehicle(conn: &Connection, vehicle: &Vehicle) -> Result<Vehicle> {
    let mut vehicle = vehicle.clone();
    validate_vehicle(&mut vehicle)?;

    let entries = get_entries_for_vehicle(conn, vehicle.id)?;
    check_initial_odometer(vehicle.initial_odometer, &entries)?;

    let updated = conn
        .execute(
            "UPDATE vehicles
             SET name = ?1, make = ?2, model = ?3, year = ?4, initial_odometer = ?5, fuel_type = ?6, is_active = ?7
             WHERE id = ?8",
            params![
                vehicle.name,
                vehicle.make,
                vehicle.model,
                vehicle.year,
                vehicle.initial_odometer,
                vehicle.fuel_type,
                vehicle.is_active,
                vehicle.id,
            ],
        )
        .with_context(|| format!("Failed to update vehicle '{}'", vehicle.name))?;
    if updated == 0 {
        bail!("Vehicle {} not found", vehicle.id);
    }
    info!(vehicle_id = vehicle.id, "vehicle updated");
    Ok(vehicle)
}

/// Removes the vehicle and, through the foreign key, all of its entries
pub fn delete_vehicle(conn: &Connection, vehicle_id: i64) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM vehicles WHERE id = ?1", params![vehicle_id])?;
    if deleted > 0 {
        info!(vehicle_id, "vehicle deleted");
    }
    Ok(deleted > 0)
}

// ============================================================================
// FUEL ENTRIES
// ============================================================================

/// Validates against field rules and the vehicle's odometer timeline, then inserts
pub fn insert_fuel_entry(conn: &Connection, entry: &FuelEntry, today: NaiveDate) -> Result<FuelEntry> {
    let vehicle = get_vehicle(conn, entry.vehicle_id)?
        .ok_or_else(|| anyhow!("Vehicle {} not found", entry.vehicle_id))?;

    let mut entry = entry.clone();
    entry.id = 0;
    validate_entry(&mut entry, today)?;

    let existing = get_entries_for_vehicle(conn, vehicle.id)?;
    check_odometer(&vehicle, &existing, &entry)?;

    insert_row(conn, &entry).with_context(|| {
        format!(
            "Failed to insert fuel entry for vehicle {} on {}",
            entry.vehicle_id, entry.entry_date
        )
    })?;
    entry.id = conn.last_insert_rowid();
    debug!(entry_id = entry.id, vehicle_id = entry.vehicle_id, "fuel entry added");
    Ok(entry)
}

fn insert_row(conn: &Connection, entry: &FuelEntry) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO fuel_entries (
            vehicle_id, entry_date, odometer, station_name, fuel_brand, fuel_grade,
            liters, total_amount, notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.vehicle_id,
            entry.entry_date.format("%Y-%m-%d").to_string(),
            entry.odometer,
            entry.station_name,
            entry.fuel_brand,
            entry.fuel_grade,
            entry.liters,
            entry.total_amount,
            entry.notes,
        ],
    )
}

/// Outcome of a bulk import
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Bulk insert. Rows already present (same vehicle, date and odometer) are
/// skipped so importing the same file twice is harmless. Rows failing
/// validation are logged and counted, not fatal.
pub fn insert_fuel_entries(conn: &Connection, entries: &[FuelEntry], today: NaiveDate) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for entry in entries {
        let duplicate: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM fuel_entries WHERE vehicle_id = ?1 AND entry_date = ?2 AND odometer = ?3)",
            params![
                entry.vehicle_id,
                entry.entry_date.format("%Y-%m-%d").to_string(),
                entry.odometer
            ],
            |row| row.get(0),
        )?;
        if duplicate {
            summary.duplicates += 1;
            continue;
        }

        match insert_fuel_entry(conn, entry, today) {
            Ok(_) => summary.inserted += 1,
            Err(e) => {
                warn!(
                    vehicle_id = entry.vehicle_id,
                    date = %entry.entry_date,
                    odometer = entry.odometer,
                    error = %e,
                    "entry rejected"
                );
                summary.rejected += 1;
            }
        }
    }

    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        rejected = summary.rejected,
        "import finished"
    );
    Ok(summary)
}

pub fn get_fuel_entry(conn: &Connection, entry_id: i64) -> Result<Option<FuelEntry>> {
    let entry = conn
        .query_row(
            &format!("SELECT {} FROM fuel_entries WHERE id = ?1", ENTRY_COLUMNS),
            params![entry_id],
            entry_from_row,
        )
        .optional()?;
    Ok(entry)
}

/// Edits a stored entry in place. The odometer is checked against the
/// entry's neighbours with the entry itself left out of the timeline.
pub fn update_fuel_entry(conn: &Connection, entry: &FuelEntry, today: NaiveDate) -> Result<FuelEntry> {
    if get_fuel_entry(conn, entry.id)?.is_none() {
        bail!("Fuel entry {} not found", entry.id);
    }
    let vehicle = get_vehicle(conn, entry.vehicle_id)?
        .ok_or_else(|| anyhow!("Vehicle {} not found", entry.vehicle_id))?;

    let mut entry = entry.clone();
    validate_entry(&mut entry, today)?;

    let existing = get_entries_for_vehicle(conn, vehicle.id)?;
    check_odometer(&vehicle, &existing, &entry)?;

    conn.execute(
        "UPDATE fuel_entries
         SET vehicle_id = ?1, entry_date = ?2, odometer = ?3, station_name = ?4, fuel_brand = ?5,
             fuel_grade = ?6, liters = ?7, total_amount = ?8, notes = ?9
         WHERE id = ?10",
        params![
            entry.vehicle_id,
            entry.entry_date.format("%Y-%m-%d").to_string(),
            entry.odometer,
            entry.station_name,
            entry.fuel_brand,
            entry.fuel_grade,
            entry.liters,
            entry.total_amount,
            entry.notes,
            entry.id,
        ],
    )
    .with_context(|| format!("Failed to update fuel entry {}", entry.id))?;
    debug!(entry_id = entry.id, vehicle_id = entry.vehicle_id, "fuel entry updated");
    Ok(entry)
}

pub fn delete_fuel_entry(conn: &Connection, entry_id: i64) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM fuel_entries WHERE id = ?1", params![entry_id])?;
    Ok(deleted > 0)
}

/// Chronological (entry date, then id)
pub fn get_entries_for_vehicle(conn: &Connection, vehicle_id: i64) -> Result<Vec<FuelEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM fuel_entries WHERE vehicle_id = ?1 ORDER BY entry_date, id",
        ENTRY_COLUMNS
    ))?;
    let entries = stmt
        .query_map(params![vehicle_id], entry_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

pub fn get_all_entries(conn: &Connection) -> Result<Vec<FuelEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM fuel_entries ORDER BY vehicle_id, entry_date, id",
        ENTRY_COLUMNS
    ))?;
    let entries = stmt
        .query_map([], entry_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

/// Entries with derived metrics, for one vehicle or all of them
pub fn load_metered_entries(conn: &Connection, vehicle_id: Option<i64>) -> Result<Vec<MeteredEntry>> {
    let entries = match vehicle_id {
        Some(id) => get_entries_for_vehicle(conn, id)?,
        None => get_all_entries(conn)?,
    };
    Ok(compute_history(&entries))
}

/// Entry list filters. Dates are inclusive; text filters are
/// case-insensitive substring matches.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EntryFilter {
    #[serde(rename = "vehicle")]
    pub vehicle_id: Option<i64>,
    pub date_after: Option<NaiveDate>,
    pub date_before: Option<NaiveDate>,
    pub fuel_brand: Option<String>,
    pub fuel_grade: Option<String>,
    pub station_name: Option<String>,
}

fn contains_ignore_case(haystack: &str, needle: &Option<String>) -> bool {
    match needle.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(needle) => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

impl EntryFilter {
    pub fn matches(&self, entry: &FuelEntry) -> bool {
        self.vehicle_id.map_or(true, |id| entry.vehicle_id == id)
            && self.date_after.map_or(true, |d| entry.entry_date >= d)
            && self.date_before.map_or(true, |d| entry.entry_date <= d)
            && contains_ignore_case(&entry.fuel_brand, &self.fuel_brand)
            && contains_ignore_case(&entry.fuel_grade, &self.fuel_grade)
            && contains_ignore_case(&entry.station_name, &self.station_name)
    }
}

/// Filtered entries with metrics. Metrics come from each vehicle's full
/// history, so filtering never changes an entry's derived values.
pub fn query_entries(conn: &Connection, filter: &EntryFilter) -> Result<Vec<MeteredEntry>> {
    let metered = load_metered_entries(conn, filter.vehicle_id)?;
    Ok(metered.into_iter().filter(|m| filter.matches(&m.entry)).collect())
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM fuel_entries", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FuelError;
    use crate::metrics::IntervalStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 12, 31)
    }

    fn setup() -> (Connection, Vehicle) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let vehicle = insert_vehicle(&conn, &Vehicle::new("Daily").with_initial_odometer(9_000)).unwrap();
        (conn, vehicle)
    }

    fn entry(vehicle_id: i64, day: u32, odometer: i64, liters: f64, total: f64) -> FuelEntry {
        FuelEntry::new(vehicle_id, date(2024, 6, day), odometer, liters, total)
            .with_station("Main St")
            .with_fuel("Shell", "95")
    }

    #[test]
    fn test_vehicle_round_trip() {
        let (conn, vehicle) = setup();
        assert!(vehicle.id > 0);

        let loaded = get_vehicle(&conn, vehicle.id).unwrap().unwrap();
        assert_eq!(loaded, vehicle);
        assert_eq!(find_vehicle_by_name(&conn, "Daily").unwrap().unwrap().id, vehicle.id);
        assert!(get_vehicle(&conn, 999).unwrap().is_none());
        assert_eq!(get_vehicles(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_vehicle_name_rejected() {
        let (conn, _) = setup();
        assert!(insert_vehicle(&conn, &Vehicle::new("Daily")).is_err());
    }

    #[test]
    fn test_insert_and_meter() {
        let (conn, vehicle) = setup();
        insert_fuel_entry(&conn, &entry(vehicle.id, 1, 10_000, 35.0, 52.5), today()).unwrap();
        insert_fuel_entry(&conn, &entry(vehicle.id, 10, 10_500, 40.0, 60.0), today()).unwrap();

        let metered = load_metered_entries(&conn, Some(vehicle.id)).unwrap();
        assert_eq!(metered.len(), 2);
        assert_eq!(metered[0].metrics.status, IntervalStatus::Baseline);
        assert_eq!(metered[1].metrics.distance_since_last, Some(500));
        assert!((metered[1].metrics.consumption_l_100km.unwrap() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_odometer_validation_on_insert() {
        let (conn, vehicle) = setup();
        insert_fuel_entry(&conn, &entry(vehicle.id, 10, 10_500, 40.0, 60.0), today()).unwrap();

        let err = insert_fuel_entry(&conn, &entry(vehicle.id, 20, 10_400, 40.0, 60.0), today()).unwrap_err();
        match err.downcast_ref::<FuelError>() {
            Some(FuelError::Validation(issues)) => assert_eq!(issues[0].code, "odometer_le_previous"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(verify_count(&conn).unwrap(), 1);
    }

    #[test]
    fn test_bulk_import_is_idempotent() {
        let (conn, vehicle) = setup();
        let batch = vec![
            entry(vehicle.id, 1, 10_000, 35.0, 52.5),
            entry(vehicle.id, 10, 10_500, 40.0, 60.0),
            entry(vehicle.id, 20, 11_000, 38.0, 57.0),
        ];

        let first = insert_fuel_entries(&conn, &batch, today()).unwrap();
        let second = insert_fuel_entries(&conn, &batch, today()).unwrap();

        assert_eq!(first.inserted, 3);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(verify_count(&conn).unwrap(), 3);
    }

    #[test]
    fn test_bulk_import_counts_rejections() {
        let (conn, vehicle) = setup();
        let batch = vec![
            entry(vehicle.id, 1, 10_000, 35.0, 52.5),
            entry(vehicle.id, 10, 10_500, 0.0, 60.0),
        ];

        let summary = insert_fuel_entries(&conn, &batch, today()).unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.rejected, 1);
    }

    #[test]
    fn test_delete_recomputes_on_read() {
        let (conn, vehicle) = setup();
        insert_fuel_entry(&conn, &entry(vehicle.id, 1, 10_000, 35.0, 52.5), today()).unwrap();
        let middle = insert_fuel_entry(&conn, &entry(vehicle.id, 10, 10_500, 40.0, 60.0), today()).unwrap();
        insert_fuel_entry(&conn, &entry(vehicle.id, 20, 11_000, 40.0, 60.0), today()).unwrap();

        assert!(delete_fuel_entry(&conn, middle.id).unwrap());
        assert!(!delete_fuel_entry(&conn, middle.id).unwrap());

        let metered = load_metered_entries(&conn, None).unwrap();
        assert_eq!(metered.len(), 2);
        assert_eq!(metered[1].metrics.distance_since_last, Some(1000));
    }

    #[test]
    fn test_update_initial_odometer() {
        let (conn, vehicle) = setup();
        insert_fuel_entry(&conn, &entry(vehicle.id, 1, 10_000, 35.0, 52.5), today()).unwrap();

        update_initial_odometer(&conn, vehicle.id, 9_500).unwrap();
        assert_eq!(get_vehicle(&conn, vehicle.id).unwrap().unwrap().initial_odometer, 9_500);

        assert!(update_initial_odometer(&conn, vehicle.id, 10_001).is_err());
        assert!(update_initial_odometer(&conn, 12345, 0).is_err());
    }

    #[test]
    fn test_update_entry_checks_neighbours_but_not_itself() {
        let (conn, vehicle) = setup();
        insert_fuel_entry(&conn, &entry(vehicle.id, 1, 10_000, 35.0, 52.5), today()).unwrap();
        let middle = insert_fuel_entry(&conn, &entry(vehicle.id, 10, 10_500, 40.0, 60.0), today()).unwrap();
        insert_fuel_entry(&conn, &entry(vehicle.id, 20, 11_000, 40.0, 60.0), today()).unwrap();

        let mut edited = middle.clone();
        edited.odometer = 10_600;
        edited.liters = 42.0;
        update_fuel_entry(&conn, &edited, today()).unwrap();

        let stored = get_fuel_entry(&conn, middle.id).unwrap().unwrap();
        assert_eq!(stored.odometer, 10_600);
        let metered = load_metered_entries(&conn, Some(vehicle.id)).unwrap();
        assert_eq!(metered[1].metrics.distance_since_last, Some(600));
        assert_eq!(metered[2].metrics.distance_since_last, Some(400));

        edited.odometer = 11_000;
        let err = update_fuel_entry(&conn, &edited, today()).unwrap_err();
        match err.downcast_ref::<FuelError>() {
            Some(FuelError::Validation(issues)) => assert_eq!(issues[0].code, "odometer_ge_next"),
            other => panic!("unexpected error: {:?}", other),
        }

        let missing = entry(vehicle.id, 15, 10_800, 40.0, 60.0).with_id(999);
        assert!(update_fuel_entry(&conn, &missing, today()).is_err());
    }

    #[test]
    fn test_update_and_delete_vehicle() {
        let (conn, vehicle) = setup();
        insert_fuel_entry(&conn, &entry(vehicle.id, 1, 10_000, 35.0, 52.5), today()).unwrap();

        let mut changed = vehicle.clone();
        changed.name = "Weekend".to_string();
        changed.make = "Mazda".to_string();
        changed.is_active = false;
        update_vehicle(&conn, &changed).unwrap();

        let stored = get_vehicle(&conn, vehicle.id).unwrap().unwrap();
        assert_eq!(stored.name, "Weekend");
        assert!(!stored.is_active);

        changed.initial_odometer = 10_500;
        assert!(update_vehicle(&conn, &changed).is_err());

        assert!(delete_vehicle(&conn, vehicle.id).unwrap());
        assert!(!delete_vehicle(&conn, vehicle.id).unwrap());
        assert_eq!(verify_count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_query_entries_filters_without_changing_metrics() {
        let (conn, vehicle) = setup();
        insert_fuel_entry(&conn, &entry(vehicle.id, 1, 10_000, 35.0, 52.5), today()).unwrap();
        let bp = entry(vehicle.id, 10, 10_500, 40.0, 60.0).with_fuel("BP Ultimate", "98");
        insert_fuel_entry(&conn, &bp, today()).unwrap();
        insert_fuel_entry(&conn, &entry(vehicle.id, 20, 11_000, 40.0, 60.0), today()).unwrap();

        let by_brand = query_entries(
            &conn,
            &EntryFilter {
                fuel_brand: Some("ultimate".to_string()),
                ..EntryFilter::default()
            },
        )
        .unwrap();
        assert_eq!(by_brand.len(), 1);
        assert_eq!(by_brand[0].metrics.distance_since_last, Some(500));

        let by_date = query_entries(
            &conn,
            &EntryFilter {
                vehicle_id: Some(vehicle.id),
                date_after: Some(date(2024, 6, 10)),
                date_before: Some(date(2024, 6, 30)),
                station_name: Some("main".to_string()),
                ..EntryFilter::default()
            },
        )
        .unwrap();
        assert_eq!(by_date.len(), 2);
        assert_eq!(by_date[0].entry.odometer, 10_500);

        assert_eq!(query_entries(&conn, &EntryFilter::default()).unwrap().len(), 3);
    }
}
