// Derived metrics per fill-up
//
// Every fill after a vehicle's first one is measured against the fill before
// it (ordered by entry date, then id). Values are computed on read from the
// raw canonical fields and never written back.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::entities::FuelEntry;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// How the interval ending at an entry was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntervalStatus {
    /// First entry for the vehicle; nothing to measure against
    Baseline,
    /// Positive distance since the previous fill
    Measured,
    /// Odometer unchanged since the previous fill
    NoDistance,
    /// Odometer went backwards; distance-based metrics withheld
    OdometerRollback { previous: i64, current: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// total_amount / liters
    pub unit_price: Option<f64>,

    /// km since the previous fill
    pub distance_since_last: Option<i64>,

    pub consumption_l_100km: Option<f64>,

    pub cost_per_km: Option<f64>,

    #[serde(flatten)]
    pub status: IntervalStatus,
}

impl DerivedMetrics {
    pub fn is_measured(&self) -> bool {
        self.status == IntervalStatus::Measured
    }

    pub fn is_flagged(&self) -> bool {
        matches!(self.status, IntervalStatus::OdometerRollback { .. })
    }
}

/// An entry together with the metrics derived for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeteredEntry {
    #[serde(flatten)]
    pub entry: FuelEntry,

    pub metrics: DerivedMetrics,
}

// ============================================================================
// CALCULATOR
// ============================================================================

pub fn unit_price(entry: &FuelEntry) -> Option<f64> {
    if entry.liters > 0.0 {
        Some(entry.total_amount / entry.liters)
    } else {
        None
    }
}

/// Metrics for `current` given the fill before it (same vehicle)
pub fn compute_metrics(current: &FuelEntry, previous: Option<&FuelEntry>) -> DerivedMetrics {
    let unit_price = unit_price(current);

    let previous = match previous {
        Some(p) => p,
        None => {
            return DerivedMetrics {
                unit_price,
                distance_since_last: None,
                consumption_l_100km: None,
                cost_per_km: None,
                status: IntervalStatus::Baseline,
            }
        }
    };

    let distance = current.odometer - previous.odometer;

    if distance < 0 {
        warn!(
            vehicle_id = current.vehicle_id,
            entry_id = current.id,
            previous = previous.odometer,
            current = current.odometer,
            "odometer rollback"
        );
        return DerivedMetrics {
            unit_price,
            distance_since_last: None,
            consumption_l_100km: None,
            cost_per_km: None,
            status: IntervalStatus::OdometerRollback {
                previous: previous.odometer,
                current: current.odometer,
            },
        };
    }

    if distance == 0 {
        return DerivedMetrics {
            unit_price,
            distance_since_last: Some(0),
            consumption_l_100km: None,
            cost_per_km: None,
            status: IntervalStatus::NoDistance,
        };
    }

    let km = distance as f64;
    DerivedMetrics {
        unit_price,
        distance_since_last: Some(distance),
        consumption_l_100km: Some(current.liters * 100.0 / km),
        cost_per_km: Some(current.total_amount / km),
        status: IntervalStatus::Measured,
    }
}

/// Metrics for every entry, vehicle by vehicle, in chronological order.
/// Output is grouped by vehicle id (ascending).
pub fn compute_history(entries: &[FuelEntry]) -> Vec<MeteredEntry> {
    let mut by_vehicle: BTreeMap<i64, Vec<&FuelEntry>> = BTreeMap::new();
    for entry in entries {
        by_vehicle.entry(entry.vehicle_id).or_default().push(entry);
    }

    let mut out = Vec::with_capacity(entries.len());
    for (_, mut list) in by_vehicle {
        list.sort_by(|a, b| a.chronological_cmp(b));

        let mut previous: Option<&FuelEntry> = None;
        for entry in list {
            out.push(MeteredEntry {
                entry: entry.clone(),
                metrics: compute_metrics(entry, previous),
            });
            previous = Some(entry);
        }
    }
    out
}

// ============================================================================
// NEIGHBOUR LOOKUP
// ============================================================================

/// Position of a (possibly not yet stored) entry in a vehicle's timeline.
/// A new entry (id 0) sorts after existing entries on the same day.
fn sort_key(entry_date: chrono::NaiveDate, entry_id: i64) -> (chrono::NaiveDate, i64) {
    (entry_date, if entry_id == 0 { i64::MAX } else { entry_id })
}

/// Latest entry of `vehicle_id` before the given position, skipping `entry_id`
pub fn previous_entry<'a>(
    entries: &'a [FuelEntry],
    vehicle_id: i64,
    entry_date: chrono::NaiveDate,
    entry_id: i64,
) -> Option<&'a FuelEntry> {
    let key = sort_key(entry_date, entry_id);
    entries
        .iter()
        .filter(|e| e.vehicle_id == vehicle_id && e.id != entry_id)
        .filter(|e| (e.entry_date, e.id) < key)
        .max_by(|a, b| a.chronological_cmp(b))
}

/// Earliest entry of `vehicle_id` after the given position, skipping `entry_id`
pub fn next_entry<'a>(
    entries: &'a [FuelEntry],
    vehicle_id: i64,
    entry_date: chrono::NaiveDate,
    entry_id: i64,
) -> Option<&'a FuelEntry> {
    let key = sort_key(entry_date, entry_id);
    entries
        .iter()
        .filter(|e| e.vehicle_id == vehicle_id && e.id != entry_id)
        .filter(|e| (e.entry_date, e.id) > key)
        .min_by(|a, b| a.chronological_cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(id: i64, day: u32, odometer: i64, liters: f64, total: f64) -> FuelEntry {
        FuelEntry::new(1, date(2024, 6, day), odometer, liters, total).with_id(id)
    }

    #[test]
    fn test_measured_interval() {
        let previous = entry(1, 1, 10_000, 35.0, 52.0);
        let current = entry(2, 10, 10_500, 40.0, 60.0);

        let m = compute_metrics(&current, Some(&previous));

        assert_eq!(m.distance_since_last, Some(500));
        assert!((m.consumption_l_100km.unwrap() - 8.0).abs() < 1e-12);
        assert!((m.cost_per_km.unwrap() - 0.12).abs() < 1e-12);
        assert!((m.unit_price.unwrap() - 1.5).abs() < 1e-12);
        assert!(m.is_measured());
    }

    #[test]
    fn test_first_entry_is_baseline() {
        let first = entry(1, 1, 10_000, 40.0, 60.0);
        let m = compute_metrics(&first, None);

        assert_eq!(m.status, IntervalStatus::Baseline);
        assert_eq!(m.distance_since_last, None);
        assert_eq!(m.consumption_l_100km, None);
        assert_eq!(m.cost_per_km, None);
        // unit price does not need a previous entry
        assert_eq!(m.unit_price, Some(1.5));
    }

    #[test]
    fn test_odometer_rollback_is_flagged() {
        let previous = entry(1, 1, 10_500, 35.0, 52.0);
        let current = entry(2, 10, 10_000, 40.0, 60.0);

        let m = compute_metrics(&current, Some(&previous));

        assert!(m.is_flagged());
        assert_eq!(
            m.status,
            IntervalStatus::OdometerRollback {
                previous: 10_500,
                current: 10_000
            }
        );
        assert_eq!(m.distance_since_last, None);
        assert_eq!(m.consumption_l_100km, None);
        assert_eq!(m.cost_per_km, None);
    }

    #[test]
    fn test_zero_distance_has_no_rates() {
        let previous = entry(1, 1, 10_000, 35.0, 52.0);
        let current = entry(2, 1, 10_000, 5.0, 7.5);

        let m = compute_metrics(&current, Some(&previous));

        assert_eq!(m.status, IntervalStatus::NoDistance);
        assert_eq!(m.distance_since_last, Some(0));
        assert_eq!(m.consumption_l_100km, None);
        assert_eq!(m.cost_per_km, None);
    }

    #[test]
    fn test_zero_liters_has_no_unit_price() {
        let current = entry(1, 1, 10_000, 0.0, 10.0);
        assert_eq!(compute_metrics(&current, None).unit_price, None);
    }

    #[test]
    fn test_history_orders_by_date_then_id() {
        let entries = vec![
            entry(3, 20, 11_000, 40.0, 60.0),
            entry(1, 1, 10_000, 40.0, 60.0),
            entry(2, 10, 10_500, 40.0, 60.0),
            // second vehicle
            FuelEntry::new(2, date(2024, 6, 5), 50_000, 50.0, 80.0).with_id(4),
            FuelEntry::new(2, date(2024, 6, 15), 50_800, 48.0, 76.8).with_id(5),
        ];

        let history = compute_history(&entries);
        let ids: Vec<i64> = history.iter().map(|m| m.entry.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        assert_eq!(history[0].metrics.status, IntervalStatus::Baseline);
        assert_eq!(history[1].metrics.distance_since_last, Some(500));
        assert_eq!(history[2].metrics.distance_since_last, Some(500));
        assert_eq!(history[3].metrics.status, IntervalStatus::Baseline);
        assert_eq!(history[4].metrics.distance_since_last, Some(800));
        assert!((history[4].metrics.consumption_l_100km.unwrap() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_history_recomputes_after_removal() {
        let mut entries = vec![
            entry(1, 1, 10_000, 40.0, 60.0),
            entry(2, 10, 10_500, 40.0, 60.0),
            entry(3, 20, 11_000, 40.0, 60.0),
        ];
        entries.retain(|e| e.id != 2);

        let history = compute_history(&entries);
        assert_eq!(history[1].metrics.distance_since_last, Some(1000));
        assert!((history[1].metrics.consumption_l_100km.unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_previous_and_next_lookup() {
        let entries = vec![
            entry(1, 1, 10_000, 40.0, 60.0),
            entry(2, 10, 10_500, 40.0, 60.0),
            entry(3, 10, 10_700, 40.0, 60.0),
            entry(4, 20, 11_000, 40.0, 60.0),
        ];

        // new entry on day 10 sorts after both existing day-10 entries
        let prev = previous_entry(&entries, 1, date(2024, 6, 10), 0).unwrap();
        assert_eq!(prev.id, 3);
        let next = next_entry(&entries, 1, date(2024, 6, 10), 0).unwrap();
        assert_eq!(next.id, 4);

        // editing entry 2 keeps its own slot
        let prev = previous_entry(&entries, 1, date(2024, 6, 10), 2).unwrap();
        assert_eq!(prev.id, 1);
        let next = next_entry(&entries, 1, date(2024, 6, 10), 2).unwrap();
        assert_eq!(next.id, 3);

        assert!(previous_entry(&entries, 1, date(2024, 5, 1), 0).is_none());
        assert!(next_entry(&entries, 1, date(2024, 7, 1), 0).is_none());
        assert!(previous_entry(&entries, 99, date(2024, 7, 1), 0).is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let m = compute_metrics(&entry(1, 1, 10_000, 40.0, 60.0), None);
        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json["status"], "baseline");
        assert!(json["distance_since_last"].is_null());
    }
}
