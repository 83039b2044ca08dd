// Fuel entry entity
// One fill-up; derived metrics live in crate::metrics and are never stored here

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const STATION_NAME_MAX: usize = 100;
pub const FUEL_BRAND_MAX: usize = 50;
pub const FUEL_GRADE_MAX: usize = 20;
pub const NOTES_MAX: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelEntry {
    /// Store-assigned id (0 until inserted); breaks ties between same-day entries
    #[serde(default)]
    pub id: i64,

    pub vehicle_id: i64,

    pub entry_date: NaiveDate,

    /// Odometer reading in km
    pub odometer: i64,

    #[serde(default)]
    pub station_name: String,

    #[serde(default)]
    pub fuel_brand: String,

    #[serde(default)]
    pub fuel_grade: String,

    /// Litres filled
    pub liters: f64,

    /// Amount paid, in the owner's currency
    pub total_amount: f64,

    #[serde(default)]
    pub notes: String,
}

impl FuelEntry {
    pub fn new(vehicle_id: i64, entry_date: NaiveDate, odometer: i64, liters: f64, total_amount: f64) -> Self {
        FuelEntry {
            id: 0,
            vehicle_id,
            entry_date,
            odometer,
            station_name: String::new(),
            fuel_brand: String::new(),
            fuel_grade: String::new(),
            liters,
            total_amount,
            notes: String::new(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    pub fn with_fuel(mut self, brand: &str, grade: &str) -> Self {
        self.fuel_brand = brand.to_string();
        self.fuel_grade = grade.to_string();
        self
    }

    pub fn with_station(mut self, station: &str) -> Self {
        self.station_name = station.to_string();
        self
    }

    /// Order by entry date, then id
    pub fn chronological_cmp(&self, other: &FuelEntry) -> Ordering {
        self.entry_date
            .cmp(&other.entry_date)
            .then_with(|| self.id.cmp(&other.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_chronological_order_uses_id_for_same_day() {
        let a = FuelEntry::new(1, date(2024, 5, 1), 10_000, 40.0, 60.0).with_id(7);
        let b = FuelEntry::new(1, date(2024, 5, 1), 10_300, 30.0, 45.0).with_id(3);
        let c = FuelEntry::new(1, date(2024, 4, 30), 9_800, 35.0, 50.0).with_id(9);

        let mut entries = vec![a.clone(), b.clone(), c.clone()];
        entries.sort_by(|x, y| x.chronological_cmp(y));

        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![9, 3, 7]);
    }

    #[test]
    fn test_serde_date_format() {
        let e = FuelEntry::new(2, date(2024, 1, 15), 1000, 40.0, 60.0).with_fuel("Shell", "95");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["entry_date"], "2024-01-15");
        assert_eq!(json["fuel_brand"], "Shell");
    }
}
