// Statistics over metered fuel entries
//
// Dashboard aggregates for a period plus all-time breakdowns by fuel brand
// and grade. All values are canonical metric and unrounded.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use crate::entities::Vehicle;
use crate::error::{FuelError, Result};
use crate::metrics::MeteredEntry;

/// Longest custom period accepted, in days
pub const MAX_CUSTOM_PERIOD_DAYS: i64 = 365;

// ============================================================================
// PERIOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Period {
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[serde(rename = "ytd")]
    YearToDate,
    #[serde(rename = "custom")]
    Custom { date_after: NaiveDate, date_before: NaiveDate },
}

impl Period {
    pub fn code(&self) -> &'static str {
        match self {
            Period::Last30Days => "30d",
            Period::Last90Days => "90d",
            Period::YearToDate => "ytd",
            Period::Custom { .. } => "custom",
        }
    }

    /// Build from a period code plus optional custom bounds
    pub fn parse(code: &str, date_after: Option<NaiveDate>, date_before: Option<NaiveDate>) -> Result<Period> {
        match code {
            "custom" => match (date_after, date_before) {
                (Some(date_after), Some(date_before)) => Ok(Period::Custom { date_after, date_before }),
                _ => Err(FuelError::InvalidPeriod(
                    "custom period requires date_after and date_before".to_string(),
                )),
            },
            other => other.parse(),
        }
    }

    /// Inclusive date range ending today
    pub fn resolve(&self, today: NaiveDate) -> Result<PeriodRange> {
        let range = match *self {
            Period::Last30Days => PeriodRange {
                date_after: today - Duration::days(30),
                date_before: today,
            },
            Period::Last90Days => PeriodRange {
                date_after: today - Duration::days(90),
                date_before: today,
            },
            Period::YearToDate => PeriodRange {
                date_after: NaiveDate::from_ymd_opt(today.year(), 1, 1)
                    .ok_or_else(|| FuelError::InvalidDate(today.to_string()))?,
                date_before: today,
            },
            Period::Custom { date_after, date_before } => {
                if date_after > date_before {
                    return Err(FuelError::InvalidPeriod(
                        "date_after must not be later than date_before".to_string(),
                    ));
                }
                if (date_before - date_after).num_days() > MAX_CUSTOM_PERIOD_DAYS {
                    return Err(FuelError::InvalidPeriod(format!(
                        "custom period cannot exceed {} days",
                        MAX_CUSTOM_PERIOD_DAYS
                    )));
                }
                PeriodRange { date_after, date_before }
            }
        };
        Ok(range)
    }
}

impl FromStr for Period {
    type Err = FuelError;

    /// Fixed periods only; custom needs bounds, see [`Period::parse`]
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "30d" => Ok(Period::Last30Days),
            "90d" => Ok(Period::Last90Days),
            "ytd" => Ok(Period::YearToDate),
            other => Err(FuelError::InvalidPeriod(format!(
                "'{}' is not one of 30d, 90d, ytd, custom",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRange {
    pub date_after: NaiveDate,
    pub date_before: NaiveDate,
}

impl PeriodRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.date_after && date <= self.date_before
    }

    /// Both ends included
    pub fn days(&self) -> i64 {
        (self.date_before - self.date_after).num_days() + 1
    }
}

// ============================================================================
// DASHBOARD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardAggregates {
    pub average_consumption: Option<f64>,
    pub average_unit_price: Option<f64>,
    pub average_cost_per_km: Option<f64>,
    pub total_distance: i64,
    pub total_liters: f64,
    pub total_spent: f64,
    pub fill_up_count: usize,
    pub average_distance_per_day: Option<f64>,
    pub min_consumption: Option<f64>,
    pub max_consumption: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub consumption: Vec<SeriesPoint>,
    pub unit_price: Vec<SeriesPoint>,
    pub cost_per_km: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStatistics {
    pub period: Period,
    pub range: PeriodRange,
    pub aggregates: DashboardAggregates,
    pub time_series: TimeSeries,
}

/// Aggregates for entries inside `period`, optionally for one vehicle.
///
/// Distance per vehicle is its highest odometer in the period minus its
/// initial odometer, so the baseline fill counts towards distance.
pub fn dashboard(
    entries: &[MeteredEntry],
    vehicles: &[Vehicle],
    vehicle_id: Option<i64>,
    period: Period,
    today: NaiveDate,
) -> Result<DashboardStatistics> {
    let range = period.resolve(today)?;

    let mut in_period: Vec<&MeteredEntry> = entries
        .iter()
        .filter(|m| range.contains(m.entry.entry_date))
        .filter(|m| vehicle_id.map_or(true, |id| m.entry.vehicle_id == id))
        .collect();
    in_period.sort_by(|a, b| a.entry.chronological_cmp(&b.entry));

    let total_liters: f64 = in_period.iter().map(|m| m.entry.liters).sum();
    let total_spent: f64 = in_period.iter().map(|m| m.entry.total_amount).sum();

    let measured: Vec<&&MeteredEntry> = in_period
        .iter()
        .filter(|m| m.metrics.consumption_l_100km.is_some())
        .collect();
    let measured_liters: f64 = measured.iter().map(|m| m.entry.liters).sum();
    let consumptions = measured.iter().filter_map(|m| m.metrics.consumption_l_100km);
    let min_consumption = consumptions.clone().reduce(f64::min);
    let max_consumption = consumptions.reduce(f64::max);

    let mut max_odometer: BTreeMap<i64, i64> = BTreeMap::new();
    for m in &in_period {
        let slot = max_odometer.entry(m.entry.vehicle_id).or_insert(m.entry.odometer);
        *slot = (*slot).max(m.entry.odometer);
    }
    let total_distance: i64 = max_odometer
        .iter()
        .filter_map(|(id, max)| {
            vehicles
                .iter()
                .find(|v| v.id == *id)
                .map(|v| max - v.initial_odometer)
        })
        .sum();

    let ratio = |num: f64, den: f64| if den > 0.0 { Some(num / den) } else { None };
    let distance = total_distance as f64;

    let period_days = match (in_period.first(), in_period.last()) {
        (Some(first), Some(last)) => {
            let active = (last.entry.entry_date - first.entry.entry_date).num_days() + 1;
            range.days().min(active)
        }
        _ => range.days(),
    };
    let average_distance_per_day = if total_distance > 0 {
        ratio(distance, period_days as f64)
    } else {
        None
    };

    let aggregates = DashboardAggregates {
        average_consumption: ratio(measured_liters * 100.0, distance),
        average_unit_price: ratio(total_spent, total_liters),
        average_cost_per_km: ratio(total_spent, distance),
        total_distance,
        total_liters,
        total_spent,
        fill_up_count: in_period.len(),
        average_distance_per_day,
        min_consumption,
        max_consumption,
    };

    let mut time_series = TimeSeries::default();
    for m in &in_period {
        let date = m.entry.entry_date;
        if let Some(value) = m.metrics.consumption_l_100km {
            time_series.consumption.push(SeriesPoint { date, value });
        }
        if let Some(value) = m.metrics.unit_price {
            time_series.unit_price.push(SeriesPoint { date, value });
        }
        if let Some(value) = m.metrics.cost_per_km {
            time_series.cost_per_km.push(SeriesPoint { date, value });
        }
    }

    Ok(DashboardStatistics {
        period,
        range,
        aggregates,
        time_series,
    })
}

// ============================================================================
// BREAKDOWNS
// ============================================================================

/// All-time averages for one brand or grade label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStatistics {
    pub label: String,
    pub average_consumption: Option<f64>,
    pub average_unit_price: Option<f64>,
    pub average_cost_per_km: Option<f64>,
    pub fill_count: usize,
}

#[derive(Default)]
struct GroupTotals {
    liters: f64,
    cost: f64,
    distance: i64,
    count: usize,
}

fn group_by<F>(entries: &[MeteredEntry], vehicle_id: Option<i64>, label: F) -> Vec<GroupStatistics>
where
    F: Fn(&MeteredEntry) -> &str,
{
    let mut groups: HashMap<String, GroupTotals> = HashMap::new();

    for m in entries {
        if vehicle_id.is_some_and(|id| m.entry.vehicle_id != id) {
            continue;
        }
        let name = label(m).trim();
        if name.is_empty() {
            continue;
        }
        let totals = groups.entry(name.to_string()).or_default();
        totals.liters += m.entry.liters;
        totals.cost += m.entry.total_amount;
        totals.distance += m.metrics.distance_since_last.unwrap_or(0);
        totals.count += 1;
    }

    let mut out: Vec<GroupStatistics> = groups
        .into_iter()
        .map(|(label, t)| {
            let distance = t.distance as f64;
            GroupStatistics {
                label,
                average_consumption: (distance > 0.0).then(|| t.liters / distance * 100.0),
                average_unit_price: (t.liters > 0.0).then(|| t.cost / t.liters),
                average_cost_per_km: (distance > 0.0).then(|| t.cost / distance),
                fill_count: t.count,
            }
        })
        .collect();

    out.sort_by(|a, b| b.fill_count.cmp(&a.fill_count).then_with(|| a.label.cmp(&b.label)));
    out
}

pub fn by_brand(entries: &[MeteredEntry], vehicle_id: Option<i64>) -> Vec<GroupStatistics> {
    group_by(entries, vehicle_id, |m| m.entry.fuel_brand.as_str())
}

pub fn by_grade(entries: &[MeteredEntry], vehicle_id: Option<i64>) -> Vec<GroupStatistics> {
    group_by(entries, vehicle_id, |m| m.entry.fuel_grade.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::FuelEntry;
    use crate::metrics::compute_history;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2024, 6, 30)
    }

    fn fixture() -> (Vec<Vehicle>, Vec<MeteredEntry>) {
        let mut car = Vehicle::new("Car").with_initial_odometer(9_500);
        car.id = 1;
        let mut van = Vehicle::new("Van").with_initial_odometer(50_000);
        van.id = 2;

        let entries = vec![
            FuelEntry::new(1, date(2024, 6, 1), 10_000, 40.0, 60.0).with_id(1).with_fuel("Shell", "95"),
            FuelEntry::new(1, date(2024, 6, 11), 10_500, 40.0, 60.0).with_id(2).with_fuel("Shell", "95"),
            FuelEntry::new(1, date(2024, 6, 21), 11_000, 30.0, 48.0).with_id(3).with_fuel("BP", "98"),
            FuelEntry::new(2, date(2024, 6, 5), 50_600, 60.0, 90.0).with_id(4).with_fuel("BP", "Diesel"),
        ];

        (vec![car, van], compute_history(&entries))
    }

    #[test]
    fn test_period_resolution() {
        let r = Period::Last30Days.resolve(today()).unwrap();
        assert_eq!(r.date_after, date(2024, 5, 31));
        assert_eq!(r.date_before, today());
        assert_eq!(r.days(), 31);

        let ytd = Period::YearToDate.resolve(today()).unwrap();
        assert_eq!(ytd.date_after, date(2024, 1, 1));

        let custom = Period::parse("custom", Some(date(2024, 1, 1)), Some(date(2024, 2, 1))).unwrap();
        assert_eq!(custom.resolve(today()).unwrap().days(), 32);
    }

    #[test]
    fn test_period_errors() {
        assert!(Period::parse("7d", None, None).is_err());
        assert!(Period::parse("custom", Some(date(2024, 1, 1)), None).is_err());

        let backwards = Period::Custom {
            date_after: date(2024, 2, 1),
            date_before: date(2024, 1, 1),
        };
        assert!(backwards.resolve(today()).is_err());

        let too_long = Period::Custom {
            date_after: date(2022, 1, 1),
            date_before: date(2024, 1, 1),
        };
        assert!(matches!(too_long.resolve(today()), Err(FuelError::InvalidPeriod(_))));
    }

    #[test]
    fn test_dashboard_single_vehicle() {
        let (vehicles, metered) = fixture();
        let stats = dashboard(&metered, &vehicles, Some(1), Period::Last30Days, today()).unwrap();
        let a = &stats.aggregates;

        assert_eq!(a.fill_up_count, 3);
        assert_eq!(a.total_distance, 1_500);
        assert!((a.total_liters - 110.0).abs() < 1e-9);
        assert!((a.total_spent - 168.0).abs() < 1e-9);
        // measured fills: 40 L + 30 L over 1500 km
        assert!((a.average_consumption.unwrap() - 70.0 * 100.0 / 1500.0).abs() < 1e-9);
        assert!((a.average_cost_per_km.unwrap() - 168.0 / 1500.0).abs() < 1e-9);
        assert!((a.average_unit_price.unwrap() - 168.0 / 110.0).abs() < 1e-9);
        assert!((a.min_consumption.unwrap() - 6.0).abs() < 1e-9);
        assert!((a.max_consumption.unwrap() - 8.0).abs() < 1e-9);
        // active period 1..21 June = 21 days
        assert!((a.average_distance_per_day.unwrap() - 1500.0 / 21.0).abs() < 1e-9);

        assert_eq!(stats.time_series.consumption.len(), 2);
        assert_eq!(stats.time_series.unit_price.len(), 3);
        assert_eq!(stats.time_series.cost_per_km.len(), 2);
    }

    #[test]
    fn test_dashboard_all_vehicles() {
        let (vehicles, metered) = fixture();
        let stats = dashboard(&metered, &vehicles, None, Period::Last30Days, today()).unwrap();

        assert_eq!(stats.aggregates.fill_up_count, 4);
        // car 1500 + van 600
        assert_eq!(stats.aggregates.total_distance, 2_100);
    }

    #[test]
    fn test_dashboard_empty_period() {
        let (vehicles, metered) = fixture();
        let period = Period::Custom {
            date_after: date(2023, 1, 1),
            date_before: date(2023, 3, 1),
        };
        let stats = dashboard(&metered, &vehicles, None, period, today()).unwrap();
        let a = &stats.aggregates;

        assert_eq!(a.fill_up_count, 0);
        assert_eq!(a.total_distance, 0);
        assert_eq!(a.average_consumption, None);
        assert_eq!(a.average_unit_price, None);
        assert_eq!(a.average_distance_per_day, None);
        assert!(stats.time_series.consumption.is_empty());
    }

    #[test]
    fn test_by_brand() {
        let (_, metered) = fixture();
        let brands = by_brand(&metered, None);

        assert_eq!(brands.len(), 2);
        let bp = &brands[0];
        assert_eq!(bp.label, "BP");
        assert_eq!(bp.fill_count, 2);

        let shell = brands.iter().find(|b| b.label == "Shell").unwrap();
        assert_eq!(shell.fill_count, 2);
        // both Shell fills count litres, only the second one adds distance
        assert!((shell.average_consumption.unwrap() - 80.0 / 500.0 * 100.0).abs() < 1e-9);
        assert!((shell.average_unit_price.unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_by_grade_filtered() {
        let (_, metered) = fixture();
        let grades = by_grade(&metered, Some(1));

        let labels: Vec<&str> = grades.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["95", "98"]);
        assert!(grades.iter().all(|g| g.label != "Diesel"));
    }
}
