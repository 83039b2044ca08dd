// Fuel Tracker - Core Library
// Unit conversion, derived fill-up metrics, formatting and statistics.
// Shared by the CLI, the API server and tests.

pub mod config;
pub mod currency;
pub mod db;
pub mod entities;
pub mod error;
pub mod format;
pub mod import;
pub mod metrics;
pub mod observability;
pub mod preferences;
pub mod stats;
pub mod units;
pub mod validation;

// Re-export commonly used types
pub use config::AppConfig;
pub use currency::CurrencyCode;
pub use db::{
    delete_fuel_entry, delete_vehicle, find_vehicle_by_name, get_all_entries, get_entries_for_vehicle,
    get_fuel_entry, get_vehicle, get_vehicles, insert_fuel_entries, insert_fuel_entry, insert_vehicle,
    load_metered_entries, query_entries, setup_database, update_fuel_entry, update_initial_odometer,
    update_vehicle, verify_count, EntryFilter, ImportSummary,
};
pub use entities::{FuelEntry, Vehicle};
pub use error::FuelError;
pub use format::{
    format_consumption, format_currency, format_date, format_decimal, format_distance, format_money,
    format_number, format_price, format_volume,
};
pub use import::{export_csv, load_csv, rows_to_entries, ImportOptions};
pub use metrics::{compute_history, compute_metrics, DerivedMetrics, IntervalStatus, MeteredEntry};
pub use preferences::{detect_locale, detect_request_locale, PricePrecision, UnitPreference};
pub use stats::{by_brand, by_grade, dashboard, DashboardStatistics, GroupStatistics, Period};
pub use units::{
    convert_by_code, convert_consumption, convert_distance, convert_volume, ConsumptionUnit,
    DistanceUnit, Measurement, Unit, VolumeUnit,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
