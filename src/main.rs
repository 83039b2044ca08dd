use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::info;

use fuel_tracker::format::{format_date, format_decimal, format_distance, format_money, format_price, format_volume};
use fuel_tracker::{
    by_brand, by_grade, convert_by_code, dashboard, delete_fuel_entry, delete_vehicle, export_csv,
    find_vehicle_by_name, get_fuel_entry, get_vehicles, insert_fuel_entries, insert_vehicle, load_csv,
    load_metered_entries, observability, query_entries, rows_to_entries, setup_database, update_fuel_entry,
    update_initial_odometer, update_vehicle, AppConfig, DistanceUnit, EntryFilter, GroupStatistics,
    ImportOptions, IntervalStatus, MeteredEntry, Period, UnitPreference, Vehicle, VolumeUnit,
};

#[derive(Parser)]
#[command(name = "fuel-tracker", version, about = "Track vehicles, fill-ups and fuel economy")]
struct Cli {
    /// SQLite database (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print statistics and entries as JSON in canonical units
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage vehicles
    Vehicle {
        #[command(subcommand)]
        action: VehicleAction,
    },
    /// Import fill-ups from CSV
    Import {
        csv: PathBuf,
        /// Unit of the odometer column (defaults to the preferred unit)
        #[arg(long)]
        distance_unit: Option<DistanceUnit>,
        /// Unit of the volume column (defaults to the preferred unit)
        #[arg(long)]
        volume_unit: Option<VolumeUnit>,
    },
    /// Write fill-ups with derived metrics as CSV
    Export {
        #[arg(long)]
        vehicle: Option<String>,
        /// Output file, stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List fill-ups for a vehicle
    Entries {
        vehicle: String,
        #[arg(long)]
        after: Option<NaiveDate>,
        #[arg(long)]
        before: Option<NaiveDate>,
        /// Case-insensitive substring of the fuel brand
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        grade: Option<String>,
        #[arg(long)]
        station: Option<String>,
    },
    /// Edit or delete a single fill-up by id
    Entry {
        #[command(subcommand)]
        action: EntryAction,
    },
    /// Dashboard statistics for a period
    Stats {
        #[arg(long)]
        vehicle: Option<String>,
        /// 30d, 90d, ytd or custom
        #[arg(long, default_value = "30d")]
        period: String,
        #[arg(long)]
        after: Option<NaiveDate>,
        #[arg(long)]
        before: Option<NaiveDate>,
    },
    /// All-time statistics per fuel brand
    Brands {
        #[arg(long)]
        vehicle: Option<String>,
    },
    /// All-time statistics per fuel grade
    Grades {
        #[arg(long)]
        vehicle: Option<String>,
    },
    /// Convert a value between unit codes (km, mi, L, gal, L/100km, mpg)
    Convert { value: f64, from: String, to: String },
}

#[derive(Subcommand)]
enum VehicleAction {
    Add {
        name: String,
        #[arg(long, default_value = "")]
        make: String,
        #[arg(long, default_value = "")]
        model: String,
        #[arg(long)]
        year: Option<u16>,
        /// In the preferred distance unit
        #[arg(long, default_value_t = 0.0)]
        initial_odometer: f64,
        #[arg(long, default_value = "")]
        fuel_type: String,
    },
    List,
    /// Change the starting odometer (preferred distance unit)
    SetOdometer { name: String, value: f64 },
    /// Change vehicle details; omitted options keep their value
    Update {
        name: String,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long)]
        make: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        year: Option<u16>,
        #[arg(long)]
        fuel_type: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    /// Delete a vehicle together with its fill-ups
    Delete { name: String },
}

#[derive(Subcommand)]
enum EntryAction {
    /// Values in the preferred units; omitted options keep their value
    Edit {
        id: i64,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        odometer: Option<f64>,
        #[arg(long)]
        volume: Option<f64>,
        #[arg(long)]
        total: Option<f64>,
        #[arg(long)]
        station: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        grade: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Delete { id: i64 },
}

fn main() -> Result<()> {
    observability::init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load()?;

    if let Command::Convert { value, from, to } = &cli.command {
        let converted = convert_by_code(*value, from, to)?;
        println!("{} {} = {} {}", value, from, format_decimal(converted, 4, &config.locale), to);
        return Ok(());
    }

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path.clone());
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    setup_database(&conn)?;
    info!(path = %db_path.display(), "database opened");

    let today = Local::now().date_naive();

    match cli.command {
        Command::Vehicle { action } => run_vehicle(&conn, &config, action),
        Command::Import {
            csv,
            distance_unit,
            volume_unit,
        } => {
            let options = ImportOptions {
                distance_unit: distance_unit.unwrap_or(config.preferences.distance_unit),
                volume_unit: volume_unit.unwrap_or(config.preferences.volume_unit),
            };
            let rows = load_csv(&csv)?;
            let vehicles = get_vehicles(&conn)?;
            let entries = rows_to_entries(&rows, &vehicles, options)?;
            let summary = insert_fuel_entries(&conn, &entries, today)?;
            println!(
                "Imported {} entries ({} duplicates skipped, {} rejected)",
                summary.inserted, summary.duplicates, summary.rejected
            );
            Ok(())
        }
        Command::Export { vehicle, out } => {
            let vehicle_id = resolve_vehicle(&conn, vehicle.as_deref())?.map(|v| v.id);
            let metered = load_metered_entries(&conn, vehicle_id)?;
            let written = match out {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    export_csv(file, &metered, &config.preferences)?
                }
                None => export_csv(io::stdout().lock(), &metered, &config.preferences)?,
            };
            info!(rows = written, "export finished");
            Ok(())
        }
        Command::Entries {
            vehicle,
            after,
            before,
            brand,
            grade,
            station,
        } => {
            let vehicle = resolve_vehicle(&conn, Some(&vehicle))?
                .ok_or_else(|| anyhow!("vehicle required"))?;
            let filter = EntryFilter {
                vehicle_id: Some(vehicle.id),
                date_after: after,
                date_before: before,
                fuel_brand: brand,
                fuel_grade: grade,
                station_name: station,
            };
            let metered = query_entries(&conn, &filter)?;
            if cli.json {
                return print_json(&metered);
            }
            print_entries(&config, &vehicle, &metered)
        }
        Command::Entry { action } => run_entry(&conn, &config, action, today),
        Command::Stats {
            vehicle,
            period,
            after,
            before,
        } => {
            let vehicle_id = resolve_vehicle(&conn, vehicle.as_deref())?.map(|v| v.id);
            let period = Period::parse(&period, after, before)?;
            let metered = load_metered_entries(&conn, vehicle_id)?;
            let vehicles = get_vehicles(&conn)?;
            let stats = dashboard(&metered, &vehicles, vehicle_id, period, today)?;
            if cli.json {
                return print_json(&stats);
            }
            print_dashboard(&config, &stats)
        }
        Command::Brands { vehicle } => {
            let vehicle_id = resolve_vehicle(&conn, vehicle.as_deref())?.map(|v| v.id);
            let metered = load_metered_entries(&conn, vehicle_id)?;
            let groups = by_brand(&metered, vehicle_id);
            if cli.json {
                return print_json(&groups);
            }
            print_groups("Brand", &config, &groups);
            Ok(())
        }
        Command::Grades { vehicle } => {
            let vehicle_id = resolve_vehicle(&conn, vehicle.as_deref())?.map(|v| v.id);
            let metered = load_metered_entries(&conn, vehicle_id)?;
            let groups = by_grade(&metered, vehicle_id);
            if cli.json {
                return print_json(&groups);
            }
            print_groups("Grade", &config, &groups);
            Ok(())
        }
        Command::Convert { .. } => Ok(()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn resolve_vehicle(conn: &Connection, name: Option<&str>) -> Result<Option<Vehicle>> {
    match name {
        None => Ok(None),
        Some(name) => find_vehicle_by_name(conn, name)?
            .map(Some)
            .ok_or_else(|| anyhow!("Vehicle '{}' not found", name)),
    }
}

fn run_vehicle(conn: &Connection, config: &AppConfig, action: VehicleAction) -> Result<()> {
    let pref = &config.preferences;
    match action {
        VehicleAction::Add {
            name,
            make,
            model,
            year,
            initial_odometer,
            fuel_type,
        } => {
            let mut vehicle = Vehicle::new(&name)
                .with_initial_odometer(pref.distance_to_canonical(initial_odometer).round() as i64);
            vehicle.make = make;
            vehicle.model = model;
            vehicle.year = year;
            vehicle.fuel_type = fuel_type;
            let vehicle = insert_vehicle(conn, &vehicle)?;
            println!("Added vehicle #{}: {}", vehicle.id, vehicle.display_name());
        }
        VehicleAction::List => {
            for v in get_vehicles(conn)? {
                println!(
                    "#{:<4} {:<40} start {}{}",
                    v.id,
                    v.display_name(),
                    format_distance(v.initial_odometer as f64, pref, 0, &config.locale),
                    if v.is_active { "" } else { " (inactive)" }
                );
            }
        }
        VehicleAction::SetOdometer { name, value } => {
            let vehicle = find_vehicle_by_name(conn, &name)?
                .ok_or_else(|| anyhow!("Vehicle '{}' not found", name))?;
            update_initial_odometer(conn, vehicle.id, pref.distance_to_canonical(value).round() as i64)?;
            println!("Updated initial odometer of {}", vehicle.name);
        }
        VehicleAction::Update {
            name,
            rename,
            make,
            model,
            year,
            fuel_type,
            active,
        } => {
            let mut vehicle = find_vehicle_by_name(conn, &name)?
                .ok_or_else(|| anyhow!("Vehicle '{}' not found", name))?;
            if let Some(v) = rename {
                vehicle.name = v;
            }
            if let Some(v) = make {
                vehicle.make = v;
            }
            if let Some(v) = model {
                vehicle.model = v;
            }
            if year.is_some() {
                vehicle.year = year;
            }
            if let Some(v) = fuel_type {
                vehicle.fuel_type = v;
            }
            if let Some(v) = active {
                vehicle.is_active = v;
            }
            let vehicle = update_vehicle(conn, &vehicle)?;
            println!("Updated vehicle #{}: {}", vehicle.id, vehicle.display_name());
        }
        VehicleAction::Delete { name } => {
            let vehicle = find_vehicle_by_name(conn, &name)?
                .ok_or_else(|| anyhow!("Vehicle '{}' not found", name))?;
            delete_vehicle(conn, vehicle.id)?;
            println!("Deleted vehicle {} and its fill-ups", vehicle.name);
        }
    }
    Ok(())
}

fn run_entry(conn: &Connection, config: &AppConfig, action: EntryAction, today: NaiveDate) -> Result<()> {
    let pref = &config.preferences;
    match action {
        EntryAction::Edit {
            id,
            date,
            odometer,
            volume,
            total,
            station,
            brand,
            grade,
            notes,
        } => {
            let mut entry = get_fuel_entry(conn, id)?.ok_or_else(|| anyhow!("Fuel entry {} not found", id))?;
            if let Some(v) = date {
                entry.entry_date = v;
            }
            if let Some(v) = odometer {
                if !v.is_finite() {
                    bail!("Odometer must be a finite number");
                }
                entry.odometer = pref.distance_to_canonical(v).round() as i64;
            }
            if let Some(v) = volume {
                entry.liters = pref.volume_to_canonical(v);
            }
            if let Some(v) = total {
                entry.total_amount = v;
            }
            if let Some(v) = station {
                entry.station_name = v;
            }
            if let Some(v) = brand {
                entry.fuel_brand = v;
            }
            if let Some(v) = grade {
                entry.fuel_grade = v;
            }
            if let Some(v) = notes {
                entry.notes = v;
            }
            let entry = update_fuel_entry(conn, &entry, today)?;
            println!("Updated fill-up #{} on {}", entry.id, format_date(entry.entry_date, Some(&config.date_pattern))?);
        }
        EntryAction::Delete { id } => {
            if !delete_fuel_entry(conn, id)? {
                bail!("Fuel entry {} not found", id);
            }
            println!("Deleted fill-up #{}", id);
        }
    }
    Ok(())
}

fn optional(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

fn print_entries(config: &AppConfig, vehicle: &Vehicle, metered: &[MeteredEntry]) -> Result<()> {
    let pref = &config.preferences;
    let locale = config.locale.as_str();

    println!("{}", vehicle.display_name());
    println!(
        "{:>6} {:<12} {:>14} {:>12} {:>12} {:>12} {:>12} {:>16}",
        "Id", "Date", "Odometer", "Volume", "Total", "Price", "Distance", "Consumption"
    );

    for m in metered {
        let e = &m.entry;
        let consumption = match m.metrics.status {
            IntervalStatus::OdometerRollback { .. } => "rollback!".to_string(),
            _ => optional(
                m.metrics
                    .consumption_l_100km
                    .map(|c| fuel_tracker::format_consumption(c, pref, 1, locale))
                    .transpose()?,
            ),
        };
        println!(
            "{:>6} {:<12} {:>14} {:>12} {:>12} {:>12} {:>12} {:>16}",
            e.id,
            format_date(e.entry_date, Some(&config.date_pattern))?,
            format_distance(e.odometer as f64, pref, 0, locale),
            format_volume(e.liters, pref, 2, locale),
            format_money(e.total_amount, pref.currency, pref.currency.minor_digits(), locale),
            optional(m.metrics.unit_price.map(|p| format_price(pref.unit_price_for_display(p), pref, locale))),
            optional(
                m.metrics
                    .distance_since_last
                    .map(|d| format_distance(d as f64, pref, 0, locale))
            ),
            consumption,
        );
    }
    Ok(())
}

fn print_dashboard(config: &AppConfig, stats: &fuel_tracker::DashboardStatistics) -> Result<()> {
    let pref: &UnitPreference = &config.preferences;
    let locale = config.locale.as_str();
    let a = &stats.aggregates;

    println!(
        "Period {} ({} - {})",
        stats.period.code(),
        format_date(stats.range.date_after, Some(&config.date_pattern))?,
        format_date(stats.range.date_before, Some(&config.date_pattern))?
    );
    println!("  Fill-ups:             {}", a.fill_up_count);
    println!("  Distance:             {}", format_distance(a.total_distance as f64, pref, 0, locale));
    println!("  Fuel:                 {}", format_volume(a.total_liters, pref, 2, locale));
    println!(
        "  Spent:                {}",
        format_money(a.total_spent, pref.currency, pref.currency.minor_digits(), locale)
    );
    println!(
        "  Average consumption:  {}",
        optional(
            a.average_consumption
                .map(|c| fuel_tracker::format_consumption(c, pref, 1, locale))
                .transpose()?
        )
    );
    println!(
        "  Average price:        {}",
        optional(a.average_unit_price.map(|p| format_price(pref.unit_price_for_display(p), pref, locale)))
    );
    println!(
        "  Cost per {}:          {}",
        pref.distance_unit.code(),
        optional(a.average_cost_per_km.map(|c| format_money(
            pref.cost_per_distance_for_display(c),
            pref.currency,
            4,
            locale
        )))
    );
    println!(
        "  Distance per day:     {}",
        optional(a.average_distance_per_day.map(|d| format_distance(d, pref, 1, locale)))
    );
    Ok(())
}

fn print_groups(title: &str, config: &AppConfig, groups: &[GroupStatistics]) {
    let pref = &config.preferences;
    let locale = config.locale.as_str();

    println!("{:<20} {:>6} {:>16} {:>12}", title, "Fills", "Consumption", "Price");
    for g in groups {
        let consumption = g
            .average_consumption
            .and_then(|c| fuel_tracker::format_consumption(c, pref, 1, locale).ok());
        println!(
            "{:<20} {:>6} {:>16} {:>12}",
            g.label,
            g.fill_count,
            optional(consumption),
            optional(g.average_unit_price.map(|p| format_price(pref.unit_price_for_display(p), pref, locale))),
        );
    }
}
