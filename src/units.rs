// Unit kinds and converters
// Distance and volume scale linearly; consumption converts through a reciprocal

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::currency::CurrencyCode;
use crate::error::{FuelError, Result};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Kilometres in one statute mile
pub const KM_PER_MILE: f64 = 1.60934;

/// Litres in one US gallon
pub const LITERS_PER_GALLON: f64 = 3.78541;

/// `mpg = MPG_L100KM_FACTOR / (L/100km)` and vice versa (US gallons)
pub const MPG_L100KM_FACTOR: f64 = 235.215;

// ============================================================================
// UNIT KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DistanceUnit {
    #[default]
    #[serde(rename = "km")]
    Kilometers,
    #[serde(rename = "mi")]
    Miles,
}

impl DistanceUnit {
    pub fn code(&self) -> &'static str {
        match self {
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceUnit::Kilometers => "Kilometers",
            DistanceUnit::Miles => "Miles",
        }
    }

    /// Kilometres per one unit
    fn km_factor(&self) -> f64 {
        match self {
            DistanceUnit::Kilometers => 1.0,
            DistanceUnit::Miles => KM_PER_MILE,
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = FuelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "km" => Ok(DistanceUnit::Kilometers),
            "mi" => Ok(DistanceUnit::Miles),
            other => Err(FuelError::UnknownUnit(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VolumeUnit {
    #[default]
    #[serde(rename = "L")]
    Liters,
    #[serde(rename = "gal")]
    Gallons,
}

impl VolumeUnit {
    pub fn code(&self) -> &'static str {
        match self {
            VolumeUnit::Liters => "L",
            VolumeUnit::Gallons => "gal",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VolumeUnit::Liters => "Liters",
            VolumeUnit::Gallons => "Gallons",
        }
    }

    fn liter_factor(&self) -> f64 {
        match self {
            VolumeUnit::Liters => 1.0,
            VolumeUnit::Gallons => LITERS_PER_GALLON,
        }
    }
}

impl FromStr for VolumeUnit {
    type Err = FuelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "L" | "l" => Ok(VolumeUnit::Liters),
            "gal" => Ok(VolumeUnit::Gallons),
            other => Err(FuelError::UnknownUnit(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConsumptionUnit {
    #[default]
    #[serde(rename = "L/100km")]
    LitersPer100Km,
    #[serde(rename = "mpg")]
    MilesPerGallon,
}

impl ConsumptionUnit {
    pub fn code(&self) -> &'static str {
        match self {
            ConsumptionUnit::LitersPer100Km => "L/100km",
            ConsumptionUnit::MilesPerGallon => "mpg",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConsumptionUnit::LitersPer100Km => "Liters per 100 km",
            ConsumptionUnit::MilesPerGallon => "Miles per gallon",
        }
    }
}

impl FromStr for ConsumptionUnit {
    type Err = FuelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "L/100km" | "l/100km" => Ok(ConsumptionUnit::LitersPer100Km),
            "mpg" => Ok(ConsumptionUnit::MilesPerGallon),
            other => Err(FuelError::UnknownUnit(other.to_string())),
        }
    }
}

/// Any unit a measurement can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "unit", rename_all = "snake_case")]
pub enum Unit {
    Distance(DistanceUnit),
    Volume(VolumeUnit),
    Consumption(ConsumptionUnit),
    Currency(CurrencyCode),
}

impl Unit {
    pub fn code(&self) -> &str {
        match self {
            Unit::Distance(u) => u.code(),
            Unit::Volume(u) => u.code(),
            Unit::Consumption(u) => u.code(),
            Unit::Currency(c) => c.as_str(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Unit::Distance(_) => "distance",
            Unit::Volume(_) => "volume",
            Unit::Consumption(_) => "consumption",
            Unit::Currency(_) => "currency",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Unit {
    type Err = FuelError;

    /// Physical unit codes first, then three-letter currency codes
    fn from_str(s: &str) -> Result<Self> {
        if let Ok(u) = s.parse::<DistanceUnit>() {
            return Ok(Unit::Distance(u));
        }
        if let Ok(u) = s.parse::<VolumeUnit>() {
            return Ok(Unit::Volume(u));
        }
        if let Ok(u) = s.parse::<ConsumptionUnit>() {
            return Ok(Unit::Consumption(u));
        }
        match s.parse::<CurrencyCode>() {
            Ok(c) => Ok(Unit::Currency(c)),
            Err(_) => Err(FuelError::UnknownUnit(s.trim().to_string())),
        }
    }
}

// ============================================================================
// CONVERTERS
// ============================================================================

pub fn convert_distance(value: f64, from: DistanceUnit, to: DistanceUnit) -> f64 {
    if from == to {
        return value;
    }
    value * from.km_factor() / to.km_factor()
}

pub fn convert_volume(value: f64, from: VolumeUnit, to: VolumeUnit) -> f64 {
    if from == to {
        return value;
    }
    value * from.liter_factor() / to.liter_factor()
}

/// L/100km and mpg are reciprocal, so zero has no counterpart. Identity
/// conversions pass any value through untouched.
pub fn convert_consumption(value: f64, from: ConsumptionUnit, to: ConsumptionUnit) -> Result<f64> {
    if from == to {
        return Ok(value);
    }
    if !value.is_finite() || value <= 0.0 {
        return Err(FuelError::InvalidConsumption(value));
    }
    Ok(MPG_L100KM_FACTOR / value)
}

/// Convert by textual unit codes ("km", "gal", "mpg", ...)
pub fn convert_by_code(value: f64, from: &str, to: &str) -> Result<f64> {
    let from: Unit = from.parse()?;
    let to: Unit = to.parse()?;
    Measurement::new(value, from).convert_to(to).map(|m| m.value)
}

// ============================================================================
// MEASUREMENT
// ============================================================================

/// A magnitude paired with its unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub unit: Unit,
}

impl Measurement {
    pub fn new(value: f64, unit: Unit) -> Self {
        Measurement { value, unit }
    }

    pub fn km(value: f64) -> Self {
        Measurement::new(value, Unit::Distance(DistanceUnit::Kilometers))
    }

    pub fn liters(value: f64) -> Self {
        Measurement::new(value, Unit::Volume(VolumeUnit::Liters))
    }

    pub fn l_per_100km(value: f64) -> Self {
        Measurement::new(value, Unit::Consumption(ConsumptionUnit::LitersPer100Km))
    }

    /// Returns a new measurement in `target`. Currency amounts only convert to
    /// the same currency since no exchange rates are known here.
    pub fn convert_to(&self, target: Unit) -> Result<Measurement> {
        let value = match (self.unit, target) {
            (Unit::Distance(a), Unit::Distance(b)) => convert_distance(self.value, a, b),
            (Unit::Volume(a), Unit::Volume(b)) => convert_volume(self.value, a, b),
            (Unit::Consumption(a), Unit::Consumption(b)) => convert_consumption(self.value, a, b)?,
            (Unit::Currency(a), Unit::Currency(b)) if a == b => self.value,
            (from, to) => {
                return Err(FuelError::IncompatibleUnits {
                    from: from.code().to_string(),
                    to: to.code().to_string(),
                })
            }
        };
        Ok(Measurement::new(value, target))
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}
