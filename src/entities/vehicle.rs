// Vehicle entity

use serde::{Deserialize, Serialize};

// ============================================================================
// FIELD LIMITS
// ============================================================================

pub const NAME_MAX: usize = 100;
pub const MAKE_MAX: usize = 50;
pub const MODEL_MAX: usize = 50;
pub const FUEL_TYPE_MAX: usize = 20;

// ============================================================================
// VEHICLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Store-assigned id (0 until inserted)
    #[serde(default)]
    pub id: i64,

    /// Unique per owner
    pub name: String,

    #[serde(default)]
    pub make: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub year: Option<u16>,

    /// Odometer reading (km) when tracking started
    #[serde(default)]
    pub initial_odometer: i64,

    #[serde(default)]
    pub fuel_type: String,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Vehicle {
    pub fn new(name: &str) -> Self {
        Vehicle {
            id: 0,
            name: name.to_string(),
            make: String::new(),
            model: String::new(),
            year: None,
            initial_odometer: 0,
            fuel_type: String::new(),
            is_active: true,
        }
    }

    pub fn with_initial_odometer(mut self, km: i64) -> Self {
        self.initial_odometer = km;
        self
    }

    /// "Make Model (Year)" or just the name when nothing else is known
    pub fn display_name(&self) -> String {
        let details = [self.make.as_str(), self.model.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        match (details.is_empty(), self.year) {
            (true, _) => self.name.clone(),
            (false, Some(year)) => format!("{} - {} ({})", self.name, details, year),
            (false, None) => format!("{} - {}", self.name, details),
        }
    }
}
