// Entity models
// Records are stored in canonical metric units (km, litres)

pub mod fuel_entry;
pub mod vehicle;

pub use fuel_entry::FuelEntry;
pub use vehicle::Vehicle;
