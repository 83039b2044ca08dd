// Per-user display preferences
// Passed explicitly into conversion and formatting calls

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::currency::CurrencyCode;
use crate::error::{FuelError, Result};
use crate::units::{
    convert_consumption, convert_distance, convert_volume, ConsumptionUnit, DistanceUnit, VolumeUnit,
};

// ============================================================================
// PRICE PRECISION
// ============================================================================

/// Decimal places used for unit prices (2 or 3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PricePrecision(u8);

impl PricePrecision {
    pub fn new(digits: u8) -> Result<Self> {
        match digits {
            2 | 3 => Ok(PricePrecision(digits)),
            other => Err(FuelError::InvalidPrecision(other)),
        }
    }

    pub fn digits(&self) -> usize {
        self.0 as usize
    }
}

impl Default for PricePrecision {
    fn default() -> Self {
        PricePrecision(2)
    }
}

impl TryFrom<u8> for PricePrecision {
    type Error = FuelError;

    fn try_from(value: u8) -> Result<Self> {
        PricePrecision::new(value)
    }
}

impl From<PricePrecision> for u8 {
    fn from(p: PricePrecision) -> Self {
        p.0
    }
}

// ============================================================================
// UNIT PREFERENCE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitPreference {
    #[serde(rename = "preferred_distance_unit", default)]
    pub distance_unit: DistanceUnit,

    #[serde(rename = "preferred_volume_unit", default)]
    pub volume_unit: VolumeUnit,

    #[serde(rename = "preferred_currency", default)]
    pub currency: CurrencyCode,

    #[serde(default)]
    pub price_precision: PricePrecision,
}

impl UnitPreference {
    pub fn metric(currency: CurrencyCode) -> Self {
        UnitPreference {
            distance_unit: DistanceUnit::Kilometers,
            volume_unit: VolumeUnit::Liters,
            currency,
            price_precision: PricePrecision::default(),
        }
    }

    pub fn imperial(currency: CurrencyCode) -> Self {
        UnitPreference {
            distance_unit: DistanceUnit::Miles,
            volume_unit: VolumeUnit::Gallons,
            currency,
            price_precision: PricePrecision::default(),
        }
    }

    /// mpg only when both distance and volume are imperial
    pub fn consumption_unit(&self) -> ConsumptionUnit {
        match (self.distance_unit, self.volume_unit) {
            (DistanceUnit::Miles, VolumeUnit::Gallons) => ConsumptionUnit::MilesPerGallon,
            _ => ConsumptionUnit::LitersPer100Km,
        }
    }

    pub fn distance_for_display(&self, km: f64) -> f64 {
        convert_distance(km, DistanceUnit::Kilometers, self.distance_unit)
    }

    pub fn distance_to_canonical(&self, value: f64) -> f64 {
        convert_distance(value, self.distance_unit, DistanceUnit::Kilometers)
    }

    pub fn volume_for_display(&self, liters: f64) -> f64 {
        convert_volume(liters, VolumeUnit::Liters, self.volume_unit)
    }

    pub fn volume_to_canonical(&self, value: f64) -> f64 {
        convert_volume(value, self.volume_unit, VolumeUnit::Liters)
    }

    pub fn consumption_for_display(&self, l_per_100km: f64) -> Result<f64> {
        convert_consumption(l_per_100km, ConsumptionUnit::LitersPer100Km, self.consumption_unit())
    }

    pub fn consumption_to_canonical(&self, value: f64) -> Result<f64> {
        convert_consumption(value, self.consumption_unit(), ConsumptionUnit::LitersPer100Km)
    }

    /// Price per litre → price per display volume unit
    pub fn unit_price_for_display(&self, price_per_liter: f64) -> f64 {
        // one display unit holds this many litres
        price_per_liter * convert_volume(1.0, self.volume_unit, VolumeUnit::Liters)
    }

    /// Cost per km → cost per display distance unit
    pub fn cost_per_distance_for_display(&self, cost_per_km: f64) -> f64 {
        cost_per_km * convert_distance(1.0, self.distance_unit, DistanceUnit::Kilometers)
    }
}

// ============================================================================
// LOCALE DETECTION
// ============================================================================

/// Currency and timezone guessed for a new profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedLocale {
    pub currency: CurrencyCode,
    pub timezone: String,
}

impl Default for DetectedLocale {
    fn default() -> Self {
        DetectedLocale {
            currency: CurrencyCode::USD,
            timezone: "UTC".to_string(),
        }
    }
}

const COUNTRY_LOCALES: &[(&str, &str, &str)] = &[
    // Europe
    ("AT", "EUR", "Europe/Vienna"),
    ("BE", "EUR", "Europe/Brussels"),
    ("BG", "BGN", "Europe/Sofia"),
    ("HR", "EUR", "Europe/Zagreb"),
    ("CY", "EUR", "Asia/Nicosia"),
    ("CZ", "CZK", "Europe/Prague"),
    ("DK", "DKK", "Europe/Copenhagen"),
    ("EE", "EUR", "Europe/Tallinn"),
    ("FI", "EUR", "Europe/Helsinki"),
    ("FR", "EUR", "Europe/Paris"),
    ("DE", "EUR", "Europe/Berlin"),
    ("GR", "EUR", "Europe/Athens"),
    ("HU", "HUF", "Europe/Budapest"),
    ("IE", "EUR", "Europe/Dublin"),
    ("IT", "EUR", "Europe/Rome"),
    ("LV", "EUR", "Europe/Riga"),
    ("LT", "EUR", "Europe/Vilnius"),
    ("LU", "EUR", "Europe/Luxembourg"),
    ("MT", "EUR", "Europe/Malta"),
    ("NL", "EUR", "Europe/Amsterdam"),
    ("PL", "PLN", "Europe/Warsaw"),
    ("PT", "EUR", "Europe/Lisbon"),
    ("RO", "RON", "Europe/Bucharest"),
    ("SK", "EUR", "Europe/Bratislava"),
    ("SI", "EUR", "Europe/Ljubljana"),
    ("ES", "EUR", "Europe/Madrid"),
    ("SE", "SEK", "Europe/Stockholm"),
    ("CH", "CHF", "Europe/Zurich"),
    ("GB", "GBP", "Europe/London"),
    ("NO", "NOK", "Europe/Oslo"),
    ("IS", "ISK", "Atlantic/Reykjavik"),
    ("UA", "UAH", "Europe/Kyiv"),
    // North America
    ("US", "USD", "America/New_York"),
    ("CA", "CAD", "America/Toronto"),
    ("MX", "MXN", "America/Mexico_City"),
    // Asia
    ("JP", "JPY", "Asia/Tokyo"),
    ("CN", "CNY", "Asia/Shanghai"),
    ("IN", "INR", "Asia/Kolkata"),
    ("KR", "KRW", "Asia/Seoul"),
    ("SG", "SGD", "Asia/Singapore"),
    ("HK", "HKD", "Asia/Hong_Kong"),
    ("TH", "THB", "Asia/Bangkok"),
    ("MY", "MYR", "Asia/Kuala_Lumpur"),
    ("ID", "IDR", "Asia/Jakarta"),
    ("PH", "PHP", "Asia/Manila"),
    ("VN", "VND", "Asia/Ho_Chi_Minh"),
    ("TR", "TRY", "Europe/Istanbul"),
    ("IL", "ILS", "Asia/Jerusalem"),
    ("AE", "AED", "Asia/Dubai"),
    ("SA", "SAR", "Asia/Riyadh"),
    // Oceania
    ("AU", "AUD", "Australia/Sydney"),
    ("NZ", "NZD", "Pacific/Auckland"),
    // South America
    ("BR", "BRL", "America/Sao_Paulo"),
    ("AR", "ARS", "America/Buenos_Aires"),
    ("CL", "CLP", "America/Santiago"),
    ("CO", "COP", "America/Bogota"),
    ("PE", "PEN", "America/Lima"),
    // Africa
    ("ZA", "ZAR", "Africa/Johannesburg"),
    ("EG", "EGP", "Africa/Cairo"),
    ("NG", "NGN", "Africa/Lagos"),
    ("KE", "KES", "Africa/Nairobi"),
    ("MA", "MAD", "Africa/Casablanca"),
];

/// Country assumed for a bare language tag
fn default_country(language: &str) -> &'static str {
    match language {
        "de" => "DE",
        "fr" => "FR",
        "es" => "ES",
        "it" => "IT",
        "pt" => "PT",
        "ja" => "JP",
        "zh" => "CN",
        "ko" => "KR",
        "ar" => "SA",
        "nl" => "NL",
        "pl" => "PL",
        "tr" => "TR",
        "uk" => "UA",
        _ => "US",
    }
}

/// Guess currency and timezone from an `Accept-Language` header value such as
/// `de-DE,de;q=0.9,en;q=0.8`. Only the first tag is used. Unknown countries
/// fall back to USD / UTC.
pub fn detect_locale(accept_language: &str) -> DetectedLocale {
    let first = accept_language.split(',').next().unwrap_or("");
    let tag = first.split(';').next().unwrap_or("").trim();
    if tag.is_empty() {
        return DetectedLocale::default();
    }

    let country = match tag.split(['-', '_']).nth(1) {
        Some(region) => region.to_ascii_uppercase(),
        None => default_country(&tag.to_ascii_lowercase()).to_string(),
    };

    let found = COUNTRY_LOCALES
        .iter()
        .find(|(c, _, _)| *c == country)
        .and_then(|(_, currency, tz)| currency.parse().ok().map(|cur| (cur, *tz)));

    match found {
        Some((currency, timezone)) => {
            debug!(tag, country = %country, currency = %currency, "detected locale");
            DetectedLocale {
                currency,
                timezone: timezone.to_string(),
            }
        }
        None => {
            debug!(tag, country = %country, "country not mapped, using defaults");
            DetectedLocale::default()
        }
    }
}

/// Longest browser-supplied timezone accepted (exclusive)
const BROWSER_TIMEZONE_MAX: usize = 50;

/// Locale for a request: `detect_locale` on the Accept-Language value, with
/// the timezone replaced by a browser-sent `X-Timezone` value when it looks
/// like an IANA name (`Area/City`). Without Accept-Language the defaults win.
pub fn detect_request_locale(accept_language: &str, browser_timezone: Option<&str>) -> DetectedLocale {
    if accept_language.trim().is_empty() {
        return DetectedLocale::default();
    }

    let mut locale = detect_locale(accept_language);
    if let Some(tz) = browser_timezone.map(str::trim) {
        if tz.contains('/') && tz.len() < BROWSER_TIMEZONE_MAX {
            debug!(timezone = tz, "using browser timezone");
            locale.timezone = tz.to_string();
        }
    }
    locale
}
