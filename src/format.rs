// Display formatting: numbers, currency, dates, measurements
// Pure string builders; stored values are never rounded in place

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate};
use std::fmt::Write;
use tracing::debug;

use crate::currency::CurrencyCode;
use crate::error::{FuelError, Result};
use crate::preferences::UnitPreference;

pub const DEFAULT_DATE_PATTERN: &str = "%d.%m.%Y";
pub const DEFAULT_LOCALE: &str = "en-US";

// ============================================================================
// NUMBER LOCALE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolPosition {
    /// `$1,234.56`
    Before,
    /// `1.234,56 €`
    After,
}

/// Separators and currency layout for one locale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberLocale {
    pub decimal: char,
    pub group: Option<char>,
    pub symbol_position: SymbolPosition,
}

impl NumberLocale {
    const EN: NumberLocale = NumberLocale {
        decimal: '.',
        group: Some(','),
        symbol_position: SymbolPosition::Before,
    };

    /// Resolve a BCP-47 tag (`de-DE`, `fr`, `en_GB`). Unknown tags use en-US.
    pub fn for_tag(tag: &str) -> NumberLocale {
        let normalized = tag.trim().replace('_', "-");
        let mut parts = normalized.split('-');
        let language = parts.next().unwrap_or("").to_ascii_lowercase();
        let region = parts.next().map(|r| r.to_ascii_uppercase());

        match (language.as_str(), region.as_deref()) {
            ("de", Some("CH")) => NumberLocale {
                decimal: '.',
                group: Some('\''),
                symbol_position: SymbolPosition::Before,
            },
            ("en", _) | ("ja", _) | ("zh", _) | ("ko", _) | ("he", _) | ("th", _) => NumberLocale::EN,
            ("pt", Some("BR")) => NumberLocale {
                decimal: ',',
                group: Some('.'),
                symbol_position: SymbolPosition::Before,
            },
            ("de", _) | ("nl", _) | ("it", _) | ("es", _) | ("pt", _) | ("da", _) | ("tr", _)
            | ("id", _) | ("ro", _) | ("hr", _) | ("sl", _) | ("el", _) => NumberLocale {
                decimal: ',',
                group: Some('.'),
                symbol_position: SymbolPosition::After,
            },
            ("fr", _) | ("ru", _) | ("uk", _) | ("pl", _) | ("cs", _) | ("sk", _) | ("sv", _)
            | ("fi", _) | ("nb", _) | ("no", _) | ("hu", _) | ("bg", _) | ("lt", _) | ("lv", _)
            | ("et", _) => NumberLocale {
                decimal: ',',
                group: Some('\u{a0}'),
                symbol_position: SymbolPosition::After,
            },
            _ => {
                debug!(tag, "unknown locale, formatting as {}", DEFAULT_LOCALE);
                NumberLocale::EN
            }
        }
    }
}

// ============================================================================
// NUMBERS
// ============================================================================

/// Fixed decimal places, no grouping: `format_number(8.0, 1) == "8.0"`
pub fn format_number(value: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, value)
}

/// Fixed decimal places with locale separators
pub fn format_decimal(value: f64, decimals: usize, locale: &str) -> String {
    group_digits(value, decimals, &NumberLocale::for_tag(locale))
}

fn group_digits(value: f64, decimals: usize, locale: &NumberLocale) -> String {
    let raw = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw.as_str(), None),
    };

    // "-0.00" reads badly; only show a sign when something non-zero survives rounding
    let negative = value.is_sign_negative() && raw.bytes().any(|b| (b'1'..=b'9').contains(&b));

    let mut out = String::with_capacity(raw.len() + raw.len() / 3 + 1);
    if negative {
        out.push('-');
    }
    let digits = int_part.len();
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (digits - i) % 3 == 0 {
            if let Some(sep) = locale.group {
                out.push(sep);
            }
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push(locale.decimal);
        out.push_str(frac);
    }
    out
}

// ============================================================================
// CURRENCY
// ============================================================================

/// `format_currency(1234.56, "USD", None) == "$1,234.56"`
/// `format_currency(1234.56, "EUR", Some("de-DE")) == "1.234,56 €"`
pub fn format_currency(value: f64, currency: &str, locale: Option<&str>) -> Result<String> {
    let code: CurrencyCode = currency.parse()?;
    Ok(format_money(value, code, code.minor_digits(), locale.unwrap_or(DEFAULT_LOCALE)))
}

/// Currency amount with an explicit number of decimals
pub fn format_money(value: f64, currency: CurrencyCode, decimals: usize, locale: &str) -> String {
    let number_locale = NumberLocale::for_tag(locale);
    let number = group_digits(value, decimals, &number_locale);
    let symbol = currency.symbol();

    match number_locale.symbol_position {
        SymbolPosition::Before => match number.strip_prefix('-') {
            Some(unsigned) => format!("-{}{}", symbol, unsigned),
            None => format!("{}{}", symbol, number),
        },
        SymbolPosition::After => format!("{}\u{a0}{}", number, symbol),
    }
}

/// Unit price with the user's price precision
pub fn format_price(value: f64, preference: &UnitPreference, locale: &str) -> String {
    format_money(value, preference.currency, preference.price_precision.digits(), locale)
}

// ============================================================================
// DATES
// ============================================================================

/// Anything a date can be formatted from
#[derive(Debug, Clone, Copy)]
pub enum DateInput<'a> {
    Date(NaiveDate),
    /// `YYYY-MM-DD` or an RFC 3339 timestamp
    Iso(&'a str),
}

impl From<NaiveDate> for DateInput<'_> {
    fn from(d: NaiveDate) -> Self {
        DateInput::Date(d)
    }
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(s: &'a str) -> Self {
        DateInput::Iso(s)
    }
}

pub fn parse_iso_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(d);
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.date_naive())
        .map_err(|_| FuelError::InvalidDate(trimmed.to_string()))
}

/// Format with a strftime pattern, `%d.%m.%Y` when none is given
pub fn format_date<'a>(input: impl Into<DateInput<'a>>, pattern: Option<&str>) -> Result<String> {
    let date = match input.into() {
        DateInput::Date(d) => d,
        DateInput::Iso(s) => parse_iso_date(s)?,
    };
    let pattern = pattern.unwrap_or(DEFAULT_DATE_PATTERN);

    let items: Vec<Item> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|i| matches!(i, Item::Error)) {
        return Err(FuelError::InvalidDatePattern(pattern.to_string()));
    }

    let mut out = String::new();
    write!(out, "{}", date.format_with_items(items.into_iter()))
        .map_err(|_| FuelError::InvalidDatePattern(pattern.to_string()))?;
    Ok(out)
}

// ============================================================================
// MEASUREMENTS
// ============================================================================

/// Canonical km shown in the preferred distance unit
pub fn format_distance(km: f64, preference: &UnitPreference, decimals: usize, locale: &str) -> String {
    let value = preference.distance_for_display(km);
    format!("{} {}", format_decimal(value, decimals, locale), preference.distance_unit.code())
}

/// Canonical litres shown in the preferred volume unit
pub fn format_volume(liters: f64, preference: &UnitPreference, decimals: usize, locale: &str) -> String {
    let value = preference.volume_for_display(liters);
    format!("{} {}", format_decimal(value, decimals, locale), preference.volume_unit.code())
}

/// Canonical L/100km shown in the preference's consumption unit
pub fn format_consumption(
    l_per_100km: f64,
    preference: &UnitPreference,
    decimals: usize,
    locale: &str,
) -> Result<String> {
    let value = preference.consumption_for_display(l_per_100km)?;
    Ok(format!(
        "{} {}",
        format_decimal(value, decimals, locale),
        preference.consumption_unit().code()
    ))
}
