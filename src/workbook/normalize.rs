//! Conversions from loosely-typed spreadsheet cells into typed values.
//!
//! Nothing in here fails loudly. Each function documents what it returns
//! for input it can't make sense of.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use time::{macros::date, Date, Duration};

use crate::util::date::{parse_text_date, today_local};

/// Parses "n/d" or a plain decimal, rounded to one decimal place.
///
/// None for a zero denominator or anything non-numeric, which callers
/// treat as "no value provided".
pub fn parse_fraction(text: &str) -> Option<Decimal> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value = match trimmed.split_once('/') {
        Some((num, den)) => {
            let num = Decimal::from_str(num.trim()).ok()?;
            let den = Decimal::from_str(den.trim()).ok()?;
            num.checked_div(den)?
        }
        None => Decimal::from_str(trimmed).ok()?,
    };
    Some(value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
}

// Serial 61 is 1900-03-01. Below that, spreadsheets count a
// February 29th 1900 that never existed.
const LEAP_BUG_SERIAL: i64 = 60;

/// Years past the current one that we still accept as a real date.
const FUTURE_YEARS_ALLOWED: i32 = 5;

/// Converts a 1900-epoch spreadsheet serial (days, with the time of day as
/// the fraction) to a calendar date.
///
/// None outside 1900..=(this year + 5), so that a stray number in a date
/// column isn't mistaken for a date.
pub fn excel_serial_to_date(serial: f64) -> Option<Date> {
    if !serial.is_finite() || serial.abs() > 10_000_000.0 {
        return None;
    }
    let mut days = serial.floor() as i64;
    // A time of 23:59:59.9 can round up into the next day.
    let secs = ((serial - serial.floor()) * 86_400.0).round() as i64;
    if secs >= 86_400 {
        days += 1;
    }

    let date = if days > LEAP_BUG_SERIAL {
        date!(1899 - 12 - 30).checked_add(Duration::days(days))?
    } else if days < LEAP_BUG_SERIAL {
        date!(1899 - 12 - 31).checked_add(Duration::days(days))?
    } else {
        return None;
    };

    let max_year = today_local().year() + FUTURE_YEARS_ALLOWED;
    if date.year() < 1900 || date.year() > max_year {
        return None;
    }
    Some(date)
}

/// Index of the first header whose lowercased text contains any of
/// `keywords` (which must be lowercase).
pub fn find_header_index<S: AsRef<str>>(headers: &[S], keywords: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let lower = h.as_ref().trim().to_lowercase();
        !lower.is_empty() && keywords.iter().any(|k| lower.contains(k))
    })
}

/// Like `find_header_index`, but tries exact header names if no header
/// contains a keyword. For short, ambiguous names like "address" or "name"
/// that would otherwise also match "Email Address" or "First Name".
pub fn find_header_index_or_exact<S: AsRef<str>>(
    headers: &[S],
    keywords: &[&str],
    exact: &[&str],
) -> Option<usize> {
    find_header_index(headers, keywords).or_else(|| {
        headers.iter().position(|h| {
            let lower = h.as_ref().trim().to_lowercase();
            exact.iter().any(|e| lower == *e)
        })
    })
}

/// Cells that mean "same as above" in a context column.
pub fn is_blank_context(cell: &str) -> bool {
    matches!(cell.trim().to_uppercase().as_str(), "" | "NA" | "N/A" | "-")
}

/// Parses a share count the way a person would read it: separators and
/// spaces are ignored, anything after the whole number is dropped, and
/// 0 is returned when there's no number at all.
pub fn parse_quantity(cell: &str) -> i64 {
    let cleaned: String = cell
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let (sign, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let leading: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    match leading.parse::<i64>() {
        Ok(v) => sign * v,
        Err(_) => 0,
    }
}

/// Parses an optional count like "Total Authorized Shares". Blank or
/// non-numeric cells are None.
pub fn parse_optional_count(cell: &str) -> Option<u64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(v) = cleaned.parse::<u64>() {
        return Some(v);
    }
    // Numeric cells arrive as "1000000" from the loader, but hand-typed
    // text may be "1000000.0".
    Decimal::from_str(&cleaned)
        .ok()
        .filter(|d| !d.is_sign_negative())
        .and_then(|d| u64::try_from(d.trunc()).ok())
}

/// A date cell may hold a serial number (what the loader produces for
/// real date cells) or text typed by a person.
pub fn parse_date_cell(cell: &str) -> Option<Date> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(serial) => excel_serial_to_date(serial),
        Err(_) => parse_text_date(trimmed),
    }
}

/// CUSIPs are 9 characters. Purely numeric ones often lose leading zeros
/// when a spreadsheet stores them as numbers, so those are re-padded.
pub fn normalize_cusip(cell: &str) -> String {
    let trimmed = cell.trim().to_uppercase();
    if !trimmed.is_empty() && trimmed.len() < 9 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        format!("{trimmed:0>9}")
    } else {
        trimmed
    }
}
