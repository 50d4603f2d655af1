use std::cell::RefCell;

use chrono::Datelike;
pub use time::Date;
use time::{macros::format_description, Month, UtcOffset};

pub type StaticDateFormat<'a> =
    &'static [time::format_description::BorrowedFormatItem<'a>];

pub const STANDARD_DATE_FORMAT: StaticDateFormat =
    format_description!("[year]-[month]-[day]");

/// How transaction dates are persisted and exported (MM/DD/YYYY).
pub const LEDGER_DATE_FORMAT: StaticDateFormat =
    format_description!("[month]/[day]/[year]");

// Accepts both 1/2/2024 and 01/02/2024.
const LOOSE_LEDGER_DATE_FORMAT: StaticDateFormat =
    format_description!("[month padding:none]/[day padding:none]/[year]");

pub fn parse_standard_date(date_str: &str) -> Result<Date, time::error::Parse> {
    Date::parse(date_str, STANDARD_DATE_FORMAT)
}

pub fn parse_ledger_date(date_str: &str) -> Result<Date, time::error::Parse> {
    Date::parse(date_str.trim(), LOOSE_LEDGER_DATE_FORMAT)
}

pub fn format_ledger_date(d: &Date) -> String {
    // The format only contains components every Date has.
    d.format(LEDGER_DATE_FORMAT)
        .unwrap_or_else(|_| format!("{:02}/{:02}/{}", d.month() as u8, d.day(), d.year()))
}

/// Parses a date cell written by a person rather than by a spreadsheet
/// application: MM/DD/YYYY first, then YYYY-MM-DD.
pub fn parse_text_date(date_str: &str) -> Option<Date> {
    let trimmed = date_str.trim();
    parse_ledger_date(trimmed)
        .or_else(|_| parse_standard_date(trimmed))
        .ok()
}

fn date_naive_to_date(dn: &chrono::NaiveDate) -> Date {
    Date::from_calendar_date(
        dn.year(),
        Month::December.nth_next(dn.month() as u8),
        dn.day() as u8,
    )
    .unwrap_or(Date::MIN)
}

thread_local! {
    static TODAYS_DATE_FOR_TEST_TL: RefCell<Date> = RefCell::new(Date::MIN);
}

pub fn set_todays_date_for_test(d: Date) {
    TODAYS_DATE_FOR_TEST_TL.with_borrow_mut(|d_| *d_ = d);
}

pub fn today_local() -> Date {
    let test_date: Date = TODAYS_DATE_FOR_TEST_TL.with_borrow(|d| *d);
    if test_date != Date::MIN {
        return test_date;
    }
    let now = chrono::offset::Local::now();
    date_naive_to_date(&now.date_naive())
}

// UtcOffset::current_local_offset refuses to work on Linux without
// the unsound feature, so go through chrono instead.
pub fn local_utc_offset() -> Result<UtcOffset, time::error::ComponentRange> {
    let now = chrono::offset::Local::now();
    let offset = now.offset();
    UtcOffset::from_whole_seconds(-1 * offset.utc_minus_local())
}

/// serde adapter for `Option<Date>` stored as MM/DD/YYYY text.
pub mod ledger_date_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(d: &Option<Date>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_str(&super::format_ledger_date(d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Date>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => super::parse_text_date(&s).map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid transaction date \"{s}\""))
            }),
        }
    }
}

// Used by both unit and integration tests
pub mod pub_testlib {
    use time::{Date, Month};

    pub fn ymd(year: i32, month: u8, day: u8) -> Date {
        Date::from_calendar_date(year, Month::December.nth_next(month), day).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use time::{Date, Month};

    use super::pub_testlib::ymd;
    use super::{
        date_naive_to_date, format_ledger_date, parse_ledger_date, parse_standard_date,
        parse_text_date,
    };

    #[test]
    fn test_parse() {
        let d = parse_standard_date("2023-01-21");
        assert_eq!(
            d.unwrap(),
            Date::from_calendar_date(2023, Month::January, 21).unwrap()
        );

        let d = parse_standard_date("2023-01-41");
        assert!(d.is_err());
    }

    #[test]
    fn test_ledger_date() {
        assert_eq!(parse_ledger_date("01/02/2024").unwrap(), ymd(2024, 1, 2));
        assert_eq!(parse_ledger_date("1/2/2024").unwrap(), ymd(2024, 1, 2));
        assert!(parse_ledger_date("13/02/2024").is_err());

        assert_eq!(format_ledger_date(&ymd(2024, 3, 9)), "03/09/2024");
    }

    #[test]
    fn test_parse_text_date() {
        assert_eq!(parse_text_date(" 12/31/2023 "), Some(ymd(2023, 12, 31)));
        assert_eq!(parse_text_date("2023-12-31"), Some(ymd(2023, 12, 31)));
        assert_eq!(parse_text_date("Dec 31"), None);
        assert_eq!(parse_text_date(""), None);
    }

    #[test]
    fn test_date_naive_to_date() {
        let naive_date = NaiveDate::from_ymd_opt(2024, 4, 13).unwrap();
        assert_eq!(date_naive_to_date(&naive_date), ymd(2024, 4, 13));
    }
}
