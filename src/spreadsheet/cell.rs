use chrono::NaiveDate;
use chrono::TimeDelta;
use iso8601_duration::Duration as IsoDuration;
use serde_json::Number;
use serde_json::Value;
use std::fmt::Display;

/// Storage type of a raw cell as read from the file.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values stored as "1" / "0"
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// ISO 8601 duration strings (ods time cells)
    IsoDuration,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values such as "#DIV/0!"
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Classifies a custom number format code by scanning for date and time tokens
    /// outside of literals, escapes and bracketed sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_bracket = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    fn is_1904(&self) -> bool {
        matches!(self, Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904)
    }
}

/// A single stored cell: position, storage type and the raw text of its value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as string
    pub(crate) value: String,
}

/// Typed value of a grid position as seen by the chunking engine.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Integer(i64),
    Float(f64),
    Text(String),
    /// Dates, times and datetimes rendered as ISO text
    Date(String),
    Boolean(bool),
}

impl CellValue {
    /// True for blank cells and whitespace-only text
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Integer(_) | CellValue::Float(_))
    }

    /// Trimmed text form, empty string for blank cells
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Integer(value) => value.to_string(),
            CellValue::Float(value) => value.to_string(),
            CellValue::Text(value) | CellValue::Date(value) => value.trim().to_owned(),
            CellValue::Boolean(value) => value.to_string(),
        }
    }

    /// JSON form used in record content; blank cells become "" rather than null
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Integer(value) => Value::Number(Number::from(*value)),
            CellValue::Float(value) => Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(value.to_string())),
            CellValue::Boolean(value) => Value::Bool(*value),
            _ => Value::String(self.to_text()),
        }
    }

    /// Interprets numeric text, keeping integral values integral.
    pub(crate) fn parse_number(text: &str) -> Option<CellValue> {
        let text = text.trim();
        if let Ok(integer) = text.parse::<i64>() {
            return Some(CellValue::Integer(integer));
        }
        let float = text.parse::<f64>().ok().filter(|value| value.is_finite())?;
        if float.fract() == 0.0 && float.abs() < 1e15 {
            Some(CellValue::Integer(float as i64))
        } else {
            Some(CellValue::Float(float))
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl Cell {
    /// Converts the raw stored text into a typed value.
    /// Values that fail to decode under their declared type fall back to text.
    pub(crate) fn to_value(&self) -> CellValue {
        let fallback = || CellValue::Text(self.value.to_owned());
        match self.kind {
            CellType::Empty => CellValue::Empty,
            CellType::Boolean => CellValue::Boolean(self.value == "1" || self.value.eq_ignore_ascii_case("true")),
            CellType::Number => CellValue::parse_number(&self.value).unwrap_or_else(fallback),
            CellType::NumberDateTime1900 | CellType::NumberDateTime1904 => {
                to_datetime_string(&self.value, self.kind.is_1904())
                    .map(CellValue::Date)
                    .unwrap_or_else(fallback)
            }
            CellType::NumberDate1900 | CellType::NumberDate1904 => {
                to_date_string(&self.value, self.kind.is_1904())
                    .map(CellValue::Date)
                    .unwrap_or_else(fallback)
            }
            CellType::NumberTime1900 | CellType::NumberTime1904 => {
                to_time_string(&self.value)
                    .map(CellValue::Date)
                    .unwrap_or_else(fallback)
            }
            CellType::IsoDateTime => CellValue::Date(self.value.replace('T', " ")),
            CellType::IsoDuration => to_duration_string(&self.value)
                .map(CellValue::Date)
                .unwrap_or_else(fallback),
            CellType::InlineString | CellType::SharedString | CellType::Error => fallback(),
        }
    }
}

/// Serial number of 9999-12-31, the last date a workbook can hold
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// Converts an Excel serial day number to an ISO date string.
/// Serial 60 is the phantom 1900-02-29 inherited from Lotus 1-2-3.
/// Serials outside 0..=9999-12-31 are not dates.
fn to_date_string(value: &str, is_1904: bool) -> Option<String> {
    let serial = value.trim().parse::<f64>().ok().filter(|serial| (0.0..=MAX_DATE_SERIAL).contains(serial))?;
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(TimeDelta::try_days(days.checked_add(offset)?)?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Converts the fractional part of an Excel serial number to "HH:MM:SS[.mmm]".
fn to_time_string(value: &str) -> Option<String> {
    let factor = value.trim().parse::<f64>().ok().filter(|serial| serial.is_finite())?.fract().abs();
    let mut total = (factor * 86_400_000f64).round() as i64;
    let milliseconds = total % 1_000;
    total /= 1_000;
    let seconds = total % 60;
    total /= 60;
    let minutes = total % 60;
    let hours = total / 60;
    if milliseconds > 0 {
        Some(format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}"))
    } else {
        Some(format!("{hours:02}:{minutes:02}:{seconds:02}"))
    }
}

fn to_datetime_string(value: &str, is_1904: bool) -> Option<String> {
    let date = to_date_string(value, is_1904)?;
    let time = to_time_string(value)?;
    Some(format!("{date} {time}"))
}

/// Formats an ISO 8601 duration such as "PT10H30M00S" as "10:30:00".
fn to_duration_string(value: &str) -> Option<String> {
    let duration = value.parse::<IsoDuration>().ok()?;
    let hours = duration.day as i64 * 24 + duration.hour as i64;
    let minutes = duration.minute as i64;
    let seconds = duration.second as i64;
    Some(format!("{hours:02}:{minutes:02}:{seconds:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell {
            row: 0,
            col: 0,
            kind,
            value: value.to_owned(),
        }
    }

    #[test]
    fn test_numbers_keep_integral_values_integral() {
        assert_eq!(cell(CellType::Number, "42").to_value(), CellValue::Integer(42));
        assert_eq!(cell(CellType::Number, "4.2E+3").to_value(), CellValue::Integer(4200));
        assert_eq!(cell(CellType::Number, "12.5").to_value(), CellValue::Float(12.5));
        assert_eq!(cell(CellType::Number, "n/a").to_value(), CellValue::Text("n/a".to_owned()));
    }

    #[test]
    fn test_dates() {
        assert_eq!(cell(CellType::NumberDate1900, "45292").to_value(), CellValue::Date("2024-01-01".to_owned()));
        assert_eq!(cell(CellType::NumberDate1900, "1").to_value(), CellValue::Date("1900-01-01".to_owned()));
        assert_eq!(cell(CellType::NumberDate1904, "0").to_value(), CellValue::Date("1904-01-01".to_owned()));
        assert_eq!(cell(CellType::NumberTime1900, "0.5").to_value(), CellValue::Date("12:00:00".to_owned()));
        assert_eq!(
            cell(CellType::NumberDateTime1900, "45292.75").to_value(),
            CellValue::Date("2024-01-01 18:00:00".to_owned())
        );
        assert_eq!(
            cell(CellType::IsoDateTime, "2024-03-05T08:15:00").to_value(),
            CellValue::Date("2024-03-05 08:15:00".to_owned())
        );
        assert_eq!(cell(CellType::IsoDuration, "PT10H30M00S").to_value(), CellValue::Date("10:30:00".to_owned()));
    }

    #[test]
    fn test_out_of_range_serials_stay_text() {
        assert_eq!(cell(CellType::NumberDate1900, "1e20").to_value(), CellValue::Text("1e20".to_owned()));
        assert_eq!(cell(CellType::NumberDate1904, "9.2e18").to_value(), CellValue::Text("9.2e18".to_owned()));
        assert_eq!(cell(CellType::NumberDateTime1900, "-3.5").to_value(), CellValue::Text("-3.5".to_owned()));
        assert_eq!(cell(CellType::NumberDate1900, "NaN").to_value(), CellValue::Text("NaN".to_owned()));
        assert_eq!(cell(CellType::NumberTime1900, "inf").to_value(), CellValue::Text("inf".to_owned()));
        assert_eq!(cell(CellType::NumberDate1900, "2958465").to_value(), CellValue::Date("9999-12-31".to_owned()));
    }

    #[test]
    fn test_custom_number_formats() {
        assert_eq!(CellType::parse_custom_number_format("yyyy-mm-dd", false), CellType::NumberDate1900);
        assert_eq!(CellType::parse_custom_number_format("hh:mm", true), CellType::NumberTime1904);
        assert_eq!(CellType::parse_custom_number_format("[Red]0.00\"days\"", false), CellType::Number);
        assert_eq!(CellType::parse_custom_number_format("#,##0_);[Red](#,##0)", false), CellType::Number);
    }

    #[test]
    fn test_value_emptiness_and_text() {
        assert!(CellValue::Empty.is_empty());
        assert!(CellValue::Text("  ".to_owned()).is_empty());
        assert!(!CellValue::Integer(0).is_empty());
        assert_eq!(CellValue::Text("  Price ".to_owned()).to_text(), "Price");
        assert_eq!(CellValue::Empty.to_json(), Value::String(String::new()));
        assert_eq!(CellValue::Float(1.5).to_json(), serde_json::json!(1.5));
    }
}
