// Copyright 2025 The Hagelradar Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Compact feed timestamp codec.
//!
//! Feed entries carry their validity time as a prefixed digit run:
//!
//! ```text
//! <prefix><YYYYMMDDHHmm><suffix>   e.g. "radar_202403151430_v2"
//! ```
//!
//! The twelve digits encode a UTC wall-clock minute. Display formatting is
//! fixed to the Dutch-Belgian locale the site serves.

use chrono::{DateTime, Locale, NaiveDate, Utc};
use thiserror::Error;

/// Errors from decoding a feed timestamp token.
#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("no run of 12 or more digits in token {0:?}")]
    NoDigitRun(String),

    #[error("digits in token {0:?} do not form a valid UTC date and time")]
    InvalidDate(String),
}

/// Decode a timestamp token into a UTC instant.
///
/// Takes the first maximal run of ASCII digits in `token`; the run must be
/// at least 12 digits long and its first 12 digits are read as
/// `YYYYMMDDHHmm`. Any shorter run, or digits that do not form a real
/// calendar date, is an error.
pub fn parse(token: &str) -> Result<DateTime<Utc>, TimestampError> {
    let start = token
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| TimestampError::NoDigitRun(token.to_string()))?;
    let run: &str = token[start..]
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or("");
    if run.len() < 12 {
        return Err(TimestampError::NoDigitRun(token.to_string()));
    }
    let digits = &run[..12];

    let field = |range: std::ops::Range<usize>| -> u32 {
        // The slice is all ASCII digits, so this cannot fail
        digits[range].parse().unwrap_or(0)
    };
    let year = i32::try_from(field(0..4)).unwrap_or(0);

    NaiveDate::from_ymd_opt(year, field(4..6), field(6..8))
        .and_then(|date| date.and_hms_opt(field(8..10), field(10..12), 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TimestampError::InvalidDate(token.to_string()))
}

/// Format an instant as a short time label, e.g. "14:30" or "9:05".
#[must_use]
pub fn format_short(instant: DateTime<Utc>) -> String {
    instant.format("%-H:%M").to_string()
}

/// Format an instant as a full Dutch-Belgian date line,
/// e.g. "vrijdag 15/3 14:30".
#[must_use]
pub fn format_long(instant: DateTime<Utc>) -> String {
    instant
        .format_localized("%A %-d/%-m %-H:%M", Locale::nl_BE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_embedded_token() {
        let instant = parse("radar_202403151430_v2").unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_bare_digits() {
        let instant = parse("202403151430").unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_uses_first_twelve_digits_of_longer_run() {
        // Seconds appended to the run are ignored
        let instant = parse("20240315143059").unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_no_digits() {
        let result = parse("radar_latest");
        assert!(matches!(result, Err(TimestampError::NoDigitRun(_))));
    }

    #[test]
    fn test_parse_short_run() {
        // A short leading run is not skipped in favor of a later one
        let result = parse("v2_202403151430");
        assert!(matches!(result, Err(TimestampError::NoDigitRun(_))));
    }

    #[test]
    fn test_parse_invalid_month() {
        let result = parse("radar_202413151430");
        assert!(matches!(result, Err(TimestampError::InvalidDate(_))));
    }

    #[test]
    fn test_parse_invalid_hour() {
        let result = parse("radar_202403152460");
        assert!(matches!(result, Err(TimestampError::InvalidDate(_))));
    }

    #[test]
    fn test_format_short() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap();
        assert_eq!(format_short(instant), "14:30");
    }

    #[test]
    fn test_format_short_single_digit_hour() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 9, 5, 0).unwrap();
        assert_eq!(format_short(instant), "9:05");
    }

    #[test]
    fn test_format_long() {
        // 2024-03-15 is a Friday
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap();
        assert_eq!(format_long(instant), "vrijdag 15/3 14:30");
    }

    #[test]
    fn test_format_long_no_padding() {
        let instant = Utc.with_ymd_and_hms(2024, 7, 1, 8, 5, 0).unwrap();
        assert_eq!(format_long(instant), "maandag 1/7 8:05");
    }
}
