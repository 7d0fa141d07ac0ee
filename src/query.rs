//! Search inputs: catalog item codes, locations and the result-date range.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{Result, XrayError};
use crate::location::{resolve_locations, LocationFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(XrayError::InvalidInput(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Inclusive on both ends.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub item_codes: Vec<u64>,
    pub locations: LocationFilter,
    pub range: DateRange,
}

impl SearchQuery {
    pub fn parse<S: AsRef<str>>(
        item_codes: &str,
        locations: &[S],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self> {
        Ok(Self {
            item_codes: parse_item_codes(item_codes)?,
            locations: resolve_locations(locations),
            range: DateRange::new(start, end)?,
        })
    }
}

/// Comma-separated integers; blank pieces are skipped.
pub fn parse_item_codes(input: &str) -> Result<Vec<u64>> {
    let mut codes = Vec::new();
    for piece in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let code = piece
            .parse::<u64>()
            .map_err(|_| XrayError::InvalidInput("item codes must be integers".into()))?;
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    if codes.is_empty() {
        return Err(XrayError::InvalidInput(
            "at least one item code is required".into(),
        ));
    }
    Ok(codes)
}

/// `YYYY-MM-DD` or `DD/MM/YYYY`.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%d/%m/%Y"))
        .map_err(|_| XrayError::InvalidInput(format!("unrecognised date '{}'", input)))
}

pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_codes_are_trimmed_and_deduplicated() {
        assert_eq!(parse_item_codes(" 459670, 12 ,,459670").unwrap(), vec![459670, 12]);
    }

    #[test]
    fn non_integer_code_is_invalid() {
        let err = parse_item_codes("459670, abc").unwrap_err();
        assert!(matches!(err, XrayError::InvalidInput(ref m) if m.contains("integers")));
    }

    #[test]
    fn empty_code_list_is_invalid() {
        assert!(matches!(parse_item_codes(" , "), Err(XrayError::InvalidInput(_))));
    }

    #[test]
    fn date_range_is_inclusive_and_ordered() {
        let a = parse_date("2023-01-01").unwrap();
        let b = parse_date("31/12/2023").unwrap();
        let range = DateRange::new(a, b).unwrap();
        assert!(range.contains(a));
        assert!(range.contains(b));
        assert!(!range.contains(b.succ_opt().unwrap()));
        assert!(DateRange::new(b, a).is_err());
    }
}
