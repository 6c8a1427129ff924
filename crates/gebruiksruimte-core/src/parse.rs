//! Parsing of user-entered values: soil-test numbers and Dutch dates.

use chrono::NaiveDate;

use crate::CoreError;

/// Parse a decimal that may use a comma as decimal separator ("2,4").
pub fn parse_decimal(s: &str) -> Result<f64, CoreError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput("empty number".into()));
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CoreError::InvalidInput(format!("not a number: '{trimmed}'")))
}

/// Parse `dd-mm-yyyy`, falling back to ISO `yyyy-mm-dd`.
pub fn parse_date(s: &str) -> Result<NaiveDate, CoreError> {
    let trimmed = s.trim();
    NaiveDate::parse_from_str(trimmed, "%d-%m-%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|_| CoreError::InvalidInput(format!("malformed date: '{trimmed}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn decimal_accepts_comma() {
        assert_eq!(parse_decimal("2,4").unwrap(), 2.4);
        assert_eq!(parse_decimal(" 30 ").unwrap(), 30.0);
    }

    #[test]
    fn decimal_rejects_text() {
        assert!(matches!(parse_decimal("hoog"), Err(CoreError::InvalidInput(_))));
        assert!(matches!(parse_decimal(""), Err(CoreError::InvalidInput(_))));
        assert!(matches!(parse_decimal("NaN"), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn dutch_and_iso_dates() {
        let d = parse_date("15-03-2024").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2024, 3, 15));
        assert_eq!(parse_date("2024-03-15").unwrap(), d);
    }

    #[test]
    fn malformed_date_is_invalid_input() {
        assert!(parse_date("31-13-2024").is_err());
        assert!(parse_date("gisteren").is_err());
    }
}
