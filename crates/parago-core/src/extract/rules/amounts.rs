//! Numeric coercion for vendor-reported field values.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::ocr::protocol::FieldValue;

/// Pull a decimal out of a recognized field, trying representations from
/// most to least structured: typed number, currency amount, numeric string,
/// raw content.
pub fn coerce_number(field: &FieldValue) -> Option<Decimal> {
    if let Some(n) = field.value_number {
        return Decimal::from_f64(n);
    }
    if let Some(amount) = field.value_currency.as_ref().and_then(|c| c.amount) {
        return Decimal::from_f64(amount);
    }
    if let Some(amount) = field.value_string.as_deref().and_then(parse_amount) {
        return Some(amount);
    }
    field.content.as_deref().and_then(parse_amount)
}

/// Parse a Polish-formatted amount (e.g., "1 234,56", "1234.56", "42,37 PLN").
pub fn parse_amount(s: &str) -> Option<Decimal> {
    // Remove spaces, currency suffixes, and non-breaking spaces
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    // Replace comma with period for decimal
    let normalized = if cleaned.contains(',') && !cleaned.contains('.') {
        cleaned.replace(',', ".")
    } else if cleaned.contains(',') && cleaned.contains('.') {
        // Ambiguous case: assume comma is decimal separator if it comes last
        let comma_pos = cleaned.rfind(',');
        let dot_pos = cleaned.rfind('.');
        match (comma_pos, dot_pos) {
            (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
            (Some(_), Some(_)) => cleaned.replace(',', ""),
            _ => cleaned,
        }
    } else {
        cleaned
    };

    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::protocol::CurrencyValue;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("1 234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("42,37 PLN"), Some(dec("42.37")));
        assert_eq!(parse_amount("12 345 678,90"), Some(dec("12345678.90")));
        assert_eq!(parse_amount("brak"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_coerce_prefers_typed_number() {
        let field = FieldValue {
            value_number: Some(10.5),
            value_string: Some("99,99".to_string()),
            ..FieldValue::default()
        };
        assert_eq!(coerce_number(&field), Some(dec("10.5")));
    }

    #[test]
    fn test_coerce_falls_back_to_currency_amount() {
        let field = FieldValue {
            value_currency: Some(CurrencyValue {
                amount: Some(42.37),
                currency_code: Some("PLN".to_string()),
            }),
            content: Some("42,37".to_string()),
            ..FieldValue::default()
        };
        assert_eq!(coerce_number(&field), Some(dec("42.37")));
    }

    #[test]
    fn test_coerce_parses_string_then_content() {
        let field = FieldValue {
            value_string: Some("7,99".to_string()),
            ..FieldValue::default()
        };
        assert_eq!(coerce_number(&field), Some(dec("7.99")));

        let field = FieldValue {
            content: Some("3 x 2,50".to_string()),
            ..FieldValue::default()
        };
        // Content parsing keeps every digit it sees; mixed content is still
        // parsed rather than rejected.
        assert_eq!(coerce_number(&field), Some(dec("32.50")));

        assert_eq!(coerce_number(&FieldValue::default()), None);
    }
}
