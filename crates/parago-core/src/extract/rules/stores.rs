//! Store-name normalization.
//!
//! Fiscal printers garble brand headers ("STOWT LIDL SP. Z O.O.", "ZABKA
//! Z5842 K.1"), and duplicate detection needs a stable vendor string. The
//! table maps anything recognizably branded to one canonical spelling; the
//! first matching rule wins and unknown names pass through trimmed.
//!
//! Each canonical name matches its own rule, so normalizing twice is the
//! same as normalizing once.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref STORE_RULES: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"(?i)biedronka").unwrap(), "Biedronka"),
        (Regex::new(r"(?i)lidl").unwrap(), "Lidl"),
        (Regex::new(r"(?i)[żz]abka").unwrap(), "Żabka"),
        (Regex::new(r"(?i)kaufland").unwrap(), "Kaufland"),
        (Regex::new(r"(?i)auchan").unwrap(), "Auchan"),
        (Regex::new(r"(?i)carrefour").unwrap(), "Carrefour"),
        (Regex::new(r"(?i)rossmann").unwrap(), "Rossmann"),
        (Regex::new(r"(?i)orlen").unwrap(), "Orlen"),
        (Regex::new(r"(?i)\bikea\b").unwrap(), "IKEA"),
        (Regex::new(r"(?i)castorama").unwrap(), "Castorama"),
        (Regex::new(r"(?i)decathlon").unwrap(), "Decathlon"),
        (Regex::new(r"(?i)empik").unwrap(), "Empik"),
        (Regex::new(r"(?i)\bnetto\b").unwrap(), "Netto"),
        (Regex::new(r"(?i)stokrotka").unwrap(), "Stokrotka"),
        (Regex::new(r"(?i)mcdonald").unwrap(), "McDonald's"),
        (Regex::new(r"(?i)\bkfc\b").unwrap(), "KFC"),
        (Regex::new(r"(?i)starbucks").unwrap(), "Starbucks"),
    ];
}

/// Map a raw vendor candidate to its canonical brand name. Unrecognized
/// names are returned trimmed and otherwise unchanged.
pub fn normalize_store_name(raw: &str) -> String {
    let trimmed = raw.trim();
    for (pattern, canonical) in STORE_RULES.iter() {
        if pattern.is_match(trimmed) {
            return (*canonical).to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalizes_garbled_legal_names() {
        assert_eq!(normalize_store_name("STOWT LIDL SP. Z O.O."), "Lidl");
        assert_eq!(normalize_store_name("BIEDRONKA CODZIENNIE NISKIE CENY"), "Biedronka");
        assert_eq!(normalize_store_name("ZABKA Z5842 K.1"), "Żabka");
        assert_eq!(normalize_store_name("PKN ORLEN S.A."), "Orlen");
    }

    #[test]
    fn test_unknown_vendor_passes_through_trimmed() {
        assert_eq!(normalize_store_name("  Piekarnia u Stasia  "), "Piekarnia u Stasia");
        assert_eq!(normalize_store_name("Kwiaciarnia Róża"), "Kwiaciarnia Róża");
    }

    #[test]
    fn test_word_boundary_rules_do_not_overmatch() {
        assert_eq!(normalize_store_name("Nettop Serwis"), "Nettop Serwis");
        assert_eq!(normalize_store_name("NETTO Sklep 104"), "Netto");
    }

    #[test]
    fn test_normalization_is_idempotent_over_whole_table() {
        for (_, canonical) in STORE_RULES.iter() {
            assert_eq!(normalize_store_name(canonical), *canonical);
        }
    }
}
