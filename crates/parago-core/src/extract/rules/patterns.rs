//! Line filters for the vendor-name heuristic scan.
//!
//! The scan walks the first few lines of raw recognized text looking for a
//! plausible store name. Receipt headers are full of lines that are never a
//! name: dates, times, tax identifiers, postal codes, and fiscal register
//! codes. These patterns reject them.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Date lines (15.03.2024, 2024-03-15, 15/03/24)
    pub static ref DATE_LINE: Regex = Regex::new(
        r"\b\d{1,2}[./\-]\d{1,2}[./\-]\d{2,4}\b|\b\d{4}[./\-]\d{1,2}[./\-]\d{1,2}\b"
    ).unwrap();

    // Time-of-day lines (14:32, 14:32:05)
    pub static ref TIME_LINE: Regex = Regex::new(
        r"\b\d{1,2}:\d{2}(?::\d{2})?\b"
    ).unwrap();

    // Legal-entity identifiers: labeled tax ids or bare long digit runs
    pub static ref LEGAL_ID: Regex = Regex::new(
        r"(?i)\b(?:NIP|REGON|KRS|VAT|PTU)\b|\b\d{9,}\b"
    ).unwrap();

    // Polish postal code
    pub static ref POSTAL_CODE: Regex = Regex::new(
        r"\b\d{2}-\d{3}\b"
    ).unwrap();

    // Register and document codes: uppercase plus digits, no spaces
    pub static ref CAPS_CODE: Regex = Regex::new(
        r"^[A-Z0-9/\-#*.]{4,}$"
    ).unwrap();

    // Leading OCR junk in front of a candidate name
    pub static ref LEADING_JUNK: Regex = Regex::new(
        r"^[^\p{L}\p{N}]+"
    ).unwrap();
}

/// Noise tokens fiscal printers emit above the store name. Stripped
/// case-insensitively from the front of a candidate, repeatedly.
pub const NOISE_PREFIXES: &[&str] = &[
    "paragon fiskalny",
    "paragon",
    "niefiskalny",
    "wydruk niefiskalny",
    "oryginał",
    "kopia",
    "faktura",
    "witamy",
    "dziękujemy",
];

/// Whether a raw-text line can be dismissed without being considered as a
/// vendor name.
pub fn is_skippable_scan_line(line: &str) -> bool {
    let line = line.trim();
    if DATE_LINE.is_match(line)
        || TIME_LINE.is_match(line)
        || LEGAL_ID.is_match(line)
        || POSTAL_CODE.is_match(line)
    {
        return true;
    }
    // A code line is all caps with at least one digit. A bare all-caps word
    // like a brand acronym stays eligible.
    CAPS_CODE.is_match(line) && line.chars().any(|c| c.is_ascii_digit())
}

/// Strip leading OCR junk and known noise tokens from a candidate name.
pub fn strip_noise_prefixes(candidate: &str) -> String {
    let mut s = LEADING_JUNK.replace(candidate.trim(), "").to_string();
    'outer: loop {
        for prefix in NOISE_PREFIXES {
            if let Some(rest) = strip_prefix_ci(&s, prefix) {
                s = rest.trim_start_matches([' ', ':', '-', '*']).to_string();
                continue 'outer;
            }
        }
        break;
    }
    s.trim().to_string()
}

/// Case-insensitive prefix strip that stays on char boundaries.
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let mut indices = s.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = indices.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    match indices.next() {
        Some((idx, _)) => Some(&s[idx..]),
        None => Some(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_date_and_time_lines() {
        assert!(is_skippable_scan_line("15.03.2024 14:32"));
        assert!(is_skippable_scan_line("2024-03-15"));
        assert!(is_skippable_scan_line("godz. 09:15:30"));
        assert!(!is_skippable_scan_line("Biedronka Codziennie niskie ceny"));
    }

    #[test]
    fn test_skips_legal_ids_and_postal_codes() {
        assert!(is_skippable_scan_line("NIP 584-123-45-67"));
        assert!(is_skippable_scan_line("Regon: 123456789"));
        assert!(is_skippable_scan_line("5841234567"));
        assert!(is_skippable_scan_line("80-298 Gdańsk"));
        assert!(!is_skippable_scan_line("ul. Długa 5"));
    }

    #[test]
    fn test_skips_register_codes_but_not_brand_acronyms() {
        assert!(is_skippable_scan_line("W0234-AB/123"));
        assert!(is_skippable_scan_line("#*1234*#"));
        assert!(!is_skippable_scan_line("LIDL"));
        assert!(!is_skippable_scan_line("IKEA"));
    }

    #[test]
    fn test_strips_noise_prefixes() {
        assert_eq!(strip_noise_prefixes("PARAGON FISKALNY Żabka"), "Żabka");
        assert_eq!(strip_noise_prefixes("** Kopia: Lidl"), "Lidl");
        assert_eq!(strip_noise_prefixes("Stokrotka"), "Stokrotka");
        assert_eq!(strip_noise_prefixes("   Carrefour Express  "), "Carrefour Express");
    }
}
