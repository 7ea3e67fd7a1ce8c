//! Rule tables and coercion helpers for receipt field extraction.

pub mod amounts;
pub mod patterns;
pub mod stores;

pub use amounts::{coerce_number, parse_amount};
pub use patterns::{is_skippable_scan_line, strip_noise_prefixes};
pub use stores::normalize_store_name;
