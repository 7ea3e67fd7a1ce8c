//! Receipt field extraction.
//!
//! Every field comes out of a prioritized cascade over the vendor's
//! recognized fields; the first source that yields a value wins. Cascades
//! are data, an ordered slice of extractor functions, so adding a source or
//! reordering one is a table edit.

pub mod rules;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::llm::TextGenerator;
use crate::models::{ExtractionConfig, LineItem, ParsedReceipt};
use crate::ocr::protocol::{AnalyzeResult, FieldValue, ReceiptFields};
use rules::{coerce_number, is_skippable_scan_line, normalize_store_name, strip_noise_prefixes};

/// One source in the total cascade.
type TotalSource = fn(&ReceiptFields) -> Option<Decimal>;

/// One source in the vendor cascade. Receives the recognized fields, the
/// raw document text, and the extraction limits.
type VendorSource = fn(&ReceiptFields, &str, &ExtractionConfig) -> Option<String>;

/// Total cascade: direct total, subtotal plus tax, subtotal alone, amount
/// due. Order is the contract.
const TOTAL_SOURCES: &[TotalSource] = &[
    total_direct,
    total_subtotal_plus_tax,
    total_subtotal,
    total_amount_due,
];

/// Vendor cascade: merchant-name field, first address line, raw-text scan.
const VENDOR_SOURCES: &[VendorSource] = &[
    vendor_merchant_name,
    vendor_address_first_line,
    vendor_raw_text_scan,
];

const VENDOR_VERIFY_SYSTEM: &str = "You read raw text recognized from retail receipts. \
Reply with the single store or vendor name that issued the receipt, cleaned of legal \
suffixes, shop numbers, and OCR noise. Reply with the name only. If no vendor can be \
determined, reply with the word null.";

fn total_direct(fields: &ReceiptFields) -> Option<Decimal> {
    fields.total.as_ref().and_then(coerce_number)
}

fn total_subtotal_plus_tax(fields: &ReceiptFields) -> Option<Decimal> {
    let subtotal = fields.subtotal.as_ref().and_then(coerce_number)?;
    let tax = fields.total_tax.as_ref().and_then(coerce_number)?;
    Some(subtotal + tax)
}

fn total_subtotal(fields: &ReceiptFields) -> Option<Decimal> {
    fields.subtotal.as_ref().and_then(coerce_number)
}

fn total_amount_due(fields: &ReceiptFields) -> Option<Decimal> {
    fields.amount_due.as_ref().and_then(coerce_number)
}

fn vendor_merchant_name(fields: &ReceiptFields, _content: &str, _config: &ExtractionConfig) -> Option<String> {
    fields.merchant_name.as_ref().and_then(string_then_content)
}

fn vendor_address_first_line(fields: &ReceiptFields, _content: &str, config: &ExtractionConfig) -> Option<String> {
    let address = fields.merchant_address.as_ref().and_then(content_then_string)?;
    let first_line = address.lines().next()?.trim();
    in_vendor_window(first_line, config).then(|| first_line.to_string())
}

fn vendor_raw_text_scan(_fields: &ReceiptFields, content: &str, config: &ExtractionConfig) -> Option<String> {
    content
        .lines()
        .take(config.vendor_scan_lines)
        .map(str::trim)
        .filter(|line| !is_skippable_scan_line(line))
        .find(|line| in_vendor_window(line, config))
        .map(str::to_string)
}

fn in_vendor_window(candidate: &str, config: &ExtractionConfig) -> bool {
    let len = candidate.chars().count();
    len >= config.vendor_min_len && len < config.vendor_max_len
}

/// Structured string first, raw content second.
fn string_then_content(field: &FieldValue) -> Option<String> {
    field
        .value_string
        .as_deref()
        .or(field.content.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Raw content first, structured string second.
fn content_then_string(field: &FieldValue) -> Option<String> {
    field
        .content
        .as_deref()
        .or(field.value_string.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Turns a completed analysis into receipt fields.
pub struct ReceiptExtractor {
    config: ExtractionConfig,
}

impl ReceiptExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extract all receipt fields from an analysis result. The optional
    /// text-generation client is used only for vendor verification; any
    /// failure there keeps the heuristic result.
    pub async fn extract(
        &self,
        analysis: &AnalyzeResult,
        llm: Option<&dyn TextGenerator>,
    ) -> ParsedReceipt {
        let empty = ReceiptFields::default();
        let fields = analysis.first_document().unwrap_or(&empty);

        let total = TOTAL_SOURCES.iter().find_map(|source| source(fields));
        let vendor = self.resolve_vendor(fields, &analysis.content, llm).await;
        let date = fields.transaction_date.as_ref().and_then(|f| f.value_date);
        let time = fields.transaction_time.as_ref().and_then(|f| f.value_time);
        let currency = fields
            .total
            .as_ref()
            .and_then(|f| f.value_currency.as_ref())
            .and_then(|c| c.currency_code.clone())
            .filter(|code| !code.is_empty())
            .unwrap_or_else(|| self.config.default_currency.clone());
        let items = self.extract_items(fields);

        debug!(
            vendor = vendor.as_deref().unwrap_or("<none>"),
            total = %total.map(|t| t.to_string()).unwrap_or_else(|| "<none>".to_string()),
            items = items.len(),
            "extraction finished"
        );

        ParsedReceipt {
            vendor,
            total,
            date,
            time,
            currency,
            items,
        }
    }

    /// Run the vendor cascade, clean the winner, and let the language model
    /// override it when its suggestion passes the acceptance rules.
    async fn resolve_vendor(
        &self,
        fields: &ReceiptFields,
        content: &str,
        llm: Option<&dyn TextGenerator>,
    ) -> Option<String> {
        let mut vendor = VENDOR_SOURCES
            .iter()
            .find_map(|source| source(fields, content, &self.config))
            .map(|raw| normalize_store_name(&strip_noise_prefixes(&raw)));

        if let Some(client) = llm {
            if let Some(name) = self.verify_vendor(client, content).await {
                vendor = Some(name);
            }
        }

        // The model may answer with an un-normalized brand spelling, so the
        // surviving name goes through the table once more.
        vendor.map(|name| normalize_store_name(&name))
    }

    async fn verify_vendor(&self, llm: &dyn TextGenerator, content: &str) -> Option<String> {
        let excerpt: String = content.chars().take(self.config.llm_excerpt_chars).collect();
        let reply = match llm.complete(VENDOR_VERIFY_SYSTEM, &excerpt).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "vendor verification call failed, keeping heuristic result");
                return None;
            }
        };

        let name = reply.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("null") {
            return None;
        }
        if name.chars().count() >= self.config.llm_vendor_max_len {
            warn!(len = name.chars().count(), "vendor suggestion over length cap, discarded");
            return None;
        }
        Some(name.to_string())
    }

    /// Map the recognized items array to line items. Price is always the
    /// reported line total taken verbatim; no arithmetic is performed on
    /// vendor-reported monetary fields.
    fn extract_items(&self, fields: &ReceiptFields) -> Vec<LineItem> {
        let Some(items) = &fields.items else {
            return Vec::new();
        };

        items
            .value_array
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let item = &entry.value_object;
                let name = [&item.description, &item.name, &item.product_name]
                    .into_iter()
                    .find_map(|field| field.as_ref().and_then(content_then_string))
                    .unwrap_or_else(|| format!("Item {}", idx + 1));
                let quantity = item.quantity.as_ref().and_then(coerce_number);
                let price = item
                    .total_price
                    .as_ref()
                    .and_then(coerce_number)
                    .or_else(|| item.price.as_ref().and_then(coerce_number));

                LineItem {
                    name,
                    quantity,
                    price,
                    category_id: None,
                }
            })
            .collect()
    }
}
