// 🔍 Deduplication Engine - Collapse past order lines into a re-order catalog
// One entry per (normalized name, unit price, cost center); first seen wins.

use crate::model::{CatalogEntry, RawLine};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// BUILD REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogBuild {
    /// Distinct entries in first-seen order
    pub entries: Vec<CatalogEntry>,

    /// Lines dropped because their name was blank
    pub skipped_blank: usize,

    /// Lines dropped because an earlier line had the same key
    pub duplicates: usize,
}

// ============================================================================
// CATALOG BUILDER
// ============================================================================

pub struct CatalogBuilder {
    /// Prefix used when rendering prices in labels (default: "$")
    pub currency_symbol: String,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        CatalogBuilder {
            currency_symbol: "$".to_string(),
        }
    }

    pub fn with_currency(symbol: impl Into<String>) -> Self {
        CatalogBuilder {
            currency_symbol: symbol.into(),
        }
    }

    pub fn build_catalog(&self, lines: &[RawLine]) -> Vec<CatalogEntry> {
        self.build(lines).entries
    }

    pub fn build(&self, lines: &[RawLine]) -> CatalogBuild {
        let mut report = CatalogBuild::default();
        let mut seen: HashSet<String> = HashSet::new();

        for line in lines {
            let name = line.item_name.as_deref().unwrap_or("").trim();
            if name.is_empty() {
                report.skipped_blank += 1;
                continue;
            }

            let price = line.unit_price.filter(|p| p.is_finite()).unwrap_or(0.0);
            let cost_center = line.cost_center.clone().unwrap_or_default();
            let key = catalog_key(name, price, &cost_center);

            // Later duplicates are dropped, never merged
            if !seen.insert(key.clone()) {
                report.duplicates += 1;
                continue;
            }

            report.entries.push(CatalogEntry {
                display_text: self.label(name, price, &cost_center),
                key,
                item_name: name.to_string(),
                unit_price: price,
                cost_center,
                source_line_id: line.id,
            });
        }

        report
    }

    /// "Gloves - $12.50 - A", cost center omitted when blank
    fn label(&self, name: &str, price: f64, cost_center: &str) -> String {
        let mut text = format!("{} - {}", name, format_currency(price, &self.currency_symbol));
        if !cost_center.is_empty() {
            text.push_str(" - ");
            text.push_str(cost_center);
        }
        text
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// name|price|costCenter, with the name trimmed and lower-cased
pub fn catalog_key(name: &str, price: f64, cost_center: &str) -> String {
    format!("{}|{}|{}", name.trim().to_lowercase(), format_price(price), cost_center)
}

/// Shortest decimal that round-trips: 12.5 → "12.5", 40.0 → "40"
pub fn format_price(price: f64) -> String {
    if price == 0.0 || !price.is_finite() {
        // also folds -0 into 0
        return "0".to_string();
    }
    format!("{}", price)
}

/// en-US style money: "$1,234.50", "-$5.00"; non-finite renders as the bare symbol
pub fn format_currency(amount: f64, symbol: &str) -> String {
    if !amount.is_finite() {
        return symbol.to_string();
    }

    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let negative = amount < 0.0 && fixed != "0.00";
    format!("{}{}{}.{}", if negative { "-" } else { "" }, symbol, grouped, cents)
}

// ============================================================================
// TESTS
// ============================================================================
