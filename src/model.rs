// Records flowing through the previous-items pipeline
//
//   VendorId → OrderHeaderRef* → RawLine* → CatalogEntry* → DraftLineItem*
//
// Headers and raw lines live only inside one aggregation run. The catalog
// snapshot replaces its predecessor wholesale; draft lines are append-only
// from the pipeline's point of view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One list item as returned by the list service
pub type Record = serde_json::Map<String, Value>;

// ============================================================================
// VENDOR
// ============================================================================

/// Opaque vendor identifier chosen by the user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VendorId {
    Id(i64),
    Key(String),
}

impl VendorId {
    /// Parse user input: integers stay numeric, anything else is a key
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<i64>() {
            Ok(id) => Some(VendorId::Id(id)),
            Err(_) => Some(VendorId::Key(trimmed.to_string())),
        }
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VendorId::Id(id) => write!(f, "{}", id),
            VendorId::Key(key) => f.write_str(key),
        }
    }
}

impl From<i64> for VendorId {
    fn from(id: i64) -> Self {
        VendorId::Id(id)
    }
}

// ============================================================================
// HEADERS + RAW LINES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHeaderRef {
    pub id: i64,
}

impl OrderHeaderRef {
    /// Non-numeric ids are discarded
    pub fn from_record(record: &Record, id_field: &str) -> Option<Self> {
        record.get(id_field).and_then(integer_value).map(|id| OrderHeaderRef { id })
    }
}

/// One historical purchase line; any field but the id may be missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLine {
    pub id: i64,
    pub item_name: Option<String>,
    pub unit_price: Option<f64>,
    pub cost_center: Option<String>,
}

/// Field names used to read a line record
#[derive(Debug, Clone, Copy)]
pub struct LineFields<'a> {
    pub id: &'a str,
    pub item_name: &'a str,
    pub unit_price: &'a str,
    pub cost_center: &'a str,
}

impl RawLine {
    pub fn from_record(record: &Record, fields: LineFields<'_>) -> Option<Self> {
        let id = record.get(fields.id).and_then(integer_value)?;

        Some(RawLine {
            id,
            item_name: record.get(fields.item_name).and_then(string_value),
            unit_price: record.get(fields.unit_price).and_then(number_value),
            cost_center: record.get(fields.cost_center).and_then(string_value),
        })
    }
}

pub(crate) fn integer_value(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    // Integral floats (e.g. 12.0) still count as ids
    value
        .as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
        .map(|f| f as i64)
}

fn string_value(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn number_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// normalized name | price | cost center
    pub key: String,
    pub display_text: String,
    pub item_name: String,
    pub unit_price: f64,
    pub cost_center: String,

    /// Id of the first line that produced this entry
    pub source_line_id: i64,
}

/// The catalog currently offered for selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub vendor: Option<VendorId>,

    /// Generation of the run that committed this snapshot (0 = never loaded)
    pub generation: u64,

    pub entries: Vec<CatalogEntry>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    pub fn find(&self, key: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// Ordered, duplicate-free set of catalog keys picked by the user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    keys: Vec<String>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the key was already selected
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| k != key);
        self.keys.len() != before
    }

    /// Select if absent, deselect if present. Returns the new state.
    pub fn toggle(&mut self, key: &str) -> bool {
        if self.remove(key) {
            false
        } else {
            self.keys.push(key.to_string());
            true
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Drop keys the catalog no longer offers
    pub fn retain_known(&mut self, catalog: &CatalogSnapshot) {
        self.keys.retain(|k| catalog.find(k).is_some());
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SelectionSet::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

// ============================================================================
// DRAFT LINES
// ============================================================================

/// Editable row on the order being composed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLineItem {
    pub description: String,
    pub quantity: String,
    pub unit_cost: String,
    pub cost_center: Option<String>,
}

impl DraftLineItem {
    pub fn blank() -> Self {
        Self::default()
    }
}
