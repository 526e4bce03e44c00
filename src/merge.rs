// Selection merger: turn picked catalog keys into new draft lines

use crate::deduplication::format_price;
use crate::model::{CatalogEntry, DraftLineItem, SelectionSet};

pub const DEFAULT_QUANTITY: &str = "1";

impl From<&CatalogEntry> for DraftLineItem {
    fn from(entry: &CatalogEntry) -> Self {
        DraftLineItem {
            description: entry.item_name.clone(),
            quantity: DEFAULT_QUANTITY.to_string(),
            unit_cost: format_price(entry.unit_price),
            cost_center: Some(entry.cost_center.clone()),
        }
    }
}

/// Draft lines for every selected key the catalog still offers, in
/// selection order. Unknown keys are skipped.
pub fn draft_lines_for(selected: &SelectionSet, catalog: &[CatalogEntry]) -> Vec<DraftLineItem> {
    selected
        .iter()
        .filter_map(|key| catalog.iter().find(|e| e.key == key))
        .map(DraftLineItem::from)
        .collect()
}

/// Existing draft lines, untouched, followed by the selected entries.
/// Clearing the selection afterwards is the caller's job (see `FormHandle::merge_selected`).
pub fn merge_selections(
    selected: &SelectionSet,
    catalog: &[CatalogEntry],
    draft: &[DraftLineItem],
) -> Vec<DraftLineItem> {
    let mut merged = draft.to_vec();
    merged.extend(draft_lines_for(selected, catalog));
    merged
}
