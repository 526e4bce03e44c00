// Form state container
// Plain owned data behind a mutex, plus a watch channel so a front end can
// redraw when anything changes. The aggregation pipeline only writes the
// catalog, busy flag and error; draft lines are only ever appended to.

use crate::merge::merge_selections;
use crate::model::{CatalogSnapshot, DraftLineItem, SelectionSet, VendorId};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormState {
    pub vendor: Option<VendorId>,
    pub line_items: Vec<DraftLineItem>,
    pub catalog: CatalogSnapshot,
    pub selection: SelectionSet,
    pub is_loading: bool,
    pub last_error: Option<String>,
}

#[derive(Clone)]
pub struct FormHandle {
    state: Arc<Mutex<FormState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl FormHandle {
    pub fn new() -> Self {
        Self::with_state(FormState::default())
    }

    pub fn with_state(state: FormState) -> Self {
        let (tx, _rx) = watch::channel(0);
        FormHandle {
            state: Arc::new(Mutex::new(state)),
            revision: Arc::new(tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> FormState {
        self.lock().clone()
    }

    /// Mutate under the lock and bump the revision
    pub fn update<R>(&self, f: impl FnOnce(&mut FormState) -> R) -> R {
        let result = {
            let mut state = self.lock();
            f(&mut state)
        };
        self.revision.send_modify(|rev| *rev += 1);
        result
    }

    /// Receives the revision number after every update
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Returns whether the key is now selected; keys not in the catalog are ignored
    pub fn toggle_selection(&self, key: &str) -> bool {
        self.update(|s| {
            if s.catalog.find(key).is_none() {
                return false;
            }
            s.selection.toggle(key)
        })
    }

    pub fn dismiss_error(&self) {
        self.update(|s| s.last_error = None);
    }

    pub fn add_blank_line(&self) {
        self.update(|s| s.line_items.push(DraftLineItem::blank()));
    }

    /// Append the selected catalog entries to the draft and clear the
    /// selection. Returns how many lines were added; 0 leaves everything as is.
    pub fn merge_selected(&self) -> usize {
        self.update(|s| {
            if s.selection.is_empty() {
                return 0;
            }
            let before = s.line_items.len();
            let merged = merge_selections(&s.selection, &s.catalog.entries, &s.line_items);
            let added = merged.len() - before;
            if added > 0 {
                s.line_items = merged;
                s.selection.clear();
            }
            added
        })
    }
}

impl Default for FormHandle {
    fn default() -> Self {
        Self::new()
    }
}
