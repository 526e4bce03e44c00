// 🔁 Aggregation Orchestrator - Previous items for the selected vendor
//
// Two-step pipeline per vendor selection:
//   headers where vendor_ref == vendor  →  lines for those headers (batched)
//   →  deduplicated catalog  →  committed to the form
//
// Every vendor change starts a new generation. A run re-checks its token at
// each resumption point and commits (catalog, error, busy flag) only while it
// is still the newest; overtaken runs drop their results silently.

use crate::config::Config;
use crate::deduplication::{CatalogBuild, CatalogBuilder};
use crate::error::Result;
use crate::fetcher::ChunkedFetcher;
use crate::filter::Filter;
use crate::form::FormHandle;
use crate::guard::{RunOutcome, RunToken, StalenessGuard};
use crate::model::{CatalogSnapshot, OrderHeaderRef, VendorId};
use crate::source::{ListQuery, ListService};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const LOAD_FAILED_PREFIX: &str = "Failed to load previous items";

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// One per form session. Clones share the same guard, form and service.
#[derive(Clone)]
pub struct AggregationOrchestrator {
    service: Arc<dyn ListService>,
    form: FormHandle,
    guard: StalenessGuard,
    config: Arc<Config>,
    builder: Arc<CatalogBuilder>,
    session_id: Uuid,
}

impl AggregationOrchestrator {
    pub fn new(service: Arc<dyn ListService>, form: FormHandle, config: Config) -> Self {
        let builder = CatalogBuilder::with_currency(config.display.currency_symbol.clone());
        AggregationOrchestrator {
            service,
            form,
            guard: StalenessGuard::new(),
            config: Arc::new(config),
            builder: Arc::new(builder),
            session_id: Uuid::new_v4(),
        }
    }

    pub fn form(&self) -> &FormHandle {
        &self.form
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fire-and-forget entry point for a vendor change.
    ///
    /// The catalog and selection are cleared before this returns; the fetch
    /// runs on a spawned task. Returns `None` when the vendor was cleared and
    /// nothing needs fetching.
    pub fn select_vendor(&self, vendor: Option<VendorId>) -> Option<JoinHandle<()>> {
        let (token, vendor) = self.begin(vendor)?;
        let this = self.clone();

        Some(tokio::spawn(async move {
            let run = AssertUnwindSafe(this.run(&token, vendor)).catch_unwind().await;
            if let Err(panic) = run {
                let detail = panic_detail(panic);
                this.fail(&token, format!("{}: task crashed unexpectedly: {}", LOAD_FAILED_PREFIX, detail));
            }
        }))
    }

    /// Same as `select_vendor`, but runs the pipeline on the caller's task
    pub async fn load_catalog_for_vendor(&self, vendor: Option<VendorId>) {
        if let Some((token, vendor)) = self.begin(vendor) {
            self.run(&token, vendor).await;
        }
    }

    /// Clear what the form shows and open a new generation. The counter
    /// advances even when the vendor was cleared, so an in-flight run for
    /// the old vendor can no longer commit.
    fn begin(&self, vendor: Option<VendorId>) -> Option<(RunToken, VendorId)> {
        self.form.update(|s| {
            let token = self.guard.begin_run();

            s.vendor = vendor.clone();
            s.catalog = CatalogSnapshot {
                vendor: vendor.clone(),
                ..Default::default()
            };
            s.selection.clear();
            s.last_error = None;
            s.is_loading = vendor.is_some();

            vendor.map(|v| (token, v))
        })
    }

    async fn run(&self, token: &RunToken, vendor: VendorId) {
        let started = Instant::now();
        log::info!(
            "[{}] generation {}: loading previous items for vendor {}",
            self.session_id,
            token.generation(),
            vendor
        );

        match self.aggregate(token, &vendor).await {
            Ok(RunOutcome::Current(build)) => {
                let (count, skipped, duplicates) = (build.entries.len(), build.skipped_blank, build.duplicates);
                if self.commit(token, &vendor, build) {
                    log::info!(
                        "[{}] generation {}: {} catalog entries ({} duplicates, {} unnamed) in {:?}",
                        self.session_id,
                        token.generation(),
                        count,
                        duplicates,
                        skipped,
                        started.elapsed()
                    );
                } else {
                    log::debug!(
                        "[{}] generation {}: superseded at commit",
                        self.session_id,
                        token.generation()
                    );
                }
            }
            Ok(RunOutcome::Superseded) => {
                log::debug!(
                    "[{}] generation {}: superseded, results dropped",
                    self.session_id,
                    token.generation()
                );
            }
            Err(e) => self.fail(token, format!("{}: {}", LOAD_FAILED_PREFIX, e)),
        }
    }

    /// headers → lines → catalog, stopping as soon as the token goes stale
    pub async fn aggregate(&self, token: &RunToken, vendor: &VendorId) -> Result<RunOutcome<CatalogBuild>> {
        let header_ids = match self.fetch_header_ids(token, vendor).await? {
            RunOutcome::Current(ids) => ids,
            RunOutcome::Superseded => return Ok(RunOutcome::Superseded),
        };

        if header_ids.is_empty() {
            log::debug!(
                "[{}] generation {}: vendor {} has no previous orders",
                self.session_id,
                token.generation(),
                vendor
            );
            return Ok(token.keep(CatalogBuild::default()));
        }

        let fetcher = ChunkedFetcher::new(self.service.as_ref(), &self.config);
        log::debug!(
            "[{}] generation {}: {} headers in {} batches",
            self.session_id,
            token.generation(),
            header_ids.len(),
            fetcher.batches(&header_ids).len()
        );

        let lines = match fetcher.fetch_lines_for_headers(&header_ids, token).await? {
            RunOutcome::Current(lines) => lines,
            RunOutcome::Superseded => return Ok(RunOutcome::Superseded),
        };

        Ok(token.keep(self.builder.build(&lines)))
    }

    pub fn header_query(&self, vendor: &VendorId) -> ListQuery {
        let fields = &self.config.fields;
        ListQuery::new(&self.config.lists.requests, self.config.limits.header_cap)
            .select([fields.id.as_str()])
            .filter(Filter::eq_vendor(&fields.vendor_ref, vendor))
    }

    /// Integer ids of the vendor's past order headers; anything else is dropped
    pub async fn fetch_header_ids(&self, token: &RunToken, vendor: &VendorId) -> Result<RunOutcome<Vec<i64>>> {
        let records = self.service.query(&self.header_query(vendor)).await?;
        if !token.is_current() {
            return Ok(RunOutcome::Superseded);
        }

        if records.len() >= self.config.limits.header_cap {
            log::warn!(
                "Vendor {} hit the {}-header cap; older orders may be missing",
                vendor,
                self.config.limits.header_cap
            );
        }

        let id_field = &self.config.fields.id;
        let ids = records
            .iter()
            .filter_map(|r| {
                let header = OrderHeaderRef::from_record(r, id_field);
                if header.is_none() {
                    log::debug!("Skipping header without a numeric id: {:?}", r);
                }
                header
            })
            .map(|h| h.id)
            .collect();

        Ok(RunOutcome::Current(ids))
    }

    /// Swap in the new catalog if this run is still the newest.
    /// The check and the write happen under the same form lock as `begin`.
    fn commit(&self, token: &RunToken, vendor: &VendorId, build: CatalogBuild) -> bool {
        self.form.update(|s| {
            if !self.guard.is_current(token) {
                return false;
            }
            s.catalog = CatalogSnapshot {
                vendor: Some(vendor.clone()),
                generation: token.generation(),
                entries: build.entries,
                loaded_at: Some(Utc::now()),
            };
            s.selection.retain_known(&s.catalog);
            s.is_loading = false;
            true
        })
    }

    /// Surface a failure, unless a newer run has taken over. The catalog is
    /// left as it was.
    fn fail(&self, token: &RunToken, message: String) {
        let shown = self.form.update(|s| {
            if !self.guard.is_current(token) {
                return false;
            }
            s.last_error = Some(message.clone());
            s.is_loading = false;
            true
        });

        if shown {
            log::warn!("[{}] generation {}: {}", self.session_id, token.generation(), message);
        } else {
            log::debug!(
                "[{}] generation {}: error from superseded run suppressed: {}",
                self.session_id,
                token.generation(),
                message
            );
        }
    }
}

fn panic_detail(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
