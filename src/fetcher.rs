// Chunked line fetcher
// Header ids are split into fixed-size batches so each OR-chained filter stays
// short. Batches run sequentially; the run's token is checked after each one.

use crate::config::Config;
use crate::error::Result;
use crate::filter::Filter;
use crate::guard::{RunOutcome, RunToken};
use crate::model::{LineFields, RawLine};
use crate::source::{ListQuery, ListService};

pub struct ChunkedFetcher<'a> {
    service: &'a dyn ListService,
    config: &'a Config,
}

impl<'a> ChunkedFetcher<'a> {
    pub fn new(service: &'a dyn ListService, config: &'a Config) -> Self {
        ChunkedFetcher { service, config }
    }

    /// Header-id batches in query order
    pub fn batches<'b>(&self, header_ids: &'b [i64]) -> std::slice::Chunks<'b, i64> {
        header_ids.chunks(self.config.limits.batch_size.max(1))
    }

    pub fn batch_query(&self, ids: &[i64]) -> ListQuery {
        let fields = &self.config.fields;
        ListQuery::new(&self.config.lists.lines, self.config.limits.line_cap)
            .select([
                fields.id.as_str(),
                fields.item_name.as_str(),
                fields.unit_price.as_str(),
                fields.cost_center.as_str(),
                fields.header_ref.as_str(),
            ])
            .filter(Filter::any_eq(&fields.header_ref, ids))
    }

    /// All lines referencing `header_ids`, concatenated in batch order.
    ///
    /// A failed batch aborts the remaining ones and returns the error; a
    /// superseded token stops the loop and yields `Superseded`.
    pub async fn fetch_lines_for_headers(
        &self,
        header_ids: &[i64],
        token: &RunToken,
    ) -> Result<RunOutcome<Vec<RawLine>>> {
        let fields = LineFields {
            id: &self.config.fields.id,
            item_name: &self.config.fields.item_name,
            unit_price: &self.config.fields.unit_price,
            cost_center: &self.config.fields.cost_center,
        };

        let mut lines = Vec::new();
        for (batch_no, ids) in self.batches(header_ids).enumerate() {
            let records = self.service.query(&self.batch_query(ids)).await?;

            let received = records.len();
            lines.extend(records.iter().filter_map(|r| {
                let parsed = RawLine::from_record(r, fields);
                if parsed.is_none() {
                    log::debug!("Skipping line record without an integer id: {:?}", r);
                }
                parsed
            }));

            if received >= self.config.limits.line_cap {
                log::warn!(
                    "Batch {} hit the {}-line cap; older lines may be missing",
                    batch_no + 1,
                    self.config.limits.line_cap
                );
            }

            if !token.is_current() {
                log::debug!(
                    "Generation {} superseded after batch {}",
                    token.generation(),
                    batch_no + 1
                );
                return Ok(RunOutcome::Superseded);
            }
        }

        Ok(RunOutcome::Current(lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::guard::StalenessGuard;
    use crate::model::Record;
    use crate::source::InMemoryListService;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn line_record(id: i64, header: i64, name: &str) -> Record {
        json!({"Id": id, "ItemName": name, "UnitPrice": 1.0, "PO_IDId": header})
            .as_object()
            .cloned()
            .unwrap()
    }

    /// One line per header, line id = header id * 10
    fn service_with_headers(count: i64) -> InMemoryListService {
        let records = (1..=count)
            .map(|h| line_record(h * 10, h, &format!("Item {}", h)))
            .collect();
        InMemoryListService::new().with_list("PO_LineItems", records)
    }

    #[tokio::test]
    async fn test_45_headers_make_three_batches() {
        let config = Config::default();
        let service = service_with_headers(45);
        let guard = StalenessGuard::new();
        let token = guard.begin_run();
        let header_ids: Vec<i64> = (1..=45).collect();

        let fetcher = ChunkedFetcher::new(&service, &config);
        let outcome = fetcher.fetch_lines_for_headers(&header_ids, &token).await.unwrap();

        let RunOutcome::Current(lines) = outcome else {
            panic!("run should still be current");
        };

        let calls = service.calls_to("PO_LineItems");
        assert_eq!(calls.len(), 3);
        let batch_sizes: Vec<usize> = calls
            .iter()
            .map(|q| match &q.filter {
                Some(Filter::Or(parts)) => parts.len(),
                Some(Filter::Eq { .. }) => 1,
                _ => 0,
            })
            .collect();
        assert_eq!(batch_sizes, vec![20, 20, 5]);
        assert!(calls.iter().all(|q| q.top == 500));

        let ids: Vec<i64> = lines.iter().map(|l| l.id).collect();
        let expected: Vec<i64> = (1..=45).map(|h| h * 10).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_every_header_queried_exactly_once() {
        let config = Config::default();
        let service = service_with_headers(0);
        let guard = StalenessGuard::new();
        let token = guard.begin_run();
        let header_ids: Vec<i64> = (100..163).collect();

        ChunkedFetcher::new(&service, &config)
            .fetch_lines_for_headers(&header_ids, &token)
            .await
            .unwrap();

        let mut queried = Vec::new();
        for call in service.calls() {
            let filter = call.filter.unwrap();
            let parts = match filter {
                Filter::Or(parts) => parts,
                single => vec![single],
            };
            assert!(parts.len() <= 20);
            for part in parts {
                if let Filter::Eq { value: crate::filter::Literal::Int(id), .. } = part {
                    queried.push(id);
                }
            }
        }
        assert_eq!(queried, header_ids);
    }

    #[tokio::test]
    async fn test_superseded_run_stops_after_current_batch() {
        struct Superseding<'a> {
            inner: InMemoryListService,
            guard: &'a StalenessGuard,
        }

        #[async_trait]
        impl ListService for Superseding<'_> {
            async fn query(&self, query: &ListQuery) -> Result<Vec<Record>> {
                // A newer vendor selection lands while the first batch is in flight
                self.guard.begin_run();
                self.inner.query(query).await
            }
        }

        let config = Config::default();
        let guard = StalenessGuard::new();
        let token = guard.begin_run();
        let service = Superseding {
            inner: service_with_headers(45),
            guard: &guard,
        };
        let header_ids: Vec<i64> = (1..=45).collect();

        let outcome = ChunkedFetcher::new(&service, &config)
            .fetch_lines_for_headers(&header_ids, &token)
            .await
            .unwrap();

        assert!(outcome.is_superseded());
        assert_eq!(service.inner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_aborts_remaining() {
        struct FailSecond {
            inner: InMemoryListService,
        }

        #[async_trait]
        impl ListService for FailSecond {
            async fn query(&self, query: &ListQuery) -> Result<Vec<Record>> {
                if self.inner.calls().len() == 1 {
                    self.inner.query(query).await?;
                    return Err(CatalogError::remote(&query.collection, "503 Service Unavailable"));
                }
                self.inner.query(query).await
            }
        }

        let config = Config::default();
        let guard = StalenessGuard::new();
        let token = guard.begin_run();
        let service = FailSecond {
            inner: service_with_headers(60),
        };
        let header_ids: Vec<i64> = (1..=60).collect();

        let err = ChunkedFetcher::new(&service, &config)
            .fetch_lines_for_headers(&header_ids, &token)
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::RemoteQuery { .. }));
        assert_eq!(service.inner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let config = Config::default();
        let bad = json!({"Id": "abc", "ItemName": "Ghost", "PO_IDId": 1})
            .as_object()
            .cloned()
            .unwrap();
        let service = InMemoryListService::new()
            .with_list("PO_LineItems", vec![line_record(1, 1, "Real"), bad]);
        let guard = StalenessGuard::new();
        let token = guard.begin_run();

        let outcome = ChunkedFetcher::new(&service, &config)
            .fetch_lines_for_headers(&[1], &token)
            .await
            .unwrap();

        let RunOutcome::Current(lines) = outcome else {
            panic!("run should still be current");
        };
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].item_name.as_deref(), Some("Real"));
    }

    #[test]
    fn test_batch_query_shape() {
        let config = Config::default();
        let service = InMemoryListService::new();
        let query = ChunkedFetcher::new(&service, &config).batch_query(&[4, 9]);

        assert_eq!(query.collection, "PO_LineItems");
        assert_eq!(query.select, vec!["Id", "ItemName", "UnitPrice", "CostCenter", "PO_IDId"]);
        assert_eq!(query.filter_expression(), "PO_IDId eq 4 or PO_IDId eq 9");
        assert_eq!(query.top, 500);
    }
}
