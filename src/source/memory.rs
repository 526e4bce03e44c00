// In-memory list service: fixture-backed stand-in for the remote lists

use super::{ListQuery, ListService, OrderBy, Record};
use crate::error::{CatalogError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct InMemoryListService {
    lists: HashMap<String, Vec<Record>>,
    calls: Mutex<Vec<ListQuery>>,
}

impl InMemoryListService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixture file shape: `{ "<list>": [ { ...item... }, ... ], ... }`
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let root: HashMap<String, Vec<Value>> = serde_json::from_str(content)?;
        let mut service = InMemoryListService::new();

        for (name, items) in root {
            let mut records = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Object(map) => records.push(map),
                    other => {
                        return Err(CatalogError::Decode {
                            collection: name,
                            message: format!("expected an object, found {}", other),
                        })
                    }
                }
            }
            service.lists.insert(name, records);
        }

        Ok(service)
    }

    pub fn with_list(mut self, collection: impl Into<String>, records: Vec<Record>) -> Self {
        self.lists.insert(collection.into(), records);
        self
    }

    /// Every query received so far, in arrival order
    pub fn calls(&self) -> Vec<ListQuery> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn calls_to(&self, collection: &str) -> Vec<ListQuery> {
        self.calls()
            .into_iter()
            .filter(|q| q.collection == collection)
            .collect()
    }

    fn run(&self, query: &ListQuery) -> Result<Vec<Record>> {
        let records = self.lists.get(&query.collection).ok_or_else(|| {
            CatalogError::remote(&query.collection, "list does not exist")
        })?;

        let mut matched: Vec<&Record> = records
            .iter()
            .filter(|r| query.filter.as_ref().map_or(true, |f| f.matches(r)))
            .collect();

        if let Some(order) = &query.order_by {
            matched.sort_by(|a, b| compare_by(a, b, order));
        }

        Ok(matched
            .into_iter()
            .take(query.top)
            .map(|r| project(r, &query.select))
            .collect())
    }
}

#[async_trait]
impl ListService for InMemoryListService {
    async fn query(&self, query: &ListQuery) -> Result<Vec<Record>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());
        self.run(query)
    }
}

fn project(record: &Record, select: &[String]) -> Record {
    if select.is_empty() {
        return record.clone();
    }
    select
        .iter()
        .filter_map(|field| record.get(field).map(|v| (field.clone(), v.clone())))
        .collect()
}

fn compare_by(a: &Record, b: &Record, order: &OrderBy) -> Ordering {
    let ord = compare_values(a.get(&order.field), b.get(&order.field));
    if order.ascending {
        ord
    } else {
        ord.reverse()
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use serde_json::json;

    const FIXTURE: &str = r#"{
        "PO_LineItems": [
            {"Id": 3, "ItemName": "Boots", "PO_IDId": 1},
            {"Id": 1, "ItemName": "Gloves", "PO_IDId": 1},
            {"Id": 2, "ItemName": "Helmet", "PO_IDId": 2}
        ]
    }"#;

    #[tokio::test]
    async fn test_filter_select_and_top() {
        let service = InMemoryListService::from_json_str(FIXTURE).unwrap();
        let query = ListQuery::new("PO_LineItems", 1)
            .select(["Id"])
            .filter(Filter::eq_int("PO_IDId", 1));

        let rows = service.query(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], json!({"Id": 3}).as_object().cloned().unwrap());
    }

    #[tokio::test]
    async fn test_order_by() {
        let service = InMemoryListService::from_json_str(FIXTURE).unwrap();
        let query = ListQuery::new("PO_LineItems", 10).order_by("Id", true);

        let ids: Vec<i64> = service
            .query(&query)
            .await
            .unwrap()
            .iter()
            .map(|r| r["Id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unknown_list_is_remote_error() {
        let service = InMemoryListService::new();
        let err = service.query(&ListQuery::new("Nope", 10)).await.unwrap_err();
        assert!(matches!(err, CatalogError::RemoteQuery { .. }));
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let service = InMemoryListService::from_json_str(FIXTURE).unwrap();
        service.query(&ListQuery::new("PO_LineItems", 10)).await.unwrap();
        let _ = service.query(&ListQuery::new("Vendors", 10)).await;

        assert_eq!(service.calls().len(), 2);
        assert_eq!(service.calls_to("PO_LineItems").len(), 1);
    }

    #[test]
    fn test_fixture_rejects_non_objects() {
        let err = InMemoryListService::from_json_str(r#"{"Vendors": [1, 2]}"#).unwrap_err();
        assert!(matches!(err, CatalogError::Decode { .. }));
    }
}
