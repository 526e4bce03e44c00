// List service seam
// Everything the pipeline reads comes through ListService::query.

mod memory;
mod rest;

pub use memory::InMemoryListService;
pub use rest::RestListService;

use crate::error::Result;
use crate::filter::Filter;
pub use crate::model::Record;
use async_trait::async_trait;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub ascending: bool,
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ascending {
            f.write_str(&self.field)
        } else {
            write!(f, "{} desc", self.field)
        }
    }
}

/// One bounded read against a named list
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub collection: String,
    pub select: Vec<String>,
    pub filter: Option<Filter>,
    pub top: usize,
    pub order_by: Option<OrderBy>,
}

impl ListQuery {
    pub fn new(collection: impl Into<String>, top: usize) -> Self {
        ListQuery {
            collection: collection.into(),
            select: Vec::new(),
            filter: None,
            top,
            order_by: None,
        }
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            ascending,
        });
        self
    }

    /// Rendered filter expression, empty when unfiltered
    pub fn filter_expression(&self) -> String {
        self.filter.as_ref().map(|f| f.to_string()).unwrap_or_default()
    }
}

/// Remote list-query service
#[async_trait]
pub trait ListService: Send + Sync {
    async fn query(&self, query: &ListQuery) -> Result<Vec<Record>>;
}
