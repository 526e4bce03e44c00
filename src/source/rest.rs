// REST list service for SharePoint-style sites
//
//   GET {site}/_api/web/lists/getbytitle('<list>')/items
//       ?$select=...&$filter=...&$top=...&$orderby=...

use super::{ListQuery, ListService, Record};
use crate::config::SiteConfig;
use crate::error::{CatalogError, Result};
use crate::filter::quote_literal;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const ACCEPT_NOMETADATA: &str = "application/json;odata=nometadata";
const MAX_ERROR_BODY: usize = 200;

pub struct RestListService {
    client: reqwest::Client,
    site_url: String,
    access_token: Option<String>,
}

impl RestListService {
    pub fn new(site: &SiteConfig) -> Result<Self> {
        if site.url.trim().is_empty() {
            return Err(CatalogError::Config("site.url is required for the REST list service".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(site.timeout_secs.max(1)))
            .build()
            .map_err(|e| CatalogError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(RestListService {
            client,
            site_url: site.url.trim_end_matches('/').to_string(),
            access_token: site.access_token.clone(),
        })
    }

    pub fn items_url(&self, query: &ListQuery) -> String {
        items_url(&self.site_url, query)
    }
}

pub(crate) fn items_url(site_url: &str, query: &ListQuery) -> String {
    let mut url = format!(
        "{}/_api/web/lists/getbytitle({})/items",
        site_url,
        urlencoding::encode(&quote_literal(&query.collection))
    );

    let mut params: Vec<(&str, String)> = Vec::new();
    if !query.select.is_empty() {
        params.push(("$select", query.select.join(",")));
    }
    if let Some(filter) = &query.filter {
        params.push(("$filter", filter.to_string()));
    }
    if let Some(order) = &query.order_by {
        params.push(("$orderby", order.to_string()));
    }
    params.push(("$top", query.top.to_string()));

    for (i, (name, value)) in params.iter().enumerate() {
        url.push(if i == 0 { '?' } else { '&' });
        url.push_str(name);
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }

    url
}

/// Accepts both `{"value": [...]}` and the verbose `{"d": {"results": [...]}}`
pub(crate) fn parse_items(collection: &str, body: Value) -> Result<Vec<Record>> {
    let items = match body {
        Value::Object(mut root) => match root.remove("value") {
            Some(value) => value,
            None => root
                .remove("d")
                .and_then(|mut d| d.get_mut("results").map(Value::take))
                .ok_or_else(|| CatalogError::Decode {
                    collection: collection.to_string(),
                    message: "response has neither 'value' nor 'd.results'".to_string(),
                })?,
        },
        _ => {
            return Err(CatalogError::Decode {
                collection: collection.to_string(),
                message: "response is not a JSON object".to_string(),
            })
        }
    };

    let Value::Array(items) = items else {
        return Err(CatalogError::Decode {
            collection: collection.to_string(),
            message: "item list is not an array".to_string(),
        });
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            other => {
                log::debug!("Skipping non-object item in '{}': {}", collection, other);
                None
            }
        })
        .collect())
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[async_trait]
impl ListService for RestListService {
    async fn query(&self, query: &ListQuery) -> Result<Vec<Record>> {
        let url = self.items_url(query);
        log::debug!("GET {}", url);

        let mut request = self.client.get(&url).header("Accept", ACCEPT_NOMETADATA);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::remote(&query.collection, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::RemoteStatus {
                collection: query.collection.clone(),
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body: Value = response.json().await.map_err(|e| CatalogError::Decode {
            collection: query.collection.clone(),
            message: e.to_string(),
        })?;

        parse_items(&query.collection, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves one canned HTTP response; the handle yields the raw request head
    async fn serve_once(status_line: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (format!("http://{}", addr), handle)
    }

    fn service(url: &str, token: Option<&str>) -> RestListService {
        RestListService::new(&SiteConfig {
            url: url.to_string(),
            access_token: token.map(str::to_string),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn header_query() -> ListQuery {
        ListQuery::new("PO_Requests", 500)
            .select(["Id"])
            .filter(Filter::eq_int("VendorId", 7))
    }

    #[tokio::test]
    async fn test_query_reads_items_and_sends_token() {
        let (url, server) = serve_once("200 OK", r#"{"value":[{"Id":1},2]}"#).await;

        let items = service(&url, Some("secret-token")).query(&header_query()).await.unwrap();

        assert_eq!(items, vec![json!({"Id": 1}).as_object().cloned().unwrap()]);
        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /_api/web/lists/getbytitle(%27po_requests%27)/items?"));
        assert!(request.contains("authorization: bearer secret-token"));
        assert!(request.contains("accept: application/json;odata=nometadata"));
    }

    #[tokio::test]
    async fn test_query_without_token_sends_no_authorization() {
        let (url, server) = serve_once("200 OK", r#"{"value":[]}"#).await;

        let items = service(&url, None).query(&header_query()).await.unwrap();

        assert!(items.is_empty());
        assert!(!server.await.unwrap().to_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn test_query_error_status() {
        let (url, server) = serve_once("503 Service Unavailable", "busy").await;

        let err = service(&url, None).query(&header_query()).await.unwrap_err();

        match err {
            CatalogError::RemoteStatus { collection, status, body } => {
                assert_eq!(collection, "PO_Requests");
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("expected RemoteStatus, got {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_query_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = service(&url, None).query(&header_query()).await.unwrap_err();

        assert!(matches!(err, CatalogError::RemoteQuery { .. }));
        assert_eq!(err.collection(), Some("PO_Requests"));
    }

    #[test]
    fn test_items_url() {
        let query = ListQuery::new("PO_Requests", 500)
            .select(["Id"])
            .filter(Filter::eq_int("VendorId", 7));

        assert_eq!(
            items_url("https://contoso.example/sites/po", &query),
            "https://contoso.example/sites/po/_api/web/lists/getbytitle(%27PO_Requests%27)/items\
             ?$select=Id&$filter=VendorId%20eq%207&$top=500"
        );
    }

    #[test]
    fn test_items_url_escapes_list_title() {
        let query = ListQuery::new("Bob's List", 5);
        let url = items_url("https://x", &query);
        assert!(url.contains("getbytitle(%27Bob%27%27s%20List%27)"));
    }

    #[test]
    fn test_new_requires_url() {
        let site = SiteConfig::default();
        assert!(matches!(RestListService::new(&site), Err(CatalogError::Config(_))));
    }

    #[test]
    fn test_parse_nometadata_body() {
        let items = parse_items("L", json!({"value": [{"Id": 1}, {"Id": 2}]})).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_parse_verbose_body() {
        let items = parse_items("L", json!({"d": {"results": [{"Id": 1}, 3]}})).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_parse_rejects_unexpected_shape() {
        assert!(matches!(
            parse_items("L", json!({"items": []})),
            Err(CatalogError::Decode { .. })
        ));
        assert!(matches!(parse_items("L", json!([])), Err(CatalogError::Decode { .. })));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(500);
        assert_eq!(truncate_body(&long).len(), MAX_ERROR_BODY + 3);
        assert_eq!(truncate_body(" short "), "short");
    }
}
