// Vendor options for the picker
// Only reading is covered here; creating vendors belongs to the order writer.

use crate::config::Config;
use crate::error::Result;
use crate::model::{integer_value, Record, VendorId};
use crate::source::{ListQuery, ListService};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorOption {
    pub id: VendorId,
    pub label: String,
    pub title: String,
    pub address: Option<String>,
    pub website: Option<String>,
}

impl VendorOption {
    fn from_record(record: &Record, config: &Config) -> Option<Self> {
        let fields = &config.fields;
        let id = record.get(&fields.id).and_then(integer_value)?;
        let text = |field: &str| {
            record
                .get(field)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let title = text(&fields.vendor_title).unwrap_or_else(|| format!("Vendor {}", id));
        let address = text(&fields.vendor_address);
        let label = match &address {
            Some(addr) => format!("{} - {}", title, addr),
            None => title.clone(),
        };

        Some(VendorOption {
            id: VendorId::Id(id),
            label,
            title,
            address,
            website: text(&fields.vendor_website),
        })
    }
}

pub fn vendor_query(config: &Config) -> ListQuery {
    let fields = &config.fields;
    ListQuery::new(&config.lists.vendors, config.limits.vendor_cap)
        .select([
            fields.id.as_str(),
            fields.vendor_title.as_str(),
            fields.vendor_address.as_str(),
            fields.vendor_website.as_str(),
        ])
        .order_by(&fields.vendor_title, true)
}

pub async fn load_vendors(service: &dyn ListService, config: &Config) -> Result<Vec<VendorOption>> {
    let records = service.query(&vendor_query(config)).await?;
    let vendors: Vec<VendorOption> = records
        .iter()
        .filter_map(|r| VendorOption::from_record(r, config))
        .collect();

    log::info!("Loaded {} vendors", vendors.len());
    Ok(vendors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryListService;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_load_vendors_labels() {
        let service = InMemoryListService::from_json_str(
            r#"{"Vendors": [
                {"Id": 2, "Title": "Zeta Tools", "Address": "1 Main St"},
                {"Id": 1, "Title": "Acme", "Address": "  ", "Website": "https://acme.example"},
                {"Id": "bad", "Title": "Broken"}
            ]}"#,
        )
        .unwrap();

        let vendors = load_vendors(&service, &Config::default()).await.unwrap();

        let labels: Vec<&str> = vendors.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, vec!["Acme", "Zeta Tools - 1 Main St"]);
        assert_eq!(vendors[0].id, VendorId::Id(1));
        assert_eq!(vendors[0].address, None);
        assert_eq!(vendors[0].website.as_deref(), Some("https://acme.example"));
    }

    #[test]
    fn test_vendor_query_shape() {
        let query = vendor_query(&Config::default());
        assert_eq!(query.collection, "Vendors");
        assert_eq!(query.top, 500);
        assert_eq!(query.select, vec!["Id", "Title", "Address", "Website"]);
    }
}
