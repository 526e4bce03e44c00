// Configuration for the previous-items pipeline
// Loaded from TOML; every section falls back to the form's stock list layout.

use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_ENV: &str = "REORDER_CONFIG";
pub const ACCESS_TOKEN_ENV: &str = "REORDER_ACCESS_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub lists: ListNames,
    pub fields: FieldNames,
    pub limits: Limits,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL of the site hosting the lists
    pub url: String,

    /// Bearer token for the REST service (env var wins when set)
    pub access_token: Option<String>,

    /// Per-request timeout for the REST service
    pub timeout_secs: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            url: String::new(),
            access_token: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListNames {
    /// Order headers
    pub requests: String,

    /// Order lines
    pub lines: String,

    pub vendors: String,
}

impl Default for ListNames {
    fn default() -> Self {
        ListNames {
            requests: "PO_Requests".to_string(),
            lines: "PO_LineItems".to_string(),
            vendors: "Vendors".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    pub id: String,

    /// Header field referencing the vendor
    pub vendor_ref: String,

    /// Line field referencing its header
    pub header_ref: String,

    pub item_name: String,
    pub unit_price: String,
    pub cost_center: String,
    pub vendor_title: String,
    pub vendor_address: String,
    pub vendor_website: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        FieldNames {
            id: "Id".to_string(),
            vendor_ref: "VendorId".to_string(),
            header_ref: "PO_IDId".to_string(),
            item_name: "ItemName".to_string(),
            unit_price: "UnitPrice".to_string(),
            cost_center: "CostCenter".to_string(),
            vendor_title: "Title".to_string(),
            vendor_address: "Address".to_string(),
            vendor_website: "Website".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Max headers returned for one vendor
    pub header_cap: usize,

    /// Max lines returned per batch query
    pub line_cap: usize,

    /// Header ids per OR-chained line query
    pub batch_size: usize,

    pub vendor_cap: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            header_cap: 500,
            line_cap: 500,
            batch_size: 20,
            vendor_cap: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub currency_symbol: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            currency_symbol: "$".to_string(),
        }
    }
}

impl Config {
    /// Resolve config: explicit path, then `REORDER_CONFIG`, then defaults.
    /// `REORDER_ACCESS_TOKEN` overrides the token in every case.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV);
        let resolved = path.or_else(|| env_path.as_deref().map(Path::new));

        let mut config = match resolved {
            Some(p) => Self::from_file(p)?,
            None => Config::default(),
        };

        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.trim().is_empty() {
                config.site.access_token = Some(token);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would stall the pipeline and names that could
    /// smuggle syntax into a filter expression.
    pub fn validate(&self) -> Result<()> {
        if self.limits.batch_size == 0 {
            return Err(CatalogError::Config("limits.batch_size must be at least 1".into()));
        }
        for (name, cap) in [
            ("header_cap", self.limits.header_cap),
            ("line_cap", self.limits.line_cap),
            ("vendor_cap", self.limits.vendor_cap),
        ] {
            if cap == 0 {
                return Err(CatalogError::Config(format!("limits.{} must be at least 1", name)));
            }
        }

        let fields = [
            ("id", &self.fields.id),
            ("vendor_ref", &self.fields.vendor_ref),
            ("header_ref", &self.fields.header_ref),
            ("item_name", &self.fields.item_name),
            ("unit_price", &self.fields.unit_price),
            ("cost_center", &self.fields.cost_center),
            ("vendor_title", &self.fields.vendor_title),
            ("vendor_address", &self.fields.vendor_address),
            ("vendor_website", &self.fields.vendor_website),
        ];
        for (key, value) in fields {
            if !is_identifier(value) {
                return Err(CatalogError::Config(format!(
                    "fields.{} = {:?} is not a plain field name",
                    key, value
                )));
            }
        }

        let lists = [
            ("requests", &self.lists.requests),
            ("lines", &self.lists.lines),
            ("vendors", &self.lists.vendors),
        ];
        for (key, value) in lists {
            if !is_list_title(value) {
                return Err(CatalogError::Config(format!(
                    "lists.{} = {:?} is not a plain list title",
                    key, value
                )));
            }
        }

        Ok(())
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_list_title(s: &str) -> bool {
    !s.trim().is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == ' ' || c == '-')
}
