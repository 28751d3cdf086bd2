//! Page description parsing.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::navigation::Navigation;

/// A parsed page description.
///
/// Only the fields the build pipeline reads are typed. Everything else in the
/// document is preserved in `extra` so the client receives the page exactly
/// as it was written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    /// Page metadata (title, description, sharing tags)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,

    /// Content blocks, opaque to the build
    #[serde(default)]
    pub blocks: Vec<Value>,

    /// Extra stylesheets linked from this page only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub css: Vec<String>,

    /// Extra scripts loaded by this page only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub js: Vec<String>,

    /// Inline navigation, overrides the shared navigation file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<Navigation>,

    /// Remaining top-level fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Page metadata block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Open Graph / Twitter Card fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharing: Option<Sharing>,

    /// Keywords, written either as a list or a comma separated string
    #[serde(
        default,
        deserialize_with = "deserialize_keywords",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub keywords: Vec<String>,

    /// Theme override for this page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

/// Social sharing metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sharing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl PageContent {
    /// Page title, if any.
    pub fn title(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.title.as_deref())
    }

    /// Page description, if any.
    pub fn description(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.description.as_deref())
    }

    /// Sharing metadata, if any.
    pub fn sharing(&self) -> Option<&Sharing> {
        self.meta.as_ref().and_then(|m| m.sharing.as_ref())
    }

    /// Keywords, empty when none are set.
    pub fn keywords(&self) -> &[String] {
        self.meta.as_ref().map(|m| m.keywords.as_slice()).unwrap_or(&[])
    }

    /// Theme override, if any.
    pub fn theme(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.theme.as_deref())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Keywords {
    List(Vec<String>),
    Text(String),
}

fn deserialize_keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let keywords = Option::<Keywords>::deserialize(deserializer)?;
    let list = match keywords {
        None => Vec::new(),
        Some(Keywords::List(list)) => list,
        Some(Keywords::Text(text)) => text.split(',').map(str::to_string).collect(),
    };

    Ok(list
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect())
}

/// Errors that can occur when reading a page or navigation file.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Document is empty")]
    Empty,
}

/// Parse a page description from YAML source.
pub fn parse_page(source: &str) -> Result<PageContent, ParseError> {
    if source.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    Ok(serde_yaml::from_str(source)?)
}

/// Read and parse a page description file.
pub fn read_page(path: &Path) -> Result<PageContent, ParseError> {
    let source = fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: path.display().to_string(),
        source,
    })?;

    parse_page(&source)
}
