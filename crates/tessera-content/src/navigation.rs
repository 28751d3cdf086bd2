//! Shared navigation data.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::page::ParseError;

/// Navigation structure handed to every page render.
///
/// The schema belongs to the component framework, so the value is kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Navigation(pub Value);

impl Navigation {
    /// Borrow the raw value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// Load the navigation file.
pub fn load_navigation(path: &Path) -> Result<Navigation, ParseError> {
    let source = fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: path.display().to_string(),
        source,
    })?;

    if source.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let navigation = serde_yaml::from_str(&source)?;
    tracing::debug!("Loaded navigation from {}", path.display());
    Ok(navigation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn loads_navigation_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nav.yaml");
        fs::write(
            &path,
            "links:\n  - label: Home\n    href: /\n  - label: Docs\n    href: /docs\n",
        )
        .unwrap();

        let nav = load_navigation(&path).unwrap();

        assert_eq!(nav.as_value()["links"][1]["label"], "Docs");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let temp = tempdir().unwrap();
        let result = load_navigation(&temp.path().join("missing.yaml"));
        assert!(matches!(result, Err(ParseError::Read { .. })));
    }
}
