//! Component manifest.
//!
//! Components are discovered by naming convention: every script module in
//! the components directory becomes one component named after its file stem
//! in PascalCase (`hero-banner.jsx` -> `HeroBanner`). A sibling `<stem>.css`
//! or `<stem>.module.css` is bundled with it for the browser.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

/// Extensions treated as component modules.
const COMPONENT_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx"];

/// A discovered component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor {
    /// Component name used as the key in the custom component map
    pub name: String,

    /// Absolute path of the component module
    pub source_path: PathBuf,

    /// Import specifiers found in the module (informational)
    pub dependencies: Vec<String>,

    /// Co-located stylesheets, absolute paths
    pub stylesheets: Vec<PathBuf>,
}

/// The set of components active for one build, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct ComponentManifest {
    components: BTreeMap<String, ComponentDescriptor>,
}

impl ComponentManifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a directory for component modules.
    pub fn scan(components_dir: &Path) -> Result<Self, RegistryError> {
        if !components_dir.is_dir() {
            return Err(RegistryError::DirectoryNotFound(
                components_dir.display().to_string(),
            ));
        }

        let mut manifest = Self::new();

        for entry in WalkDir::new(components_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || !is_component_file(path) {
                continue;
            }

            let descriptor = describe(path)?;

            if let Some(existing) = manifest.components.get(&descriptor.name) {
                tracing::warn!(
                    "Component {} in {} ignored, already defined by {}",
                    descriptor.name,
                    path.display(),
                    existing.source_path.display()
                );
                continue;
            }

            manifest.insert(descriptor);
        }

        Ok(manifest)
    }

    /// Add a component, replacing any with the same name.
    pub fn insert(&mut self, descriptor: ComponentDescriptor) {
        self.components.insert(descriptor.name.clone(), descriptor);
    }

    /// Look up a component by name.
    pub fn get(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.components.get(name)
    }

    /// Iterate over components in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

fn is_component_file(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !COMPONENT_EXTENSIONS.contains(&ext) {
        return false;
    }

    // Skip tests, stories, declarations and barrel files
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    !(filename.contains(".test.")
        || filename.contains(".spec.")
        || filename.contains(".stories.")
        || filename.ends_with(".d.ts")
        || stem == "index")
}

fn describe(path: &Path) -> Result<ComponentDescriptor, RegistryError> {
    let source_path = fs::canonicalize(path).map_err(|e| RegistryError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    // Imports are informational; an unreadable source still registers
    let dependencies = match fs::read(&source_path) {
        Ok(bytes) => extract_imports(&String::from_utf8_lossy(&bytes)),
        Err(e) => {
            tracing::warn!("Could not read imports of {}: {}", source_path.display(), e);
            Vec::new()
        }
    };

    let stem = source_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("component");

    let stylesheets = [format!("{}.css", stem), format!("{}.module.css", stem)]
        .iter()
        .map(|name| source_path.with_file_name(name))
        .filter(|p| p.is_file())
        .collect();

    Ok(ComponentDescriptor {
        name: to_pascal_case(stem),
        dependencies,
        stylesheets,
        source_path,
    })
}

/// Collect static import and require specifiers.
fn extract_imports(source: &str) -> Vec<String> {
    static RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r#"(?m)(?:^\s*import\s+(?:[^'";]*?\s+from\s+)?|require\(\s*)['"]([^'"]+)['"]"#,
        )
        .expect("Invalid import regex")
    });

    let mut imports: Vec<String> = Vec::new();
    for caps in RE.captures_iter(source) {
        let specifier = caps[1].to_string();
        if !imports.contains(&specifier) {
            imports.push(specifier);
        }
    }
    imports
}

/// Convert a kebab, snake or dotted file stem to PascalCase.
fn to_pascal_case(s: &str) -> String {
    s.split(['-', '_', '.', ' '])
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Errors that can occur while scanning components.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Components directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to read component {path}: {message}")]
    Io { path: String, message: String },
}
