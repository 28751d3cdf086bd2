//! Entry module synthesis.
//!
//! Each build writes two throwaway modules into the runtime package root: a
//! browser entry that installs the global hydration function, and a server
//! entry that exports `render`. All imports are static so the bundler sees
//! the full graph.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tessera_content::AnalyticsConfig;

use crate::bundler::BundleError;
use crate::registry::{ComponentDescriptor, ComponentManifest};
use crate::target::Target;
use crate::toolchain::ToolchainConfig;

/// Global function installed by the browser bundle.
pub const HYDRATE_GLOBAL: &str = "tesseraHydrate";

/// Writes the browser and server entry modules.
#[derive(Debug, Clone)]
pub struct EntrySynthesizer {
    toolchain: ToolchainConfig,
    styles: Vec<PathBuf>,
}

/// The entry modules on disk. Both files are removed when this is dropped.
#[derive(Debug)]
pub struct EntryFiles {
    browser: PathBuf,
    server: PathBuf,
}

impl EntryFiles {
    /// Path of the entry module for a target.
    pub fn path(&self, target: Target) -> &Path {
        match target {
            Target::Browser => &self.browser,
            Target::Server => &self.server,
        }
    }
}

impl Drop for EntryFiles {
    fn drop(&mut self) {
        for path in [&self.browser, &self.server] {
            match fs::remove_file(path) {
                Ok(()) => tracing::debug!("Removed entry {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove entry {}: {}", path.display(), e),
            }
        }
    }
}

impl EntrySynthesizer {
    /// Create a synthesizer. `styles` are extra stylesheets imported by the
    /// browser entry, in order.
    pub fn new(toolchain: ToolchainConfig, styles: Vec<PathBuf>) -> Self {
        Self { toolchain, styles }
    }

    /// Write both entry modules into the package root.
    pub fn write(
        &self,
        manifest: &ComponentManifest,
        analytics: Option<&AnalyticsConfig>,
    ) -> Result<EntryFiles, BundleError> {
        let root = &self.toolchain.package_root;

        // Guard first, so a failed second write still removes the first file
        let files = EntryFiles {
            browser: root.join(Target::Browser.entry_file_name()),
            server: root.join(Target::Server.entry_file_name()),
        };

        let browser = self.browser_entry(manifest, analytics)?;
        write_entry(&files.browser, &browser)?;

        let server = self.server_entry(manifest, analytics)?;
        write_entry(&files.server, &server)?;

        tracing::debug!(
            "Wrote entries for {} components to {}",
            manifest.len(),
            root.display()
        );

        Ok(files)
    }

    /// Source of the browser entry module.
    pub fn browser_entry(
        &self,
        manifest: &ComponentManifest,
        analytics: Option<&AnalyticsConfig>,
    ) -> Result<String, BundleError> {
        let mut lines = vec![HEADER.to_string()];

        lines.push(format!(
            "import {{ hydrate }} from {};",
            js_string(&self.toolchain.client_module)
        ));
        for style in &self.toolchain.global_styles {
            lines.push(format!("import {};", js_string(style)));
        }
        for style in &self.styles {
            lines.push(format!("import {};", js_path(style)));
        }
        for component in manifest.iter() {
            lines.push(component_import(component));
            for style in &component.stylesheets {
                lines.push(format!("import {};", js_path(style)));
            }
        }
        lines.extend(handler_import(analytics));
        lines.push(String::new());
        lines.push(component_map(manifest));
        lines.push(default_analytics(analytics)?);
        lines.push(String::new());
        lines.push(format!(
            r#"window.{global} = function {global}(options = {{}}) {{
  const analytics = options.analytics
    ? Object.assign({{}}, defaultAnalytics, options.analytics)
    : defaultAnalytics;
  return hydrate(Object.assign({{}}, options, {{
    customComponents: options.customComponents || customComponents,
    analytics,
  }}));
}};"#,
            global = HYDRATE_GLOBAL
        ));

        Ok(lines.join("\n") + "\n")
    }

    /// Source of the server entry module.
    pub fn server_entry(
        &self,
        manifest: &ComponentManifest,
        analytics: Option<&AnalyticsConfig>,
    ) -> Result<String, BundleError> {
        let mut lines = vec![HEADER.to_string()];

        lines.push(format!(
            "import {{ renderToString }} from {};",
            js_string(&self.toolchain.server_module)
        ));
        for component in manifest.iter() {
            lines.push(component_import(component));
        }
        lines.extend(handler_import(analytics));
        lines.push(String::new());
        lines.push(component_map(manifest));
        lines.push(default_analytics(analytics)?);
        lines.push(String::new());
        lines.push(
            r#"export function render(pageContent, theme, navigation, analytics) {
  return renderToString({
    pageContent,
    customComponents,
    theme,
    navigation,
    analytics: analytics
      ? Object.assign({}, defaultAnalytics, analytics)
      : defaultAnalytics,
  });
}"#
            .to_string(),
        );

        Ok(lines.join("\n") + "\n")
    }
}

const HEADER: &str = "// Generated by tessera for a single build. Do not edit.";

fn write_entry(path: &Path, source: &str) -> Result<(), BundleError> {
    fs::write(path, source).map_err(|e| BundleError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn component_import(component: &ComponentDescriptor) -> String {
    format!(
        "import {} from {};",
        component_ident(&component.name),
        js_path(&component.source_path)
    )
}

fn component_map(manifest: &ComponentManifest) -> String {
    let entries: Vec<String> = manifest
        .iter()
        .map(|c| format!("  {}: {},", js_string(&c.name), component_ident(&c.name)))
        .collect();

    if entries.is_empty() {
        "const customComponents = {};".to_string()
    } else {
        format!("const customComponents = {{\n{}\n}};", entries.join("\n"))
    }
}

fn handler_import(analytics: Option<&AnalyticsConfig>) -> Option<String> {
    let handler = analytics?.handler.as_ref()?;
    Some(format!("import analyticsHandler from {};", js_path(handler)))
}

fn default_analytics(analytics: Option<&AnalyticsConfig>) -> Result<String, BundleError> {
    let Some(config) = analytics else {
        return Ok("const defaultAnalytics = null;".to_string());
    };

    let literal = config
        .to_js_literal()
        .map_err(|e| BundleError::Entry(e.to_string()))?;

    Ok(if config.handler.is_some() {
        format!(
            "const defaultAnalytics = Object.assign({}, {{ onEvent: analyticsHandler }});",
            literal
        )
    } else {
        format!("const defaultAnalytics = {};", literal)
    })
}

/// Identifier a component is imported under.
fn component_ident(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '$' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("Component_{}", sanitized)
}

fn js_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// Import specifier for a local file. Entries live in the package root, so
/// relative paths are made absolute against the working directory.
fn js_path(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    js_string(&absolute.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use tempfile::tempdir;

    fn manifest() -> ComponentManifest {
        let mut manifest = ComponentManifest::new();
        manifest.insert(ComponentDescriptor {
            name: "HeroBanner".to_string(),
            source_path: PathBuf::from("/site/components/hero-banner.jsx"),
            dependencies: vec![],
            stylesheets: vec![PathBuf::from("/site/components/hero-banner.css")],
        });
        manifest.insert(ComponentDescriptor {
            name: "Card".to_string(),
            source_path: PathBuf::from("/site/components/card.tsx"),
            dependencies: vec![],
            stylesheets: vec![],
        });
        manifest
    }

    fn synthesizer(root: &Path) -> EntrySynthesizer {
        EntrySynthesizer::new(
            ToolchainConfig {
                package_root: root.to_path_buf(),
                ..Default::default()
            },
            vec![PathBuf::from("/site/styles/site.css")],
        )
    }

    #[test]
    fn browser_entry_imports_components_and_styles() {
        let source = synthesizer(Path::new("/pkg"))
            .browser_entry(&manifest(), None)
            .unwrap();

        assert!(source.contains(r#"import { hydrate } from "./client.js";"#));
        assert!(source.contains(r#"import "./styles.css";"#));
        assert!(source.contains(r#"import "/site/styles/site.css";"#));
        assert!(source
            .contains(r#"import Component_HeroBanner from "/site/components/hero-banner.jsx";"#));
        assert!(source.contains(r#"import "/site/components/hero-banner.css";"#));
        assert!(source.contains(r#"  "Card": Component_Card,"#));
        assert!(source.contains("const defaultAnalytics = null;"));
        assert!(source.contains("window.tesseraHydrate = function tesseraHydrate"));
        assert!(source.contains("options.customComponents || customComponents"));

        // Global styles are imported before user styles
        let global = source.find("./styles.css").unwrap();
        let user = source.find("site.css").unwrap();
        assert!(global < user);
    }

    #[test]
    fn server_entry_skips_stylesheets() {
        let source = synthesizer(Path::new("/pkg"))
            .server_entry(&manifest(), None)
            .unwrap();

        assert!(source.contains(r#"import { renderToString } from "./server.js";"#));
        assert!(source.contains("import Component_Card from"));
        assert!(!source.contains(".css"));
        assert!(source.contains("export function render(pageContent, theme, navigation, analytics)"));
    }

    #[test]
    fn analytics_is_embedded_as_data_with_handler_import() {
        let analytics = AnalyticsConfig {
            auto_events: true,
            sink: Some("beacon".to_string()),
            params: Map::new(),
            handler: Some(PathBuf::from("/site/track.js")),
        };

        let synth = synthesizer(Path::new("/pkg"));
        for source in [
            synth.browser_entry(&manifest(), Some(&analytics)).unwrap(),
            synth.server_entry(&manifest(), Some(&analytics)).unwrap(),
        ] {
            assert!(source.contains(r#"import analyticsHandler from "/site/track.js";"#));
            assert!(source.contains(
                r#"const defaultAnalytics = Object.assign({"autoEvents":true,"sink":"beacon"}, { onEvent: analyticsHandler });"#
            ));
        }
    }

    #[test]
    fn entry_files_are_removed_on_drop() {
        let temp = tempdir().unwrap();
        let synth = synthesizer(temp.path());

        let files = synth.write(&manifest(), None).unwrap();
        let browser = files.path(Target::Browser).to_path_buf();
        let server = files.path(Target::Server).to_path_buf();
        assert!(browser.exists());
        assert!(server.exists());

        drop(files);

        assert!(!browser.exists());
        assert!(!server.exists());
    }

    #[test]
    fn write_fails_when_package_root_is_missing() {
        let temp = tempdir().unwrap();
        let synth = synthesizer(&temp.path().join("missing"));

        let result = synth.write(&manifest(), None);

        assert!(matches!(result, Err(BundleError::Io { .. })));
    }

    #[test]
    fn empty_manifest_gives_empty_map() {
        let source = synthesizer(Path::new("/pkg"))
            .server_entry(&ComponentManifest::new(), None)
            .unwrap();
        assert!(source.contains("const customComponents = {};"));
    }

    #[test]
    fn relative_imports_are_made_absolute() {
        let specifier = js_path(Path::new("analytics/track.js"));
        let path: String = serde_json::from_str(&specifier).unwrap();

        assert!(Path::new(&path).is_absolute());
        assert!(path.ends_with("track.js"));
    }
}
