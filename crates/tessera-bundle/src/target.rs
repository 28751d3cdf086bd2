//! Bundle targets and their asset handling policy.
//!
//! Both targets bundle the same components. They differ only in what happens
//! to stylesheets, binary assets and platform built-ins, which is captured in
//! one [`AssetPolicy`] per target.

use std::path::{Path, PathBuf};

/// Client bundle file name, written to the output root.
pub const CLIENT_BUNDLE: &str = "tessera-client.js";

/// Server bundle file name.
pub const SERVER_BUNDLE: &str = "tessera-server.js";

/// Directory under the output root holding transient server build files.
pub const SERVER_DIR: &str = ".tessera-server";

/// Image and font extensions handled as resource files.
pub const BINARY_ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "woff", "woff2", "ttf", "eot",
    "otf",
];

/// A bundling target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Runs in the browser and hydrates pre-rendered markup
    Browser,
    /// Runs in Node.js at build time to pre-render markup
    Server,
}

/// What to do with imported stylesheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleHandling {
    /// Extract into a separate stylesheet next to the bundle
    Extract,
    /// Resolve imports to nothing
    Suppress,
}

/// What to do with imported images and fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryAssets {
    /// Emit as resource files referenced by URL
    Emit,
    /// Resolve to the same URLs as the browser build, into a directory that
    /// is removed after the build
    Transient,
}

/// What to do with platform built-in modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtins {
    /// Replace Node-only globals with browser shims
    Shim,
    /// Leave built-ins as external requires
    External,
}

/// Module format of the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Self-executing script for a `<script>` tag
    Iife,
    /// CommonJS module exporting `render`
    CommonJs,
}

/// Per-target bundling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetPolicy {
    pub styles: StyleHandling,
    pub binary_assets: BinaryAssets,
    pub builtins: Builtins,
    pub format: OutputFormat,
    /// Bundle file name
    pub bundle_name: &'static str,
    /// Subdirectory of the output root, if any
    pub out_subdir: Option<&'static str>,
}

const BROWSER_POLICY: AssetPolicy = AssetPolicy {
    styles: StyleHandling::Extract,
    binary_assets: BinaryAssets::Emit,
    builtins: Builtins::Shim,
    format: OutputFormat::Iife,
    bundle_name: CLIENT_BUNDLE,
    out_subdir: None,
};

const SERVER_POLICY: AssetPolicy = AssetPolicy {
    styles: StyleHandling::Suppress,
    binary_assets: BinaryAssets::Transient,
    builtins: Builtins::External,
    format: OutputFormat::CommonJs,
    bundle_name: SERVER_BUNDLE,
    out_subdir: Some(SERVER_DIR),
};

impl Target {
    /// Targets in build order.
    pub const ALL: [Target; 2] = [Target::Browser, Target::Server];

    /// Asset handling policy for this target.
    pub fn policy(self) -> &'static AssetPolicy {
        match self {
            Target::Browser => &BROWSER_POLICY,
            Target::Server => &SERVER_POLICY,
        }
    }

    /// Short name used in logs and entry file names.
    pub fn name(self) -> &'static str {
        match self {
            Target::Browser => "browser",
            Target::Server => "server",
        }
    }

    /// Name of the synthesized entry module.
    pub fn entry_file_name(self) -> String {
        format!(".tessera-entry.{}.js", self.name())
    }

    /// Directory the target's files are written to.
    pub fn output_dir(self, output_root: &Path) -> PathBuf {
        match self.policy().out_subdir {
            Some(sub) => output_root.join(sub),
            None => output_root.to_path_buf(),
        }
    }

    /// Full path of the target's bundle file.
    pub fn bundle_path(self, output_root: &Path) -> PathBuf {
        self.output_dir(output_root).join(self.policy().bundle_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_diverge_on_assets() {
        let browser = Target::Browser.policy();
        let server = Target::Server.policy();

        assert_eq!(browser.styles, StyleHandling::Extract);
        assert_eq!(server.styles, StyleHandling::Suppress);
        assert_eq!(browser.binary_assets, BinaryAssets::Emit);
        assert_eq!(server.binary_assets, BinaryAssets::Transient);
        assert_eq!(server.builtins, Builtins::External);
        assert_eq!(server.format, OutputFormat::CommonJs);
    }

    #[test]
    fn server_bundle_lives_in_transient_dir() {
        let root = Path::new("/out");

        assert_eq!(
            Target::Browser.bundle_path(root),
            PathBuf::from("/out/tessera-client.js")
        );
        assert_eq!(
            Target::Server.bundle_path(root),
            PathBuf::from("/out/.tessera-server/tessera-server.js")
        );
    }

    #[test]
    fn entry_names_are_distinct() {
        assert_ne!(
            Target::Browser.entry_file_name(),
            Target::Server.entry_file_name()
        );
    }
}
