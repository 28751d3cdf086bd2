//! Locations of the external JavaScript toolchain.

use std::path::PathBuf;

use serde::Deserialize;

/// Where the framework runtime package and the external tools live.
///
/// Deserializes from the `[toolchain]` table; missing keys keep their
/// defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Root of the framework runtime package. Entry modules are written here
    /// so their relative imports resolve against the package's dependencies.
    pub package_root: PathBuf,

    /// Client runtime module exporting `hydrate`, relative to the package root
    pub client_module: String,

    /// Server runtime module exporting `renderToString`, relative to the package root
    pub server_module: String,

    /// Global framework stylesheets, relative to the package root
    pub global_styles: Vec<String>,

    /// esbuild executable
    pub esbuild: PathBuf,

    /// Node.js executable used to run the server bundle
    pub node: PathBuf,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            package_root: PathBuf::from("node_modules/tessera-runtime"),
            client_module: "./client.js".to_string(),
            server_module: "./server.js".to_string(),
            global_styles: vec!["./styles.css".to_string()],
            esbuild: PathBuf::from("esbuild"),
            node: PathBuf::from("node"),
        }
    }
}
