//! Bundler abstraction.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::target::Target;

/// One bundling invocation.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    /// Target to build for
    pub target: Target,

    /// Entry module
    pub entry: PathBuf,

    /// Site output root; the target decides the exact directory
    pub output_root: PathBuf,

    /// Directory the bundler runs in, used for module resolution
    pub working_dir: PathBuf,

    /// Minify the output
    pub minify: bool,

    /// Emit source maps
    pub source_maps: bool,
}

impl BundleRequest {
    /// Directory the bundle is written to.
    pub fn output_dir(&self) -> PathBuf {
        self.target.output_dir(&self.output_root)
    }

    /// Path of the bundle file.
    pub fn bundle_path(&self) -> PathBuf {
        self.target.bundle_path(&self.output_root)
    }
}

/// Compiler diagnostics reported by a bundler run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Result of a bundler run.
#[derive(Debug, Clone, Default)]
pub struct BundleOutput {
    /// Absolute paths of every file written
    pub outputs: Vec<PathBuf>,

    /// Errors and warnings
    pub diagnostics: Diagnostics,
}

/// An external bundler.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Bundler identifier (e.g. "esbuild")
    fn name(&self) -> &'static str;

    /// Bundle one entry.
    ///
    /// Compilation problems are reported through `diagnostics`; `Err` is for
    /// failures to run the bundler at all.
    async fn bundle(&self, request: &BundleRequest) -> Result<BundleOutput, BundleError>;
}

/// Errors that can occur while bundling.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to generate entry module: {0}")]
    Entry(String),

    #[error("Failed to run {tool}: {message}")]
    Spawn { tool: String, message: String },

    #[error("Failed to read bundler metafile: {0}")]
    Metafile(String),

    #[error("Bundling failed:\n{0}")]
    Compilation(String),
}
