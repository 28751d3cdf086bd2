//! Server-side rendering through the built server bundle.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use tessera_content::{AnalyticsConfig, Navigation, PageContent};

use crate::templates::escape_html;

/// Process-wide load counter. Every successful load gets a new number.
static GENERATION: AtomicU64 = AtomicU64::new(0);

/// A server bundle that passed the load check.
///
/// Handles are never shared between renderers; a rebuild constructs a new
/// renderer and loads a new handle from the freshly written file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedBundle {
    path: PathBuf,
    generation: u64,
}

impl LoadedBundle {
    /// Absolute path of the bundle file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load number, unique within the process.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Arguments passed to the bundle's `render` export.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest<'a> {
    pub page_content: &'a PageContent,
    pub theme: &'a str,
    pub navigation: Option<&'a Navigation>,
    pub analytics: Option<&'a AnalyticsConfig>,
}

/// Executes a server bundle.
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    /// Call the bundle's `render` export and return its markup.
    async fn render(
        &self,
        bundle: &LoadedBundle,
        request: &RenderRequest<'_>,
    ) -> Result<String, RuntimeError>;
}

/// Errors raised while executing the server bundle.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Failed to start {runtime}: {message}")]
    Spawn { runtime: String, message: String },

    #[error("Failed to encode render request: {0}")]
    Request(#[from] serde_json::Error),

    #[error("{0}")]
    Thrown(String),

    #[error("Render output is not valid UTF-8")]
    Output,
}

/// Errors returned by [`ServerRenderer`].
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Server bundle not found: {0}")]
    BundleNotFound(String),

    #[error("Server bundle is not loaded")]
    NotLoaded,
}

/// Pre-renders pages with the server bundle of one build.
pub struct ServerRenderer {
    bundle_path: PathBuf,
    theme: String,
    runtime: Arc<dyn ScriptRuntime>,
    loaded: Option<LoadedBundle>,
}

impl ServerRenderer {
    /// Create a renderer for the bundle at `bundle_path`. Nothing is loaded
    /// until [`load_server_bundle`](Self::load_server_bundle).
    pub fn new(
        bundle_path: impl Into<PathBuf>,
        theme: impl Into<String>,
        runtime: Arc<dyn ScriptRuntime>,
    ) -> Self {
        Self {
            bundle_path: bundle_path.into(),
            theme: theme.into(),
            runtime,
            loaded: None,
        }
    }

    /// Check the bundle file and take a fresh handle to it, discarding any
    /// previous one.
    pub fn load_server_bundle(&mut self) -> Result<(), RenderError> {
        self.loaded = None;

        let path = std::fs::canonicalize(&self.bundle_path)
            .ok()
            .filter(|p| p.is_file())
            .ok_or_else(|| RenderError::BundleNotFound(self.bundle_path.display().to_string()))?;

        let generation = GENERATION.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("Loaded server bundle {} (#{})", path.display(), generation);

        self.loaded = Some(LoadedBundle { path, generation });
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// The current bundle handle.
    pub fn loaded(&self) -> Option<&LoadedBundle> {
        self.loaded.as_ref()
    }

    /// Render a page to markup.
    ///
    /// Failures inside the bundle are logged and replaced with a fallback
    /// fragment; only a missing load is an error.
    pub async fn render_to_html(
        &self,
        page: &PageContent,
        navigation: Option<&Navigation>,
        filename: Option<&str>,
        analytics: Option<&AnalyticsConfig>,
    ) -> Result<String, RenderError> {
        let bundle = self.loaded.as_ref().ok_or(RenderError::NotLoaded)?;

        let request = RenderRequest {
            page_content: page,
            theme: page.theme().unwrap_or(&self.theme),
            navigation,
            analytics,
        };

        match self.runtime.render(bundle, &request).await {
            Ok(markup) => Ok(markup),
            Err(e) => {
                tracing::error!(
                    "Server-side rendering failed for {}: {}",
                    filename.unwrap_or("page"),
                    e
                );
                Ok(fallback_markup(&e.to_string()))
            }
        }
    }
}

/// Markup shown in place of a page whose server render failed.
pub fn fallback_markup(message: &str) -> String {
    format!(
        concat!(
            "<div class=\"ssr-error\">",
            "<h2>Server-Side Rendering Error</h2>",
            "<p>This page could not be rendered on the server and will render client-side only.</p>",
            "<pre>{}</pre>",
            "</div>"
        ),
        escape_html(message)
    )
}

/// Runs the server bundle with Node.js, one process per render.
#[derive(Debug, Clone)]
pub struct NodeRuntime {
    binary: PathBuf,
}

impl NodeRuntime {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for NodeRuntime {
    fn default() -> Self {
        Self::new("node")
    }
}

/// Reads a render request from stdin and writes markup to stdout.
const NODE_HARNESS: &str = r#"
const bundle = require(process.argv[1]);
let input = '';
process.stdin.setEncoding('utf8');
process.stdin.on('data', (chunk) => { input += chunk; });
process.stdin.on('end', async () => {
  try {
    const request = JSON.parse(input);
    const render = bundle.render || (bundle.default && bundle.default.render);
    if (typeof render !== 'function') {
      throw new Error('Server bundle does not export render()');
    }
    const markup = await render(request.pageContent, request.theme, request.navigation, request.analytics);
    process.stdout.write(markup == null ? '' : String(markup));
  } catch (error) {
    process.stderr.write(String(error && error.stack ? error.stack : error));
    process.exitCode = 1;
  }
});
"#;

#[async_trait]
impl ScriptRuntime for NodeRuntime {
    async fn render(
        &self,
        bundle: &LoadedBundle,
        request: &RenderRequest<'_>,
    ) -> Result<String, RuntimeError> {
        let payload = serde_json::to_vec(request)?;

        let spawn_error = |e: std::io::Error| RuntimeError::Spawn {
            runtime: self.binary.display().to_string(),
            message: e.to_string(),
        };

        let mut child = Command::new(&self.binary)
            .arg("-e")
            .arg(NODE_HARNESS)
            .arg(bundle.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await.map_err(spawn_error)?;
        }

        let output = child.wait_with_output().await.map_err(spawn_error)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RuntimeError::Thrown(thrown_message(&stderr)));
        }

        String::from_utf8(output.stdout).map_err(|_| RuntimeError::Output)
    }
}

/// First line of a stack trace, or the whole output when it has no lines.
fn thrown_message(stderr: &str) -> String {
    stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Server bundle exited with an error")
        .to_string()
}
