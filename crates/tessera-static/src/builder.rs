//! Static site builder.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tessera_bundle::{
    BundleError, Bundler, ComponentManifest, DualTargetBuild, EntrySynthesizer, EsbuildBundler,
    ToolchainConfig,
};
use tessera_content::{
    load_navigation, read_page, AnalyticsConfig, ContentTransformer, MarkdownTransformer,
    Navigation, ParseError,
};

use crate::assets::{is_remote, AssetPipeline, ASSETS_DIR};
use crate::document::{DocumentAssembler, DocumentError};
use crate::renderer::{NodeRuntime, ScriptRuntime, ServerRenderer};

/// Configuration for building a static site.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory holding the page descriptions
    pub input_dir: PathBuf,

    /// Output directory
    pub output_dir: PathBuf,

    /// Stylesheets bundled into the client stylesheet, in order
    pub styles: Vec<PathBuf>,

    /// User components directory
    pub components_dir: Option<PathBuf>,

    /// Static files copied to `<output>/assets`
    pub assets_dir: Option<PathBuf>,

    /// Default theme, overridable per page
    pub theme: String,

    /// Base URL for the site
    pub base_url: String,

    /// Minify the client bundle and inline styles
    pub minify: bool,

    /// Emit source maps for the client bundle
    pub source_maps: bool,

    /// Rebuild on change
    pub watch: bool,

    /// Shared navigation file
    pub navigation: Option<PathBuf>,

    /// Local favicon path or remote URL
    pub favicon: Option<String>,

    /// Analytics configuration file
    pub analytics: Option<PathBuf>,

    /// External tools and the runtime package
    pub toolchain: ToolchainConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("pages"),
            output_dir: PathBuf::from("dist"),
            styles: vec![],
            components_dir: None,
            assets_dir: None,
            theme: "light".to_string(),
            base_url: "/".to_string(),
            minify: false,
            source_maps: false,
            watch: false,
            navigation: None,
            favicon: None,
            analytics: None,
            toolchain: ToolchainConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Paths whose changes should trigger a rebuild.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.input_dir.clone()];
        paths.extend(self.components_dir.iter().cloned());
        paths.extend(self.styles.iter().cloned());
        paths.extend(self.assets_dir.iter().cloned());
        paths.extend(self.navigation.iter().cloned());
        paths
    }
}

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of pages written
    pub pages_built: usize,

    /// Total build time
    pub duration: Duration,

    /// Structural and per-page errors
    pub errors: Vec<String>,

    /// Advisory problems
    pub warnings: Vec<String>,

    /// Output directory
    pub output_dir: PathBuf,
}

impl BuildResult {
    fn new(output_dir: PathBuf) -> Self {
        Self {
            pages_built: 0,
            duration: Duration::ZERO,
            errors: Vec::new(),
            warnings: Vec::new(),
            output_dir,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Errors that can occur during build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to create output directory {path}: {message}")]
    OutputDir { path: String, message: String },

    #[error("Failed to read input directory {path}: {message}")]
    ReadError { path: String, message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Failed to write output: {0}")]
    WriteError(String),
}

/// A page description found in the input directory.
#[derive(Debug)]
struct PageFile {
    /// Source file path
    source_path: PathBuf,

    /// File name, used in messages
    file_name: String,

    /// Output path
    output_path: PathBuf,
}

/// Static site builder.
pub struct StaticBuilder {
    config: Arc<BuildConfig>,
    bundler: Arc<dyn Bundler>,
    runtime: Arc<dyn ScriptRuntime>,
    transformer: Arc<dyn ContentTransformer>,
}

impl StaticBuilder {
    /// Create a builder using esbuild and Node.js from the configured
    /// toolchain.
    pub fn new(config: BuildConfig) -> Self {
        let bundler = Arc::new(EsbuildBundler::new(&config.toolchain.esbuild));
        let runtime = Arc::new(NodeRuntime::new(&config.toolchain.node));
        Self::with_toolchain(config, bundler, runtime)
    }

    /// Create a builder with explicit bundler and script runtime.
    pub fn with_toolchain(
        config: BuildConfig,
        bundler: Arc<dyn Bundler>,
        runtime: Arc<dyn ScriptRuntime>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            bundler,
            runtime,
            transformer: Arc::new(MarkdownTransformer::new()),
        }
    }

    /// Replace the content transformer.
    pub fn with_transformer(mut self, transformer: Arc<dyn ContentTransformer>) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build the static site.
    ///
    /// Never fails as a whole: structural problems end the build early with
    /// a single error in the result, per-page problems are collected and the
    /// remaining pages still build.
    pub async fn build(&self) -> BuildResult {
        let start = Instant::now();
        let mut result = BuildResult::new(self.config.output_dir.clone());

        if let Err(e) = self.run(&mut result).await {
            tracing::error!("Build failed: {}", e);
            result.errors.push(e.to_string());
        }

        result.duration = start.elapsed();
        result
    }

    async fn run(&self, result: &mut BuildResult) -> Result<(), BuildError> {
        let output_dir = &self.config.output_dir;
        fs::create_dir_all(output_dir).map_err(|e| BuildError::OutputDir {
            path: output_dir.display().to_string(),
            message: e.to_string(),
        })?;

        self.copy_assets(result);
        self.copy_favicon(result);

        let pages = self.discover_pages()?;
        if pages.is_empty() {
            result.warn(format!(
                "No page descriptions found in {}",
                self.config.input_dir.display()
            ));
            return Ok(());
        }
        tracing::info!("Found {} pages", pages.len());

        let manifest = self.load_components(result);
        let navigation = self.load_navigation(result);
        let analytics = self.load_analytics(result);

        let mut bundle = DualTargetBuild::new(
            self.bundler.clone(),
            EntrySynthesizer::new(self.config.toolchain.clone(), self.existing_styles(result)),
            output_dir.clone(),
            self.config.toolchain.package_root.clone(),
        )
        .with_minify(self.config.minify)
        .with_source_maps(self.config.source_maps);

        bundle.build(&manifest, analytics.as_ref()).await?;

        // Fresh renderer per build; nothing from a previous bundle survives
        let renderer = ServerRenderer::new(
            bundle.server_bundle_path(),
            &self.config.theme,
            self.runtime.clone(),
        );
        let mut assembler =
            DocumentAssembler::new(self.config.clone(), renderer, self.transformer.clone());

        for page in &pages {
            match self
                .build_page(
                    &mut assembler,
                    page,
                    &manifest,
                    navigation.as_ref(),
                    bundle.generated_stylesheets(),
                    analytics.as_ref(),
                )
                .await
            {
                Ok(()) => {
                    tracing::debug!("Built {}", page.output_path.display());
                    result.pages_built += 1;
                }
                Err(e) => {
                    tracing::error!("{}: {}", page.file_name, e);
                    result.errors.push(format!("{}: {}", page.file_name, e));
                }
            }
        }

        if result.errors.is_empty() {
            if let Err(e) = bundle.cleanup() {
                result.warn(format!("Failed to remove server bundle: {}", e));
            }
        } else {
            result.warn(format!(
                "Kept server bundle in {} because {} page(s) failed",
                bundle
                    .server_bundle_path()
                    .parent()
                    .unwrap_or(output_dir)
                    .display(),
                result.errors.len()
            ));
        }

        Ok(())
    }

    /// Find page descriptions directly under the input directory, in file
    /// name order.
    fn discover_pages(&self) -> Result<Vec<PageFile>, BuildError> {
        let input_dir = &self.config.input_dir;
        let read_error = |message: String| BuildError::ReadError {
            path: input_dir.display().to_string(),
            message,
        };

        let entries = fs::read_dir(input_dir).map_err(|e| read_error(e.to_string()))?;

        let mut pages = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| read_error(e.to_string()))?.path();

            if !path.is_file() {
                continue;
            }

            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if ext != "yaml" && ext != "yml" {
                continue;
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("index");
            let output_path = self.config.output_dir.join(format!("{}.html", stem));
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            pages.push(PageFile {
                source_path: path.clone(),
                file_name,
                output_path,
            });
        }

        pages.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        Ok(pages)
    }

    /// Build a single page.
    async fn build_page(
        &self,
        assembler: &mut DocumentAssembler,
        page: &PageFile,
        manifest: &ComponentManifest,
        navigation: Option<&Navigation>,
        generated_stylesheets: &[String],
        analytics: Option<&AnalyticsConfig>,
    ) -> Result<(), BuildError> {
        let content = read_page(&page.source_path)?;

        let html = assembler
            .render(
                &content,
                navigation,
                manifest,
                generated_stylesheets,
                Some(&page.file_name),
                analytics,
            )
            .await?;

        fs::write(&page.output_path, html).map_err(|e| {
            BuildError::WriteError(format!("{}: {}", page.output_path.display(), e))
        })?;

        Ok(())
    }

    fn copy_assets(&self, result: &mut BuildResult) {
        let Some(assets_dir) = &self.config.assets_dir else {
            return;
        };

        let dest = self.config.output_dir.join(ASSETS_DIR);
        match AssetPipeline::copy_dir(assets_dir, &dest) {
            Ok(count) => tracing::info!("Copied {} assets from {}", count, assets_dir.display()),
            Err(e) => result.warn(e.to_string()),
        }
    }

    fn copy_favicon(&self, result: &mut BuildResult) {
        let Some(favicon) = self.config.favicon.as_deref() else {
            return;
        };
        if is_remote(favicon) {
            return;
        }

        let dest = self.config.output_dir.join(ASSETS_DIR);
        match AssetPipeline::copy_favicon(favicon, self.config.assets_dir.as_deref(), &dest) {
            Ok(path) => tracing::debug!("Copied favicon to {}", path.display()),
            Err(e) => result.warn(e.to_string()),
        }
    }

    fn load_components(&self, result: &mut BuildResult) -> ComponentManifest {
        let Some(components_dir) = &self.config.components_dir else {
            return ComponentManifest::new();
        };

        match ComponentManifest::scan(components_dir) {
            Ok(manifest) => {
                tracing::info!(
                    "Loaded {} components from {}",
                    manifest.len(),
                    components_dir.display()
                );
                manifest
            }
            Err(e) => {
                result.warn(format!("Failed to scan components directory: {}", e));
                ComponentManifest::new()
            }
        }
    }

    fn load_navigation(&self, result: &mut BuildResult) -> Option<Navigation> {
        let path = self.config.navigation.as_ref()?;
        match load_navigation(path) {
            Ok(navigation) => Some(navigation),
            Err(e) => {
                result.warn(format!("Failed to load navigation: {}", e));
                None
            }
        }
    }

    fn load_analytics(&self, result: &mut BuildResult) -> Option<AnalyticsConfig> {
        let path = self.config.analytics.as_ref()?;
        match AnalyticsConfig::load(path) {
            Ok(config) => Some(config),
            Err(e) => {
                result.warn(format!("Failed to load analytics: {}", e));
                None
            }
        }
    }

    /// Configured stylesheets that exist, as absolute paths.
    fn existing_styles(&self, result: &mut BuildResult) -> Vec<PathBuf> {
        let mut styles = Vec::new();
        for style in &self.config.styles {
            match fs::canonicalize(style) {
                Ok(path) if path.is_file() => styles.push(path),
                _ => result.warn(format!("Stylesheet not found: {}", style.display())),
            }
        }
        styles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::tests::FakeRuntime;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};
    use tessera_bundle::{BundleOutput, BundleRequest, Diagnostics, Target};

    /// Writes a bundle per target, or nothing when `skip_server` is set.
    #[derive(Default)]
    struct FakeBundler {
        skip_server: bool,
        fail: bool,
    }

    #[async_trait]
    impl Bundler for FakeBundler {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn bundle(&self, request: &BundleRequest) -> Result<BundleOutput, BundleError> {
            if self.fail {
                return Ok(BundleOutput {
                    outputs: vec![],
                    diagnostics: Diagnostics {
                        errors: vec!["Could not resolve \"react\"".to_string()],
                        warnings: vec![],
                    },
                });
            }

            let dir = request.output_dir();
            fs::create_dir_all(&dir).unwrap();

            let mut outputs = vec![];
            if request.target == Target::Server && self.skip_server {
                return Ok(BundleOutput::default());
            }
            outputs.push(request.bundle_path());
            if request.target == Target::Browser {
                outputs.push(dir.join("tessera-client.css"));
            }
            for path in &outputs {
                fs::write(path, "/* bundle */").unwrap();
            }

            Ok(BundleOutput {
                outputs,
                diagnostics: Diagnostics::default(),
            })
        }
    }

    struct Site {
        temp: TempDir,
    }

    impl Site {
        fn new() -> Self {
            let temp = tempdir().unwrap();
            fs::create_dir_all(temp.path().join("pages")).unwrap();
            fs::create_dir_all(temp.path().join("pkg")).unwrap();
            Self { temp }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.temp.path().join(rel)
        }

        fn page(&self, name: &str, yaml: &str) {
            fs::write(self.path("pages").join(name), yaml).unwrap();
        }

        fn config(&self) -> BuildConfig {
            BuildConfig {
                input_dir: self.path("pages"),
                output_dir: self.path("dist"),
                toolchain: ToolchainConfig {
                    package_root: self.path("pkg"),
                    ..Default::default()
                },
                ..Default::default()
            }
        }

        fn builder(&self, config: BuildConfig, bundler: FakeBundler) -> StaticBuilder {
            StaticBuilder::with_toolchain(
                config,
                Arc::new(bundler),
                Arc::new(FakeRuntime::default()),
            )
        }
    }

    #[tokio::test]
    async fn builds_valid_pages_and_reports_broken_ones() {
        let site = Site::new();
        site.page("home.yaml", "meta:\n  title: Home\nblocks: []\n");
        site.page("broken.yaml", "meta: [unclosed\n");

        let result = site
            .builder(site.config(), FakeBundler::default())
            .build()
            .await;

        assert_eq!(result.pages_built, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("broken.yaml: "));

        let html: Vec<_> = fs::read_dir(site.path("dist"))
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".html"))
            .collect();
        assert_eq!(html, vec!["home.html"]);

        // A failed page keeps the server bundle around
        assert!(site.path("dist/.tessera-server/tessera-server.js").exists());
        assert!(result.warnings.iter().any(|w| w.contains("Kept server bundle")));
    }

    #[tokio::test]
    async fn successful_build_removes_server_bundle() {
        let site = Site::new();
        site.page("home.yaml", "meta:\n  title: Home\n");

        let result = site
            .builder(site.config(), FakeBundler::default())
            .build()
            .await;

        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.pages_built, 1);
        assert!(!site.path("dist/.tessera-server").exists());
        assert!(site.path("dist/tessera-client.js").exists());

        let html = fs::read_to_string(site.path("dist/home.html")).unwrap();
        assert!(html.contains(r#"<link rel="stylesheet" href="tessera-client.css">"#));
        assert!(html.contains(r#"<script src="tessera-client.js"></script>"#));
    }

    #[tokio::test]
    async fn favicon_is_copied_and_linked() {
        let site = Site::new();
        site.page("home.yaml", "meta:\n  title: Home\n");
        fs::create_dir_all(site.path("static")).unwrap();
        fs::write(site.path("static/logo.svg"), "<svg/>").unwrap();

        let config = BuildConfig {
            assets_dir: Some(site.path("static")),
            favicon: Some("logo.svg".to_string()),
            ..site.config()
        };
        let result = site.builder(config, FakeBundler::default()).build().await;

        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert!(site.path("dist/assets/logo.svg").exists());

        let html = fs::read_to_string(site.path("dist/home.html")).unwrap();
        assert!(html.contains(r#"<link rel="icon" type="image/svg+xml" href="assets/logo.svg">"#));
    }

    #[tokio::test]
    async fn missing_server_bundle_fails_each_page() {
        let site = Site::new();
        site.page("about.yaml", "meta:\n  title: About\n");
        site.page("home.yaml", "meta:\n  title: Home\n");

        let bundler = FakeBundler {
            skip_server: true,
            ..Default::default()
        };
        let result = site.builder(site.config(), bundler).build().await;

        assert_eq!(result.pages_built, 0);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].starts_with("about.yaml: Server bundle not found"));
        assert!(result.errors[1].starts_with("home.yaml: Server bundle not found"));
        assert!(result.errors[0].contains("tessera-server.js"));
    }

    #[tokio::test]
    async fn ssr_failure_still_counts_page() {
        let site = Site::new();
        site.page("boom.yaml", "meta:\n  title: boom\n");

        let result = site
            .builder(site.config(), FakeBundler::default())
            .build()
            .await;

        assert_eq!(result.pages_built, 1);
        assert!(result.errors.is_empty());

        let html = fs::read_to_string(site.path("dist/boom.html")).unwrap();
        assert!(html.contains(r#"<div id="root"><div class="ssr-error">"#));
        assert!(html.contains("Server-Side Rendering Error"));
    }

    #[tokio::test]
    async fn no_pages_is_a_warning() {
        let site = Site::new();
        site.page("notes.txt", "not a page");

        let result = site
            .builder(site.config(), FakeBundler::default())
            .build()
            .await;

        assert_eq!(result.pages_built, 0);
        assert!(result.errors.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("No page descriptions found"));
        assert!(!site.path("dist/tessera-client.js").exists());
    }

    #[tokio::test]
    async fn bundling_failure_is_structural() {
        let site = Site::new();
        site.page("home.yaml", "meta:\n  title: Home\n");

        let bundler = FakeBundler {
            fail: true,
            ..Default::default()
        };
        let result = site.builder(site.config(), bundler).build().await;

        assert_eq!(result.pages_built, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("[browser] Could not resolve \"react\""));
        assert!(!site.path("dist/home.html").exists());
    }

    #[tokio::test]
    async fn missing_input_directory_is_structural() {
        let site = Site::new();
        let config = BuildConfig {
            input_dir: site.path("nope"),
            ..site.config()
        };

        let result = site.builder(config, FakeBundler::default()).build().await;

        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Failed to read input directory"));
    }

    #[tokio::test]
    async fn missing_optional_inputs_are_warnings() {
        let site = Site::new();
        site.page("home.yaml", "meta:\n  title: Home\n");

        let config = BuildConfig {
            assets_dir: Some(site.path("static")),
            favicon: Some("favicon.ico".to_string()),
            styles: vec![site.path("styles/site.css")],
            navigation: Some(site.path("nav.yaml")),
            ..site.config()
        };
        let result = site.builder(config, FakeBundler::default()).build().await;

        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.pages_built, 1);
        assert_eq!(result.warnings.len(), 4, "{:?}", result.warnings);
    }

    #[tokio::test]
    async fn rebuild_is_byte_identical() {
        let site = Site::new();
        site.page(
            "home.yaml",
            "meta:\n  title: Home\n  description: Welcome\nblocks:\n  - type: markdown\n    content: \"# Hi\"\n",
        );
        let builder = site.builder(site.config(), FakeBundler::default());

        builder.build().await;
        let first = fs::read_to_string(site.path("dist/home.html")).unwrap();
        builder.build().await;
        let second = fs::read_to_string(site.path("dist/home.html")).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn inline_navigation_overrides_shared() {
        let site = Site::new();
        fs::write(site.path("nav.yaml"), "items:\n  - label: Shared\n").unwrap();
        site.page("home.yaml", "meta:\n  title: Home\n");
        site.page(
            "other.yaml",
            "meta:\n  title: Other\nnavigation:\n  items:\n    - label: Inline\n",
        );

        let config = BuildConfig {
            navigation: Some(site.path("nav.yaml")),
            ..site.config()
        };
        let result = site.builder(config, FakeBundler::default()).build().await;
        assert!(result.errors.is_empty(), "{:?}", result.errors);

        let home = fs::read_to_string(site.path("dist/home.html")).unwrap();
        let other = fs::read_to_string(site.path("dist/other.html")).unwrap();
        assert!(home.contains(r#"var navigation = {"items":[{"label":"Shared"}]};"#));
        assert!(other.contains(r#"var navigation = {"items":[{"label":"Inline"}]};"#));
    }

    #[test]
    fn watch_paths_cover_every_input() {
        let config = BuildConfig {
            input_dir: PathBuf::from("pages"),
            components_dir: Some(PathBuf::from("components")),
            styles: vec![PathBuf::from("a.css"), PathBuf::from("b.css")],
            assets_dir: Some(PathBuf::from("static")),
            navigation: Some(PathBuf::from("nav.yaml")),
            ..Default::default()
        };

        assert_eq!(
            config.watch_paths(),
            vec![
                PathBuf::from("pages"),
                PathBuf::from("components"),
                PathBuf::from("a.css"),
                PathBuf::from("b.css"),
                PathBuf::from("static"),
                PathBuf::from("nav.yaml"),
            ]
        );
    }
}
