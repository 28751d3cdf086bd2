//! Static site build command.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Deserialize;
use tessera_bundle::ToolchainConfig;
use tessera_static::{BuildConfig, BuildResult, StaticBuilder};
use tessera_watch::{rebuild_on_change, FileWatcher};

/// Flags for `tessera build`. Each one overrides the config file.
#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Directory containing page descriptions
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Stylesheet to bundle; repeat for several
    #[arg(short, long = "style")]
    pub styles: Vec<PathBuf>,

    /// Components directory
    #[arg(long)]
    pub components: Option<PathBuf>,

    /// Navigation file
    #[arg(long)]
    pub navigation: Option<PathBuf>,

    /// Static assets directory
    #[arg(long)]
    pub assets: Option<PathBuf>,

    /// Favicon file or URL
    #[arg(long)]
    pub favicon: Option<String>,

    /// Analytics configuration file
    #[arg(long)]
    pub analytics: Option<PathBuf>,

    /// Default theme
    #[arg(long)]
    pub theme: Option<String>,

    /// Base URL the site is served from
    #[arg(long)]
    pub base_url: Option<String>,

    /// Minify output
    #[arg(long)]
    pub minify: bool,

    /// Emit source maps
    #[arg(long)]
    pub source_maps: bool,

    /// Rebuild when inputs change
    #[arg(short, long)]
    pub watch: bool,
}

/// Configuration file structure (tessera.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    site: SiteConfig,
    build: BuildSettings,
    toolchain: ToolchainConfig,
}

#[derive(Debug, Deserialize)]
struct SiteConfig {
    #[serde(default = "default_input")]
    input: PathBuf,
    #[serde(default = "default_output")]
    output: PathBuf,
    #[serde(default = "default_theme")]
    theme: String,
    #[serde(default = "default_base_url")]
    base_url: String,
    favicon: Option<String>,
    navigation: Option<PathBuf>,
    analytics: Option<PathBuf>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            theme: default_theme(),
            base_url: default_base_url(),
            favicon: None,
            navigation: None,
            analytics: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct BuildSettings {
    #[serde(default)]
    styles: Vec<PathBuf>,
    components: Option<PathBuf>,
    assets: Option<PathBuf>,
    #[serde(default)]
    minify: bool,
    #[serde(default)]
    source_maps: bool,
}

fn default_input() -> PathBuf {
    PathBuf::from("pages")
}
fn default_output() -> PathBuf {
    PathBuf::from("dist")
}
fn default_theme() -> String {
    "light".to_string()
}
fn default_base_url() -> String {
    "/".to_string()
}

/// Load configuration from the config file if it exists.
/// Returns an error if the file exists but is malformed.
fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No config file at {}, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Merge the config file with command line flags.
fn resolve(args: BuildArgs, file: ConfigFile) -> BuildConfig {
    let styles = if args.styles.is_empty() {
        file.build.styles
    } else {
        args.styles
    };

    BuildConfig {
        input_dir: args.input.unwrap_or(file.site.input),
        output_dir: args.output.unwrap_or(file.site.output),
        styles,
        components_dir: args.components.or(file.build.components),
        assets_dir: args.assets.or(file.build.assets),
        theme: args.theme.unwrap_or(file.site.theme),
        base_url: args.base_url.unwrap_or(file.site.base_url),
        minify: args.minify || file.build.minify,
        source_maps: args.source_maps || file.build.source_maps,
        watch: args.watch,
        navigation: args.navigation.or(file.site.navigation),
        favicon: args.favicon.or(file.site.favicon),
        analytics: args.analytics.or(file.site.analytics),
        toolchain: file.toolchain,
    }
}

/// Run the build command.
pub async fn run(config_path: &Path, args: BuildArgs) -> Result<()> {
    tracing::info!("Building static site...");

    let config = resolve(args, load_config(config_path)?);
    let watch = config.watch;
    let builder = StaticBuilder::new(config);

    let result = builder.build().await;
    report(&result);

    if watch {
        return watch_and_rebuild(&builder).await;
    }

    if result.has_errors() {
        bail!("Build failed with {} error(s)", result.errors.len());
    }

    Ok(())
}

async fn watch_and_rebuild(builder: &StaticBuilder) -> Result<()> {
    let config = builder.config();
    let (watcher, events) =
        FileWatcher::new(&config.watch_paths()).context("Failed to start file watcher")?;

    tracing::info!(
        "Watching {} paths for changes (Ctrl+C to stop)",
        watcher.watched().len()
    );

    let ignore = [config.output_dir.clone()];
    let rebuilds = rebuild_on_change(events, &ignore, Duration::from_millis(100), move |_| async move {
        let result = builder.build().await;
        report(&result);
        if result.has_errors() {
            Err(format!("{} error(s)", result.errors.len()))
        } else {
            Ok(())
        }
    });

    tokio::select! {
        _ = rebuilds => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Stopping watcher");
        }
    }

    drop(watcher);
    Ok(())
}

fn report(result: &BuildResult) {
    tracing::info!(
        "Built {} pages in {}ms",
        result.pages_built,
        result.duration.as_millis()
    );

    if !result.warnings.is_empty() {
        tracing::warn!("{} warning(s):", result.warnings.len());
        for warning in &result.warnings {
            tracing::warn!("  - {}", warning);
        }
    }

    if !result.errors.is_empty() {
        tracing::error!("{} error(s):", result.errors.len());
        for error in &result.errors {
            tracing::error!("  - {}", error);
        }
    }

    tracing::info!("Output: {}", result.output_dir.display());
}
