//! Dual-target bundling.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tessera_content::AnalyticsConfig;

use crate::bundler::{BundleError, BundleOutput, BundleRequest, Bundler};
use crate::entry::EntrySynthesizer;
use crate::registry::ComponentManifest;
use crate::target::{BinaryAssets, StyleHandling, Target};

/// Builds the browser and server bundles for one site and tracks what each
/// run produced.
///
/// `build` takes `&mut self`: the recorded asset lists are only valid for
/// the most recent run.
pub struct DualTargetBuild {
    bundler: Arc<dyn Bundler>,
    synthesizer: EntrySynthesizer,
    output_root: PathBuf,
    working_dir: PathBuf,
    minify: bool,
    source_maps: bool,

    /// Stylesheets emitted by the browser run, relative to the output root
    generated_stylesheets: Vec<String>,

    /// Every file emitted by targets whose output is transient, absolute
    transient_files: Vec<PathBuf>,
}

impl DualTargetBuild {
    /// Create a build for the given output root. Bundlers run inside
    /// `working_dir`, normally the runtime package root.
    pub fn new(
        bundler: Arc<dyn Bundler>,
        synthesizer: EntrySynthesizer,
        output_root: PathBuf,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            bundler,
            synthesizer,
            output_root,
            working_dir,
            minify: false,
            source_maps: false,
            generated_stylesheets: Vec::new(),
            transient_files: Vec::new(),
        }
    }

    /// Minify the browser bundle.
    pub fn with_minify(mut self, minify: bool) -> Self {
        self.minify = minify;
        self
    }

    /// Emit source maps for the browser bundle.
    pub fn with_source_maps(mut self, source_maps: bool) -> Self {
        self.source_maps = source_maps;
        self
    }

    /// Write the entries and bundle both targets.
    ///
    /// Compilation errors from either target fail the whole step with every
    /// message in one error. Entry modules are removed whatever the outcome.
    pub async fn build(
        &mut self,
        manifest: &ComponentManifest,
        analytics: Option<&AnalyticsConfig>,
    ) -> Result<(), BundleError> {
        self.generated_stylesheets.clear();
        self.transient_files.clear();

        let entries = self.synthesizer.write(manifest, analytics)?;
        let mut errors = Vec::new();

        for target in Target::ALL {
            let request = BundleRequest {
                target,
                entry: entries.path(target).to_path_buf(),
                output_root: self.output_root.clone(),
                working_dir: self.working_dir.clone(),
                minify: self.minify && target == Target::Browser,
                source_maps: self.source_maps && target == Target::Browser,
            };

            tracing::info!(
                "Bundling {} target with {}",
                target.name(),
                self.bundler.name()
            );

            let output = self.bundler.bundle(&request).await?;

            for warning in &output.diagnostics.warnings {
                tracing::warn!("[{}] {}", target.name(), warning);
            }

            if output.diagnostics.has_errors() {
                errors.extend(
                    output
                        .diagnostics
                        .errors
                        .iter()
                        .map(|e| format!("[{}] {}", target.name(), e)),
                );
                continue;
            }

            self.record(target, &output);
        }

        if !errors.is_empty() {
            return Err(BundleError::Compilation(errors.join("\n")));
        }

        tracing::info!(
            "Bundled {} components ({} stylesheets, {} transient files)",
            manifest.len(),
            self.generated_stylesheets.len(),
            self.transient_files.len()
        );

        Ok(())
    }

    fn record(&mut self, target: Target, output: &BundleOutput) {
        let policy = target.policy();

        if policy.styles == StyleHandling::Extract {
            let stylesheets: Vec<String> = output
                .outputs
                .iter()
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("css"))
                .map(|p| self.output_relative(p))
                .collect();
            self.generated_stylesheets.extend(stylesheets);
        }

        if policy.binary_assets == BinaryAssets::Transient {
            self.transient_files.extend(output.outputs.iter().cloned());
        }
    }

    fn output_relative(&self, path: &Path) -> String {
        let root = fs::canonicalize(&self.output_root).unwrap_or_else(|_| self.output_root.clone());

        let relative = path
            .strip_prefix(&root)
            .or_else(|_| path.strip_prefix(&self.output_root))
            .unwrap_or(path);

        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Stylesheets from the last browser run, relative to the output root.
    pub fn generated_stylesheets(&self) -> &[String] {
        &self.generated_stylesheets
    }

    /// Files from the last run that `cleanup` will remove.
    pub fn transient_files(&self) -> &[PathBuf] {
        &self.transient_files
    }

    /// Expected location of the server bundle.
    pub fn server_bundle_path(&self) -> PathBuf {
        Target::Server.bundle_path(&self.output_root)
    }

    /// Remove the files recorded from transient targets, then any of their
    /// directories left empty. Returns the number of files removed.
    pub fn cleanup(&mut self) -> Result<usize, BundleError> {
        let assets = std::mem::take(&mut self.transient_files);
        let mut dirs = BTreeSet::new();
        let mut removed = 0;

        for path in &assets {
            match fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(BundleError::Io {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })
                }
            }
            if let Some(parent) = path.parent() {
                dirs.insert(parent.to_path_buf());
            }
        }
        for target in Target::ALL {
            if target.policy().binary_assets == BinaryAssets::Transient {
                dirs.insert(target.output_dir(&self.output_root));
            }
        }

        // Deepest first; non-empty directories stay
        let mut dirs: Vec<PathBuf> = dirs.into_iter().collect();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            match fs::remove_dir(&dir) {
                Ok(()) => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::DirectoryNotEmpty
                    ) => {}
                Err(e) => tracing::debug!("Kept directory {}: {}", dir.display(), e),
            }
        }

        tracing::debug!("Removed {} transient files", removed);

        Ok(removed)
    }
}
