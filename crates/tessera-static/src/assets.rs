//! Static asset handling: assets directory, favicon and the baseline style.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::templates::BASELINE_CSS;

/// Directory under the output root that assets are copied into.
pub const ASSETS_DIR: &str = "assets";

/// Errors that can occur while handling assets.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Assets directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Favicon not found: {0}")]
    FaviconNotFound(String),

    #[error("Failed to copy {from} to {to}: {message}")]
    Copy {
        from: String,
        to: String,
        message: String,
    },

    #[error("CSS error: {0}")]
    Css(String),
}

/// Asset pipeline utilities.
pub struct AssetPipeline;

impl AssetPipeline {
    /// Copy every file under `source` into `dest`, keeping relative paths.
    /// Returns the number of files copied.
    pub fn copy_dir(source: &Path, dest: &Path) -> Result<usize, AssetError> {
        if !source.is_dir() {
            return Err(AssetError::DirectoryNotFound(source.display().to_string()));
        }

        let mut copied = 0;
        for entry in WalkDir::new(source)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
            copy_file(entry.path(), &dest.join(relative))?;
            copied += 1;
        }

        Ok(copied)
    }

    /// Copy a local favicon flat into `dest_dir`.
    ///
    /// The favicon is looked up as given, then inside `search_dir` by its
    /// relative path and by its file name. Returns the destination path.
    pub fn copy_favicon(
        favicon: &str,
        search_dir: Option<&Path>,
        dest_dir: &Path,
    ) -> Result<PathBuf, AssetError> {
        let given = Path::new(favicon);
        let file_name = given
            .file_name()
            .ok_or_else(|| AssetError::FaviconNotFound(favicon.to_string()))?;

        let mut candidates = vec![given.to_path_buf()];
        if let Some(dir) = search_dir {
            candidates.push(dir.join(given));
            candidates.push(dir.join(file_name));
        }

        let source = candidates
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| AssetError::FaviconNotFound(favicon.to_string()))?;

        let dest = dest_dir.join(file_name);
        copy_file(&source, &dest)?;
        Ok(dest)
    }

    /// Baseline layout, loading and error styles, minified on request.
    pub fn baseline_css(minify: bool) -> Result<String, AssetError> {
        if minify {
            Self::minify_css(BASELINE_CSS)
        } else {
            Ok(BASELINE_CSS.to_string())
        }
    }

    /// Minify CSS using lightningcss.
    pub fn minify_css(css: &str) -> Result<String, AssetError> {
        use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

        let stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| AssetError::Css(format!("parse error: {}", e)))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| AssetError::Css(format!("minify error: {}", e)))?;

        Ok(minified.code)
    }
}

/// Whether a favicon value is a remote URL rather than a local file.
pub fn is_remote(favicon: &str) -> bool {
    favicon.starts_with("http://") || favicon.starts_with("https://")
}

fn copy_file(from: &Path, to: &Path) -> Result<(), AssetError> {
    let err = |e: std::io::Error| AssetError::Copy {
        from: from.display().to_string(),
        to: to.display().to_string(),
        message: e.to_string(),
    };

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(err)?;
    }
    fs::copy(from, to).map_err(err)?;
    Ok(())
}
