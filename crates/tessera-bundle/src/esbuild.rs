//! esbuild CLI adapter.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;

use crate::bundler::{BundleError, BundleOutput, BundleRequest, Bundler, Diagnostics};
use crate::target::{Builtins, OutputFormat, StyleHandling, BINARY_ASSET_EXTENSIONS};

/// Resource file names, relative to the target's output directory.
const ASSET_NAMES: &str = "assets/[name]-[hash]";

/// Runs the `esbuild` executable.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    binary: PathBuf,
}

impl EsbuildBundler {
    /// Create an adapter for the given esbuild executable.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Command line arguments for a request.
    ///
    /// esbuild runs inside the package root, so every path handed to it is
    /// absolute.
    pub fn args(&self, request: &BundleRequest, metafile: &Path) -> Vec<OsString> {
        let policy = request.target.policy();

        let mut args: Vec<OsString> = vec![
            absolute(&request.entry).into(),
            "--bundle".into(),
            flag("--outfile=", &absolute(&request.bundle_path())),
            flag("--metafile=", &absolute(metafile)),
            "--log-level=warning".into(),
            "--log-limit=0".into(),
            "--color=false".into(),
        ];

        args.push(match policy.format {
            OutputFormat::Iife => "--format=iife".into(),
            OutputFormat::CommonJs => "--format=cjs".into(),
        });

        match policy.builtins {
            Builtins::Shim => {
                args.push("--platform=browser".into());
                args.push("--define:global=globalThis".into());
                args.push("--define:process.env.NODE_ENV=\"production\"".into());
            }
            Builtins::External => {
                // Node platform leaves every built-in module as an external require
                args.push("--platform=node".into());
            }
        }

        if policy.styles == StyleHandling::Suppress {
            args.push("--loader:.css=empty".into());
        }

        // Same names on both targets so resource URLs match; transient files
        // are removed by the adapter's cleanup
        args.push(format!("--asset-names={}", ASSET_NAMES).into());
        for ext in BINARY_ASSET_EXTENSIONS {
            args.push(format!("--loader:.{}=file", ext).into());
        }

        if request.minify {
            args.push("--minify".into());
        }
        if request.source_maps {
            args.push("--sourcemap".into());
        }

        args
    }

    /// A bare command name is looked up on `PATH`; anything with a directory
    /// part is taken relative to our own working directory.
    fn program(&self) -> PathBuf {
        if self.binary.components().count() > 1 {
            absolute(&self.binary)
        } else {
            self.binary.clone()
        }
    }
}

impl Default for EsbuildBundler {
    fn default() -> Self {
        Self::new("esbuild")
    }
}

#[async_trait]
impl Bundler for EsbuildBundler {
    fn name(&self) -> &'static str {
        "esbuild"
    }

    async fn bundle(&self, request: &BundleRequest) -> Result<BundleOutput, BundleError> {
        let output_dir = absolute(&request.output_dir());
        fs::create_dir_all(&output_dir).map_err(|e| BundleError::Io {
            path: output_dir.display().to_string(),
            message: e.to_string(),
        })?;
        let working_dir = absolute(&request.working_dir);

        let metafile = output_dir.join(format!(
            ".{}.meta.json",
            request.target.policy().bundle_name
        ));

        tracing::debug!(
            "Running {} for {} target: {}",
            self.binary.display(),
            request.target.name(),
            request.entry.display()
        );

        let output = Command::new(self.program())
            .args(self.args(request, &metafile))
            .current_dir(&working_dir)
            .output()
            .await
            .map_err(|e| BundleError::Spawn {
                tool: self.binary.display().to_string(),
                message: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut diagnostics = parse_diagnostics(&stderr);

        if !output.status.success() {
            if diagnostics.errors.is_empty() {
                diagnostics.errors.push(format!(
                    "esbuild exited with {}: {}",
                    output.status,
                    stderr.trim()
                ));
            }
            let _ = fs::remove_file(&metafile);
            return Ok(BundleOutput {
                outputs: Vec::new(),
                diagnostics,
            });
        }

        let meta = fs::read_to_string(&metafile)
            .map_err(|e| BundleError::Metafile(format!("{}: {}", metafile.display(), e)))?;
        let _ = fs::remove_file(&metafile);

        let outputs = parse_metafile_outputs(&meta, &working_dir)?;

        Ok(BundleOutput {
            outputs,
            diagnostics,
        })
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn flag(name: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(name);
    arg.push(path.as_os_str());
    arg
}

#[derive(Deserialize)]
struct Metafile {
    #[serde(default)]
    outputs: serde_json::Map<String, serde_json::Value>,
}

/// Output paths from an esbuild metafile, made absolute against the
/// directory esbuild ran in.
fn parse_metafile_outputs(meta: &str, working_dir: &Path) -> Result<Vec<PathBuf>, BundleError> {
    let meta: Metafile =
        serde_json::from_str(meta).map_err(|e| BundleError::Metafile(e.to_string()))?;

    Ok(meta
        .outputs
        .keys()
        .map(|key| {
            let joined = working_dir.join(key);
            fs::canonicalize(&joined).unwrap_or(joined)
        })
        .collect())
}

/// Parse esbuild's plain-text log output.
fn parse_diagnostics(stderr: &str) -> Diagnostics {
    static HEADER: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(?:✘|X|▲)\s+\[(ERROR|WARNING)\]\s+(.+?)\s*$")
            .expect("Invalid diagnostic regex")
    });
    static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s+(\S+:\d+:\d+):\s*$").expect("Invalid location regex")
    });

    let mut diagnostics = Diagnostics::default();
    let lines: Vec<&str> = stderr.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = HEADER.captures(line) else {
            continue;
        };

        let mut message = caps[2].to_string();
        let location = lines[i + 1..]
            .iter()
            .find(|l| !l.trim().is_empty())
            .and_then(|l| LOCATION.captures(l));
        if let Some(loc) = location {
            message = format!("{} ({})", message, &loc[1]);
        }

        if &caps[1] == "ERROR" {
            diagnostics.errors.push(message);
        } else {
            diagnostics.warnings.push(message);
        }
    }

    diagnostics
}
