//! Entry synthesis and dual-target bundling.
//!
//! This crate discovers user components, writes the browser and server entry
//! modules that wire them to the framework runtime, and drives an external
//! bundler once per target.

pub mod adapter;
pub mod bundler;
pub mod entry;
pub mod esbuild;
pub mod registry;
pub mod target;
pub mod toolchain;

pub use adapter::DualTargetBuild;
pub use bundler::{BundleError, BundleOutput, BundleRequest, Bundler, Diagnostics};
pub use entry::{EntryFiles, EntrySynthesizer, HYDRATE_GLOBAL};
pub use esbuild::EsbuildBundler;
pub use registry::{ComponentDescriptor, ComponentManifest, RegistryError};
pub use target::{AssetPolicy, BinaryAssets, Builtins, OutputFormat, StyleHandling, Target};
pub use toolchain::ToolchainConfig;
