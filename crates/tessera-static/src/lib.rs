//! Static site generation for tessera.
//!
//! Bundles the site's components once, pre-renders every page through the
//! server bundle, and writes one self-contained HTML document per page.

pub mod assets;
pub mod builder;
pub mod document;
pub mod renderer;
pub mod templates;

pub use builder::{BuildConfig, BuildError, BuildResult, StaticBuilder};
pub use document::{DocumentAssembler, DocumentError};
pub use renderer::{
    LoadedBundle, NodeRuntime, RenderError, RenderRequest, RuntimeError, ScriptRuntime,
    ServerRenderer,
};
pub use tessera_bundle::ToolchainConfig;
