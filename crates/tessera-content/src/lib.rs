//! Page description model for tessera.
//!
//! This crate parses YAML page descriptions and navigation files, loads the
//! analytics configuration, and expands embedded markdown into the component
//! framework's block format before rendering.

pub mod analytics;
pub mod navigation;
pub mod page;
pub mod script;
pub mod transform;

pub use analytics::AnalyticsConfig;
pub use navigation::{load_navigation, Navigation};
pub use page::{parse_page, read_page, PageContent, PageMeta, ParseError, Sharing};
pub use script::to_script_json;
pub use transform::{ContentTransformer, MarkdownTransformer, TransformError};
