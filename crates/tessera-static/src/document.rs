//! HTML document assembly.

use std::path::Path;
use std::sync::Arc;

use tessera_bundle::{ComponentManifest, Target, HYDRATE_GLOBAL};
use tessera_content::{
    to_script_json, AnalyticsConfig, ContentTransformer, Navigation, PageContent, Sharing,
};

use crate::assets::{is_remote, AssetPipeline, ASSETS_DIR};
use crate::builder::BuildConfig;
use crate::renderer::{RenderError, ServerRenderer};
use crate::templates::{Context, FaviconLink, MetaTag, TemplateEngine, BASELINE_CSS};

/// Title used when a page has none.
pub const UNTITLED: &str = "Untitled";

/// Errors that can occur while assembling a document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to serialize page data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to render template: {0}")]
    Template(#[from] minijinja::Error),
}

/// Turns page descriptions into complete HTML documents.
///
/// Owns the renderer for one build.
pub struct DocumentAssembler {
    config: Arc<BuildConfig>,
    renderer: ServerRenderer,
    transformer: Arc<dyn ContentTransformer>,
    templates: TemplateEngine,
    baseline_css: String,
}

impl DocumentAssembler {
    pub fn new(
        config: Arc<BuildConfig>,
        renderer: ServerRenderer,
        transformer: Arc<dyn ContentTransformer>,
    ) -> Self {
        let baseline_css = AssetPipeline::baseline_css(config.minify).unwrap_or_else(|e| {
            tracing::warn!("Failed to minify baseline styles: {}", e);
            BASELINE_CSS.to_string()
        });

        Self {
            config,
            renderer,
            transformer,
            templates: TemplateEngine::new(),
            baseline_css,
        }
    }

    /// The renderer used for pre-rendering.
    pub fn renderer(&self) -> &ServerRenderer {
        &self.renderer
    }

    /// Assemble the document for one page.
    ///
    /// A failed content transform falls back to the page as written. The
    /// server bundle is loaded on first use; a missing bundle is an error.
    pub async fn render(
        &mut self,
        page: &PageContent,
        navigation: Option<&Navigation>,
        manifest: &ComponentManifest,
        generated_stylesheets: &[String],
        filename: Option<&str>,
        analytics: Option<&AnalyticsConfig>,
    ) -> Result<String, DocumentError> {
        let name = filename.unwrap_or("page");

        let content = match self.transformer.transform(page, "en") {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Content transform failed for {}: {}", name, e);
                page.clone()
            }
        };

        let navigation = content.navigation.as_ref().or(navigation);

        if !self.renderer.is_loaded() {
            self.renderer.load_server_bundle()?;
        }
        let markup = self
            .renderer
            .render_to_html(&content, navigation, filename, analytics)
            .await?;

        tracing::debug!(
            "Assembling {} ({} components available)",
            name,
            manifest.len()
        );

        let context = self.context(&content, navigation, generated_stylesheets, analytics, markup)?;
        Ok(self.templates.render_document(&context)?)
    }

    fn context(
        &self,
        page: &PageContent,
        navigation: Option<&Navigation>,
        generated_stylesheets: &[String],
        analytics: Option<&AnalyticsConfig>,
        markup: String,
    ) -> Result<Context, DocumentError> {
        let theme = page.theme().unwrap_or(&self.config.theme).to_string();

        let base_href = match self.config.base_url.as_str() {
            "" | "/" => None,
            url => Some(url.to_string()),
        };

        let keywords = page.keywords();
        let keywords = (!keywords.is_empty()).then(|| keywords.join(", "));

        let stylesheets = generated_stylesheets
            .iter()
            .chain(page.css.iter())
            .cloned()
            .collect();

        Ok(Context {
            theme_json: to_script_json(&theme)?,
            theme,
            base_href,
            title: page.title().unwrap_or(UNTITLED).to_string(),
            description: page.description().unwrap_or_default().to_string(),
            favicons: favicon_links(self.config.favicon.as_deref()),
            sharing: sharing_tags(page.sharing()),
            keywords,
            stylesheets,
            baseline_css: self.baseline_css.clone(),
            markup,
            client_script: Target::Browser.policy().bundle_name.to_string(),
            hydrate_global: HYDRATE_GLOBAL.to_string(),
            page_json: to_script_json(page)?,
            navigation_json: to_script_json(&navigation)?,
            analytics_json: to_script_json(&analytics)?,
            scripts: page.js.clone(),
        })
    }
}

/// Link tags for the configured favicon.
pub fn favicon_links(favicon: Option<&str>) -> Vec<FaviconLink> {
    let Some(favicon) = favicon.filter(|f| !f.is_empty()) else {
        return Vec::new();
    };

    if is_remote(favicon) {
        return vec![FaviconLink {
            rel: "icon",
            mime: None,
            href: favicon.to_string(),
        }];
    }

    let path = Path::new(favicon);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| favicon.to_string());

    let mime = Some(favicon_mime(&extension));
    let href = format!("{}/{}", ASSETS_DIR, file_name);

    let mut links = vec![FaviconLink {
        rel: "icon",
        mime,
        href: href.clone(),
    }];
    if extension == "ico" {
        links.push(FaviconLink {
            rel: "shortcut icon",
            mime,
            href,
        });
    }
    links
}

fn favicon_mime(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "image/x-icon",
    }
}

/// Open Graph and Twitter Card tags for a page's sharing metadata.
pub fn sharing_tags(sharing: Option<&Sharing>) -> Vec<MetaTag> {
    let Some(sharing) = sharing else {
        return Vec::new();
    };

    let mut tags = Vec::new();
    if sharing.title.is_some() || sharing.description.is_some() {
        tags.push(MetaTag {
            attr: "name",
            key: "twitter:card",
            content: "summary_large_image".to_string(),
        });
    }

    let fields = [
        (&sharing.title, "og:title", "twitter:title"),
        (&sharing.description, "og:description", "twitter:description"),
        (&sharing.image, "og:image", "twitter:image"),
    ];
    for (value, og, twitter) in fields {
        if let Some(value) = value {
            tags.push(MetaTag {
                attr: "property",
                key: og,
                content: value.clone(),
            });
            tags.push(MetaTag {
                attr: "name",
                key: twitter,
                content: value.clone(),
            });
        }
    }

    tags
}
