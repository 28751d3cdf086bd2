//! Document template.

use minijinja::{AutoEscape, Environment};
use serde::Serialize;

/// A `<link>` tag for a favicon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaviconLink {
    /// `icon` or `shortcut icon`
    pub rel: &'static str,
    /// MIME type, absent for remote icons
    pub mime: Option<&'static str>,
    pub href: String,
}

/// A `<meta>` tag for social sharing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaTag {
    /// `property` for Open Graph, `name` for Twitter
    pub attr: &'static str,
    pub key: &'static str,
    pub content: String,
}

/// Context for rendering the document template.
///
/// String fields are raw; the template escapes them. The `*_json` fields are
/// already safe script literals.
#[derive(Debug, Clone, Serialize)]
pub struct Context {
    pub theme: String,
    pub base_href: Option<String>,
    pub title: String,
    pub description: String,
    pub favicons: Vec<FaviconLink>,
    pub sharing: Vec<MetaTag>,
    pub keywords: Option<String>,
    pub stylesheets: Vec<String>,
    pub baseline_css: String,
    pub markup: String,
    pub client_script: String,
    pub hydrate_global: String,
    pub page_json: String,
    pub navigation_json: String,
    pub analytics_json: String,
    pub theme_json: String,
    pub scripts: Vec<String>,
}

/// Template engine using minijinja.
///
/// Auto-escaping is off: user text goes through the `esc` filter, which
/// escapes exactly `& < > " '`.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create a new template engine with the document template.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_filter("esc", |value: String| escape_html(&value));

        env.add_template_owned("document.html".to_string(), DOCUMENT_TEMPLATE.to_string())
            .expect("Failed to add document template");

        Self { env }
    }

    /// Render the document.
    pub fn render_document(&self, context: &Context) -> Result<String, minijinja::Error> {
        self.env.get_template("document.html")?.render(context)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape text for HTML text and attribute positions.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Layout, loading and error presentation shipped inline with every page.
pub const BASELINE_CSS: &str = r#"html, body {
  margin: 0;
  padding: 0;
  min-height: 100%;
}

#root {
  min-height: 100vh;
}

.tessera-loading {
  display: flex;
  align-items: center;
  justify-content: center;
  min-height: 100vh;
  font-family: system-ui, -apple-system, sans-serif;
  color: #666;
}

.ssr-error,
.hydration-error {
  margin: 2rem auto;
  max-width: 800px;
  padding: 1.5rem;
  border: 1px solid #e5484d;
  border-radius: 0.5rem;
  background: #fff5f5;
  color: #3b0d0c;
  font-family: system-ui, -apple-system, sans-serif;
}

.ssr-error pre,
.hydration-error pre {
  overflow-x: auto;
  padding: 1rem;
  background: #fff;
  border-radius: 0.375rem;
  font-size: 0.875rem;
  white-space: pre-wrap;
}
"#;

const DOCUMENT_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en" data-theme="{{ theme|esc }}">
<head>
{% if base_href %}
  <base href="{{ base_href|esc }}">
{% endif %}
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ title|esc }}</title>
  <meta name="description" content="{{ description|esc }}">
{% for link in favicons %}
  <link rel="{{ link.rel }}"{% if link.mime %} type="{{ link.mime }}"{% endif %} href="{{ link.href|esc }}">
{% endfor %}
{% for tag in sharing %}
  <meta {{ tag.attr }}="{{ tag.key }}" content="{{ tag.content|esc }}">
{% endfor %}
{% if keywords %}
  <meta name="keywords" content="{{ keywords|esc }}">
{% endif %}
{% for style in stylesheets %}
  <link rel="stylesheet" href="{{ style|esc }}">
{% endfor %}
  <style>{{ baseline_css }}</style>
</head>
<body>
  <div id="root">{% if markup %}{{ markup }}{% else %}<div class="tessera-loading" aria-busy="true">Loading...</div>{% endif %}</div>
  <script src="{{ client_script|esc }}"></script>
  <script>
    (function () {
      var pageContent = {{ page_json }};
      var navigation = {{ navigation_json }};
      var analytics = {{ analytics_json }};
      var theme = {{ theme_json }};

      function showHydrationError(error) {
        var root = document.getElementById('root');
        if (!root) return;
        var message = error && error.message ? error.message : String(error);
        var panel = document.createElement('div');
        panel.className = 'hydration-error';
        var heading = document.createElement('h2');
        heading.textContent = 'Hydration Error';
        var text = document.createElement('p');
        text.textContent = message;
        var details = document.createElement('pre');
        details.textContent = JSON.stringify({
          userAgent: navigator.userAgent,
          pageContent: pageContent,
          error: message
        }, null, 2);
        panel.appendChild(heading);
        panel.appendChild(text);
        panel.appendChild(details);
        root.innerHTML = '';
        root.appendChild(panel);
      }

      function initialize() {
        if (typeof window.{{ hydrate_global }} !== 'function') {
          setTimeout(initialize, 100);
          return;
        }
        try {
          var result = window.{{ hydrate_global }}({
            container: document.getElementById('root'),
            pageContent: pageContent,
            theme: theme,
            navigation: navigation,
            analytics: analytics
          });
          if (result && typeof result.then === 'function') {
            result.then(null, showHydrationError);
          }
        } catch (error) {
          console.error('Hydration failed:', error);
          showHydrationError(error);
        }
      }

      if (document.readyState === 'loading') {
        document.addEventListener('DOMContentLoaded', initialize);
      } else {
        initialize();
      }
    })();
  </script>
{% for script in scripts %}
  <script src="{{ script|esc }}"></script>
{% endfor %}
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> Context {
        Context {
            theme: "light".to_string(),
            base_href: None,
            title: "Home".to_string(),
            description: String::new(),
            favicons: vec![],
            sharing: vec![],
            keywords: None,
            stylesheets: vec!["tessera-client.css".to_string()],
            baseline_css: "#root{}".to_string(),
            markup: "<main>Hi</main>".to_string(),
            client_script: "tessera-client.js".to_string(),
            hydrate_global: "tesseraHydrate".to_string(),
            page_json: "{}".to_string(),
            navigation_json: "null".to_string(),
            analytics_json: "null".to_string(),
            theme_json: "\"light\"".to_string(),
            scripts: vec![],
        }
    }

    #[test]
    fn escape_html_works() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("assets/logo.svg"), "assets/logo.svg");
    }

    #[test]
    fn renders_document_shell() {
        let html = TemplateEngine::new().render_document(&context()).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"<html lang="en" data-theme="light">"#));
        assert!(html.contains("<title>Home</title>"));
        assert!(html.contains(r#"<link rel="stylesheet" href="tessera-client.css">"#));
        assert!(html.contains(r#"<div id="root"><main>Hi</main></div>"#));
        assert!(html.contains(r#"<script src="tessera-client.js"></script>"#));
        assert!(html.contains("typeof window.tesseraHydrate !== 'function'"));
        assert!(html.contains("setTimeout(initialize, 100)"));
        assert!(!html.contains("<base"));
    }

    #[test]
    fn shows_loading_indicator_without_markup() {
        let mut ctx = context();
        ctx.markup = String::new();

        let html = TemplateEngine::new().render_document(&ctx).unwrap();

        assert!(html.contains(r#"<div id="root"><div class="tessera-loading""#));
    }

    #[test]
    fn escapes_user_text_but_not_markup() {
        let mut ctx = context();
        ctx.title = "<script>alert(1)</script>".to_string();
        ctx.markup = "<b>bold</b>".to_string();

        let html = TemplateEngine::new().render_document(&ctx).unwrap();

        assert!(html.contains("<title>&lt;script&gt;alert(1)&lt;/script&gt;</title>"));
        assert!(html.contains("<b>bold</b>"));
    }
}
