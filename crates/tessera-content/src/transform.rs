//! Markdown expansion into framework blocks.

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag};
use serde_json::{json, Map, Value};

use crate::page::PageContent;

/// Transforms page content before it is rendered.
pub trait ContentTransformer: Send + Sync {
    /// Return the transformed content for the given language.
    fn transform(&self, content: &PageContent, lang: &str) -> Result<PageContent, TransformError>;
}

/// Errors that can occur during content transformation.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Invalid markdown block at {path}: {reason}")]
    InvalidBlock { path: String, reason: String },
}

/// Expands `type: markdown` blocks into heading, code and html blocks.
///
/// Nested `blocks` arrays are expanded too.
#[derive(Debug, Default)]
pub struct MarkdownTransformer;

impl MarkdownTransformer {
    /// Create a new markdown transformer.
    pub fn new() -> Self {
        Self
    }

    fn expand_blocks(
        &self,
        blocks: &[Value],
        lang: &str,
        path: &str,
    ) -> Result<Vec<Value>, TransformError> {
        let mut out = Vec::with_capacity(blocks.len());

        for (index, block) in blocks.iter().enumerate() {
            let block_path = format!("{}[{}]", path, index);

            let Some(object) = block.as_object() else {
                out.push(block.clone());
                continue;
            };

            if object.get("type").and_then(Value::as_str) == Some("markdown") {
                let source = object
                    .get("content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| TransformError::InvalidBlock {
                        path: block_path.clone(),
                        reason: "missing string `content`".to_string(),
                    })?;
                out.extend(markdown_to_blocks(source, lang));
                continue;
            }

            let mut object = object.clone();
            let expanded = match object.get("blocks") {
                Some(Value::Array(children)) => {
                    Some(self.expand_blocks(children, lang, &format!("{}.blocks", block_path))?)
                }
                _ => None,
            };
            if let Some(expanded) = expanded {
                object.insert("blocks".to_string(), Value::Array(expanded));
            }
            out.push(Value::Object(object));
        }

        Ok(out)
    }
}

impl ContentTransformer for MarkdownTransformer {
    fn transform(&self, content: &PageContent, lang: &str) -> Result<PageContent, TransformError> {
        let blocks = self.expand_blocks(&content.blocks, lang, "blocks")?;

        Ok(PageContent {
            blocks,
            ..content.clone()
        })
    }
}

/// Convert markdown source to a list of blocks, one per top-level element.
pub fn markdown_to_blocks(source: &str, lang: &str) -> Vec<Value> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let mut blocks = Vec::new();
    let mut chunk: Vec<Event> = Vec::new();
    let mut depth = 0usize;

    for event in Parser::new_ext(source, options) {
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth = depth.saturating_sub(1),
            _ => {}
        }

        chunk.push(event);

        if depth == 0 {
            blocks.push(chunk_to_block(std::mem::take(&mut chunk), lang));
        }
    }

    if !chunk.is_empty() {
        blocks.push(chunk_to_block(chunk, lang));
    }

    blocks
}

enum ChunkKind {
    Heading(u8),
    Code(String),
    Html,
}

fn chunk_to_block(chunk: Vec<Event>, lang: &str) -> Value {
    let kind = match chunk.first() {
        Some(Event::Start(Tag::Heading { level, .. })) => ChunkKind::Heading(*level as u8),
        Some(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))) => {
            ChunkKind::Code(info.split_whitespace().next().unwrap_or("").to_string())
        }
        Some(Event::Start(Tag::CodeBlock(CodeBlockKind::Indented))) => ChunkKind::Code(String::new()),
        _ => ChunkKind::Html,
    };

    match kind {
        ChunkKind::Heading(level) => {
            let text = plain_text(&chunk);
            json!({
                "type": "heading",
                "level": level,
                "id": slugify(&text),
                "text": text,
            })
        }
        ChunkKind::Code(language) => {
            let mut block = Map::new();
            block.insert("type".to_string(), Value::from("code"));
            if !language.is_empty() {
                block.insert("language".to_string(), Value::from(language));
            }
            block.insert("code".to_string(), Value::from(plain_text(&chunk)));
            Value::Object(block)
        }
        ChunkKind::Html => {
            let mut content = String::new();
            html::push_html(&mut content, chunk.into_iter());
            json!({
                "type": "html",
                "lang": lang,
                "content": content.trim_end(),
            })
        }
    }
}

fn plain_text(chunk: &[Event]) -> String {
    chunk
        .iter()
        .filter_map(|event| match event {
            Event::Text(text) | Event::Code(text) => Some(text.as_ref()),
            Event::SoftBreak | Event::HardBreak => Some(" "),
            _ => None,
        })
        .collect()
}

/// Convert a heading to a URL-safe slug.
fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::parse_page;
    use pretty_assertions::assert_eq;

    #[test]
    fn expands_markdown_block() {
        let page = parse_page(
            r#"
blocks:
  - type: markdown
    content: |
      # Getting Started

      Some *intro* text.

      ```rust
      fn main() {}
      ```
  - type: hero
    title: Kept
"#,
        )
        .unwrap();

        let out = MarkdownTransformer::new().transform(&page, "en").unwrap();

        assert_eq!(out.blocks.len(), 4);
        assert_eq!(out.blocks[0]["type"], "heading");
        assert_eq!(out.blocks[0]["level"], 1);
        assert_eq!(out.blocks[0]["text"], "Getting Started");
        assert_eq!(out.blocks[0]["id"], "getting-started");
        assert_eq!(out.blocks[1]["type"], "html");
        assert_eq!(out.blocks[1]["content"], "<p>Some <em>intro</em> text.</p>");
        assert_eq!(out.blocks[1]["lang"], "en");
        assert_eq!(out.blocks[2]["type"], "code");
        assert_eq!(out.blocks[2]["language"], "rust");
        assert_eq!(out.blocks[2]["code"], "fn main() {}\n");
        assert_eq!(out.blocks[3]["title"], "Kept");
    }

    #[test]
    fn expands_nested_blocks() {
        let page = parse_page(
            r#"
blocks:
  - type: columns
    blocks:
      - type: markdown
        content: "- one\n- two"
"#,
        )
        .unwrap();

        let out = MarkdownTransformer::new().transform(&page, "en").unwrap();
        let children = out.blocks[0]["blocks"].as_array().unwrap();

        assert_eq!(children.len(), 1);
        assert!(children[0]["content"].as_str().unwrap().starts_with("<ul>"));
    }

    #[test]
    fn rejects_markdown_block_without_content() {
        let page = parse_page("blocks:\n  - type: markdown\n").unwrap();

        let err = MarkdownTransformer::new().transform(&page, "en").unwrap_err();

        assert!(err.to_string().contains("blocks[0]"));
    }

    #[test]
    fn leaves_metadata_untouched() {
        let page = parse_page("meta:\n  title: Same\nblocks: []\n").unwrap();
        let out = MarkdownTransformer::new().transform(&page, "en").unwrap();
        assert_eq!(out, page);
    }

    #[test]
    fn slugify_works() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Button (Primary)"), "button-primary");
    }
}
