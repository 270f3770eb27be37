//! Builds a step's instructions as a single HTML document.
//!
//! The source is `_doc/index.html`, or `_doc/index.md` passed through a
//! [`DocRenderer`]. Images referenced from the document are inlined as
//! base64 `data:` URIs so the result is self-contained.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;

use crate::error::GrindError;

const DOC_PREFIX: &str = "_doc/";
const INDEX_HTML: &str = "_doc/index.html";
const INDEX_MD: &str = "_doc/index.md";

/// The `src` attribute of an `<img>` tag, single or double quoted.
static IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("image source pattern is valid")
});

/// Turns markdown into HTML.
pub trait DocRenderer: Send + Sync {
    /// Renders a markdown document to an HTML fragment.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be rendered.
    fn render_markdown(&self, markdown: &str) -> Result<String, GrindError>;
}

/// Renderer that escapes markdown into a `<pre>` block.
pub struct PreformattedRenderer;

impl DocRenderer for PreformattedRenderer {
    fn render_markdown(&self, markdown: &str) -> Result<String, GrindError> {
        Ok(format!("<pre>{}</pre>\n", escape_html(markdown)))
    }
}

/// Builds the instructions for a step from its `_doc/` files.
///
/// # Errors
///
/// Returns a validation error if there is no index document, an image
/// reference points at a missing file, or an image has an unknown type.
pub fn build_instructions(
    files: &BTreeMap<String, String>,
    docs: &dyn DocRenderer,
) -> Result<String, GrindError> {
    let mut used: BTreeMap<&str, bool> = files
        .keys()
        .filter(|name| name.starts_with(DOC_PREFIX))
        .map(|name| (name.as_str(), false))
        .collect();

    let html = if let Some(html) = files.get(INDEX_HTML) {
        used.insert(INDEX_HTML, true);
        html.clone()
    } else if let Some(markdown) = files.get(INDEX_MD) {
        used.insert(INDEX_MD, true);
        docs.render_markdown(markdown)?
    } else {
        return Err(GrindError::Validation(
            "no documentation found: checked _doc/index.html and _doc/index.md".into(),
        ));
    };

    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for caps in IMG_SRC.captures_iter(&html) {
        let Some(src) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        if src.as_str().starts_with("data:") {
            continue;
        }
        let (key, contents) = files
            .get_key_value(&format!("{DOC_PREFIX}{}", src.as_str()))
            .ok_or_else(|| {
                GrindError::Validation(format!(
                    "image tag found, but image file not found: {}",
                    src.as_str()
                ))
            })?;
        let mime = image_mime(src.as_str())?;
        tracing::debug!(image = src.as_str(), "encoding image as base64 data URI");
        used.insert(key.as_str(), true);

        out.push_str(&html[last..src.start()]);
        out.push_str("data:");
        out.push_str(mime);
        out.push_str(";base64,");
        out.push_str(&STANDARD.encode(contents.as_bytes()));
        last = src.end();
    }
    out.push_str(&html[last..]);

    for (name, _) in used.iter().filter(|(_, used)| !**used) {
        tracing::warn!(file = *name, "file was not used in the instructions");
    }

    Ok(out)
}

fn image_mime(src: &str) -> Result<&'static str, GrindError> {
    let lower = src.to_ascii_lowercase();
    let mime = match lower.rsplit_once('.').map(|(_, ext)| ext) {
        Some("gif") => "image/gif",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        _ => {
            return Err(GrindError::Validation(format!(
                "image tag found, but image type is unknown: {src}"
            )))
        }
    };
    Ok(mime)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn prefers_html_index() {
        let f = files(&[("_doc/index.html", "<h1>Hi</h1>"), ("_doc/index.md", "# Hi")]);
        let html = build_instructions(&f, &PreformattedRenderer).unwrap();
        assert_eq!(html, "<h1>Hi</h1>");
    }

    #[test]
    fn falls_back_to_markdown() {
        let f = files(&[("_doc/index.md", "a < b")]);
        let html = build_instructions(&f, &PreformattedRenderer).unwrap();
        assert_eq!(html, "<pre>a &lt; b</pre>\n");
    }

    #[test]
    fn missing_index_is_rejected() {
        let f = files(&[("main.py", "print(1)")]);
        let err = build_instructions(&f, &PreformattedRenderer).unwrap_err();
        assert!(err.to_string().contains("no documentation found"));
    }

    #[test]
    fn images_are_inlined() {
        let f = files(&[
            ("_doc/index.html", r#"<p><img alt="x" src="fig.svg"></p>"#),
            ("_doc/fig.svg", "<svg/>"),
        ]);
        let html = build_instructions(&f, &PreformattedRenderer).unwrap();
        let expected = format!(
            r#"<p><img alt="x" src="data:image/svg+xml;base64,{}"></p>"#,
            STANDARD.encode("<svg/>")
        );
        assert_eq!(html, expected);
    }

    #[test]
    fn single_quoted_sources_are_inlined_and_data_src_is_left_alone() {
        let f = files(&[
            ("_doc/index.html", r#"<img data-src="lazy.png" src='a.png'><img data-src="lazy.png">"#),
            ("_doc/a.png", "PNG"),
        ]);
        let html = build_instructions(&f, &PreformattedRenderer).unwrap();
        let expected = format!(
            r#"<img data-src="lazy.png" src='data:image/png;base64,{}'><img data-src="lazy.png">"#,
            STANDARD.encode("PNG")
        );
        assert_eq!(html, expected);
    }

    #[test]
    fn missing_or_unknown_images_are_rejected() {
        let missing = files(&[("_doc/index.html", r#"<img src="gone.png">"#)]);
        assert!(build_instructions(&missing, &PreformattedRenderer).is_err());

        let unknown = files(&[
            ("_doc/index.html", r#"<img src="fig.bmp">"#),
            ("_doc/fig.bmp", "BM"),
        ]);
        let err = build_instructions(&unknown, &PreformattedRenderer).unwrap_err();
        assert!(err.to_string().contains("unknown"));
    }
}
