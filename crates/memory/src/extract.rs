//! Plain-text extraction from page HTML.

use scraper::{ElementRef, Html};

/// Elements whose whole subtree is dropped.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "footer", "iframe", "noscript"];

/// Visible text of `html`, with script/style/navigation chrome removed and
/// whitespace collapsed to single spaces.
pub fn extract_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let document = Html::parse_document(html);
    let mut pieces = Vec::new();
    collect_text(document.root_element(), &mut pieces);
    collapse_whitespace(&pieces.join(" "))
}

fn collect_text<'a>(element: ElementRef<'a>, out: &mut Vec<&'a str>) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.iter().any(|skipped| *skipped == name) {
        return;
    }
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            collect_text(child_el, out);
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push(trimmed);
            }
        }
    }
}

fn collapse_whitespace(input: &str) -> String {
    let mut buf = String::with_capacity(input.len());
    let mut last_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !last_space && !buf.is_empty() {
                buf.push(' ');
            }
            last_space = true;
        } else {
            buf.push(ch);
            last_space = false;
        }
    }
    buf.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_chrome_and_keeps_body_text() {
        let html = r#"<html><head><title>T</title><style>p{color:red}</style></head>
            <body>
              <nav><a href="/">Home</a></nav>
              <article><h1>Heading</h1><p>First   paragraph.</p>
              <script>var x = 1;</script><p>Second</p></article>
              <noscript>enable js</noscript>
              <iframe src="x"></iframe>
              <footer>copyright</footer>
            </body></html>"#;
        assert_eq!(extract_text(html), "T Heading First paragraph. Second");
    }

    #[test]
    fn nested_skipped_subtree_is_removed() {
        let html = "<div>keep<footer><p>gone <b>too</b></p></footer>tail</div>";
        assert_eq!(extract_text(html), "keep tail");
    }

    #[test]
    fn empty_input() {
        assert_eq!(extract_text("   "), "");
        assert_eq!(extract_text("<html></html>"), "");
    }
}
