//! Wiki-link parsing and resolution.
//!
//! `[[Target]]`, `[[Target|Alias]]` and `[[Target#Heading]]` are recognized.
//! Ordinary Markdown links (`[text](url)`) are left for the Markdown parser.

use std::ops::Range;

use crate::vault::{PageId, VaultIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReference {
    /// Everything before the pipe, trimmed. Kept for diagnostics.
    pub raw: String,
    /// Note name with any `#fragment` removed.
    pub target: String,
    pub fragment: Option<String>,
    pub alias: Option<String>,
    /// Byte range of the whole `[[...]]` in the scanned text.
    pub span: Range<usize>,
}

impl LinkReference {
    pub fn display_text(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.raw)
    }

    /// `[[#Heading]]` points into the page that contains it.
    pub fn is_self_anchor(&self) -> bool {
        self.target.is_empty() && self.fragment.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(PageId),
    Unresolved(String),
}

pub fn resolve(link: &LinkReference, index: &VaultIndex) -> Resolution {
    match PageId::from_target(&link.target) {
        Some(id) if index.contains(&id) => Resolution::Resolved(id),
        _ => Resolution::Unresolved(link.raw.clone()),
    }
}

/// Extract every wiki-link from a Markdown document.
///
/// Uses the same Markdown event stream the renderer rewrites, so code
/// blocks, inline code and raw HTML never contribute links. Spans are byte
/// ranges into `text`.
pub fn extract_links(text: &str) -> Vec<LinkReference> {
    crate::markdown::wiki_links(text)
}

/// Scan plain text for wiki-links without any Markdown awareness.
pub fn scan_text(text: &str) -> Vec<LinkReference> {
    let bytes = text.as_bytes();
    let mut links = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'[' && bytes.get(i + 1) == Some(&b'[') {
            if let Some((len, inner)) = parse_at(&text[i..]) {
                links.push(reference(inner, i..i + len));
                i += len;
                continue;
            }
        }
        i += 1;
    }

    links
}

/// Replace every wiki-link in `text` with its display text.
pub fn strip_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for link in scan_text(text) {
        out.push_str(&text[last..link.span.start]);
        out.push_str(link.display_text());
        last = link.span.end;
    }
    out.push_str(&text[last..]);
    out
}

/// `s` starts with `[[`. Returns the length of the link and its inner text.
fn parse_at(s: &str) -> Option<(usize, &str)> {
    let body = &s[2..];
    let end = body.find(['[', ']', '\n'])?;
    if end == 0 || !body[end..].starts_with("]]") {
        return None;
    }
    Some((end + 4, &body[..end]))
}

fn reference(inner: &str, span: Range<usize>) -> LinkReference {
    let (raw, alias) = match inner.split_once('|') {
        Some((target, alias)) => (target.trim(), Some(alias.trim()).filter(|a| !a.is_empty())),
        None => (inner.trim(), None),
    };
    let (target, fragment) = match raw.split_once('#') {
        Some((target, fragment)) => (
            target.trim(),
            Some(fragment.trim()).filter(|f| !f.is_empty()),
        ),
        None => (raw, None),
    };

    LinkReference {
        raw: raw.to_string(),
        target: target.to_string(),
        fragment: fragment.map(str::to_string),
        alias: alias.map(str::to_string),
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::VaultOptions;

    fn targets(text: &str) -> Vec<String> {
        extract_links(text).into_iter().map(|l| l.target).collect()
    }

    #[test]
    fn test_simple_link() {
        let text = "See [[Target]] for more.";
        let links = extract_links(text);

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "Target");
        assert_eq!(links[0].alias, None);
        assert_eq!(&text[links[0].span.clone()], "[[Target]]");
    }

    #[test]
    fn test_alias_and_whitespace() {
        let links = extract_links("[[  Target  |  Shown Text ]]");
        assert_eq!(links[0].target, "Target");
        assert_eq!(links[0].alias.as_deref(), Some("Shown Text"));
        assert_eq!(links[0].display_text(), "Shown Text");

        let links = extract_links("[[Target|]]");
        assert_eq!(links[0].alias, None);
        assert_eq!(links[0].display_text(), "Target");
    }

    #[test]
    fn test_fragment() {
        let links = extract_links("[[Rust Safety#Memory Model|memory]] [[#Intro]]");
        assert_eq!(links[0].target, "Rust Safety");
        assert_eq!(links[0].fragment.as_deref(), Some("Memory Model"));
        assert_eq!(links[0].raw, "Rust Safety#Memory Model");
        assert!(!links[0].is_self_anchor());
        assert!(links[1].is_self_anchor());
    }

    #[test]
    fn test_ignores_markdown_links() {
        assert!(targets("[text](other.md) and [ref][label] and [single]").is_empty());
    }

    #[test]
    fn test_malformed_links() {
        assert!(targets("[[unterminated and more").is_empty());
        assert!(targets("[[]]").is_empty());
        assert!(targets("[[split\nline]]").is_empty());
        assert_eq!(targets("[[[Nested]]]"), vec!["Nested"]);
    }

    #[test]
    fn test_skips_code() {
        let text = "\
[[one]] `[[not-inline]]`
```rust
let x = [[not-fenced]];
```
~~~~
[[still code]]
~~~
~~~~
``[[double `tick` span]]`` [[two]]
";
        assert_eq!(targets(text), vec!["one", "two"]);
    }

    #[test]
    fn test_skips_nested_code_and_html() {
        let cases = [
            "Intro.\n\n    [[private]]\n",
            "> ```\n> [[private]]\n> ```\n",
            "<div>\n[[private]]\n</div>\n",
            "- item\n\n    ```\n    [[private]]\n    ```\n",
        ];
        for text in cases {
            assert!(targets(text).is_empty(), "{text:?}");
        }
    }

    #[test]
    fn test_spans_are_offsets_into_source() {
        let text = "intro\n\n- [[a]]\n- [[b|B]]\n";
        for link in extract_links(text) {
            assert!(text[link.span.clone()].starts_with("[["));
            assert!(text[link.span.clone()].ends_with("]]"));
        }
    }

    #[test]
    fn test_strip_links() {
        assert_eq!(strip_links("About [[me|Me]] and [[You]]"), "About Me and You");
    }

    #[test]
    fn test_resolve() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Target.md"), "").unwrap();
        let index = VaultIndex::build(dir.path(), &VaultOptions::default()).unwrap();

        let links = extract_links("[[target]] [[TARGET|x]] [[Nonexistent]] [[ |x]]");
        let resolved: Vec<Resolution> = links.iter().map(|l| resolve(l, &index)).collect();

        let target = PageId::new("Target").unwrap();
        assert_eq!(resolved[0], Resolution::Resolved(target.clone()));
        assert_eq!(resolved[1], Resolution::Resolved(target));
        assert_eq!(resolved[2], Resolution::Unresolved("Nonexistent".into()));
        assert_eq!(resolved[3], Resolution::Unresolved(String::new()));
    }
}
