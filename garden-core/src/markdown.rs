use std::ops::Range;
use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::links::{self, LinkReference};
use crate::vault::normalize;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const DEFAULT_THEME: &str = "base16-ocean.dark";

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Convert a note body to an HTML fragment.
///
/// Every wiki-link outside of code is handed to `render_link`, which returns
/// the HTML to put in its place. Headings get an `id` built from their text
/// so `[[Note#Heading]]` fragments have something to land on.
pub fn render_markdown<F>(body: &str, syntax_theme: &str, render_link: F) -> String
where
    F: FnMut(&LinkReference) -> String,
{
    let events = transform(body, Some(syntax_theme), render_link);
    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    out
}

/// The wiki-links `render_markdown` would rewrite, in document order.
///
/// Links in code blocks, inline code and raw HTML are not included.
pub fn wiki_links(body: &str) -> Vec<LinkReference> {
    let mut found = Vec::new();
    transform(body, None, |link| {
        found.push(link.clone());
        String::new()
    });
    found
}

/// Rewrite the event stream of `body`.
///
/// Code blocks are highlighted when a theme is given and dropped otherwise.
/// Links passed to `render_link` carry spans into `body`; when the text
/// around a link was unescaped by the parser the span covers the whole run.
fn transform<'a, F>(body: &'a str, syntax_theme: Option<&str>, mut render_link: F) -> Vec<Event<'a>>
where
    F: FnMut(&LinkReference) -> String,
{
    let events: Vec<(Event<'a>, Range<usize>)> = Parser::new_ext(body, markdown_options())
        .into_offset_iter()
        .collect();
    let mut processed = Vec::with_capacity(events.len());
    let mut i = 0;

    while i < events.len() {
        match &events[i].0 {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next().unwrap_or(""),
                    CodeBlockKind::Indented => "",
                };

                // Collect all text events until the end of the code block
                let mut code = String::new();
                i += 1;
                while i < events.len() {
                    match &events[i].0 {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(text) => code.push_str(text),
                        _ => {}
                    }
                    i += 1;
                }

                if let Some(theme) = syntax_theme {
                    processed.push(Event::Html(highlight_code(&code, lang, theme).into()));
                }
            }
            Event::Text(_) => {
                // The parser splits text around brackets, so merge runs first
                let start = events[i].1.start;
                let mut end = start;
                let mut merged = String::new();
                while let Some((Event::Text(text), range)) = events.get(i) {
                    merged.push_str(text);
                    end = range.end;
                    i += 1;
                }

                let verbatim = body.get(start..end) == Some(merged.as_str());
                push_text(merged, &mut processed, |link| {
                    let mut located = link.clone();
                    located.span = if verbatim {
                        start + link.span.start..start + link.span.end
                    } else {
                        start..end
                    };
                    render_link(&located)
                });
                continue;
            }
            Event::Start(Tag::Heading {
                level,
                id: None,
                classes,
                attrs,
            }) => {
                let slug = normalize(&heading_text(events[i + 1..].iter().map(|(e, _)| e)));
                processed.push(Event::Start(Tag::Heading {
                    level: *level,
                    id: (!slug.is_empty()).then(|| CowStr::from(slug)),
                    classes: classes.clone(),
                    attrs: attrs.clone(),
                }));
            }
            event => processed.push(event.clone()),
        }
        i += 1;
    }

    processed
}

fn push_text<'a, F>(text: String, out: &mut Vec<Event<'a>>, mut render_link: F)
where
    F: FnMut(&LinkReference) -> String,
{
    let found = links::scan_text(&text);
    if found.is_empty() {
        out.push(Event::Text(text.into()));
        return;
    }

    let mut last = 0;
    for link in &found {
        if link.span.start > last {
            out.push(Event::Text(text[last..link.span.start].to_string().into()));
        }
        out.push(Event::InlineHtml(render_link(link).into()));
        last = link.span.end;
    }
    if last < text.len() {
        out.push(Event::Text(text[last..].to_string().into()));
    }
}

fn heading_text<'e, 'a: 'e>(events: impl Iterator<Item = &'e Event<'a>>) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::End(TagEnd::Heading(_)) => break,
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            _ => {}
        }
    }
    links::strip_links(&text)
}

pub fn highlight_code(code: &str, lang: &str, theme: &str) -> String {
    let plain = || format!("<pre><code>{}</code></pre>\n", html_escape::encode_text(code));
    if lang.is_empty() {
        return plain();
    }

    let syntax = SYNTAX_SET.find_syntax_by_token(lang).or_else(|| {
        // Fallback mappings for unsupported languages
        match lang {
            "nix" => SYNTAX_SET.find_syntax_by_name("JavaScript"),
            "toml" => SYNTAX_SET.find_syntax_by_name("YAML"),
            _ => None,
        }
    });
    let theme = THEME_SET
        .themes
        .get(theme)
        .or_else(|| THEME_SET.themes.get(DEFAULT_THEME));

    match (syntax, theme) {
        (Some(syntax), Some(theme)) => {
            highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme).unwrap_or_else(|_| plain())
        }
        _ => plain(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(body: &str) -> String {
        render_markdown(body, DEFAULT_THEME, |link| {
            format!("<a href=\"{}.html\">{}</a>", link.target, link.display_text())
        })
    }

    #[test]
    fn test_wikilinks_are_replaced() {
        let html = render("See [[about|About me]] and [[faq]].");
        assert!(html.contains("<a href=\"about.html\">About me</a>"));
        assert!(html.contains("<a href=\"faq.html\">faq</a>"));
        assert!(!html.contains("[["));
    }

    #[test]
    fn test_markdown_links_untouched() {
        let html = render("A [normal link](https://example.com).");
        assert!(html.contains("<a href=\"https://example.com\">normal link</a>"));
    }

    #[test]
    fn test_code_is_left_alone() {
        let html = render("`[[inline]]`\n\n```\n[[fenced]]\n```\n");
        assert!(html.contains("<code>[[inline]]</code>"));
        assert!(html.contains("[[fenced]]"));
        assert!(!html.contains("href"));
    }

    #[test]
    fn test_text_around_links_is_escaped() {
        let html = render("1 < 2 [[x]] & done");
        assert!(html.contains("1 &lt; 2 "));
        assert!(html.contains(" &amp; done"));
    }

    #[test]
    fn test_heading_ids() {
        let html = render("## Memory Model\n\n## See [[Other|the other page]]\n");
        assert!(html.contains("<h2 id=\"memory-model\">Memory Model</h2>"));
        assert!(html.contains("id=\"see-the-other-page\""));
    }

    #[test]
    fn test_highlighting() {
        let html = render("```rust\nfn main() {}\n```\n");
        assert!(html.contains("<pre style="));

        let html = render("```not-a-language\n<tag>\n```\n");
        assert!(html.contains("<pre><code>&lt;tag&gt;\n</code></pre>"));
    }

    #[test]
    fn test_wiki_links_match_rendering() {
        let body = "Intro [[a]].\n\n    [[indented]]\n\n> ```\n> [[quoted fence]]\n> ```\n\n\
<div>\n[[html block]]\n</div>\n\n- item\n\n    ```\n    [[list fence]]\n    ```\n\n\
See [[b|*not* an alias]] and [[c]].\n";

        let found: Vec<String> = wiki_links(body).into_iter().map(|l| l.target).collect();
        assert_eq!(found, vec!["a", "c"]);

        let mut rendered = Vec::new();
        render_markdown(body, DEFAULT_THEME, |link| {
            rendered.push(link.target.clone());
            String::new()
        });
        assert_eq!(rendered, found);
    }

    #[test]
    fn test_wiki_link_spans() {
        let body = "# Title\n\nSee [[Target|x]] here.\n";
        let links = wiki_links(body);
        assert_eq!(&body[links[0].span.clone()], "[[Target|x]]");
    }

    #[test]
    fn test_tables_and_tasks() {
        let html = render("| a | b |\n|---|---|\n| 1 | 2 |\n\n- [x] done\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("checkbox"));
    }
}
