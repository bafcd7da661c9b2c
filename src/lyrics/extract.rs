//! Lyric text extraction from provider pages.
//!
//! Page markup changes without notice, so extraction is an ordered list of
//! strategies. The first one that yields non-empty text wins.

use once_cell::sync::Lazy;
use regex::Regex;
use select::document::Document;
use select::node::Node;
use select::predicate::{Any, Attr, Class, Predicate};

static SNIPPET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)Lyrics from Snippet:.*$").expect("snippet regex is valid"));
// Genius prefixes the page text with a single "N Contributors..." header line.
static CONTRIBUTORS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A\s*[^\n]*?\d+\s*Contributors?[^\n]*").expect("contributors regex is valid")
});
static EMBED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d*Embed\s*\z").expect("embed regex is valid"));
static SECTION_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]\n]*\]").expect("section marker regex is valid"));
static BLANK_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank run regex is valid"));

const AD_PHRASES: &[&str] = &["You might also like"];

/// One way of pulling lyric text out of a parsed page.
pub trait ExtractStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, doc: &Document) -> Option<String>;
}

/// Joins the text of every element matching a predicate.
pub struct ElementsMatching<P> {
    name: &'static str,
    predicate: P,
}

impl<P> ElementsMatching<P> {
    pub fn new(name: &'static str, predicate: P) -> Self {
        Self { name, predicate }
    }
}

impl<P: Predicate + Send + Sync> ExtractStrategy for ElementsMatching<P> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extract(&self, doc: &Document) -> Option<String> {
        let mut out = String::new();
        for node in doc.find(Any).filter(|n| self.predicate.matches(n)) {
            let mut text = String::new();
            collect_text(&node, &mut text);
            let text = text.trim();
            if !text.is_empty() {
                out.push_str(text);
                out.push_str("\n\n");
            }
        }
        let out = out.trim();
        (!out.is_empty()).then(|| out.to_string())
    }
}

/// Matches elements of a given tag whose class attribute contains a fragment.
///
/// Genius emits hashed class names like `Lyrics__Container-sc-1ynbvzw-1`.
pub struct ClassContains {
    tag: &'static str,
    fragment: &'static str,
}

impl ClassContains {
    pub fn new(tag: &'static str, fragment: &'static str) -> Self {
        Self { tag, fragment }
    }
}

impl Predicate for ClassContains {
    fn matches(&self, node: &Node) -> bool {
        node.name() == Some(self.tag)
            && node
                .attr("class")
                .is_some_and(|class| class.contains(self.fragment))
    }
}

// Walks element children, turning <br> and block ends into newlines.
fn collect_text(node: &Node, out: &mut String) {
    for child in node.children() {
        if let Some(text) = child.as_text() {
            out.push_str(text);
            continue;
        }
        if child.attr("data-exclude-from-selection") == Some("true") {
            continue;
        }
        match child.name() {
            Some("br") => out.push('\n'),
            Some("script") | Some("style") => {}
            Some("div") | Some("p") => {
                collect_text(&child, out);
                out.push('\n');
            }
            Some(_) => collect_text(&child, out),
            None => {}
        }
    }
}

/// Ordered extraction strategies for a provider's pages.
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractStrategy>>,
}

impl Extractor {
    pub fn new(strategies: Vec<Box<dyn ExtractStrategy>>) -> Self {
        Self { strategies }
    }

    /// Markup used by Genius song pages, newest layout first.
    pub fn genius() -> Self {
        Self::new(vec![
            Box::new(ElementsMatching::new(
                "data-lyrics-container",
                Attr("data-lyrics-container", "true"),
            )),
            Box::new(ElementsMatching::new(
                "lyrics-container-class",
                ClassContains::new("div", "Lyrics__Container"),
            )),
            Box::new(ElementsMatching::new("lyrics-class", Class("lyrics"))),
            Box::new(ElementsMatching::new(
                "song-body-lyrics-class",
                Class("song_body-lyrics"),
            )),
        ])
    }

    /// Raw text from the first strategy that finds any, with its name.
    pub fn extract(&self, html: &str) -> Option<(&'static str, String)> {
        let doc = Document::from(html);
        self.strategies.iter().find_map(|strategy| {
            strategy.extract(&doc).map(|text| (strategy.name(), text))
        })
    }
}

/// Strips provider boilerplate and section markers, normalizes blank lines.
pub fn clean_lyrics_text(text: &str) -> String {
    let mut text = text.replace("\r\n", "\n");
    for phrase in AD_PHRASES {
        text = text.replace(phrase, "");
    }
    let text = SNIPPET_RE.replace_all(&text, "");
    let text = CONTRIBUTORS_RE.replace(&text, "");
    let text = SECTION_MARKER_RE.replace_all(&text, "");
    let text = text.trim();
    let text = EMBED_RE.replace(text, "");

    let text = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANK_RUN_RE.replace_all(&text, "\n\n").trim().to_string()
}
