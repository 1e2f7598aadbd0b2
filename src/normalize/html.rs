use regex::Regex;
use scraper::{ElementRef, Html, Node};
use std::sync::LazyLock;

/// Elements whose whole subtree never carries message content.
const DROPPED_TAGS: &[&str] = &[
    "script", "style", "head", "title", "meta", "link", "noscript", "img", "header", "footer",
    "nav",
];

/// Class names that mark marketing/footer blocks. `ad` only matches as a
/// standalone token (`ad`, `ads`, `ad-slot`), not inside `header` or `shadow`.
// Deliberately narrower than a substring match on "ad": that would also drop
// `header`, `shadow`, `download` and `thread` blocks holding real content.
static BOILERPLATE_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)footer|signature|disclaimer|unsubscribe|social-media|marketing|banner|(?:^|[-_])ads?(?:$|[-_])",
    )
    .unwrap()
});

fn is_boilerplate(el: &ElementRef<'_>) -> bool {
    let v = el.value();
    DROPPED_TAGS.contains(&v.name()) || v.classes().any(|c| BOILERPLATE_CLASS_RE.is_match(c))
}

fn collect_text(el: ElementRef<'_>, out: &mut Vec<String>) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.extend(
                    text.lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                );
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child)
                    && !is_boilerplate(&child_el)
                {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Visible text of an HTML body with boilerplate elements removed,
/// joined by single spaces.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let root = doc.root_element();
    if is_boilerplate(&root) {
        return String::new();
    }
    let mut lines = Vec::new();
    collect_text(root, &mut lines);
    lines.join(" ")
}
