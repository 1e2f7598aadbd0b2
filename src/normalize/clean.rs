use regex::Regex;
use std::sync::LazyLock;

pub const MAX_BODY_CHARS: usize = 1000;
pub const TRUNCATION_MARKER: &str = "...";
pub const NO_CONTENT: &str = "No content available";

/// Bounded so a pathological body cannot loop forever.
const MAX_SCRUB_PASSES: usize = 8;

static INVISIBLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[\u{200b}\u{200c}\u{200d}\u{034f}\u{feff}\u{2060}\u{00ad}]").unwrap());

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+|www\.\S+").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Marketing and footer lines. Words are joined by `\s+` so a phrase
/// wrapped across lines still matches; line-anchored patterns then run to
/// the end of the line the phrase ends on.
static BOILERPLATE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\[Image\]",
        r"View\s+(?:this\s+email\s+)?in\s+(?:your\s+)?browser[^\n]*",
        r"To\s+unsubscribe[^\n]*",
        r"Unsubscribe[^\n]*",
        r"Manage\s+(?:your\s+)?(?:email\s+)?preferences[^\n]*",
        r"Privacy\s+Policy[^\n]*",
        r"Terms\s+of\s+(?:Service|Use)[^\n]*",
        r"Copyright[^\n]*",
        r"©[^\n]*",
        r"Sent\s+from\s+my[^\n]*",
        r"This\s+(?:email|message)\s+was\s+sent[^\n]*",
        r"You\s+are\s+receiving\s+this[^\n]*",
        r"Follow\s+us\s+on[^\n]*",
        r"Like\s+us\s+on[^\n]*",
        r"\[?[A-Za-z]+(?:[ \t]+[A-Za-z]+)*\s+on\s+(?:Twitter|Facebook|Instagram|LinkedIn|YouTube|TikTok)\]?",
        r"Click\s+here[^\n]*",
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
    .collect()
});

/// One stripping pass. Line breaks survive so `[^\n]*` never reaches past
/// the line it started on.
fn strip_once(text: &str) -> String {
    let text = html_escape::decode_html_entities(text);
    let text = INVISIBLE_RE.replace_all(&text, "");
    let mut text = URL_RE.replace_all(&text, "").into_owned();
    for re in BOILERPLATE_RES.iter() {
        text = re.replace_all(&text, "").into_owned();
    }
    text
}

/// Entity decoding, invisible-character removal, URL and boilerplate
/// removal, repeated on the line-structured text until stable, then
/// whitespace collapsing.
pub fn scrub(text: &str) -> String {
    let mut current = strip_once(text);
    for _ in 1..MAX_SCRUB_PASSES {
        let next = strip_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    WHITESPACE_RE.replace_all(&current, " ").trim().to_string()
}

/// Keep the first `max_chars` characters, appending the marker when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Full body cleaning pass applied to whichever body part was chosen.
pub fn clean_body(text: &str) -> String {
    let scrubbed = scrub(text);
    if scrubbed.is_empty() {
        return NO_CONTENT.to_string();
    }
    truncate_chars(&scrubbed, MAX_BODY_CHARS)
}
