//! URL span detection for chat text.
//!
//! [`segment`] splits a string into literal runs and links.  A link candidate
//! is `http://` or `https://` followed by every non-whitespace character up to
//! the next whitespace; closing punctuation and unbalanced closing brackets at
//! its end are peeled off into the link's trailing remainder, so that prose
//! like `(see https://example.com/a).` links only `https://example.com/a`.
//!
//! Segments borrow from the input and always partition it exactly:
//! [`reassemble`] of the result gives back the original text.
use std::sync::OnceLock;

use regex::Regex;

static URL_CANDIDATE: OnceLock<Regex> = OnceLock::new();

fn url_candidate() -> &'static Regex {
    URL_CANDIDATE.get_or_init(|| Regex::new(r"https?://\S+").expect("Failed to compile URL regex"))
}

/// Characters never kept at the end of a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', '?', '!', ',', ';', ':', '\'', '"', '<', '>'];

/// Closing brackets and the opener each one pairs with.
const BRACKET_PAIRS: &[(char, char)] = &[(')', '('), (']', '['), ('}', '{')];

/// A span of chat text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Plain text, rendered verbatim.
    Literal(&'a str),
    /// A URL followed by characters that were judged not to belong to it.
    Link { url: &'a str, trailing: &'a str },
}

impl<'a> Segment<'a> {
    /// Length in bytes of the input this segment covers.
    pub fn source_len(&self) -> usize {
        match self {
            Segment::Literal(text) => text.len(),
            Segment::Link { url, trailing } => url.len() + trailing.len(),
        }
    }

    /// The link target, if this is a link.
    pub fn url(&self) -> Option<&'a str> {
        match self {
            Segment::Link { url, .. } => Some(url),
            Segment::Literal(_) => None,
        }
    }
}

/// Split `text` into literal and link segments, in input order.
///
/// Empty input yields no segments.  Never fails.
pub fn segment(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for candidate in url_candidate().find_iter(text) {
        if candidate.start() > cursor {
            segments.push(Segment::Literal(&text[cursor..candidate.start()]));
        }
        let (url, trailing) = split_trailing(candidate.as_str());
        segments.push(Segment::Link { url, trailing });
        cursor = candidate.end();
    }

    if cursor < text.len() {
        segments.push(Segment::Literal(&text[cursor..]));
    }
    segments
}

/// Concatenate segments back into the text they were cut from.
pub fn reassemble(segments: &[Segment<'_>]) -> String {
    let mut out = String::with_capacity(segments.iter().map(Segment::source_len).sum());
    for seg in segments {
        match seg {
            Segment::Literal(text) => out.push_str(text),
            Segment::Link { url, trailing } => {
                out.push_str(url);
                out.push_str(trailing);
            }
        }
    }
    out
}

/// Peel trailing punctuation and unbalanced closing brackets off a URL
/// candidate.  Returns `(url, trailing)` with `url + trailing == candidate`.
///
/// Bracket balance is recounted over the surviving prefix after every strip.
fn split_trailing(candidate: &str) -> (&str, &str) {
    let mut end = candidate.len();

    while let Some(last) = candidate[..end].chars().next_back() {
        let url = &candidate[..end];

        let strip = if TRAILING_PUNCTUATION.contains(&last) {
            true
        } else if let Some(&(close, open)) = BRACKET_PAIRS.iter().find(|(c, _)| *c == last) {
            count_char(url, open) < count_char(url, close)
        } else {
            false
        };

        if !strip {
            break;
        }
        end -= last.len_utf8();
    }

    candidate.split_at(end)
}

fn count_char(s: &str, needle: char) -> usize {
    s.chars().filter(|&c| c == needle).count()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
