//! Normalization of raw block text before rendering.
//!
//! Chat transcripts decorate code blocks with citation artifacts and stray
//! markup that the diagram engine chokes on. [`clean`] strips the known
//! artifact shapes, converts `<br>` variants back into newlines, drops any
//! remaining tag-like markup, and collapses blank-line runs.

use std::sync::LazyLock;

use regex::Regex;

/// `:contentReference[oaicite:N]{index=N}` citation artifacts.
static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":contentReference\[oaicite:\d+\]\{index=\d+\}").unwrap());

/// Bare `[oaicite:N]` fragments left behind by partial citations.
static OAICITE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[oaicite:\d+\]").unwrap());

/// `<br>`, `<br/>`, `<br />` in any case.
static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

/// Any remaining tag-like markup.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Three or more consecutive newlines.
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalize raw block text for rendering.
///
/// Idempotent: `clean(clean(x)) == clean(x)` for all inputs. Returns an
/// empty string when nothing meaningful remains; callers must treat empty
/// output as "nothing to render".
#[must_use]
pub fn clean(text: &str) -> String {
    let text = CITATION_RE.replace_all(text, "");
    let text = OAICITE_RE.replace_all(&text, "");
    let text = BR_RE.replace_all(&text, "\n");
    let text = TAG_RE.replace_all(&text, "");
    let text = BLANK_RUN_RE.replace_all(&text, "\n\n");
    text.trim().to_owned()
}
