//! Sentence cleanup before synthesis.
//!
//! Language models like to answer in markdown. Synthesizers read markup
//! aloud ("asterisk asterisk"), so each sentence is reduced to the words a
//! listener should hear. Works on one sentence at a time, so block-level
//! constructs that span sentences are handled only by their line markers.

/// Strip inline markdown and collapse whitespace.
///
/// Returns an empty string when nothing speakable remains.
#[must_use]
pub fn clean_for_speech(sentence: &str) -> String {
    let mut text = strip_line_prefix(sentence.trim());
    text = unwrap_links(&text);
    text = text.replace("**", "").replace("__", "").replace("~~", "");
    text.retain(|c| !matches!(c, '*' | '`' | '#'));
    text = drop_html_tags(&text);

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().any(char::is_alphanumeric) {
        collapsed
    } else {
        String::new()
    }
}

/// Heading hashes, quote markers, bullets and list numbers at the start.
fn strip_line_prefix(line: &str) -> String {
    let mut rest = line;
    loop {
        let before = rest;
        rest = rest.trim_start_matches(['#', '>']).trim_start();
        for bullet in ["- ", "* ", "+ "] {
            if let Some(stripped) = rest.strip_prefix(bullet) {
                rest = stripped;
            }
        }
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 {
            let after = &rest[digits..];
            if let Some(stripped) = after.strip_prefix(". ").or_else(|| after.strip_prefix(") ")) {
                rest = stripped;
            }
        }
        if rest == before {
            return rest.to_string();
        }
    }
}

/// `[label](target)` → `label`; `![alt](src)` → `alt`.
fn unwrap_links(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let Some(close) = rest[open..].find("](").map(|i| open + i) else {
            break;
        };
        let Some(end) = rest[close..].find(')').map(|i| close + i) else {
            break;
        };
        let prefix = rest[..open].strip_suffix('!').unwrap_or(&rest[..open]);
        out.push_str(prefix);
        out.push_str(&rest[open + 1..close]);
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    out
}

fn drop_html_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' if !in_tag => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    // An unclosed '<' was a comparison, not a tag.
    if in_tag {
        return text.to_string();
    }
    out
}
