//! Plain-text preparation for speech.
//!
//! Bot replies are usually markdown. Before a provider speaks one, code is
//! dropped, links are reduced to their label and formatting characters are
//! removed, so the voice never reads out URLs or asterisks.

/// Spoken in place of a fenced code block.
const CODE_PLACEHOLDER: &str = "Code omitted.";

/// Convert markdown to text suitable for a speech provider.
#[must_use]
pub fn speech_text(markdown: &str) -> String {
    let mut spoken = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            if !in_fence {
                spoken.push(CODE_PLACEHOLDER.to_string());
            }
            in_fence = !in_fence;
            continue;
        }
        if in_fence || is_rule(trimmed) {
            continue;
        }

        let line = strip_block_prefix(trimmed);
        let line = strip_inline(line);
        if !line.trim().is_empty() {
            spoken.push(line);
        }
    }

    normalize_spaces(&spoken.join(" "))
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|&marker| compact.chars().all(|c| c == marker))
}

/// Remove heading, quote and list markers from the start of a line.
fn strip_block_prefix(line: &str) -> &str {
    let mut line = line;
    loop {
        let before = line;
        line = line.trim_start_matches('>').trim_start();
        line = line.trim_start_matches('#').trim_start();
        for bullet in ["- ", "* ", "+ "] {
            if let Some(rest) = line.strip_prefix(bullet) {
                line = rest;
            }
        }
        let digits = line.chars().take_while(char::is_ascii_digit).count();
        if digits > 0 {
            let rest = &line[digits..];
            if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
                line = rest;
            }
        }
        if line == before {
            return line;
        }
    }
}

/// Strip links, images, inline code, emphasis and HTML tags.
fn strip_inline(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '!' if chars.get(i + 1) == Some(&'[') => {
                if let Some((label, next)) = bracket_link(&chars, i + 1) {
                    out.push_str(&label);
                    i = next;
                } else {
                    out.push('!');
                    i += 1;
                }
            }
            '[' => {
                if let Some((label, next)) = bracket_link(&chars, i) {
                    out.push_str(&label);
                    i = next;
                } else {
                    out.push('[');
                    i += 1;
                }
            }
            '<' => match chars[i..].iter().position(|&c| c == '>') {
                Some(close) => i += close + 1,
                None => {
                    out.push('<');
                    i += 1;
                }
            },
            '`' | '*' | '~' => i += 1,
            '_' if is_emphasis_underscore(&chars, i) => i += 1,
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Parse `[label](target)` starting at `open`; returns the label and the
/// index after the closing parenthesis.
fn bracket_link(chars: &[char], open: usize) -> Option<(String, usize)> {
    let close = open + chars[open..].iter().position(|&c| c == ']')?;
    if chars.get(close + 1) != Some(&'(') {
        return None;
    }
    let end = close + 1 + chars[close + 1..].iter().position(|&c| c == ')')?;
    let label: String = chars[open + 1..close].iter().collect();
    Some((label, end + 1))
}

/// `_` counts as emphasis only at a word edge (keeps `snake_case`).
fn is_emphasis_underscore(chars: &[char], i: usize) -> bool {
    let before = i.checked_sub(1).and_then(|p| chars.get(p));
    let after = chars.get(i + 1);
    let is_word = |c: Option<&char>| c.is_some_and(|c| c.is_alphanumeric());
    !(is_word(before) && is_word(after))
}

fn normalize_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
