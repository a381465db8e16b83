//! HTML to readable, markdown-flavoured plain text.
//!
//! The output is meant for a language model, not a browser: structure is
//! kept (paragraphs, headings, list items, emphasis) while link targets,
//! scripts, styles and other markup are dropped to save context space.

/// Blocks whose entire content is discarded.
const SKIPPED_BLOCKS: &[&str] = &["script", "style", "head", "title", "noscript"];

/// Tags that start and end a paragraph-like block.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "table", "tr", "ul", "ol", "blockquote", "section", "article", "header",
    "footer", "center", "form", "pre",
];

/// Convert HTML to text.
///
/// - `<a href="url">text</a>` keeps only `text`
/// - `<h1>`..`<h6>` become `#`-prefixed lines
/// - `<li>` becomes `* item`
/// - `<b>`/`<strong>` become `**bold**`, `<i>`/`<em>` become `_italic_`
/// - `<img alt="x">` keeps its alt text
/// - Entities are decoded and blank lines collapsed
pub fn html_to_text(html: &str) -> String {
    let mut html = html.to_string();
    for tag in SKIPPED_BLOCKS {
        html = remove_tag_block(&html, tag);
    }
    html = remove_comments(&html);

    let mut out = String::with_capacity(html.len());
    let mut rest = html.as_str();

    while let Some(lt) = rest.find('<') {
        push_text(&mut out, &rest[..lt]);
        let after = &rest[lt + 1..];
        let Some(gt) = after.find('>') else {
            // Unterminated tag: treat the remainder as text
            push_text(&mut out, &rest[lt..]);
            rest = "";
            break;
        };
        push_tag(&mut out, &after[..gt]);
        rest = &after[gt + 1..];
    }
    push_text(&mut out, rest);

    collapse_blank_lines(&out)
}

/// Append a run of character data, collapsing HTML whitespace.
fn push_text(out: &mut String, raw: &str) {
    if raw.is_empty() {
        return;
    }
    let decoded = decode_entities(raw);
    let mut pending_space = false;
    for ch in decoded.chars() {
        if ch.is_whitespace() && ch != '\u{a0}' {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() && !out.ends_with([' ', '\n']) {
            out.push(' ');
        }
        pending_space = false;
        out.push(if ch == '\u{a0}' { ' ' } else { ch });
    }
    if pending_space && !out.is_empty() && !out.ends_with([' ', '\n']) {
        out.push(' ');
    }
}

/// Render the textual effect of one tag (the part between `<` and `>`).
fn push_tag(out: &mut String, tag: &str) {
    let tag = tag.trim();
    let closing = tag.starts_with('/');
    let body = tag.trim_start_matches('/').trim_end_matches('/');
    let name: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    match name.as_str() {
        "br" => out.push('\n'),
        "hr" => out.push_str("\n\n* * *\n\n"),
        "li" if !closing => out.push_str("\n* "),
        "b" | "strong" => out.push_str("**"),
        "i" | "em" => out.push('_'),
        "td" | "th" if closing => out.push(' '),
        "img" => {
            if let Some(alt) = attribute(body, "alt").filter(|a| !a.trim().is_empty()) {
                push_text(out, &alt);
            }
        }
        h if is_heading(h) => {
            out.push_str("\n\n");
            if !closing {
                let level = h[1..].parse::<usize>().unwrap_or(1);
                out.push_str(&"#".repeat(level));
                out.push(' ');
            }
        }
        b if BLOCK_TAGS.contains(&b) => out.push_str("\n\n"),
        _ => {}
    }
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Read a quoted attribute value from a tag body.
fn attribute(tag_body: &str, name: &str) -> Option<String> {
    let lower = tag_body.to_ascii_lowercase();
    let needle = format!("{name}=");
    let mut search_from = 0;

    while let Some(found) = lower[search_from..].find(&needle) {
        let start = search_from + found;
        let preceded_by_space = start == 0
            || lower[..start]
                .chars()
                .last()
                .is_some_and(char::is_whitespace);
        let value_start = start + needle.len();
        if preceded_by_space {
            let value = &tag_body[value_start..];
            let quote = value.chars().next()?;
            if quote == '"' || quote == '\'' {
                let inner = &value[1..];
                let end = inner.find(quote)?;
                return Some(decode_entities(&inner[..end]));
            }
            let end = value.find(char::is_whitespace).unwrap_or(value.len());
            return Some(decode_entities(&value[..end]));
        }
        search_from = value_start;
    }
    None
}

/// Remove an entire tag block (e.g. `<script>…</script>`).
fn remove_tag_block(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    // ASCII lowercasing keeps byte offsets aligned with the original text
    while let Some(start) = find_open_tag(&remaining.to_ascii_lowercase(), &open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        if let Some(end) = after.to_ascii_lowercase().find(&close) {
            remaining = &after[end + close.len()..];
        } else {
            // No closing tag: drop the rest
            remaining = "";
            break;
        }
    }
    result.push_str(remaining);
    result
}

/// Find `<tag` followed by `>`, `/` or whitespace, so `<head` does not match `<header`.
fn find_open_tag(lower: &str, open: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = lower[from..].find(open) {
        let start = from + found;
        let next = lower[start + open.len()..].chars().next();
        if matches!(next, None | Some('>') | Some('/')) || next.is_some_and(char::is_whitespace) {
            return Some(start);
        }
        from = start + open.len();
    }
    None
}

fn remove_comments(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;
    while let Some(start) = remaining.find("<!--") {
        result.push_str(&remaining[..start]);
        match remaining[start..].find("-->") {
            Some(end) => remaining = &remaining[start + end + 3..],
            None => {
                remaining = "";
                break;
            }
        }
    }
    result.push_str(remaining);
    result
}

/// Decode named and numeric HTML entities. Unknown entities are left as is.
pub fn decode_entities(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&after[..semi]).map(|ch| (ch, semi)));

        match decoded {
            Some((ch, semi)) => {
                result.push(ch);
                rest = &after[semi + 1..];
            }
            None => {
                result.push('&');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }

    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "euro" => '€',
        "pound" => '£',
        "yen" => '¥',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "laquo" => '«',
        "raquo" => '»',
        "rsquo" => '\u{2019}',
        "lsquo" => '\u{2018}',
        "rdquo" => '\u{201d}',
        "ldquo" => '\u{201c}',
        "bull" => '•',
        "middot" => '·',
        "eacute" => 'é',
        "egrave" => 'è',
        "agrave" => 'à',
        "ccedil" => 'ç',
        "zwnj" => '\u{200c}',
        _ => return None,
    };
    Some(ch)
}

/// Trim every line and collapse runs of blank lines into one.
fn collapse_blank_lines(text: &str) -> String {
    let mut prev_was_blank = false;
    let mut cleaned = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank && !cleaned.is_empty() {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}
