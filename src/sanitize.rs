/*
 *  sanitize.rs
 *
 *  Pantalla - ambient clock and geoscope
 *  (c) 2020-26 Stuart Hunter
 *
 *  Feed values to display safe text: allow-list markup filter,
 *  plain text and display string coercion
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use serde_json::Value;

/// Inline formatting tags that survive, lowercase
const ALLOWED_TAGS: [&str; 5] = ["b", "strong", "i", "em", "br"];
/// Elements whose content is dropped together with the element
const RAW_TEXT_TAGS: [&str; 7] = ["script", "style", "noscript", "template", "iframe", "object", "textarea"];

pub const DISPLAY_FALLBACK: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Markup {
    /// keep the allow-listed inline tags, attributes stripped
    #[default]
    AllowList,
    /// no markup at all, everything escaped
    EscapeAll,
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Decode the handful of entities upstream feeds actually carry, so that
/// re-escaping does not double them.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|&end| end <= 10).and_then(|end| {
            let name = &tail[1..end];
            let ch = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => {
                    let num = name.strip_prefix('#')?;
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                        None => num.parse::<u32>().ok()?,
                    };
                    char::from_u32(code)
                }
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn push_text(out: &mut String, text: &str) {
    if !text.is_empty() {
        out.push_str(&escape_html(&decode_entities(text)));
    }
}

/// Index just past the `>` closing a tag that starts at `start`,
/// skipping quoted attribute values.
fn tag_end(src: &str, start: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, ch) in src[start..].char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '>') => return Some(start + i + 1),
            _ => {}
        }
    }
    None
}

struct Tag {
    name: String,
    closing: bool,
}

fn parse_tag(raw: &str) -> Option<Tag> {
    // raw is everything between '<' and '>'
    let (closing, body) = match raw.strip_prefix('/') {
        Some(b) => (true, b),
        None => (false, raw),
    };
    let name: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if name.is_empty() || !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(Tag { name, closing })
}

/// Filter markup down to the inline allow-list.
///
/// Disallowed elements are unwrapped (their text kept) except raw text
/// elements such as `script`, which vanish with their content. Output is
/// always balanced.
fn filter_markup(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut open: Vec<String> = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while let Some(rel) = src[pos..].find('<') {
        let lt = pos + rel;
        let next = &src[lt + 1..];

        // comments and doctype-like declarations
        if next.starts_with("!--") {
            push_text(&mut out, &src[text_start..lt]);
            let end = src[lt..].find("-->").map(|e| lt + e + 3).unwrap_or(src.len());
            pos = end;
            text_start = end;
            continue;
        }
        if next.starts_with('!') || next.starts_with('?') {
            push_text(&mut out, &src[text_start..lt]);
            let end = tag_end(src, lt).unwrap_or(src.len());
            pos = end;
            text_start = end;
            continue;
        }

        // only a letter (or '/' and a letter) opens a tag
        let name_start = next.strip_prefix('/').unwrap_or(next);
        if !name_start.starts_with(|c: char| c.is_ascii_alphabetic()) {
            pos = lt + 1;
            continue;
        }

        let Some(end) = tag_end(src, lt) else {
            break;
        };
        let Some(tag) = parse_tag(&src[lt + 1..end - 1]) else {
            // a bare '<' is text
            pos = lt + 1;
            continue;
        };

        push_text(&mut out, &src[text_start..lt]);
        pos = end;
        text_start = end;

        if !tag.closing && RAW_TEXT_TAGS.contains(&tag.name.as_str()) {
            let closer = format!("</{}", tag.name);
            let lower = src[end..].to_ascii_lowercase();
            let skip_to = match lower.find(&closer) {
                Some(c) => tag_end(src, end + c).unwrap_or(src.len()),
                None => src.len(),
            };
            pos = skip_to;
            text_start = skip_to;
            continue;
        }

        if !ALLOWED_TAGS.contains(&tag.name.as_str()) {
            continue;
        }
        if tag.name == "br" {
            if !tag.closing {
                out.push_str("<br>");
            }
            continue;
        }
        if tag.closing {
            if let Some(idx) = open.iter().rposition(|t| *t == tag.name) {
                for t in open.drain(idx..).rev() {
                    out.push_str(&format!("</{}>", t));
                }
            }
        } else {
            out.push_str(&format!("<{}>", tag.name));
            open.push(tag.name);
        }
    }

    push_text(&mut out, &src[text_start..]);
    for t in open.into_iter().rev() {
        out.push_str(&format!("</{}>", t));
    }
    out
}

/// Display safe text for a feed value.
///
/// `null` and missing values become the empty string, never `"null"`.
/// Non-string scalars are escaped verbatim; objects and arrays have no
/// display form and also become empty.
pub fn sanitize_rich_text(value: &Value, markup: Markup) -> String {
    let text = match value {
        Value::String(s) => s.trim(),
        Value::Number(n) => return escape_html(&n.to_string()),
        Value::Bool(b) => return b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return String::new(),
    };
    if text.is_empty() {
        return String::new();
    }
    match markup {
        Markup::AllowList => filter_markup(text),
        Markup::EscapeAll => escape_html(text),
    }
}

/// Allow-list sanitizing of an optional field, `None` when nothing
/// displayable remains.
pub fn rich_field(value: Option<&Value>) -> Option<String> {
    let s = sanitize_rich_text(value.unwrap_or(&Value::Null), Markup::AllowList);
    if s.is_empty() { None } else { Some(s) }
}

pub fn ensure_plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

/// Strings as-is, numbers and booleans as their JSON text, anything else
/// (including null) as `fallback`.
pub fn coerce_to_display_string(value: &Value, fallback: &str) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => fallback.to_string(),
    }
}

/// Remove every tag, keeping text; used where markup cannot be shown
pub fn strip_tags(html: &str) -> String {
    let mut plain = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => plain.push(ch),
            _ => {}
        }
    }
    decode_entities(&plain)
}
