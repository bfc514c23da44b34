//! Decoding of a single rustdoc implementor snippet.
//!
//! A snippet is the HTML rustdoc renders for one impl header, for example
//! `impl&lt;'s&gt; <a class="trait" ...>Iterator</a> for <a class="struct" ...>StripStr</a>&lt;'s&gt;`.
//! Parsing is a small tag scanner rather than a full HTML parse: anchors are
//! kept as links over the decoded text, every other tag is dropped except that
//! a `where` block marks where the type ends.

use crate::catalog::{EntityRef, Fact, GroupKey, ItemKind, TraitPath, TraitRef};
use thiserror::Error;

/// Why a snippet could not be turned into a `Fact`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnippetError {
    /// Decoded text does not begin with `impl`
    #[error("snippet does not start with `impl`: {0}")]
    NotAnImpl(String),

    /// `impl<` header never closes
    #[error("unbalanced generic parameter list: {0}")]
    UnbalancedGenerics(String),

    /// No top-level ` for ` between trait and type
    #[error("missing ` for ` separator: {0}")]
    MissingFor(String),

    /// Nothing follows ` for `
    #[error("missing implementing type: {0}")]
    MissingEntity(String),

    /// A `<` opened a tag that never closes
    #[error("unterminated tag: {0}")]
    UnterminatedTag(String),
}

/// Parse one snippet owned by `group` into a fact about `trait_path`.
///
/// The trait path comes from the implementor file rather than the anchor so
/// every fact in a batch agrees on it.
pub fn parse_snippet(
    group: &GroupKey,
    trait_path: &TraitPath,
    html: &str,
    synthetic: bool,
) -> Result<Fact, SnippetError> {
    let decoded = decode(html)?;
    let text = decoded.text.as_str();

    let rest = text
        .strip_prefix("impl")
        .filter(|rest| rest.starts_with('<') || rest.starts_with(' '))
        .ok_or_else(|| SnippetError::NotAnImpl(text.to_string()))?;
    let mut pos = text.len() - rest.len();

    let mut generics = Vec::new();
    if rest.starts_with('<') {
        let close = matching_close(text, pos)
            .ok_or_else(|| SnippetError::UnbalancedGenerics(text.to_string()))?;
        generics = split_top_level(&text[pos + 1..close]);
        pos = close + 1;
    }
    pos += text[pos..].len() - text[pos..].trim_start().len();

    let negative = text[pos..].starts_with('!');
    if negative {
        pos += 1;
    }

    let for_idx = find_top_level(text, pos, " for ")
        .ok_or_else(|| SnippetError::MissingFor(text.to_string()))?;
    let trait_ref = build_trait_ref(&decoded, trait_path, pos, for_idx);

    let entity_start = for_idx + " for ".len();
    let entity_end = decoded
        .where_start
        .filter(|&idx| idx >= entity_start)
        .or_else(|| find_top_level(text, entity_start, " where "))
        .unwrap_or(text.len());
    let raw_display = &text[entity_start..entity_end];
    let display = raw_display.trim();
    if display.is_empty() {
        return Err(SnippetError::MissingEntity(text.to_string()));
    }
    let display_start = entity_start + (raw_display.len() - raw_display.trim_start().len());
    let entity = build_entity_ref(&decoded, display, display_start, entity_end);

    let where_clause = Some(text[entity_end..].trim())
        .map(|clause| clause.strip_prefix("where").unwrap_or(clause))
        .map(|clause| clause.trim().trim_end_matches(',').trim_end())
        .filter(|clause| !clause.is_empty())
        .map(str::to_string);

    Ok(Fact {
        group: group.clone(),
        trait_ref,
        entity,
        generics,
        negative,
        synthetic,
        where_clause,
        html: html.to_string(),
    })
}

fn build_trait_ref(
    decoded: &Decoded,
    trait_path: &TraitPath,
    start: usize,
    end: usize,
) -> TraitRef {
    let trait_text = decoded.text[start..end].trim();
    let link = decoded.first_link_in(start, end);
    let name = match link {
        Some(link) => decoded.link_text(link).to_string(),
        None => trait_text
            .split('<')
            .next()
            .unwrap_or(trait_text)
            .trim()
            .to_string(),
    };
    let args = trait_text
        .strip_prefix(name.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    TraitRef {
        name,
        path: trait_path.clone(),
        href: link.and_then(|link| link.href.clone()),
        args,
    }
}

fn build_entity_ref(decoded: &Decoded, display: &str, start: usize, end: usize) -> EntityRef {
    match decoded.first_link_in(start, end) {
        Some(link) => {
            let (kind, path) = split_title(link);
            let raw_name = &decoded.text[link.start..link.end];
            let name = raw_name.trim();
            let name_offset = link.start - start + (raw_name.len() - raw_name.trim_start().len());
            EntityRef {
                name: name.to_string(),
                display: display.to_string(),
                kind,
                path,
                href: link.href.clone(),
                name_offset: display
                    .get(name_offset..)
                    .is_some_and(|rest| rest.starts_with(name))
                    .then_some(name_offset),
            }
        }
        None => EntityRef {
            name: display.to_string(),
            display: display.to_string(),
            kind: None,
            path: None,
            href: None,
            name_offset: None,
        },
    }
}

/// `title="struct anstream::adapter::StripStr"` carries both kind and path;
/// the class attribute is the fallback for the kind.
fn split_title(link: &Link) -> (Option<ItemKind>, Option<String>) {
    let from_title = link
        .title
        .as_deref()
        .and_then(|title| title.split_once(' '))
        .map(|(kind, path)| (ItemKind::from_class(kind), path.trim().to_string()));
    match from_title {
        Some((kind, path)) => (Some(kind), Some(path)),
        None => (link.class.as_deref().map(ItemKind::from_class), None),
    }
}

#[derive(Debug, Default)]
struct Link {
    class: Option<String>,
    href: Option<String>,
    title: Option<String>,
    start: usize,
    end: usize,
}

/// Snippet text with entities decoded and whitespace collapsed, plus the byte
/// ranges covered by anchors.
#[derive(Debug, Default)]
struct Decoded {
    text: String,
    links: Vec<Link>,
    where_start: Option<usize>,
}

impl Decoded {
    fn first_link_in(&self, start: usize, end: usize) -> Option<&Link> {
        self.links
            .iter()
            .find(|link| link.start >= start && link.start < end)
    }

    fn link_text(&self, link: &Link) -> &str {
        self.text[link.start..link.end].trim()
    }

    fn push_text(&mut self, raw: &str) {
        for ch in decode_entities(raw).chars() {
            if ch.is_whitespace() {
                if !self.text.is_empty() && !self.text.ends_with(' ') {
                    self.text.push(' ');
                }
            } else {
                self.text.push(ch);
            }
        }
    }
}

fn decode(html: &str) -> Result<Decoded, SnippetError> {
    let mut out = Decoded::default();
    let mut open_link: Option<Link> = None;
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        out.push_text(&rest[..lt]);
        let tag_len = tag_length(&rest[lt..])
            .ok_or_else(|| SnippetError::UnterminatedTag(html.to_string()))?;
        let tag = &rest[lt + 1..lt + tag_len - 1];
        rest = &rest[lt + tag_len..];

        if let Some(closing) = tag.strip_prefix('/') {
            if closing.trim().eq_ignore_ascii_case("a") {
                if let Some(mut link) = open_link.take() {
                    link.end = out.text.len();
                    out.links.push(link);
                }
            }
            continue;
        }

        let (name, attrs) = split_tag(tag);
        let class = attr(&attrs, "class");
        if class.is_some_and(|class| class.split_whitespace().any(|c| c == "where"))
            && out.where_start.is_none()
        {
            out.where_start = Some(out.text.len());
        }
        if matches!(name.as_str(), "div" | "br") && !out.text.ends_with(' ') {
            out.text.push(' ');
        }
        if name == "a" {
            open_link = Some(Link {
                class: class.map(str::to_string),
                href: attr(&attrs, "href").map(str::to_string),
                title: attr(&attrs, "title").map(str::to_string),
                start: out.text.len(),
                end: out.text.len(),
            });
        }
    }
    out.push_text(rest);

    if let Some(mut link) = open_link.take() {
        link.end = out.text.len();
        out.links.push(link);
    }
    while out.text.ends_with(' ') {
        out.text.pop();
    }
    // Offsets recorded before the trailing space was dropped must stay in bounds.
    let len = out.text.len();
    for link in &mut out.links {
        link.start = link.start.min(len);
        link.end = link.end.min(len);
    }
    if let Some(where_start) = out.where_start.as_mut() {
        *where_start = (*where_start).min(len);
    }
    Ok(out)
}

/// Length of the tag starting at `s[0] == '<'`, honoring quoted attribute
/// values.
fn tag_length(s: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (idx, ch) in s.char_indices().skip(1) {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '>') => return Some(idx + 1),
            (None, _) => {}
        }
    }
    None
}

fn split_tag(tag: &str) -> (String, Vec<(String, String)>) {
    let tag = tag.trim().trim_end_matches('/');
    let name_end = tag.find(char::is_whitespace).unwrap_or(tag.len());
    let name = tag[..name_end].to_ascii_lowercase();
    (name, parse_attrs(&tag[name_end..]))
}

fn parse_attrs(mut s: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    loop {
        s = s.trim_start();
        if s.is_empty() {
            break;
        }
        let name_end = s
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(s.len());
        let name = s[..name_end].to_ascii_lowercase();
        s = s[name_end..].trim_start();

        let value = if let Some(after_eq) = s.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            match after_eq.chars().next() {
                Some(q @ ('"' | '\'')) => {
                    let body = &after_eq[1..];
                    let end = body.find(q).unwrap_or(body.len());
                    s = body.get(end + 1..).unwrap_or("");
                    &body[..end]
                }
                _ => {
                    let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                    s = &after_eq[end..];
                    &after_eq[..end]
                }
            }
        } else {
            ""
        };
        if name.is_empty() {
            break;
        }
        attrs.push((name, decode_entities(value)));
    }
    attrs
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// Decode the entities rustdoc emits; unknown entities are kept verbatim.
pub fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            entity_char(entity).map(|ch| (ch, semi + 1))
        });
        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity_char(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let numeric = entity.strip_prefix('#')?;
            let code = match numeric.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Index of the `>` closing the `<` at `open`, skipping `->` arrows.
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut prev = '\0';
    for (idx, ch) in text[open..].char_indices() {
        match ch {
            '<' => depth += 1,
            '>' if prev != '-' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
        prev = ch;
    }
    None
}

/// Find `needle` starting at `from`, outside any `<>`, `()` or `[]` nesting.
fn find_top_level(text: &str, from: usize, needle: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut prev = '\0';
    for (idx, ch) in text[from..].char_indices() {
        let abs = from + idx;
        if depth == 0 && text[abs..].starts_with(needle) {
            return Some(abs);
        }
        match ch {
            '<' | '(' | '[' => depth += 1,
            '>' if prev != '-' => depth -= 1,
            ')' | ']' => depth -= 1,
            _ => {}
        }
        prev = ch;
    }
    None
}

/// Split a generic parameter list at commas that are not nested.
fn split_top_level(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut prev = '\0';
    let mut current = String::new();
    for ch in list.chars() {
        match ch {
            '<' | '(' | '[' => depth += 1,
            '>' if prev != '-' => depth -= 1,
            ')' | ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                prev = ch;
                continue;
            }
            _ => {}
        }
        current.push(ch);
        prev = ch;
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
