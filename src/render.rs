//! Presentation of query results.

use crate::catalog::Fact;
use anyhow::{Result, bail};
use std::fmt::Write as _;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Text,
    Markdown,
    Json,
}

impl FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "text" => Ok(Self::Text),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            other => bail!("unknown format '{other}' (expected text|markdown|json)"),
        }
    }
}

/// Render facts in `format`. `base_url` is prefixed to relative doc links in
/// Markdown output.
pub fn render<'a>(
    facts: impl IntoIterator<Item = &'a Fact>,
    format: Format,
    base_url: Option<&str>,
) -> Result<String> {
    let facts: Vec<&Fact> = facts.into_iter().collect();
    match format {
        Format::Text => Ok(facts.iter().map(|fact| text_line(fact) + "\n").collect()),
        Format::Markdown => Ok(facts
            .iter()
            .map(|fact| format!("- {}\n", markdown_line(fact, base_url)))
            .collect()),
        Format::Json => Ok(serde_json::to_string_pretty(&facts)? + "\n"),
    }
}

/// `impl<'s> Iterator for StripStr<'s> where ...`
pub fn text_line(fact: &Fact) -> String {
    let mut line = fact.header();
    if let Some(clause) = &fact.where_clause {
        let _ = write!(line, " where {clause}");
    }
    line
}

/// Header with the trait and type names linked to their documentation.
pub fn markdown_line(fact: &Fact, base_url: Option<&str>) -> String {
    let mut line = String::from("`impl");
    if !fact.generics.is_empty() {
        let _ = write!(line, "<{}>", fact.generics.join(", "));
    }
    line.push_str("` ");
    if fact.negative {
        line.push('!');
    }
    line.push_str(&link(&fact.trait_ref.name, fact.trait_ref.href.as_deref(), base_url));
    if !fact.trait_ref.args.is_empty() {
        let _ = write!(line, "`{}`", fact.trait_ref.args);
    }
    line.push_str(" for ");

    let entity = &fact.entity;
    let name_at = entity
        .name_offset
        .or_else(|| entity.display.starts_with(entity.name.as_str()).then_some(0))
        .filter(|&at| {
            entity
                .display
                .get(at..)
                .is_some_and(|rest| rest.starts_with(entity.name.as_str()))
        });
    match name_at {
        Some(at) if entity.href.is_some() => {
            let (before, rest) = entity.display.split_at(at);
            let after = &rest[entity.name.len()..];
            if !before.is_empty() {
                let _ = write!(line, "`{before}`");
            }
            line.push_str(&link(&entity.name, entity.href.as_deref(), base_url));
            if !after.is_empty() {
                let _ = write!(line, "`{after}`");
            }
        }
        _ => {
            let _ = write!(line, "`{}`", entity.display);
        }
    }

    if let Some(clause) = &fact.where_clause {
        let _ = write!(line, " `where {clause}`");
    }
    line
}

fn link(label: &str, href: Option<&str>, base_url: Option<&str>) -> String {
    match href {
        Some(href) => format!("[`{label}`]({})", resolve_href(href, base_url)),
        None => format!("`{label}`"),
    }
}

fn resolve_href(href: &str, base_url: Option<&str>) -> String {
    let absolute = href.contains("://") || href.starts_with('/');
    match base_url {
        Some(base) if !absolute => format!("{}/{}", base.trim_end_matches('/'), href),
        _ => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::fixtures::fact;

    fn sample() -> Fact {
        let mut f = fact("memchr", "Memchr", "core::iter::traits::iterator::Iterator");
        f.entity.display = "Memchr<'h>".to_string();
        f.generics = vec!["'h".to_string()];
        f.trait_ref.href = Some("https://doc.rust-lang.org/core/iter/trait.Iterator.html".into());
        f
    }

    #[test]
    fn parses_formats() {
        assert_eq!("md".parse::<Format>().unwrap(), Format::Markdown);
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert!("yaml".parse::<Format>().is_err());
    }

    #[test]
    fn text_lines_include_where_clause() {
        let mut f = sample();
        assert_eq!(text_line(&f), "impl<'h> Iterator for Memchr<'h>");
        f.where_clause = Some("'h: 'static".into());
        assert_eq!(text_line(&f), "impl<'h> Iterator for Memchr<'h> where 'h: 'static");
    }

    #[test]
    fn markdown_links_resolve_against_base() {
        let line = markdown_line(&sample(), Some("https://docs.example/"));
        assert_eq!(
            line,
            "`impl<'h>` [`Iterator`](https://doc.rust-lang.org/core/iter/trait.Iterator.html) for [`Memchr`](https://docs.example/memchr/struct.Memchr.html)`<'h>`"
        );
    }

    #[test]
    fn unlinked_entity_is_code() {
        let mut f = sample();
        f.entity.href = None;
        f.entity.display = "&'a mut I".into();
        let line = markdown_line(&f, None);
        assert!(line.ends_with(" for `&'a mut I`"));
    }

    #[test]
    fn entity_link_uses_recorded_offset() {
        let mut f = sample();
        f.entity.name = "str".into();
        f.entity.display = "&'str str".into();
        f.entity.href = Some("core/primitive.str.html".into());
        f.entity.name_offset = Some(6);
        let line = markdown_line(&f, None);
        assert!(line.ends_with(" for `&'str `[`str`](core/primitive.str.html)"));
    }

    #[test]
    fn json_is_an_array() {
        let facts = [sample()];
        let out = render(facts.iter(), Format::Json, None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(1));
    }
}
