//! Leading `---` metadata block of a markdown post.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)(.*)\z").expect("frontmatter pattern compiles")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, schemars::JsonSchema)]
pub struct Frontmatter {
    pub title: Option<String>,
    pub date: Option<String>,
    pub tags: Vec<String>,
    /// Every other `key: value` line.
    pub extra: BTreeMap<String, String>,
}

/// Split `content` into its frontmatter and the markdown body.
///
/// Content without a leading block yields empty metadata and the whole text.
pub fn parse(content: &str) -> (Frontmatter, &str) {
    let Some(caps) = BLOCK.captures(content) else {
        return (Frontmatter::default(), content);
    };
    let block = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(2).map_or("", |m| m.as_str());

    let mut meta = Frontmatter::default();
    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = unquote(value.trim());
        match key {
            "title" => meta.title = Some(value.to_string()),
            "date" => meta.date = Some(value.to_string()),
            "tags" => meta.tags = split_tags(value),
            _ => {
                meta.extra.insert(key.to_string(), value.to_string());
            }
        }
    }
    (meta, body)
}

fn unquote(value: &str) -> &str {
    let value = value.strip_prefix(['"', '\'']).unwrap_or(value);
    value.strip_suffix(['"', '\'']).unwrap_or(value)
}

/// `a, b` and `[a, b]` both give `["a", "b"]`.
fn split_tags(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|tag| tag.trim().trim_start_matches('[').trim_end_matches(']').trim())
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_block() {
        let content = "---\ntitle: \"Offline first\"\ndate: 2024-03-01\ntags: [rust, cache]\nauthor: bambans\n---\n# Hello\n";
        let (meta, body) = parse(content);
        assert_eq!(meta.title.as_deref(), Some("Offline first"));
        assert_eq!(meta.date.as_deref(), Some("2024-03-01"));
        assert_eq!(meta.tags, vec!["rust", "cache"]);
        assert_eq!(meta.extra["author"], "bambans");
        assert_eq!(body, "# Hello\n");
    }

    #[test]
    fn test_value_with_colon() {
        let (meta, _) = parse("---\ntitle: Rust: the good parts\n---\nbody");
        assert_eq!(meta.title.as_deref(), Some("Rust: the good parts"));
    }

    #[test]
    fn test_plain_tag_list() {
        let (meta, _) = parse("---\ntags: web, sw ,  \n---\n");
        assert_eq!(meta.tags, vec!["web", "sw"]);
    }

    #[test]
    fn test_no_block() {
        let content = "# Just markdown\n---\nnot: meta\n";
        let (meta, body) = parse(content);
        assert_eq!(meta, Frontmatter::default());
        assert_eq!(body, content);
    }

    #[test]
    fn test_crlf_block() {
        let (meta, body) = parse("---\r\ntitle: Windows\r\n---\r\ntext");
        assert_eq!(meta.title.as_deref(), Some("Windows"));
        assert_eq!(body, "text");
    }
}
