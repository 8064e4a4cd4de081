//! Upstream wire types and their normalized forms.

use super::frontmatter::Frontmatter;
use crate::strategy::Source;
use serde::{Deserialize, Serialize};

/// One item of the contents listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub sha: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl FileDescriptor {
    pub fn is_post(&self) -> bool {
        self.kind == "file" && (self.name.ends_with(".md") || self.name.ends_with(".markdown"))
    }
}

/// A post as shown in the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PostSummary {
    pub name: String,
    /// Display title derived from the file name.
    pub title: String,
    pub url: String,
    pub size: u64,
    pub sha: String,
}

/// `2024-01-02-offline_first.md` -> `2024 01 02 offline first`.
pub fn title_from_name(name: &str) -> String {
    let stem = name
        .strip_suffix(".markdown")
        .or_else(|| name.strip_suffix(".md"))
        .unwrap_or(name);
    stem.replace(['-', '_'], " ")
}

/// Keep markdown files, README first, then names descending.
pub fn order_posts(mut files: Vec<FileDescriptor>) -> Vec<FileDescriptor> {
    files.retain(FileDescriptor::is_post);
    files.sort_by(|a, b| {
        let a_readme = a.name == "README.md";
        let b_readme = b.name == "README.md";
        b_readme.cmp(&a_readme).then_with(|| b.name.cmp(&a.name))
    });
    files
}

/// A fetched post.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct Post {
    pub name: String,
    /// Frontmatter title, else the title derived from the file name.
    pub title: String,
    pub metadata: Frontmatter,
    pub body: String,
    pub source: Source,
}
