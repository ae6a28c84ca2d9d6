//! Post models

use chrono::{DateTime, Local};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::PathBuf;

/// A blog post
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    /// Slug (URL-friendly name, derived from the file name)
    pub slug: String,

    /// Post title
    pub title: String,

    /// Short summary shown on the listing page
    pub excerpt: String,

    /// Creation date as written in the source file
    pub created: String,

    /// Parsed creation date, when `created` is a recognizable date
    pub date: Option<DateTime<Local>>,

    /// Raw markdown content
    pub raw: String,

    /// Rendered, sanitized HTML content
    pub content: String,

    /// Source file path
    #[serde(skip)]
    pub source: PathBuf,
}

impl Post {
    /// Project the post into a listing row
    pub fn index_entry(&self) -> PostIndexEntry {
        PostIndexEntry {
            title: self.title.clone(),
            excerpt: self.excerpt.clone(),
            slug: self.slug.clone(),
            created: self.created.clone(),
        }
    }

    /// Listing order: newest first, undated posts last, ties by slug
    pub fn listing_order(a: &Post, b: &Post) -> Ordering {
        match (&a.date, &b.date) {
            (Some(da), Some(db)) => db.cmp(da).then_with(|| a.slug.cmp(&b.slug)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.slug.cmp(&b.slug),
        }
    }
}

/// A row on the blog listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostIndexEntry {
    pub title: String,
    pub excerpt: String,
    pub slug: String,
    pub created: String,
}
