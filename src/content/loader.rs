//! Content loader - loads posts from the posts directory

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{ContentError, FrontMatter, MarkdownRenderer, Post};

/// File extensions recognised as post sources
const POST_EXTENSIONS: [&str; 4] = ["yaml", "yml", "md", "markdown"];

/// Result of loading every post in a directory
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Posts that loaded cleanly, in listing order
    pub posts: Vec<Post>,
    /// Files that were skipped, with the reason
    pub errors: Vec<ContentError>,
}

/// Loads posts from a single directory
pub struct ContentLoader<'a> {
    posts_dir: &'a Path,
    renderer: &'a MarkdownRenderer,
}

impl<'a> ContentLoader<'a> {
    /// Create a new content loader
    pub fn new(posts_dir: &'a Path, renderer: &'a MarkdownRenderer) -> Self {
        Self {
            posts_dir,
            renderer,
        }
    }

    /// Load every post file in the directory.
    ///
    /// A broken file is reported in [`LoadOutcome::errors`] and skipped; only
    /// an unreadable directory fails the whole load.
    pub fn load_all(&self) -> Result<LoadOutcome, ContentError> {
        let files = self.post_files()?;

        let mut outcome = LoadOutcome::default();
        let mut claimed: HashMap<String, PathBuf> = HashMap::new();

        for path in files {
            let slug = match slug_for(&path) {
                Some(slug) => slug,
                None => {
                    outcome.errors.push(ContentError::Parse {
                        path,
                        message: "file name does not produce a usable slug".to_string(),
                    });
                    continue;
                }
            };

            if let Some(first) = claimed.get(&slug) {
                outcome.errors.push(ContentError::DuplicateSlug {
                    slug,
                    path,
                    first: first.clone(),
                });
                continue;
            }

            match self.load_post(&path, &slug) {
                Ok(post) => {
                    claimed.insert(slug, path);
                    outcome.posts.push(post);
                }
                Err(e) => outcome.errors.push(e),
            }
        }

        for error in &outcome.errors {
            tracing::warn!("Skipping post: {}", error);
        }

        outcome.posts.sort_by(Post::listing_order);
        Ok(outcome)
    }

    /// Post source files in the directory, sorted by path
    fn post_files(&self) -> Result<Vec<PathBuf>, ContentError> {
        if !self.posts_dir.is_dir() {
            return Err(ContentError::MissingDirectory(self.posts_dir.to_path_buf()));
        }

        let dir = glob::Pattern::escape(&self.posts_dir.to_string_lossy());
        let mut files = Vec::new();

        for ext in POST_EXTENSIONS {
            let pattern = format!("{}/*.{}", dir, ext);
            let entries = glob::glob(&pattern).map_err(|e| ContentError::Io {
                path: self.posts_dir.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
            })?;

            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => files.push(path),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Cannot read {:?}: {}", e.path(), e.error());
                    }
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Load a single post from a file
    fn load_post(&self, path: &Path, slug: &str) -> Result<Post, ContentError> {
        let text = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let parse_error = |message: String| ContentError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let fm = if is_markdown_file(path) {
            let (mut fm, body) = FrontMatter::parse(&text).map_err(|e| parse_error(e.to_string()))?;
            if fm.content.is_none() {
                fm.content = Some(body.to_string());
            }
            fm
        } else {
            FrontMatter::from_yaml(&text).map_err(|e| parse_error(e.to_string()))?
        };

        let date = fm.parse_created();
        let title = fm
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| parse_error("missing `title`".to_string()))?;
        let raw = fm
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| parse_error("missing `content`".to_string()))?;

        let (marked_excerpt, body) = MarkdownRenderer::split_excerpt(&raw);
        let content = self
            .renderer
            .render(&body)
            .map_err(|e| ContentError::Render {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let excerpt = fm
            .excerpt
            .or(marked_excerpt)
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(Post {
            slug: slug.to_string(),
            title: title.trim().to_string(),
            excerpt,
            created: fm.created.unwrap_or_default(),
            date,
            raw,
            content,
            source: path.to_path_buf(),
        })
    }
}

/// URL-safe slug from the file stem
fn slug_for(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let slug = slug::slugify(stem);
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Check if a file is a markdown file
fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "md" || e == "markdown")
        .unwrap_or(false)
}
