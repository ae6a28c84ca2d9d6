//! Content module - handles posts and content processing

mod frontmatter;
pub mod loader;
mod markdown;
mod post;
pub mod store;

use std::path::PathBuf;
use thiserror::Error;

pub use frontmatter::{FrontMatter, FrontMatterError};
pub use markdown::{MarkdownRenderer, RenderError};
pub use post::{Post, PostIndexEntry};
pub use store::{ContentStore, LoadReport, Snapshot};

/// Errors raised while loading posts
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("posts directory {0:?} does not exist")]
    MissingDirectory(PathBuf),

    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("cannot render {path:?}: {message}")]
    Render { path: PathBuf, message: String },

    #[error("slug {slug:?} of {path:?} is already used by {first:?}")]
    DuplicateSlug {
        slug: String,
        path: PathBuf,
        first: PathBuf,
    },
}
