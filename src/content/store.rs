//! In-memory post store
//!
//! The store holds an immutable [`Snapshot`] behind an `Arc`. A reload builds
//! a complete new snapshot first and then swaps the pointer, so a reader sees
//! either the old set of posts or the new one, never a mix. Reloads are
//! serialized by a writer mutex.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::loader::ContentLoader;
use super::{ContentError, MarkdownRenderer, Post, PostIndexEntry};

/// One complete, immutable view of the posts directory
#[derive(Debug)]
pub struct Snapshot {
    posts: Vec<Arc<Post>>,
    by_slug: HashMap<String, Arc<Post>>,
}

impl Snapshot {
    fn new(posts: Vec<Post>) -> Self {
        let posts: Vec<Arc<Post>> = posts.into_iter().map(Arc::new).collect();
        let by_slug = posts
            .iter()
            .map(|p| (p.slug.clone(), Arc::clone(p)))
            .collect();
        Self { posts, by_slug }
    }

    /// Exact-match lookup by slug
    pub fn get(&self, slug: &str) -> Option<Arc<Post>> {
        self.by_slug.get(slug).cloned()
    }

    /// Listing rows, newest first
    pub fn list(&self) -> Vec<PostIndexEntry> {
        self.posts.iter().map(|p| p.index_entry()).collect()
    }

    /// Posts in listing order
    pub fn posts(&self) -> &[Arc<Post>] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// Summary of a reload
#[derive(Debug)]
pub struct LoadReport {
    /// Number of posts now being served
    pub loaded: usize,
    /// Files that were skipped
    pub errors: Vec<ContentError>,
}

/// Process-wide post store
pub struct ContentStore {
    posts_dir: PathBuf,
    renderer: MarkdownRenderer,
    current: RwLock<Option<Arc<Snapshot>>>,
    writer: Mutex<()>,
}

impl ContentStore {
    /// Create an empty store; nothing is read until the first load
    pub fn new<P: AsRef<Path>>(posts_dir: P, renderer: MarkdownRenderer) -> Self {
        Self {
            posts_dir: posts_dir.as_ref().to_path_buf(),
            renderer,
            current: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Re-read the posts directory and swap in the result.
    ///
    /// On error the previous snapshot stays in place.
    pub fn reload(&self) -> Result<LoadReport, ContentError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.reload_locked()
    }

    fn reload_locked(&self) -> Result<LoadReport, ContentError> {
        let outcome = ContentLoader::new(&self.posts_dir, &self.renderer).load_all()?;
        let snapshot = Arc::new(Snapshot::new(outcome.posts));
        let loaded = snapshot.len();
        if snapshot.is_empty() {
            tracing::warn!("No posts found in {:?}", self.posts_dir);
        }

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);

        tracing::info!(
            "Loaded {} posts from {:?} ({} skipped)",
            loaded,
            self.posts_dir,
            outcome.errors.len()
        );

        Ok(LoadReport {
            loaded,
            errors: outcome.errors,
        })
    }

    /// The snapshot currently served, if any load has succeeded
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current snapshot, loading it first if nothing has been loaded yet
    pub fn snapshot(&self) -> Result<Arc<Snapshot>, ContentError> {
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }

        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished a load while we waited
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }

        self.reload_locked()?;
        self.current()
            .ok_or_else(|| ContentError::MissingDirectory(self.posts_dir.clone()))
    }

    /// Look up one post by slug
    pub fn get(&self, slug: &str) -> Result<Option<Arc<Post>>, ContentError> {
        Ok(self.snapshot()?.get(slug))
    }

    /// Listing rows for the blog index
    pub fn list(&self) -> Result<Vec<PostIndexEntry>, ContentError> {
        Ok(self.snapshot()?.list())
    }
}
