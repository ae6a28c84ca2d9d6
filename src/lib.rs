//! folio: a small personal site server
//!
//! Serves a handful of static pages, a blog read from YAML/Markdown post
//! files, a contact form that forwards messages by email, and a signed push
//! webhook that pulls new content and reloads the blog without a restart.

pub mod commands;
pub mod config;
pub mod content;
pub mod i18n;
pub mod mail;
pub mod server;
pub mod templates;
pub mod webhook;

use anyhow::Result;
use std::path::{Path, PathBuf};

use content::{ContentStore, MarkdownRenderer};

/// A site rooted at a directory
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Post files
    pub posts_dir: PathBuf,
    /// Files served under `/static`
    pub static_dir: PathBuf,
}

impl Site {
    /// Load the site configuration from a directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config = config::SiteConfig::load(base_dir.as_ref())?;
        Ok(Self::from_config(base_dir, config))
    }

    /// Build a site from an already resolved configuration
    pub fn from_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let posts_dir = base_dir.join(&config.posts_dir);
        let static_dir = base_dir.join(&config.static_dir);

        Self {
            config,
            base_dir,
            posts_dir,
            static_dir,
        }
    }

    /// Translation tables, with any overrides from `locales/`
    pub fn i18n(&self) -> Result<i18n::I18n> {
        let mut i18n = i18n::I18n::new(&self.config.language);
        i18n.load_languages(self.base_dir.join("locales"))?;
        Ok(i18n)
    }

    /// An empty post store for this site's posts directory
    pub fn content_store(&self) -> ContentStore {
        ContentStore::new(
            &self.posts_dir,
            MarkdownRenderer::with_config(&self.config.highlight),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_site_paths_follow_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("site.yml"), "posts_dir: content/posts\n").unwrap();

        let site = Site::new(tmp.path()).unwrap();
        assert_eq!(site.posts_dir, tmp.path().join("content/posts"));
        assert_eq!(site.static_dir, tmp.path().join("static"));
    }

    #[test]
    fn test_site_locale_overrides() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("locales")).unwrap();
        fs::write(tmp.path().join("locales/en.yml"), "nav:\n  blog: Notes\n").unwrap();

        let config = config::SiteConfig {
            language: "en".to_string(),
            ..Default::default()
        };
        let site = Site::from_config(tmp.path(), config);
        assert_eq!(site.i18n().unwrap().get("nav.blog"), "Notes");
    }
}
