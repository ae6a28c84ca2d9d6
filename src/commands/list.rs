//! List site content

use anyhow::Result;
use std::io::Write;

use crate::content::loader::ContentLoader;
use crate::content::MarkdownRenderer;
use crate::Site;

/// List site content by type
pub fn run(site: &Site, content_type: &str) -> Result<()> {
    let stdout = std::io::stdout();
    write_listing(site, content_type, &mut stdout.lock())
}

fn write_listing<W: Write>(site: &Site, content_type: &str, out: &mut W) -> Result<()> {
    let renderer = MarkdownRenderer::with_config(&site.config.highlight);
    let outcome = ContentLoader::new(&site.posts_dir, &renderer).load_all()?;

    match content_type {
        "post" | "posts" => {
            writeln!(out, "Posts ({}):", outcome.posts.len())?;
            for post in &outcome.posts {
                let date = post
                    .date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "----------".to_string());
                writeln!(
                    out,
                    "  {} - {} /posts/{} [{}]",
                    date,
                    post.title,
                    post.slug,
                    post.source.display()
                )?;
            }
        }
        "error" | "errors" => {
            writeln!(out, "Errors ({}):", outcome.errors.len())?;
            for error in &outcome.errors {
                writeln!(out, "  {}", error)?;
            }
        }
        _ => {
            anyhow::bail!("Unknown type: {}. Available: posts, errors", content_type);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> (TempDir, Site) {
        let tmp = TempDir::new().unwrap();
        let posts = tmp.path().join("posts");
        fs::create_dir(&posts).unwrap();
        fs::write(
            posts.join("first.yaml"),
            "title: First\ncreated: 2024-02-10\ncontent: Hi\n",
        )
        .unwrap();
        fs::write(posts.join("broken.yaml"), "title: [\n").unwrap();
        let site = Site::from_config(tmp.path(), SiteConfig::default());
        (tmp, site)
    }

    #[test]
    fn test_list_posts() {
        let (_tmp, site) = site();
        let mut out = Vec::new();
        write_listing(&site, "posts", &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Posts (1):"));
        assert!(out.contains("2024-02-10 - First /posts/first"));
    }

    #[test]
    fn test_list_errors() {
        let (_tmp, site) = site();
        let mut out = Vec::new();
        write_listing(&site, "errors", &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Errors (1):"));
        assert!(out.contains("broken.yaml"));
    }

    #[test]
    fn test_unknown_type() {
        let (_tmp, site) = site();
        assert!(write_listing(&site, "tags", &mut Vec::new()).is_err());
    }
}
