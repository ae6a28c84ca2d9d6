//! Page templates using the Tera template engine
//!
//! Templates are embedded in the binary. Every page extends `layout.html`,
//! and the renderer adds the site data and translation table to each
//! context so handlers only supply the page-specific payload.

use anyhow::{Context as _, Result};
use chrono::Datelike;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{Post, PostIndexEntry};
use crate::i18n::I18n;

/// Template renderer with the embedded site templates
pub struct TemplateRenderer {
    tera: Tera,
    site: SiteData,
    translations: HashMap<String, String>,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new(config: &SiteConfig, i18n: &I18n) -> Result<Self> {
        let mut tera = Tera::default();

        // Form values and post metadata are user-controlled
        tera.autoescape_on(vec![".html"]);

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("site/layout.html")),
            ("home.html", include_str!("site/home.html")),
            ("about.html", include_str!("site/about.html")),
            ("services.html", include_str!("site/services.html")),
            ("contact.html", include_str!("site/contact.html")),
            ("blog.html", include_str!("site/blog.html")),
            ("post.html", include_str!("site/post.html")),
            ("error.html", include_str!("site/error.html")),
        ])
        .context("failed to compile site templates")?;

        tera.register_filter("truncate_chars", truncate_chars_filter);

        Ok(Self {
            tera,
            site: SiteData::from_config(config),
            translations: i18n.get_all_translations(),
        })
    }

    /// Render a page template with the given page payload
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        let mut full = Context::new();
        full.insert("site", &self.site);
        full.insert("t", &self.translations);
        full.insert("year", &chrono::Local::now().year());
        full.extend(context.clone());

        self.tera
            .render(template_name, &full)
            .with_context(|| format!("failed to render template {}", template_name))
    }
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 160,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "…".to_string(),
    };

    if s.chars().count() <= length {
        Ok(tera::Value::String(s))
    } else {
        let truncated: String = s.chars().take(length).collect();
        Ok(tera::Value::String(format!(
            "{}{}",
            truncated.trim_end(),
            omission
        )))
    }
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub author: String,
    pub language: String,
    pub in_production: bool,
}

impl SiteData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            author: config.author.clone(),
            language: config.language.clone(),
            in_production: config.in_production,
        }
    }
}

/// A post as shown on its own page
#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub slug: String,
    pub title: String,
    pub date: String,
    pub datetime: Option<String>,
    pub excerpt: String,
    pub content: String,
}

impl PostData {
    pub fn new(post: &Post, language: &str) -> Self {
        let date = match &post.date {
            Some(dt) if language.starts_with("pt") => dt.format("%d/%m/%Y").to_string(),
            Some(dt) => dt.format("%B %-d, %Y").to_string(),
            None => post.created.clone(),
        };
        Self {
            slug: post.slug.clone(),
            title: post.title.clone(),
            date,
            datetime: post.date.map(|dt| dt.format("%Y-%m-%d").to_string()),
            excerpt: post.excerpt.clone(),
            content: post.content.clone(),
        }
    }
}

/// A card on the blog listing page
#[derive(Debug, Clone, Serialize)]
pub struct PostCard {
    pub title: String,
    pub excerpt: String,
    pub slug: String,
    pub created: String,
}

impl From<PostIndexEntry> for PostCard {
    fn from(entry: PostIndexEntry) -> Self {
        Self {
            title: entry.title,
            excerpt: entry.excerpt,
            slug: entry.slug,
            created: entry.created,
        }
    }
}

/// Values echoed back into the contact form
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactFormData {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::path::PathBuf;

    fn renderer() -> TemplateRenderer {
        let config = SiteConfig::default();
        TemplateRenderer::new(&config, &I18n::new(&config.language)).unwrap()
    }

    fn sample_post() -> Post {
        Post {
            slug: "hello".to_string(),
            title: "Hello <World>".to_string(),
            excerpt: "First".to_string(),
            created: "2024-01-15".to_string(),
            date: Local.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).single(),
            raw: "Hi".to_string(),
            content: "<p>Hi <em>there</em></p>".to_string(),
            source: PathBuf::from("posts/hello.yaml"),
        }
    }

    #[test]
    fn test_all_pages_render() {
        let renderer = renderer();
        for name in ["home.html", "about.html", "services.html"] {
            let mut ctx = Context::new();
            ctx.insert("title", "Page");
            let html = renderer.render(name, &ctx).unwrap();
            assert!(html.contains("<title>Page"));
            assert!(html.contains("/static/css/style.css"));
        }
    }

    #[test]
    fn test_post_content_is_not_escaped_but_title_is() {
        let renderer = renderer();
        let mut ctx = Context::new();
        ctx.insert("title", "Hello <World>");
        ctx.insert("post", &PostData::new(&sample_post(), "pt-BR"));
        let html = renderer.render("post.html", &ctx).unwrap();
        assert!(html.contains("<p>Hi <em>there</em></p>"));
        assert!(html.contains("Hello &lt;World&gt;"));
        assert!(html.contains(r#"<time datetime="2024-01-15">15&#x2F;01&#x2F;2024</time>"#));
    }

    #[test]
    fn test_contact_form_escapes_input() {
        let renderer = renderer();
        let mut ctx = Context::new();
        ctx.insert("title", "Contato");
        ctx.insert("csrf_token", "tok");
        ctx.insert("success", &false);
        ctx.insert("error", "Oops");
        ctx.insert(
            "form",
            &ContactFormData {
                name: "<b>Ana</b>".to_string(),
                email: "ana@example.com".to_string(),
                message: String::new(),
            },
        );
        let html = renderer.render("contact.html", &ctx).unwrap();
        assert!(html.contains("&lt;b&gt;Ana&lt;&#x2F;b&gt;"));
        assert!(html.contains(r#"value="tok""#));
        assert!(html.contains("Oops"));
    }

    #[test]
    fn test_blog_lists_cards() {
        let renderer = renderer();
        let cards: Vec<PostCard> = vec![sample_post().index_entry().into()];
        let mut ctx = Context::new();
        ctx.insert("title", "Blog");
        ctx.insert("posts", &cards);
        let html = renderer.render("blog.html", &ctx).unwrap();
        assert!(html.contains(r#"href="/posts/hello""#));
    }

    #[test]
    fn test_unknown_template_fails() {
        let renderer = renderer();
        assert!(renderer.render("missing.html", &Context::new()).is_err());
    }

    #[test]
    fn test_truncate_chars_filter() {
        let mut args = HashMap::new();
        args.insert("length".to_string(), tera::Value::from(5));
        let value = tera::Value::String("Olá mundo".to_string());
        let out = truncate_chars_filter(&value, &args).unwrap();
        assert_eq!(out, tera::Value::String("Olá m…".to_string()));
    }
}
