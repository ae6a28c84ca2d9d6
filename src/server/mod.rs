//! HTTP server: routes, shared state and middleware

mod csrf;
mod error;
mod handlers;

use anyhow::Result;
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tera::Context;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::SiteConfig;
use crate::content::ContentStore;
use crate::i18n::I18n;
use crate::mail::{Mailer, SmtpMailer};
use crate::templates::TemplateRenderer;
use crate::webhook::{ContentUpdater, GitPull, Refresher};
use crate::Site;

pub use csrf::CsrfToken;
pub use error::AppError;

pub type SharedState = Arc<AppState>;

/// Everything the handlers share
pub struct AppState {
    pub config: SiteConfig,
    pub static_dir: PathBuf,
    pub store: Arc<ContentStore>,
    pub templates: TemplateRenderer,
    pub i18n: I18n,
    pub mailer: Arc<dyn Mailer>,
    pub refresher: Refresher,
}

impl AppState {
    /// Wire up the state for `site` with the given collaborators
    pub fn new(
        site: &Site,
        mailer: Arc<dyn Mailer>,
        updater: Arc<dyn ContentUpdater>,
    ) -> Result<Self> {
        let i18n = site.i18n()?;
        let templates = TemplateRenderer::new(&site.config, &i18n)?;
        let store = Arc::new(site.content_store());
        let refresher = Refresher::new(&site.config.webhook, updater, store.clone());

        Ok(Self {
            config: site.config.clone(),
            static_dir: site.static_dir.clone(),
            store,
            templates,
            i18n,
            mailer,
            refresher,
        })
    }

    /// Production wiring: SMTP mail and `git pull` in the posts directory
    pub fn for_site(site: &Site) -> Result<Self> {
        let i18n = site.i18n()?;
        let mailer = Arc::new(SmtpMailer::new(site.config.mail.clone(), &i18n));
        let updater = Arc::new(GitPull::new(&site.posts_dir));
        Self::new(site, mailer, updater)
    }

    /// Render a page whose title comes from the translation table
    fn page(
        &self,
        template: &str,
        title_key: &str,
        mut context: Context,
    ) -> Result<Html<String>, AppError> {
        context.insert("title", &self.i18n.get(title_key));
        Ok(Html(self.templates.render(template, &context)?))
    }

    fn not_found_page(&self) -> Response {
        let mut context = Context::new();
        context.insert("message", &self.i18n.get("error.not_found"));
        match self.page("error.html", "page.not_found", context) {
            Ok(html) => (StatusCode::NOT_FOUND, html).into_response(),
            Err(e) => {
                tracing::error!("Failed to render not found page: {}", e);
                StatusCode::NOT_FOUND.into_response()
            }
        }
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| o.starts_with("http://") || o.starts_with("https://"))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(csrf::HEADER_NAME)])
        .max_age(Duration::from_secs(300))
}

/// Build the application router
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/about", get(handlers::about))
        .route("/services", get(handlers::services))
        .route(
            "/contact",
            get(handlers::contact_form).post(handlers::contact_submit),
        )
        .route("/blog", get(handlers::blog))
        .route("/posts/:slug", get(handlers::post))
        .route("/webhook", post(handlers::webhook))
        .nest_service("/static", ServeDir::new(&state.static_dir))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), csrf::protect))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn start(site: &Site, ip: &str, port: u16) -> Result<()> {
    let state = Arc::new(AppState::for_site(site)?);

    // Warm the store; a failure here is retried by the first blog request
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.reload()).await? {
        Ok(report) => tracing::info!("{} posts ready", report.loaded),
        Err(e) => tracing::warn!("Initial content load failed: {}", e),
    }

    let app = build_router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server running at http://{}:{}", ip, port);
    axum::serve(listener, app).await?;

    Ok(())
}
