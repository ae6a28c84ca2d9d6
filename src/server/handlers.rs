//! Request handlers

use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;
use tera::Context;

use super::csrf::CsrfToken;
use super::error::AppError;
use super::SharedState;
use crate::mail::ContactMessage;
use crate::templates::{ContactFormData, PostCard, PostData};
use crate::webhook::{RefreshOutcome, SIGNATURE_HEADER};

pub async fn home(State(state): State<SharedState>) -> Result<Html<String>, AppError> {
    state.page("home.html", "page.home", Context::new())
}

pub async fn about(State(state): State<SharedState>) -> Result<Html<String>, AppError> {
    state.page("about.html", "page.about", Context::new())
}

pub async fn services(State(state): State<SharedState>) -> Result<Html<String>, AppError> {
    state.page("services.html", "page.services", Context::new())
}

pub async fn blog(State(state): State<SharedState>) -> Result<Html<String>, AppError> {
    let store = state.store.clone();
    let entries = tokio::task::spawn_blocking(move || store.list()).await??;

    let cards: Vec<PostCard> = entries.into_iter().map(PostCard::from).collect();
    let mut context = Context::new();
    context.insert("posts", &cards);
    state.page("blog.html", "page.blog", context)
}

pub async fn post(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let store = state.store.clone();
    let lookup = slug.clone();
    let Some(post) = tokio::task::spawn_blocking(move || store.get(&lookup)).await?? else {
        tracing::debug!("No post with slug {:?}", slug);
        return Ok(state.not_found_page());
    };

    let mut context = Context::new();
    context.insert("title", &post.title);
    context.insert("post", &PostData::new(&post, state.i18n.language()));
    let html = state.templates.render("post.html", &context)?;
    Ok(Html(html).into_response())
}

pub async fn not_found(State(state): State<SharedState>) -> Response {
    state.not_found_page()
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    success: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    name: String,
    email: String,
    message: String,
}

impl ContactForm {
    fn is_complete(&self) -> bool {
        [&self.name, &self.email, &self.message]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    fn echo(&self) -> ContactFormData {
        ContactFormData {
            name: self.name.clone(),
            email: self.email.clone(),
            message: self.message.clone(),
        }
    }
}

fn contact_context(token: &CsrfToken, form: ContactFormData) -> Context {
    let mut context = Context::new();
    context.insert("csrf_token", token.as_str());
    context.insert("form", &form);
    context
}

pub async fn contact_form(
    State(state): State<SharedState>,
    Query(query): Query<ContactQuery>,
    Extension(token): Extension<CsrfToken>,
) -> Result<Html<String>, AppError> {
    let mut context = contact_context(&token, ContactFormData::default());
    context.insert("success", &(query.success.as_deref() == Some("true")));
    state.page("contact.html", "page.contact", context)
}

pub async fn contact_submit(
    State(state): State<SharedState>,
    Extension(token): Extension<CsrfToken>,
    Form(form): Form<ContactForm>,
) -> Result<Response, AppError> {
    let mut context = contact_context(&token, form.echo());

    if !form.is_complete() {
        context.insert("error", &state.i18n.get("contact.error_required"));
        return Ok(state.page("contact.html", "page.contact", context)?.into_response());
    }

    let message = ContactMessage {
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        message: form.message.trim().to_string(),
    };

    match state.mailer.send(&message).await {
        Ok(()) => Ok(Redirect::to("/contact?success=true").into_response()),
        Err(e) => {
            tracing::error!("Failed to send contact message: {}", e);
            context.insert("error", &state.i18n.get("contact.error_send"));
            Ok(state.page("contact.html", "page.contact", context)?.into_response())
        }
    }
}

pub async fn webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.refresher.handle(signature, &body).await {
        Ok(RefreshOutcome::Refreshed(_)) => (StatusCode::OK, "OK").into_response(),
        Ok(RefreshOutcome::Ignored { .. }) => (StatusCode::ACCEPTED, "ignored").into_response(),
        Err(e) => e.into_response(),
    }
}
