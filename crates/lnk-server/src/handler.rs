use std::sync::Arc;

use axum::extract::{Form, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use lnk_protocol::HealthResponse;
use lnk_store::Store;
use serde::Deserialize;
use tracing::info;

use crate::error::ServerResult;

const ADD_FORM: &str = r#"<!DOCTYPE html>
<html>
<head>
	<title>Add URL</title>
</head>
<body>
	<h1>Add URL</h1>
	<form method="POST" action="/add">
		URL: <input type="text" name="url">
		<input type="submit" value="Add">
	</form>
</body>
</html>
"#;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Host part of the short links returned by `/add`.
    pub hostname: String,
    pub role: &'static str,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, hostname: impl Into<String>, role: &'static str) -> Self {
        Self {
            store,
            hostname: hostname.into(),
            role,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AddParams {
    #[serde(default)]
    pub url: String,
}

/// Health check handler.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::for_role(state.role))
}

/// `GET /{key}`: 302 to the stored URL.
pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ServerResult<Response> {
    let url = state.store.get(&key).await?;
    info!(%key, %url, "redirect");
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

/// `GET /add`: the form, or an add when `?url=` is given.
pub async fn add_query_handler(
    State(state): State<AppState>,
    Query(params): Query<AddParams>,
) -> ServerResult<Response> {
    add(&state, params.url).await
}

/// `POST /add` with a form-encoded `url` field.
pub async fn add_form_handler(
    State(state): State<AppState>,
    Form(params): Form<AddParams>,
) -> ServerResult<Response> {
    add(&state, params.url).await
}

async fn add(state: &AppState, url: String) -> ServerResult<Response> {
    if url.is_empty() {
        return Ok(Html(ADD_FORM).into_response());
    }
    let key = state.store.put(url.clone()).await?;
    info!(%key, %url, "add");
    Ok(format!("http://{}/{}", state.hostname, key).into_response())
}
