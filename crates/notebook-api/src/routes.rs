use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use notebook_core::models::{Note, User};
use notebook_core::store::RemoteStore;

use crate::auth::{extract_bearer_token, AuthenticatedUser, TokenVerifier};
use crate::config::AppConfig;
use crate::error::AppError;

pub struct AppState<R> {
    pub config: Arc<AppConfig>,
    verifier: Arc<dyn TokenVerifier>,
    store: R,
}

impl<R: Clone> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            verifier: self.verifier.clone(),
            store: self.store.clone(),
        }
    }
}

impl<R> AppState<R> {
    pub fn new(config: Arc<AppConfig>, verifier: Arc<dyn TokenVerifier>, store: R) -> Self {
        Self {
            config,
            verifier,
            store,
        }
    }
}

pub fn app_router<R>(state: AppState<R>) -> Router
where
    R: RemoteStore + Clone + 'static,
{
    let protected_routes = Router::new()
        .route("/api/notes", get(list_notes::<R>).post(create_note::<R>))
        .route("/api/users/upsert", post(upsert_user::<R>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_auth::<R>,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/config", get(client_config::<R>))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

#[derive(Debug, Serialize)]
struct ClientConfigResponse {
    supabase: SupabasePublicConfig,
}

#[derive(Debug, Serialize)]
struct SupabasePublicConfig {
    url: String,
    anon_key: String,
    bucket: String,
}

/// Public client bootstrap configuration. The anon key is the only key that
/// ever appears here.
async fn client_config<R>(State(state): State<AppState<R>>) -> Json<ClientConfigResponse>
where
    R: RemoteStore + Clone + 'static,
{
    Json(ClientConfigResponse {
        supabase: SupabasePublicConfig {
            url: state.config.supabase.url().to_string(),
            anon_key: state.config.supabase.anon_key().to_string(),
            bucket: state.config.supabase.bucket().to_string(),
        },
    })
}

async fn require_auth<R>(
    State(state): State<AppState<R>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError>
where
    R: RemoteStore + Clone + 'static,
{
    let token = extract_bearer_token(request.headers())?;
    let user = state.verifier.verify_access_token(token).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
struct NotesResponse {
    notes: Vec<Note>,
}

async fn list_notes<R>(
    State(state): State<AppState<R>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<NotesResponse>, AppError>
where
    R: RemoteStore + Clone + 'static,
{
    let notes = state.store.list_notes(&user.user_id).await?;
    Ok(Json(NotesResponse { notes }))
}

#[derive(Debug, Deserialize)]
struct CreateNoteRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct NoteResponse {
    note: Note,
}

async fn create_note<R>(
    State(state): State<AppState<R>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<NoteResponse>), AppError>
where
    R: RemoteStore + Clone + 'static,
{
    if request.title.trim().is_empty() || request.content.trim().is_empty() {
        return Err(AppError::bad_request("Title and content are required."));
    }

    let draft = Note::draft(&user.user_id, request.title, request.content);
    let note = state.store.insert_note(&draft).await?;
    tracing::info!(user = %user.user_id, note = note.id.as_deref().unwrap_or("?"), "Created note");
    Ok((StatusCode::CREATED, Json(NoteResponse { note })))
}

#[derive(Debug, Deserialize)]
struct UpsertUserRequest {
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct UserResponse {
    user: User,
}

/// Upsert the caller's profile row. The row key is always the verified token
/// subject; any id in the request body is ignored.
async fn upsert_user<R>(
    State(state): State<AppState<R>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<UpsertUserRequest>,
) -> Result<Json<UserResponse>, AppError>
where
    R: RemoteStore + Clone + 'static,
{
    let profile = User::from_provider(
        &user.user_id,
        request.email.or(user.email),
        request.display_name,
        request.photo_url,
    );
    let stored = state.store.upsert_user(&profile).await?;
    tracing::info!(user = %user.user_id, "Upserted user profile");
    Ok(Json(UserResponse { user: stored }))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use notebook_core::store::MemoryStore;

    use super::*;

    struct StaticVerifier;

    #[async_trait]
    impl TokenVerifier for StaticVerifier {
        async fn verify_access_token(
            &self,
            token: &str,
        ) -> Result<AuthenticatedUser, AppError> {
            if token == "valid-token" {
                Ok(AuthenticatedUser {
                    user_id: "user-1".to_string(),
                    email: Some("user@example.com".to_string()),
                })
            } else {
                Err(AppError::unauthorized("Token validation failed"))
            }
        }
    }

    fn test_config() -> Arc<AppConfig> {
        let config = AppConfig::from_lookup(|name| match name {
            "SUPABASE_URL" => Some("https://project.supabase.co".to_string()),
            "SUPABASE_ANON_KEY" => Some("public-anon-key".to_string()),
            _ => None,
        })
        .unwrap();
        Arc::new(config)
    }

    fn test_router(store: MemoryStore) -> Router {
        let state = AppState::new(test_config(), Arc::new(StaticVerifier), store);
        app_router(state)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn authed(request: axum::http::request::Builder) -> axum::http::request::Builder {
        request.header("authorization", "Bearer valid-token")
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let response = test_router(MemoryStore::new())
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn config_exposes_only_public_values() {
        let response = test_router(MemoryStore::new())
            .oneshot(
                Request::builder()
                    .uri("/config")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["supabase"]["url"], "https://project.supabase.co");
        assert_eq!(body["supabase"]["anon_key"], "public-anon-key");
        assert_eq!(body["supabase"]["bucket"], "note-attachments");
    }

    #[tokio::test]
    async fn notes_routes_require_a_bearer_token() {
        let response = test_router(MemoryStore::new())
            .oneshot(
                Request::builder()
                    .uri("/api/notes")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_note_returns_201_with_stored_row() {
        let response = test_router(MemoryStore::new())
            .oneshot(
                authed(Request::builder().method("POST").uri("/api/notes"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"title": "Groceries", "content": "Milk, eggs"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["note"]["title"], "Groceries");
        assert_eq!(body["note"]["user_id"], "user-1");
        assert!(body["note"]["id"].is_string());
    }

    #[tokio::test]
    async fn create_note_rejects_missing_fields_with_exact_error() {
        let response = test_router(MemoryStore::new())
            .oneshot(
                authed(Request::builder().method("POST").uri("/api/notes"))
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"title": ""}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body, json!({"error": "Title and content are required."}));
    }

    #[tokio::test]
    async fn list_notes_is_scoped_to_the_token_subject() {
        let store = MemoryStore::new();
        store
            .insert_note(&Note::draft("user-1", "mine", "c"))
            .await
            .unwrap();
        store
            .insert_note(&Note::draft("user-2", "theirs", "c"))
            .await
            .unwrap();

        let response = test_router(store)
            .oneshot(
                authed(Request::builder().uri("/api/notes"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let notes = body["notes"].as_array().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["title"], "mine");
    }

    #[tokio::test]
    async fn upsert_user_is_keyed_by_the_token_subject() {
        let response = test_router(MemoryStore::new())
            .oneshot(
                authed(Request::builder().method("POST").uri("/api/users/upsert"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({"display_name": "Ada", "photo_url": null}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user"]["id"], "user-1");
        assert_eq!(body["user"]["display_name"], "Ada");
        assert_eq!(body["user"]["email"], "user@example.com");
        assert_eq!(body["user"]["is_premium"], false);
    }
}
