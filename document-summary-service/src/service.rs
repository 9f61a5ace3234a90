use std::collections::HashMap;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use axum::{
    Router,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Json,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use session_flow::{InMemorySessionStorage, Session, SessionStorage};
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::PipelineError;
use crate::models::{
    ChatHistoryResponse, ChatRequest, DocumentListResponse, SessionResponse, SummarizeRequest,
    SummarizeResponse, UploadResponse,
};
use crate::pipeline::{self, QueryEngine};
use crate::store::DocumentStore;

/// Keys under which a session's domain state lives in its context.
pub mod session_keys {
    /// Map of document display name -> stored file path.
    pub const FILE_CACHE: &str = "file_cache";
    /// True while a summarization run is in flight for this session.
    pub const PROCESSING: &str = "processing";
    /// Display name of the most recently summarized document.
    pub const ACTIVE_DOCUMENT: &str = "active_document";
    /// Root summary of the active document.
    pub const LAST_SUMMARY: &str = "last_summary";
}

type ApiResult<T> = Result<Json<T>, ApiError>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn conflict_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn pipeline_error(e: &PipelineError) -> ApiError {
    let status = match e {
        PipelineError::DocumentLoad(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub store: Arc<DocumentStore>,
    pub session_storage: Arc<dyn SessionStorage>,
    pub query_engines: Arc<DashMap<String, Arc<QueryEngine>>>,
}

pub async fn create_app(config: ServiceConfig) -> anyhow::Result<Router> {
    let app_state = create_app_state(config).await?;
    Ok(build_router(app_state))
}

async fn create_app_state(config: ServiceConfig) -> anyhow::Result<AppState> {
    let store = DocumentStore::open(&config.documents_dir).await?;

    Ok(AppState {
        config: Arc::new(config),
        store: Arc::new(store),
        session_storage: Arc::new(InMemorySessionStorage::new()),
        query_engines: Arc::new(DashMap::new()),
    })
}

fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/sessions/{session_id}", get(get_session_status))
        .route(
            "/sessions/{session_id}/documents",
            post(upload_document).get(list_documents),
        )
        .route(
            "/sessions/{session_id}/documents/rescan",
            post(rescan_documents),
        )
        .route(
            "/sessions/{session_id}/documents/{file_name}",
            get(get_document),
        )
        .route("/sessions/{session_id}/summarize", post(summarize_document))
        .route("/sessions/{session_id}/chat", post(chat))
        .route("/sessions/{session_id}/chat/clear", post(clear_chat))
        .route("/sessions/{session_id}/messages", get(get_messages))
        .route("/sessions/{session_id}/reset", post(reset_session))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Document Summary Service",
        "version": "1.0.0",
        "description": "PDF upload, tree-reduced document summarization, and streaming follow-up chat",
        "endpoints": {
            "POST /sessions": "Create a session (scans the document store)",
            "GET /sessions/{session_id}": "Get session status",
            "POST /sessions/{session_id}/documents": "Upload a PDF (multipart `file` field)",
            "GET /sessions/{session_id}/documents": "List cached documents",
            "POST /sessions/{session_id}/documents/rescan": "Re-scan the document store",
            "GET /sessions/{session_id}/documents/{file_name}": "Fetch a stored PDF",
            "POST /sessions/{session_id}/summarize": "Summarize a cached document",
            "POST /sessions/{session_id}/chat": "Ask a question (SSE fragment stream)",
            "POST /sessions/{session_id}/chat/clear": "Clear the chat history",
            "GET /sessions/{session_id}/messages": "Get the chat history",
            "POST /sessions/{session_id}/reset": "Reset the session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_session(State(state): State<AppState>) -> ApiResult<SessionResponse> {
    let session = Session::new(Uuid::new_v4().to_string());

    let file_cache = scan_file_cache(&state).await?;
    info!(
        session_id = %session.id,
        documents = file_cache.len(),
        "session created"
    );

    session
        .context
        .set(session_keys::FILE_CACHE, &file_cache)
        .await;
    session.context.set(session_keys::PROCESSING, false).await;

    let response = session_response(&state, &session).await;
    save_session(&state, session).await?;
    Ok(Json(response))
}

async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let session = load_session(&state, &session_id).await?;
    Ok(Json(session_response(&state, &session).await))
}

async fn upload_document(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let session = load_session(&state, &session_id).await?;
    let (file_name, bytes) = read_upload(&mut multipart).await?;

    if !file_name.ends_with(".pdf") {
        return Err(bad_request_error("Only .pdf documents are accepted"));
    }

    let path = state.store.save(&file_name, &bytes).await.map_err(|e| {
        error!(session_id = %session_id, file_name = %file_name, error = %e, "upload failed");
        if e.kind() == std::io::ErrorKind::InvalidInput {
            bad_request_error(&e.to_string())
        } else {
            internal_error("Failed to store uploaded document", &e.to_string())
        }
    })?;

    let mut file_cache = get_file_cache(&session).await;
    file_cache
        .entry(file_name.clone())
        .or_insert_with(|| path.display().to_string());
    session
        .context
        .set(session_keys::FILE_CACHE, &file_cache)
        .await;

    let document_count = file_cache.len();
    save_session(&state, session).await?;

    info!(session_id = %session_id, file_name = %file_name, "document uploaded");
    Ok(Json(UploadResponse {
        session_id,
        file_name,
        path: path.display().to_string(),
        document_count,
    }))
}

async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request_error(&format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| bad_request_error("Upload is missing a file name"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request_error(&format!("Failed to read upload: {e}")))?;

        return Ok((file_name, bytes.to_vec()));
    }

    Err(bad_request_error("Multipart body has no `file` field"))
}

async fn list_documents(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<DocumentListResponse> {
    let session = load_session(&state, &session_id).await?;
    let documents = sorted_names(&get_file_cache(&session).await);
    Ok(Json(DocumentListResponse {
        session_id,
        documents,
    }))
}

async fn rescan_documents(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<DocumentListResponse> {
    let session = load_session(&state, &session_id).await?;

    let file_cache = scan_file_cache(&state).await?;
    let documents = sorted_names(&file_cache);
    session
        .context
        .set(session_keys::FILE_CACHE, &file_cache)
        .await;
    save_session(&state, session).await?;

    info!(session_id = %session_id, documents = documents.len(), "document store rescanned");
    Ok(Json(DocumentListResponse {
        session_id,
        documents,
    }))
}

async fn get_document(
    State(state): State<AppState>,
    Path((session_id, file_name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let session = load_session(&state, &session_id).await?;

    let file_cache = get_file_cache(&session).await;
    if !file_cache.contains_key(&file_name) {
        return Err(not_found_error("Document not in session cache", &file_name));
    }

    let bytes = state.store.load(&file_name).await.map_err(|e| {
        error!(session_id = %session_id, file_name = %file_name, error = %e, "failed to read document");
        internal_error("Failed to read document", &e.to_string())
    })?;

    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}

async fn summarize_document(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SummarizeRequest>,
) -> ApiResult<SummarizeResponse> {
    let mut session = load_session(&state, &session_id).await?;

    let file_name = match request.file_name {
        Some(name) if !name.trim().is_empty() => name,
        _ => return Err(bad_request_error("Please select a document to summarize")),
    };

    let file_cache = get_file_cache(&session).await;
    let path = file_cache
        .get(&file_name)
        .cloned()
        .ok_or_else(|| not_found_error("Document not in session cache", &file_name))?;

    let processing: bool = session
        .context
        .get(session_keys::PROCESSING)
        .await
        .unwrap_or(false);
    if processing {
        return Err(conflict_error(
            "A summarization is already in progress for this session",
            &session_id,
        ));
    }

    info!(session_id = %session_id, file_name = %file_name, "starting summarization");
    session.context.set(session_keys::PROCESSING, true).await;
    save_session(&state, session.clone()).await?;

    let result = pipeline::summarize(&state.config, std::path::Path::new(&path)).await;
    session.context.set(session_keys::PROCESSING, false).await;

    match result {
        Ok((index, summary)) => {
            let doc_id = index.doc_id().to_string();
            let engine = QueryEngine::new(index, (*state.config).clone());
            state
                .query_engines
                .insert(session_id.clone(), Arc::new(engine));

            session
                .context
                .set(session_keys::ACTIVE_DOCUMENT, &file_name)
                .await;
            session
                .context
                .set(session_keys::LAST_SUMMARY, &summary)
                .await;
            session.status_message = Some(format!("Summarized {file_name}"));
            save_session(&state, session).await?;

            info!(session_id = %session_id, doc_id, "summarization completed");
            Ok(Json(SummarizeResponse {
                session_id,
                file_name,
                doc_id,
                summary,
            }))
        }
        Err(e) => {
            error!(session_id = %session_id, file_name = %file_name, error = %e, "summarization failed");
            save_session(&state, session).await?;
            Err(pipeline_error(&e))
        }
    }
}

async fn chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = load_session(&state, &session_id).await?;

    let question = request.question.trim().to_string();
    if question.is_empty() {
        return Err(bad_request_error("Question cannot be empty"));
    }

    let engine = state
        .query_engines
        .get(&session_id)
        .map(|entry| entry.clone())
        .ok_or_else(|| {
            bad_request_error("No summarized document; summarize one before chatting")
        })?;

    let mut answer = engine.query(&question).await.map_err(|e| {
        error!(session_id = %session_id, error = %e, "query failed");
        pipeline_error(&e)
    })?;

    session.context.add_user_message(question.clone()).await;
    save_session(&state, session.clone()).await?;

    let storage = state.session_storage.clone();
    let (tx, rx) = mpsc::channel::<Event>(32);

    tokio::spawn(async move {
        let mut full_response = String::new();

        while let Some(fragment) = answer.next().await {
            match fragment {
                Ok(text) => {
                    full_response.push_str(&text);
                    if tx.send(Event::default().data(text)).await.is_err() {
                        // Client went away; the answer is abandoned.
                        return;
                    }
                }
                Err(e) => {
                    error!(session_id = %session.id, error = %e, "answer stream failed");
                    let _ = tx.send(Event::default().event("error").data(e.to_string())).await;
                    return;
                }
            }
        }

        session.context.add_assistant_message(full_response).await;
        if let Err(e) = storage.save(session).await {
            error!(error = %e, "failed to save chat history");
        }
        let _ = tx.send(Event::default().event("done").data("")).await;
    });

    let stream = EventStream { rx }.map(Ok::<Event, Infallible>);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn get_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ChatHistoryResponse> {
    let session = load_session(&state, &session_id).await?;
    let messages = session.context.get_all_messages().await;
    Ok(Json(ChatHistoryResponse {
        session_id,
        messages,
    }))
}

async fn clear_chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    let session = load_session(&state, &session_id).await?;
    session.context.clear_messages().await;
    save_session(&state, session).await?;

    info!(session_id = %session_id, "chat history cleared");
    Ok(Json(json!({
        "session_id": session_id,
        "status": "chat_cleared"
    })))
}

async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let mut session = load_session(&state, &session_id).await?;

    // The query engine handle is dropped here; the document store itself is
    // left untouched and a rescan will repopulate the cache from disk.
    state.query_engines.remove(&session_id);
    session.context.clear().await;
    session.context.clear_messages().await;
    session.context.set(session_keys::PROCESSING, false).await;
    session.status_message = None;

    let response = session_response(&state, &session).await;
    save_session(&state, session).await?;

    info!(session_id = %session_id, "session reset");
    Ok(Json(response))
}

async fn load_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    match state.session_storage.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "failed to load session");
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

async fn save_session(state: &AppState, session: Session) -> Result<(), ApiError> {
    state.session_storage.save(session).await.map_err(|e| {
        error!(error = %e, "failed to save session");
        internal_error("Failed to save session", &e.to_string())
    })
}

async fn scan_file_cache(state: &AppState) -> Result<HashMap<String, String>, ApiError> {
    let documents = state.store.scan().await.map_err(|e| {
        error!(error = %e, "failed to scan document store");
        internal_error("Failed to scan document store", &e.to_string())
    })?;

    Ok(documents
        .into_iter()
        .map(|doc| (doc.name, doc.path.display().to_string()))
        .collect())
}

async fn get_file_cache(session: &Session) -> HashMap<String, String> {
    session
        .context
        .get(session_keys::FILE_CACHE)
        .await
        .unwrap_or_default()
}

fn sorted_names(file_cache: &HashMap<String, String>) -> Vec<String> {
    let mut names: Vec<String> = file_cache.keys().cloned().collect();
    names.sort();
    names
}

async fn session_response(state: &AppState, session: &Session) -> SessionResponse {
    let documents = sorted_names(&get_file_cache(session).await);
    let processing: bool = session
        .context
        .get(session_keys::PROCESSING)
        .await
        .unwrap_or(false);
    let has_query_engine = state.query_engines.contains_key(&session.id);

    let status = if processing {
        "summarizing"
    } else if has_query_engine {
        "ready"
    } else if !documents.is_empty() {
        "documents_available"
    } else {
        "awaiting_upload"
    };

    SessionResponse {
        session_id: session.id.clone(),
        status: status.to_string(),
        documents,
        processing,
        message_count: session.context.message_count().await,
        has_query_engine,
        active_document: session.context.get(session_keys::ACTIVE_DOCUMENT).await,
        status_message: session.status_message.clone(),
    }
}

struct EventStream {
    rx: mpsc::Receiver<Event>,
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn test_app() -> (Router, TempDir) {
        let tmp = TempDir::new().unwrap();
        let config = ServiceConfig {
            documents_dir: tmp.path().to_path_buf(),
            ..ServiceConfig::default()
        };
        let app = create_app(config).await.unwrap();
        (app, tmp)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn multipart_request(uri: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{file_name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn create_test_session(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(empty_request("POST", "/sessions"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        body["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _tmp) = test_app().await;

        let response = app
            .oneshot(empty_request("GET", "/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_new_session_is_awaiting_upload() {
        let (app, _tmp) = test_app().await;

        let response = app
            .clone()
            .oneshot(empty_request("POST", "/sessions"))
            .await
            .unwrap();
        let body = body_json(response).await;

        assert_eq!(body["status"], "awaiting_upload");
        assert_eq!(body["documents"].as_array().unwrap().len(), 0);
        assert_eq!(body["processing"], false);
        assert_eq!(body["has_query_engine"], false);
    }

    #[tokio::test]
    async fn test_session_scans_existing_documents() {
        let (app, tmp) = test_app().await;
        tokio::fs::write(tmp.path().join("old.pdf"), b"existing")
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(empty_request("POST", "/sessions"))
            .await
            .unwrap();
        let body = body_json(response).await;

        assert_eq!(body["status"], "documents_available");
        assert_eq!(body["documents"], json!(["old.pdf"]));
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (app, _tmp) = test_app().await;

        let response = app
            .oneshot(empty_request("GET", "/sessions/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_roundtrip() {
        let (app, tmp) = test_app().await;
        let session_id = create_test_session(&app).await;

        let content = b"%PDF-1.4 sample content";
        let response = app
            .clone()
            .oneshot(multipart_request(
                &format!("/sessions/{session_id}/documents"),
                "sample.pdf",
                content,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["file_name"], "sample.pdf");
        assert_eq!(body["document_count"], 1);

        // Stored bytes equal the uploaded content exactly.
        let stored = tokio::fs::read(tmp.path().join("sample.pdf")).await.unwrap();
        assert_eq!(stored, content);

        // And the filename is now in the session's cache.
        let response = app
            .clone()
            .oneshot(empty_request(
                "GET",
                &format!("/sessions/{session_id}/documents"),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["documents"], json!(["sample.pdf"]));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_pdf() {
        let (app, _tmp) = test_app().await;
        let session_id = create_test_session(&app).await;

        let response = app
            .clone()
            .oneshot(multipart_request(
                &format!("/sessions/{session_id}/documents"),
                "notes.txt",
                b"plain text",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_document_returns_pdf_bytes() {
        let (app, _tmp) = test_app().await;
        let session_id = create_test_session(&app).await;

        let content = b"%PDF-1.4 raw bytes";
        app.clone()
            .oneshot(multipart_request(
                &format!("/sessions/{session_id}/documents"),
                "raw.pdf",
                content,
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(empty_request(
                "GET",
                &format!("/sessions/{session_id}/documents/raw.pdf"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], content);
    }

    #[tokio::test]
    async fn test_summarize_without_selection_is_rejected() {
        let (app, _tmp) = test_app().await;
        let session_id = create_test_session(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/sessions/{session_id}/summarize"),
                json!({ "file_name": null }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/sessions/{session_id}/summarize"),
                json!({ "file_name": "  " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_summarize_unknown_document_is_not_found() {
        let (app, _tmp) = test_app().await;
        let session_id = create_test_session(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/sessions/{session_id}/summarize"),
                json!({ "file_name": "ghost.pdf" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chat_requires_a_summarized_document() {
        let (app, _tmp) = test_app().await;
        let session_id = create_test_session(&app).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/sessions/{session_id}/chat"),
                json!({ "question": "What is this about?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reset_clears_cache_and_messages_and_rescan_repopulates() {
        let (app, tmp) = test_app().await;
        let session_id = create_test_session(&app).await;

        app.clone()
            .oneshot(multipart_request(
                &format!("/sessions/{session_id}/documents"),
                "keep.pdf",
                b"kept on disk",
            ))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(empty_request(
                "POST",
                &format!("/sessions/{session_id}/reset"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "awaiting_upload");
        assert_eq!(body["documents"].as_array().unwrap().len(), 0);
        assert_eq!(body["message_count"], 0);
        assert_eq!(body["has_query_engine"], false);

        // The store itself is untouched; a rescan repopulates the cache
        // with exactly the files on disk.
        assert!(tmp.path().join("keep.pdf").exists());

        let response = app
            .clone()
            .oneshot(empty_request(
                "POST",
                &format!("/sessions/{session_id}/documents/rescan"),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["documents"], json!(["keep.pdf"]));
    }

    #[tokio::test]
    async fn test_messages_start_empty_and_clear_chat_is_idempotent() {
        let (app, _tmp) = test_app().await;
        let session_id = create_test_session(&app).await;

        let response = app
            .clone()
            .oneshot(empty_request(
                "GET",
                &format!("/sessions/{session_id}/messages"),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["messages"].as_array().unwrap().len(), 0);

        let response = app
            .clone()
            .oneshot(empty_request(
                "POST",
                &format!("/sessions/{session_id}/chat/clear"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
