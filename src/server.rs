use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::dispatcher::{DispatchKind, Dispatcher, GenerationResult};
use crate::generation::GenerationRequest;

#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    provider: String,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, provider: &str) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            provider: provider.to_string(),
        }
    }
}

// ── Request / response types ───────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    #[serde(rename = "type")]
    kind: DispatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
}

#[derive(Deserialize, Default)]
struct GenerateRequest {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    style: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    duration: Option<String>,
}

/// The front end sends `duration` as either `"30"` or `30`.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl GenerateRequest {
    fn prompt(&self) -> &str {
        self.prompt.as_deref().unwrap_or_default()
    }
}

/// An unreadable body is treated like an empty one.
fn payload<T: Default>(body: std::result::Result<Json<T>, JsonRejection>) -> T {
    match body {
        Ok(Json(value)) => value,
        Err(rejection) => {
            debug!("Ignoring unreadable request body: {}", rejection);
            T::default()
        }
    }
}

// ── Handlers ───────────────────────────────────────────────────────────────────

async fn chat(
    State(state): State<AppState>,
    body: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Json<ChatResponse> {
    let request = payload(body);
    let message = request.message.unwrap_or_default();
    let persona = state.dispatcher.persona();

    if message.trim().is_empty() {
        return Json(ChatResponse {
            response: persona.empty_input_reply.clone(),
            kind: DispatchKind::Fallback,
            model: None,
        });
    }

    let preview: String = message.chars().take(50).collect();
    let request_id = Uuid::new_v4();
    let result = state
        .dispatcher
        .dispatch(&message)
        .instrument(info_span!("chat", %request_id))
        .await;

    info!(
        "Chat {} -> {:?} ({} failed attempts) for: {}...",
        request_id,
        result.kind,
        result.failures.len(),
        preview
    );

    Json(ChatResponse {
        response: result.text,
        kind: result.kind,
        model: result.model,
    })
}

async fn run_generation(state: &AppState, request: GenerationRequest) -> GenerationResult {
    let request_id = Uuid::new_v4();
    let kind = request.kind;
    let result = state
        .dispatcher
        .generate(&request)
        .instrument(info_span!("generate", %request_id, %kind))
        .await;
    info!(
        "Generate {} {} -> {:?} ({} failed attempts)",
        kind,
        request_id,
        result.kind,
        result.failures.len()
    );
    result
}

async fn generate_image(
    State(state): State<AppState>,
    body: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Json<Value> {
    let body = payload(body);
    let request = GenerationRequest::image(body.prompt());
    let prompt = request.prompt.clone();
    let result = run_generation(&state, request).await;

    Json(json!({
        "image": null,
        "description": result.output,
        "message": result.message,
        "type": result.kind,
        "prompt": prompt,
        "model": result.model,
    }))
}

async fn generate_music(
    State(state): State<AppState>,
    body: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Json<Value> {
    let body = payload(body);
    let request =
        GenerationRequest::music(body.prompt(), body.genre.as_deref(), body.duration.as_deref());
    let (genre, duration) = (request.genre.clone(), request.duration.clone());
    let result = run_generation(&state, request).await;

    Json(json!({
        "output": result.output,
        "message": result.message,
        "type": result.kind,
        "genre": genre,
        "duration": duration,
        "model": result.model,
    }))
}

async fn generate_video(
    State(state): State<AppState>,
    body: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Json<Value> {
    let body = payload(body);
    let request =
        GenerationRequest::video(body.prompt(), body.style.as_deref(), body.duration.as_deref());
    let (style, duration) = (request.style.clone(), request.duration.clone());
    let result = run_generation(&state, request).await;

    Json(json!({
        "output": result.output,
        "message": result.message,
        "type": result.kind,
        "style": style,
        "duration": duration,
        "model": result.model,
    }))
}

async fn generate_text(
    State(state): State<AppState>,
    body: std::result::Result<Json<GenerateRequest>, JsonRejection>,
) -> Json<Value> {
    let body = payload(body);
    let result = run_generation(&state, GenerationRequest::text(body.prompt())).await;

    Json(json!({
        "output": result.output,
        "message": result.message,
        "type": result.kind,
        "model": result.model,
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let persona = state.dispatcher.persona();
    Json(json!({
        "status": "healthy",
        "hasApiKey": state.dispatcher.has_credential(),
        "availableModels": state.dispatcher.models().len(),
        "message": format!("{} All systems go! 🚀✨", persona.greeting),
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

async fn settings(State(state): State<AppState>) -> Json<Value> {
    let persona = state.dispatcher.persona();
    Json(json!({
        "available_features": {
            "chat": "✅ Working",
            "text_generation": "✅ Working",
            "image_generation": "✅ Working (Descriptions)",
            "music_generation": "✅ Working (Compositions)",
            "video_generation": "✅ Working (Storyboards)",
            "personality": format!("✅ Always calls you {}", persona.address_term),
        },
        "current_config": {
            "api_provider": state.provider,
            "api_key_configured": state.dispatcher.has_credential(),
            "models": state.dispatcher.models(),
            "creator": persona.creator,
            "assistant": persona.name,
        },
        "message": format!("{} All systems are working! 🚀✨", persona.greeting),
    }))
}

async fn creator(State(state): State<AppState>) -> Json<Value> {
    let persona = state.dispatcher.persona();
    Json(json!({
        "creator": persona.creator,
        "assistant": persona.name,
        "special_message": persona.attribution,
    }))
}

async fn test_all(State(state): State<AppState>) -> Json<Value> {
    let persona = state.dispatcher.persona();
    Json(json!({
        "message": format!("{} All endpoints are working! 🎉✨", persona.greeting),
        "endpoints": {
            "/api/chat": "✅ Working - AI chat with personality",
            "/api/generate-text": "✅ Working - Text generation",
            "/api/generate-image": "✅ Working - Image descriptions",
            "/api/generate-music": "✅ Working - Music compositions",
            "/api/generate-video": "✅ Working - Video storyboards",
            "/api/settings": "✅ Working - System settings",
            "/api/creator": "✅ Working - Creator info",
            "/api/health": "✅ Working - Health check",
        },
        "personality": format!(
            "Always calls you {} and credits {}! 😄🌟",
            persona.address_term, persona.creator
        ),
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

// ── Router ─────────────────────────────────────────────────────────────────────

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .route("/generate-image", post(generate_image))
        .route("/generate-music", post(generate_music))
        .route("/generate-video", post(generate_video))
        .route("/generate-text", post(generate_text))
        .route("/settings", get(settings))
        .route("/creator", get(creator))
        .route("/test-all", get(test_all))
}

fn panic_message(err: &(dyn Any + Send)) -> &str {
    if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic"
    }
}

/// Wrap routes with CORS, request tracing and panic-to-500 handling. Every
/// route is reachable both at the root and under `/api`.
fn build(routes: Router<AppState>, state: AppState) -> Router {
    let apology = state.dispatcher.persona().error_reply.clone();
    let on_panic = move |err: Box<dyn Any + Send + 'static>| -> Response {
        error!("Handler panicked: {}", panic_message(err.as_ref()));
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "response": apology, "type": DispatchKind::Error })),
        )
            .into_response()
    };

    let cors = CorsLayer::new()
        .allow_origin(cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(cors::Any);

    Router::new()
        .nest("/api", routes.clone())
        .merge(routes)
        .layer(CatchPanicLayer::custom(on_panic))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn router(state: AppState) -> Router {
    build(api_routes(), state)
}

/// Bind and serve until Ctrl-C.
pub async fn run(config: &Config, dispatcher: Dispatcher) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let state = AppState::new(dispatcher, &config.llm.provider.to_string());
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!("Genesis server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{AttemptError, ChatMessage, CompletionBackend};
    use crate::persona::Persona;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower::ServiceExt; // for Router::oneshot

    struct StubBackend {
        credential: bool,
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionBackend for StubBackend {
        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn complete(
            &self,
            _model: &str,
            _messages: &[ChatMessage],
        ) -> std::result::Result<String, AttemptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Some(text) => Ok(text.to_string()),
                None => Err(AttemptError::Status {
                    status: 503,
                    body: String::new(),
                }),
            }
        }
    }

    fn state_with(credential: bool, reply: Option<&'static str>) -> (AppState, Arc<StubBackend>) {
        let backend = Arc::new(StubBackend {
            credential,
            reply,
            calls: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new(
            backend.clone(),
            Persona::default(),
            vec!["m1".to_string(), "m2".to_string()],
            Duration::from_secs(1),
        );
        (AppState::new(dispatcher, "openrouter"), backend)
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chat_special_trigger() {
        let (state, backend) = state_with(true, Some("nope"));
        let (status, v) = send(router(state), post_json("/chat", json!({"message": "who made you?"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["type"], "special");
        assert_eq!(v["response"], Persona::default().attribution);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chat_empty_message_short_circuits() {
        let (state, backend) = state_with(false, None);
        let (status, v) = send(router(state), post_json("/chat", json!({"message": ""}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["type"], "fallback");
        assert!(v["response"]
            .as_str()
            .unwrap()
            .contains("didn't quite catch that"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chat_missing_or_invalid_body_is_empty_input() {
        let (state, _) = state_with(true, Some("hi"));
        let app = router(state);

        let (_, v) = send(app.clone(), post_json("/chat", json!({}))).await;
        assert_eq!(v["type"], "fallback");

        let req = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, v) = send(app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["type"], "fallback");
    }

    #[tokio::test]
    async fn test_chat_ai_reply_under_api_prefix() {
        let (state, backend) = state_with(true, Some("Rust is great, Duce! 🎉🚀"));
        let (status, v) = send(router(state), post_json("/api/chat", json!({"message": "rust?"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["type"], "ai");
        assert_eq!(v["response"], "Rust is great, Duce! 🎉🚀");
        assert_eq!(v["model"], "m1");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chat_all_models_down_returns_fallback() {
        let (state, backend) = state_with(true, None);
        let (status, v) = send(router(state), post_json("/chat", json!({"message": "hi"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["type"], "fallback");
        let text = v["response"].as_str().unwrap().to_string();
        assert!(Persona::default().fallback_replies.contains(&text));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = state_with(false, None);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, v) = send(router(state), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["status"], "healthy");
        assert_eq!(v["hasApiKey"], false);
        let ts = v["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[tokio::test]
    async fn test_generate_music_offline_echoes_options() {
        let (state, _) = state_with(false, None);
        let body = json!({"prompt": "the sea", "genre": "jazz", "duration": 45});
        let (status, v) = send(router(state), post_json("/api/generate-music", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["type"], "fallback");
        assert_eq!(v["genre"], "jazz");
        assert_eq!(v["duration"], "45");
        assert!(v["output"].as_str().unwrap().contains("the sea"));
    }

    #[tokio::test]
    async fn test_generate_image_with_model() {
        let (state, _) = state_with(true, Some("A fox in the snow, Duce 🦊❄"));
        let (_, v) = send(router(state), post_json("/generate-image", json!({"prompt": "fox"}))).await;
        assert_eq!(v["type"], "ai");
        assert!(v["image"].is_null());
        assert_eq!(v["description"], "A fox in the snow, Duce 🦊❄");
        assert_eq!(v["prompt"], "fox");
    }

    #[tokio::test]
    async fn test_generate_video_defaults() {
        let (state, _) = state_with(true, None);
        let (_, v) = send(router(state), post_json("/generate-video", json!({"prompt": "a heist"}))).await;
        assert_eq!(v["type"], "fallback");
        assert_eq!(v["style"], "cinematic");
        assert_eq!(v["duration"], "15");
    }

    #[tokio::test]
    async fn test_generate_text_empty_prompt() {
        let (state, backend) = state_with(true, Some("x"));
        let (_, v) = send(router(state), post_json("/generate-text", json!({"prompt": " "}))).await;
        assert_eq!(v["type"], "fallback");
        assert!(v["output"].as_str().unwrap().contains("What would you like me to generate"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_settings_and_creator() {
        let (state, _) = state_with(true, None);
        let app = router(state);

        let req = Request::builder().uri("/api/settings").body(Body::empty()).unwrap();
        let (_, v) = send(app.clone(), req).await;
        assert_eq!(v["current_config"]["api_provider"], "openrouter");
        assert_eq!(v["current_config"]["models"], json!(["m1", "m2"]));

        let req = Request::builder().uri("/creator").body(Body::empty()).unwrap();
        let (_, v) = send(app, req).await;
        assert_eq!(v["creator"], "Sai Kaarthik");
    }

    #[tokio::test]
    async fn test_test_all_lists_endpoints() {
        let (state, backend) = state_with(true, None);
        let req = Request::builder().uri("/api/test-all").body(Body::empty()).unwrap();
        let (status, v) = send(router(state), req).await;

        assert_eq!(status, StatusCode::OK);
        assert!(v["message"].as_str().unwrap().starts_with("Hey Duce!"));
        assert_eq!(
            v["endpoints"]["/api/chat"],
            "✅ Working - AI chat with personality"
        );
        assert_eq!(v["endpoints"].as_object().unwrap().len(), 8);
        assert!(v["personality"].as_str().unwrap().contains("Sai Kaarthik"));
        assert!(v["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let (state, _) = state_with(false, None);
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/chat")
            .header("origin", "http://example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = router(state).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_panic_becomes_500_with_apology() {
        let (state, _) = state_with(false, None);
        async fn boom() -> &'static str {
            panic!("boom")
        }
        let routes = api_routes().route("/boom", get(boom));
        let req = Request::builder().uri("/boom").body(Body::empty()).unwrap();
        let (status, v) = send(build(routes, state), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(v["type"], "error");
        assert_eq!(v["response"], Persona::default().error_reply);
    }
}
