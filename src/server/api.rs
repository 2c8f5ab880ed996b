use crate::agent::{ AgentError, ConciergeAgent };
use crate::models::chat::{ ChatRequest, ChatResponse, ErrorResponse, HealthResponse, KnowledgeSummary };
use std::num::NonZeroU32;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ State, rejection::JsonRejection },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn, error };

/// Body of every upstream failure; details stay in the server log.
pub const GENERIC_ERROR: &str = "Internal Server Error";

type ChatLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
struct AppState {
    agent: Arc<ConciergeAgent>,
    limiter: Option<Arc<ChatLimiter>>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    RateLimited,
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::RateLimited =>
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests, please retry shortly".to_string()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_ERROR.to_string()),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Conversation(e) => {
                warn!("Rejected chat request: {}", e);
                ApiError::BadRequest(e.to_string())
            }
            AgentError::Gateway(e) => {
                error!("Model gateway error: {}", e);
                ApiError::Internal
            }
        }
    }
}

pub fn router(agent: Arc<ConciergeAgent>, rate_limit_per_second: u32) -> Router {
    let limiter = NonZeroU32::new(rate_limit_per_second).map(|rate|
        Arc::new(RateLimiter::direct(Quota::per_second(rate)))
    );
    if limiter.is_none() {
        warn!("Rate limiting disabled for /api/chat");
    }

    let app_state = AppState { agent, limiter };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/health", get(health_handler))
        .layer(cors)
        .with_state(app_state)
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>
) -> Result<Json<ChatResponse>, ApiError> {
    if let Some(limiter) = &state.limiter {
        if limiter.check().is_err() {
            warn!("Chat request rejected by rate limiter");
            return Err(ApiError::RateLimited);
        }
    }

    let Json(request) = payload.map_err(|rejection| {
        warn!("Malformed chat request: {}", rejection.body_text());
        ApiError::BadRequest(rejection.body_text())
    })?;

    info!("Chat request with {} message(s)", request.messages.len());
    let content = state.agent.process_message(&request.messages).await?;
    Ok(Json(ChatResponse { content }))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let knowledge = state.agent.knowledge();
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.agent.model(),
        knowledge: KnowledgeSummary {
            treatments: knowledge.treatments.len(),
            clinics: knowledge.clinics.len(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::knowledge::KnowledgeBase;
    use crate::config::prompt::{ build_system_prompt, PromptSettings, PromptTemplate };
    use crate::conversation::Exchange;
    use crate::llm::chat::{ ChatClient, GatewayError };
    use crate::llm::LlmType;
    use async_trait::async_trait;
    use axum::body::{ to_bytes, Body };
    use axum::http::Request;
    use tower::ServiceExt;

    struct StubClient {
        reply: Result<String, ()>,
    }

    #[async_trait]
    impl ChatClient for StubClient {
        async fn generate(&self, _exchange: &Exchange) -> Result<String, GatewayError> {
            self.reply.clone().map_err(|_| GatewayError::Status { status: 429, body: "quota".to_string() })
        }

        fn get_model(&self) -> String {
            "stub".to_string()
        }

        fn get_llm_type(&self) -> LlmType {
            LlmType::Gemini
        }
    }

    fn app(reply: Result<String, ()>, rate: u32) -> Router {
        let knowledge = Arc::new(KnowledgeBase { treatments: vec![], clinics: vec![], faq: vec![] });
        let settings = PromptSettings {
            clinic_name: "テストクリニック".to_string(),
            site_url: "https://clinic.example.jp/".to_string(),
        };
        let prompt = build_system_prompt(&PromptTemplate::builtin(), &knowledge, &settings).unwrap();
        let agent = ConciergeAgent::from_parts(Arc::new(StubClient { reply }), knowledge, prompt);
        router(Arc::new(agent), rate)
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn returns_generated_content() {
        let response = app(Ok("こんにちは".to_string()), 0)
            .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}]}"#)).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({ "content": "こんにちは" }));
    }

    #[tokio::test]
    async fn gateway_failure_becomes_generic_500() {
        let response = app(Err(()), 0)
            .oneshot(chat_request(r#"{"messages":[{"role":"user","content":"hi"}]}"#)).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await, serde_json::json!({ "error": GENERIC_ERROR }));
    }

    #[tokio::test]
    async fn empty_message_list_is_a_bad_request() {
        let response = app(Ok("unused".to_string()), 0)
            .oneshot(chat_request(r#"{"messages":[]}"#)).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_role_is_a_bad_request() {
        let response = app(Ok("unused".to_string()), 0)
            .oneshot(chat_request(r#"{"messages":[{"role":"system","content":"x"}]}"#)).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rate_limiter_rejects_burst() {
        let app = app(Ok("ok".to_string()), 1);
        let body = r#"{"messages":[{"role":"user","content":"hi"}]}"#;
        let first = app.clone().oneshot(chat_request(body)).await.unwrap();
        let second = app.oneshot(chat_request(body)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn health_reports_model_and_knowledge() {
        let response = app(Ok("ok".to_string()), 0)
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap()).await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["model"], "stub");
        assert_eq!(body["knowledge"]["clinics"], 0);
    }
}
