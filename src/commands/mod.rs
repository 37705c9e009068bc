pub mod chat;
pub mod knowledge;
pub mod settings;

use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route(
            "/api/conversations",
            post(chat::create_conversation).get(chat::list_conversations),
        )
        .route(
            "/api/conversations/{id}",
            get(chat::get_conversation).delete(chat::delete_conversation),
        )
        .route("/api/conversations/{id}/messages", post(chat::add_message))
        .route(
            "/api/documents",
            post(knowledge::upload_document)
                .get(knowledge::list_documents)
                .layer(DefaultBodyLimit::max(knowledge::MAX_UPLOAD_BYTES)),
        )
        .route(
            "/api/documents/{id}",
            get(knowledge::get_document).delete(knowledge::delete_document),
        )
        .route("/api/settings", get(settings::get_settings))
        .route(
            "/api/settings/{key}",
            put(settings::set_setting).delete(settings::delete_setting),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::db::Database;
    use crate::service::ChatService;
    use crate::testing::KeywordEmbedder;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_server() -> (TestServer, Arc<Database>) {
        test_server_with_model("ollama/test-model")
    }

    fn test_server_with_model(default_model: &str) -> (TestServer, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let service = ChatService::new(
            db.clone(),
            db.clone(),
            Arc::new(KeywordEmbedder::new()),
            RagConfig::default(),
        );
        let state = AppState {
            db: db.clone(),
            service: Arc::new(service),
            default_model: default_model.into(),
        };
        let server = TestServer::new(router(state)).expect("Failed to create test server");
        (server, db)
    }

    async fn mock_ollama(db: &Database, reply: &str) -> MockServer {
        let llm = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "test-model",
                "choices": [{ "message": { "role": "assistant", "content": reply } }],
                "usage": { "total_tokens": 42 }
            })))
            .mount(&llm)
            .await;
        db.set_setting("ollama_host", &llm.uri()).unwrap();
        llm
    }

    fn text_upload(name: &str, body: &str) -> MultipartForm {
        MultipartForm::new().add_part(
            "file",
            Part::bytes(body.as_bytes().to_vec())
                .file_name(name)
                .mime_type("text/plain"),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let (server, _db) = test_server();
        let response = server.get("/").await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_conversation_is_404() {
        let (server, _db) = test_server();
        let response = server.get("/api/conversations/nope").await;
        response.assert_status_not_found();
        assert_eq!(response.json::<Value>()["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_lookups_run_before_provider_credentials() {
        let (server, _db) = test_server_with_model("groq/llama-3.1-8b-instant");

        let response = server
            .post("/api/conversations/nope/messages")
            .json(&json!({ "content": "hello?" }))
            .await;
        response.assert_status_not_found();
        assert_eq!(response.json::<Value>()["kind"], "not_found");

        let response = server
            .post("/api/conversations")
            .json(&json!({
                "mode": "rag",
                "first_message": "what is this?",
                "document_id": "nope",
            }))
            .await;
        response.assert_status_not_found();
        assert_eq!(response.json::<Value>()["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_missing_provider_key_is_400() {
        // The key falls back to the environment.
        if std::env::var("GROQ_API_KEY").is_ok() {
            return;
        }
        let (server, _db) = test_server_with_model("groq/llama-3.1-8b-instant");

        let response = server
            .post("/api/conversations")
            .json(&json!({ "mode": "open_chat", "first_message": "hi" }))
            .await;
        response.assert_status_bad_request();
        let body = response.json::<Value>();
        assert_eq!(body["kind"], "validation");
        assert_eq!(body["error"], "invalid input: Groq API key not configured");

        let listed = server.get("/api/conversations").await.json::<Value>();
        assert_eq!(listed["count"], 0);
    }

    #[tokio::test]
    async fn test_rag_without_document_is_400() {
        let (server, _db) = test_server();
        let response = server
            .post("/api/conversations")
            .json(&json!({ "mode": "rag", "first_message": "what is this?" }))
            .await;
        response.assert_status_bad_request();
        assert_eq!(response.json::<Value>()["kind"], "validation");

        let listed = server.get("/api/conversations").await.json::<Value>();
        assert_eq!(listed["count"], 0);
    }

    #[tokio::test]
    async fn test_upload_list_and_delete_document() {
        let (server, _db) = test_server();
        let response = server
            .post("/api/documents")
            .multipart(text_upload("notes.txt", "the grinder needs fresh beans"))
            .await;
        response.assert_status_ok();
        let document = response.json::<Value>();
        assert_eq!(document["filename"], "notes.txt");
        assert_eq!(document["total_chunks"], 1);
        let id = document["id"].as_str().unwrap().to_string();

        let listed = server.get("/api/documents").await.json::<Value>();
        assert_eq!(listed["count"], 1);

        server
            .delete(&format!("/api/documents/{}", id))
            .await
            .assert_status_ok();
        server
            .get(&format!("/api/documents/{}", id))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn test_unsupported_upload_is_400() {
        let (server, _db) = test_server();
        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(vec![0, 1, 2])
                .file_name("image.png")
                .mime_type("image/png"),
        );
        server
            .post("/api/documents")
            .multipart(form)
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn test_conversation_round_trip_through_provider() {
        let (server, db) = test_server();
        let _llm = mock_ollama(&db, "Hello from the model").await;

        let created = server
            .post("/api/conversations")
            .json(&json!({ "mode": "open_chat", "first_message": "hi there" }))
            .await;
        created.assert_status_ok();
        let conversation = created.json::<Value>();
        assert_eq!(conversation["messages"].as_array().unwrap().len(), 2);
        assert_eq!(conversation["messages"][1]["content"], "Hello from the model");
        assert_eq!(conversation["messages"][1]["tokens"], 42);
        let id = conversation["id"].as_str().unwrap().to_string();

        let exchange = server
            .post(&format!("/api/conversations/{}/messages", id))
            .json(&json!({ "content": "and again" }))
            .await;
        exchange.assert_status_ok();
        let exchange = exchange.json::<Value>();
        assert_eq!(exchange["user_message"]["content"], "and again");
        assert_eq!(exchange["assistant_message"]["model"], "test-model");

        let fetched = server
            .get(&format!("/api/conversations/{}", id))
            .await
            .json::<Value>();
        assert_eq!(fetched["messages"].as_array().unwrap().len(), 4);

        server
            .delete(&format!("/api/conversations/{}", id))
            .await
            .assert_status_ok();
        let listed = server.get("/api/conversations").await.json::<Value>();
        assert_eq!(listed["count"], 0);
    }

    #[tokio::test]
    async fn test_rag_conversation_over_uploaded_document() {
        let (server, db) = test_server();
        let _llm = mock_ollama(&db, "Use fresh beans.").await;

        let document = server
            .post("/api/documents")
            .multipart(text_upload("coffee.txt", "the grinder needs fresh beans"))
            .await
            .json::<Value>();

        let response = server
            .post("/api/conversations")
            .json(&json!({
                "mode": "rag",
                "first_message": "what does the grinder need?",
                "document_id": document["id"],
            }))
            .await;
        response.assert_status_ok();
        let conversation = response.json::<Value>();
        assert_eq!(conversation["mode"], "rag");
        assert_eq!(
            conversation["messages"][1]["retrieved_chunks"]
                .as_array()
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_settings_are_masked_and_validated() {
        let (server, _db) = test_server();
        server
            .put("/api/settings/openai_api_key")
            .json(&json!({ "value": "sk-abcdefghijklmnop" }))
            .await
            .assert_status_ok();
        server
            .put("/api/settings/theme")
            .json(&json!({ "value": "dark" }))
            .await
            .assert_status_bad_request();

        let settings = server.get("/api/settings").await.json::<Value>();
        assert_eq!(settings["openai_api_key"], "sk-a...mnop");

        server
            .delete("/api/settings/openai_api_key")
            .await
            .assert_status_ok();
        server
            .delete("/api/settings/openai_api_key")
            .await
            .assert_status_not_found();
    }
}
