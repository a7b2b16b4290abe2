//! HTTP collaborator clients
//!
//! Every service is a JSON POST endpoint with its own timeout. Transport
//! timeouts become `KaizenError::Timeout` and undecodable bodies become
//! `KaizenError::Parse`, which is what escalation keys on.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{Agents, Diagnosis, Memory, SelfRepair};
use crate::config::EndpointConfig;
use crate::domain::{MissionUpdate, Plan, Reflection, Review};
use crate::error::{KaizenError, Result};

/// One JSON-over-HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpService {
    name: &'static str,
    url: String,
    timeout_ms: u64,
    client: Client,
}

impl HttpService {
    pub fn new(name: &'static str, endpoint: &EndpointConfig) -> Result<Self> {
        Self::with_url(name, endpoint.url.clone(), endpoint.timeout_ms)
    }

    pub fn with_url(name: &'static str, url: impl Into<String>, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| KaizenError::collaborator(name, format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            name,
            url: url.into(),
            timeout_ms,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST `body` to `url` and decode the answer as `R`
    pub async fn post_to<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        log::debug!("POST {} ({})", url, self.name);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(KaizenError::collaborator(
                self.name,
                format!("HTTP {}: {}", status, crate::text::truncate_chars(&text, 200)),
            ));
        }

        serde_json::from_str(&text).map_err(|e| KaizenError::parse(self.name, e.to_string()))
    }

    pub async fn post<B, R>(&self, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.post_to(&self.url, body).await
    }

    fn transport_error(&self, e: reqwest::Error) -> KaizenError {
        if e.is_timeout() {
            KaizenError::timeout(self.name, self.timeout_ms)
        } else if e.is_decode() {
            KaizenError::parse(self.name, e.to_string())
        } else {
            KaizenError::collaborator(self.name, e.to_string())
        }
    }
}

/// Plan, review, reflect and strategize services
#[derive(Debug, Clone)]
pub struct HttpAgents {
    model: String,
    plan: HttpService,
    review: HttpService,
    reflect: HttpService,
    strategize: HttpService,
}

impl HttpAgents {
    pub fn new(
        model: impl Into<String>,
        plan: HttpService,
        review: HttpService,
        reflect: HttpService,
        strategize: HttpService,
    ) -> Self {
        Self {
            model: model.into(),
            plan,
            review,
            reflect,
            strategize,
        }
    }
}

#[async_trait]
impl Agents for HttpAgents {
    async fn plan(&self, context: &str) -> Result<Plan> {
        self.plan
            .post(&json!({ "model": self.model, "context": context }))
            .await
    }

    async fn review(&self, plan: &Plan) -> Result<Review> {
        // The reviewer takes the plan's own fields alongside the model
        let mut body = serde_json::to_value(plan)?;
        if let Value::Object(map) = &mut body {
            map.insert("model".into(), Value::String(self.model.clone()));
        }
        self.review.post(&body).await
    }

    async fn reflect(&self, prompt: &str) -> Result<Reflection> {
        self.reflect
            .post(&json!({ "model": self.model, "prompt": prompt }))
            .await
    }

    async fn strategize(&self, prompt: &str) -> Result<MissionUpdate> {
        self.strategize
            .post(&json!({ "model": self.model, "prompt": prompt }))
            .await
    }
}

/// Memory service with `/add` and `/query` under one base URL
#[derive(Debug, Clone)]
pub struct HttpMemory {
    service: HttpService,
}

impl HttpMemory {
    pub fn new(endpoint: &EndpointConfig) -> Result<Self> {
        Ok(Self {
            service: HttpService::new("memory", endpoint)?,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.service.url().trim_end_matches('/'), path)
    }
}

/// Memory results are `{"results": [...]}` with items as strings or `{"text": ...}`
fn snippets_from(value: &Value) -> Vec<String> {
    value
        .get("results")
        .and_then(|r| r.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    other => other.get("text").and_then(|t| t.as_str()).map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Memory for HttpMemory {
    async fn add(&self, id: &str, text: &str) -> Result<()> {
        let _: Value = self
            .service
            .post_to(&self.endpoint("add"), &json!({ "id": id, "text": text }))
            .await?;
        Ok(())
    }

    async fn query(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        let value: Value = self
            .service
            .post_to(&self.endpoint("query"), &json!({ "query": query, "top_k": top_k }))
            .await?;
        Ok(snippets_from(&value))
    }
}

/// Self-repair agent endpoint
#[derive(Debug, Clone)]
pub struct HttpSelfRepair {
    service: HttpService,
}

impl HttpSelfRepair {
    pub fn new(service: HttpService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl SelfRepair for HttpSelfRepair {
    async fn improve(&self, trigger: &str) -> Result<Diagnosis> {
        self.service.post(&json!({ "trigger": trigger })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use axum::Router;
    use axum::routing::post;
    use std::time::Duration;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_snippets_from_both_shapes() {
        let value = json!({"results": [{"text": "a", "score": 0.9}, "b", {"nope": 1}]});
        assert_eq!(snippets_from(&value), vec!["a", "b"]);
        assert!(snippets_from(&json!({})).is_empty());
    }

    #[tokio::test]
    async fn test_plan_roundtrip() {
        let router = Router::new().route(
            "/_py/plan",
            post(|axum::Json(body): axum::Json<Value>| async move {
                assert_eq!(body["model"], "test-model");
                axum::Json(json!({"steps": [{"title": "list", "bash": "ls"}], "spec_md": body["context"]}))
            }),
        );
        let base = serve(router).await;
        let service = HttpService::with_url("plan", format!("{}/_py/plan", base), 5_000).unwrap();
        let unused = HttpService::with_url("x", format!("{}/missing", base), 5_000).unwrap();
        let agents = HttpAgents::new("test-model", service, unused.clone(), unused.clone(), unused);

        let plan = agents.plan("do things").await.unwrap();
        assert_eq!(plan.steps[0].bash, "ls");
        assert_eq!(plan.spec_md, "do things");
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let router = Router::new().route("/x", post(|| async { "not json" }));
        let base = serve(router).await;
        let service = HttpService::with_url("plan", format!("{}/x", base), 5_000).unwrap();

        let err = service.post::<_, Plan>(&json!({})).await.unwrap_err();
        assert_eq!(err.category(), Some(ErrorCategory::Parse));
    }

    #[tokio::test]
    async fn test_missing_required_field_is_parse_error() {
        let router = Router::new().route("/x", post(|| async { axum::Json(json!({"summary_md": "ok"})) }));
        let base = serve(router).await;
        let service = HttpService::with_url("review", format!("{}/x", base), 5_000).unwrap();

        let err = service.post::<_, Review>(&json!({})).await.unwrap_err();
        assert!(matches!(err, KaizenError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_slow_service_is_timeout() {
        let router = Router::new().route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
        let base = serve(router).await;
        let service = HttpService::with_url("reflect", format!("{}/slow", base), 100).unwrap();

        let err = service.post::<_, Reflection>(&json!({})).await.unwrap_err();
        assert!(matches!(err, KaizenError::Timeout { after_ms: 100, .. }));
    }

    #[tokio::test]
    async fn test_error_status_is_collaborator_error() {
        let router = Router::new().route(
            "/boom",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "exploded") }),
        );
        let base = serve(router).await;
        let service = HttpService::with_url("self_repair", format!("{}/boom", base), 5_000).unwrap();

        let err = HttpSelfRepair::new(service).improve("manual").await.unwrap_err();
        assert!(matches!(err, KaizenError::Collaborator { .. }));
        assert!(err.to_string().contains("exploded"));
    }

    #[tokio::test]
    async fn test_memory_endpoints() {
        let router = Router::new()
            .route("/_py/add", post(|| async { axum::Json(json!({"ok": true})) }))
            .route(
                "/_py/query",
                post(|axum::Json(body): axum::Json<Value>| async move {
                    assert_eq!(body["top_k"], 3);
                    axum::Json(json!({"results": [{"text": "remember this"}]}))
                }),
            );
        let base = serve(router).await;
        let memory = HttpMemory::new(&EndpointConfig::new(format!("{}/_py/", base), 5_000)).unwrap();

        memory.add("report_1", "text").await.unwrap();
        assert_eq!(memory.query("mission", 3).await.unwrap(), vec!["remember this"]);
    }
}
