use anyhow::Context;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::HubConfig;

/// A compute node as reported by the hub. Only the fields the dashboard
/// reads are typed; everything else rides along in `extra`. `id` is kept as
/// raw JSON since the hub has sent both strings and numbers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct NodeStatus {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub readiness_score: Option<f64>,
    #[serde(default)]
    pub idle: Option<Value>,
    #[serde(default)]
    pub power: Option<Value>,
    #[serde(default)]
    pub resources: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeStatus {
    fn fill_id(mut self) -> Self {
        if self.id.is_null() {
            self.id = self.extra.get("node_id").cloned().unwrap_or(Value::Null);
        }
        self
    }

    pub fn is_online(&self) -> bool {
        self.status == "online"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct TaskStatus {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub created_at: Option<Value>,
    #[serde(default)]
    pub started_at: Option<Value>,
    #[serde(default)]
    pub completed_at: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskStatus {
    fn fill_id(mut self) -> Self {
        if self.id.is_null() {
            self.id = self.extra.get("task_id").cloned().unwrap_or(Value::Null);
        }
        self
    }

    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// Where the dashboard gets hub data from.
#[async_trait]
pub trait HubSource: Send + Sync {
    async fn nodes(&self) -> anyhow::Result<Vec<NodeStatus>>;
    async fn tasks(&self) -> anyhow::Result<Vec<TaskStatus>>;
}

/// HTTP client for the hub status API.
#[derive(Clone)]
pub struct HubClient {
    http: reqwest::Client,
    base_url: String,
}

impl HubClient {
    pub fn new(cfg: &HubConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .build()
            .context("build hub http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "hub request");
        let body = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()
            .with_context(|| format!("GET {}", url))?
            .json::<T>()
            .await
            .with_context(|| format!("decode {}", url))?;
        Ok(body)
    }
}

/// Decodes each element on its own; malformed entries are logged and dropped
/// so one bad record cannot blank the whole list.
fn decode_each<T: DeserializeOwned>(items: Vec<Value>, kind: &'static str) -> Vec<T> {
    let total = items.len();
    let decoded: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(kind, index, error = %e, "skipping malformed hub entry");
                None
            }
        })
        .collect();
    if decoded.len() < total {
        debug!(kind, kept = decoded.len(), total, "hub list partially decoded");
    }
    decoded
}

#[async_trait]
impl HubSource for HubClient {
    async fn nodes(&self) -> anyhow::Result<Vec<NodeStatus>> {
        let raw: Vec<Value> = self.get_json("/nodes/status").await?;
        Ok(decode_each::<NodeStatus>(raw, "node")
            .into_iter()
            .map(NodeStatus::fill_id)
            .collect())
    }

    async fn tasks(&self) -> anyhow::Result<Vec<TaskStatus>> {
        let raw: Vec<Value> = self.get_json("/tasks/status").await?;
        Ok(decode_each::<TaskStatus>(raw, "task")
            .into_iter()
            .map(TaskStatus::fill_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn client_for(server: &MockServer) -> HubClient {
        HubClient::new(&HubConfig {
            base_url: format!("{}/", server.uri()),
            poll_interval_secs: 5,
            timeout_secs: 1,
        })
        .expect("client")
    }

    #[tokio::test]
    async fn reads_nodes_with_aliases_and_extras() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "node_id": "n1",
                    "status": "online",
                    "readiness_score": 0.82,
                    "resources": { "gpu": "A100" },
                    "host": "10.0.0.4"
                },
                { "id": "n2", "status": "offline" }
            ])))
            .mount(&server)
            .await;

        let nodes = client_for(&server).nodes().await.expect("nodes");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "n1");
        assert_eq!(nodes[0].readiness_score, Some(0.82));
        assert_eq!(nodes[0].resources, Some(json!({ "gpu": "A100" })));
        assert_eq!(nodes[0].extra.get("host"), Some(&json!("10.0.0.4")));
        assert!(nodes[0].is_online());
        assert!(!nodes[1].is_online());
        assert_eq!(nodes[1].power, None);
    }

    #[tokio::test]
    async fn reads_tasks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "task_id": "t1", "status": "running", "model": "llama", "started_at": 1700000000 },
                { "id": "t2", "status": "pending" }
            ])))
            .mount(&server)
            .await;

        let tasks = client_for(&server).tasks().await.expect("tasks");
        assert_eq!(tasks[0].id, "t1");
        assert_eq!(tasks[0].model.as_deref(), Some("llama"));
        assert_eq!(tasks[0].started_at, Some(json!(1700000000)));
        assert!(tasks[0].is_running());
        assert!(!tasks[1].is_running());
    }

    #[tokio::test]
    async fn odd_entries_do_not_sink_the_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "n1", "status": "online" },
                { "id": "n2" },
                { "id": "n3", "node_id": "n3", "status": "online" },
                { "id": 7, "status": "idle" },
                { "id": "n5", "status": "online", "readiness_score": "high" },
                "not an object"
            ])))
            .mount(&server)
            .await;

        let nodes = client_for(&server).nodes().await.expect("nodes");
        let ids: Vec<_> = nodes.iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec![json!("n1"), json!("n2"), json!("n3"), json!(7)]);
        assert_eq!(nodes[1].status, "");
        assert!(!nodes[1].is_online());
        assert_eq!(nodes[2].extra.get("node_id"), Some(&json!("n3")));
    }

    #[tokio::test]
    async fn server_errors_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes/status"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).nodes().await.unwrap_err();
        assert!(err.to_string().contains("/nodes/status"));
    }
}
