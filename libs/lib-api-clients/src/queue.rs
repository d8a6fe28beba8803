use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Status of one queue element in the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    New,
    InProgress,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueElement {
    pub id: String,
    /// Correlation key, here a person/organization identifier.
    pub reference: String,
    /// Serialized payload carried along with the element.
    pub data: String,
    pub status: QueueStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Client for the orchestrator's durable job queue API. The queue guarantees
/// that a popped element is handed out to exactly one consumer; this client
/// only speaks the push/pop/status contract.
#[derive(Debug, Clone)]
pub struct OrchestratorQueue {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OrchestratorQueue {
    pub fn new(http_client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Create one element per reference, all carrying the same payloads list
    /// index-for-index. `references` and `data` must be equally long.
    pub async fn bulk_create(
        &self,
        queue_name: &str,
        references: &[String],
        data: &[String],
        created_by: &str,
    ) -> anyhow::Result<()> {
        if references.len() != data.len() {
            return Err(anyhow!(
                "Bulk create requires one payload per reference: {} references, {} payloads",
                references.len(),
                data.len()
            ));
        }

        let resp = self
            .http_client
            .post(format!("{}/api/queues/{}/elements/bulk", self.base_url, queue_name))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "references": references,
                "data": data,
                "createdBy": created_by,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Error bulk creating queue elements: {body}"));
        }

        Ok(())
    }

    /// Pop the next pending element, marking it in progress. `None` when the
    /// queue has nothing pending.
    pub async fn get_next(&self, queue_name: &str) -> anyhow::Result<Option<QueueElement>> {
        let resp = self
            .http_client
            .post(format!("{}/api/queues/{}/next", self.base_url, queue_name))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Error popping next queue element: {body}"));
        }

        Ok(Some(resp.json::<QueueElement>().await?))
    }

    /// Terminal status write for one element. The reason is recorded verbatim
    /// and is the only failure surface a task has.
    pub async fn set_status(
        &self,
        element_id: &str,
        status: QueueStatus,
        message: Option<&str>,
    ) -> anyhow::Result<()> {
        let resp = self
            .http_client
            .put(format!("{}/api/elements/{}/status", self.base_url, element_id))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "status": status,
                "message": message,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Error setting status for element {element_id}: {body}"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_element_wire_format() {
        let json = r#"{
            "id": "3f6a9d50-0000-0000-0000-000000000001",
            "reference": "1111111111",
            "data": "{\"Sagsoverskrift\": \"Sag A\"}",
            "status": "NEW",
            "createdBy": "Robot"
        }"#;

        let element = serde_json::from_str::<QueueElement>(json).unwrap();
        assert_eq!(element.status, QueueStatus::New);
        assert_eq!(element.reference, "1111111111");
        assert_eq!(element.created_by.as_deref(), Some("Robot"));
        assert!(element.message.is_none());
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        assert_eq!(serde_json::to_string(&QueueStatus::InProgress).unwrap(), "\"IN_PROGRESS\"");
        assert_eq!(serde_json::to_string(&QueueStatus::Failed).unwrap(), "\"FAILED\"");
    }
}
