use anyhow::anyhow;

/// Key-value store resolving short keys to long note bodies, so large texts
/// never travel inside queue payloads.
#[derive(Debug, Clone)]
pub struct BucketClient {
    http_client: reqwest::Client,
    connection_string: String,
}

impl BucketClient {
    /// `connection_string` is the bucket endpoint handed to the robot as a
    /// named runtime constant.
    pub fn new(http_client: reqwest::Client, connection_string: String) -> Self {
        Self {
            http_client,
            connection_string: connection_string.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the stored text for a key. `None` when the key is unknown.
    pub async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let resp = self
            .http_client
            .get(format!("{}/api/values/{}", self.connection_string, key))
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Error reading bucket key '{key}': {body}"));
        }

        Ok(Some(resp.text().await?))
    }
}
