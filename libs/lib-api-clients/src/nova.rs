use chrono::{DateTime, Utc};
use derive_more::derive::Display;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// The service identity notes and cases are written as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caseworker {
    pub name: String,
    pub ident: String,
    pub uuid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: i64,
    pub name: String,
    pub user_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseParty {
    pub role: String,
    pub identification_type: String,
    pub identification: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    pub uuid: String,
    pub title: String,
    pub case_date: DateTime<Utc>,
    pub progress_state: String,
    #[serde(default)]
    pub case_parties: Vec<CaseParty>,
    pub kle_number: String,
    pub proceeding_facet: String,
    pub sensitivity: String,
    #[serde(default)]
    pub caseworker: Option<Caseworker>,
    #[serde(default)]
    pub responsible_department: Option<Department>,
    #[serde(default)]
    pub security_unit: Option<Department>,
}

#[derive(Debug, Clone, Deserialize)]
struct AddressMatch {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CaseListResponse {
    #[serde(default = "Vec::new")]
    cases: Vec<CaseRecord>,
}

#[derive(Debug, Display)]
pub enum NovaError {
    /// Non-2xx answer from the case API, carrying the machine title from the
    /// response body. Treated as a systemic outage by the consumer pass.
    #[display("KMD Nova svarede {status}: {title}")]
    Http { status: u16, title: String },
    Transport(reqwest::Error),
}

impl std::error::Error for NovaError {}

impl From<reqwest::Error> for NovaError {
    fn from(error: reqwest::Error) -> Self {
        NovaError::Transport(error)
    }
}

/// Pull the machine title out of an error body, falling back to the raw text.
fn http_error(status: u16, body: &str) -> NovaError {
    let title = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("title").and_then(|t| t.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    NovaError::Http { status, title }
}

/// Client for the KMD Nova case API. The bearer token is supplied by the
/// caller and assumed valid for the duration of a run.
#[derive(Debug, Clone)]
pub struct NovaClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl NovaClient {
    pub fn new(http_client: reqwest::Client, base_url: String, access_token: String) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, NovaError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(http_error(status.as_u16(), &body))
    }

    /// All cases the given person/organization identifier is a party to.
    pub async fn get_cases(&self, identifier: &str) -> Result<Vec<CaseRecord>, NovaError> {
        let resp = self
            .http_client
            .post(self.url("cases/search"))
            .bearer_auth(&self.access_token)
            .json(&json!({ "identification": identifier }))
            .send()
            .await?;

        let resp = Self::check(resp).await?;
        Ok(resp.json::<CaseListResponse>().await?.cases)
    }

    /// Persist a new case and return it as stored by Nova.
    pub async fn add_case(&self, case: &CaseRecord) -> Result<CaseRecord, NovaError> {
        let resp = self
            .http_client
            .post(self.url("cases"))
            .bearer_auth(&self.access_token)
            .json(case)
            .send()
            .await?;

        let resp = Self::check(resp).await?;
        Ok(resp.json::<CaseRecord>().await?)
    }

    pub async fn add_text_note(
        &self,
        case_uuid: &str,
        title: &str,
        text: &str,
        caseworker: &Caseworker,
        approved: bool,
    ) -> Result<(), NovaError> {
        let resp = self
            .http_client
            .post(self.url(&format!("cases/{case_uuid}/notes")))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "title": title,
                "text": text,
                "caseworker": caseworker,
                "approved": approved,
            }))
            .send()
            .await?;

        Self::check(resp).await?;
        Ok(())
    }

    /// Look up a registered name for an identifier in the address registry.
    /// Unregistered identifiers (e.g. test CPRs) yield `None`.
    pub async fn get_address_name(&self, identifier: &str) -> Result<Option<String>, NovaError> {
        let resp = self
            .http_client
            .get(self.url(&format!("addresses/{identifier}")))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let resp = Self::check(resp).await?;
        Ok(Some(resp.json::<AddressMatch>().await?.name))
    }
}
