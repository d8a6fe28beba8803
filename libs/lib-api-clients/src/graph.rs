use anyhow::{anyhow, Context};
use base64::Engine;
use serde::Deserialize;

macro_rules! graph_url {
    ($($params:expr),*) => {
        {
            const GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";
            let parts = vec![$($params.to_string()),*];
            format!("{}/{}", GRAPH_ENDPOINT, parts.join("/"))
        }
    };
}

const MAX_FOLDERS_PER_PAGE: u32 = 100;
const MAX_MESSAGES_PER_PAGE: u32 = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailMessage {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub sender: Option<Recipient>,
    #[serde(default)]
    pub body: Option<ItemBody>,
    #[serde(default)]
    pub received_date_time: Option<String>,
}

impl MailMessage {
    pub fn sender_address(&self) -> Option<&str> {
        self.sender.as_ref().map(|s| s.email_address.address.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    pub address: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemBody {
    #[serde(default)]
    pub content_type: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content_bytes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MailFolder {
    id: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

/// Mail client against the Microsoft Graph API for a single shared mailbox.
#[derive(Debug, Clone)]
pub struct GraphMailClient {
    http_client: reqwest::Client,
    access_token: String,
    mailbox: String,
}

impl GraphMailClient {
    pub fn new(http_client: reqwest::Client, access_token: String, mailbox: String) -> Self {
        Self {
            http_client,
            access_token,
            mailbox,
        }
    }

    /// Resolve a folder id from a display-name path like
    /// `Indbakke/Masseoprettelse KMD Nova`.
    pub async fn folder_id_by_path(&self, path: &str) -> anyhow::Result<String> {
        let mut folder_id: Option<String> = None;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let url = match &folder_id {
                None => graph_url!("users", self.mailbox, "mailFolders"),
                Some(id) => graph_url!("users", self.mailbox, "mailFolders", id, "childFolders"),
            };
            let resp = self
                .http_client
                .get(url)
                .query(&[("$top", MAX_FOLDERS_PER_PAGE.to_string())])
                .bearer_auth(&self.access_token)
                .send()
                .await?;

            if !resp.status().is_success() {
                let json = resp.json::<serde_json::Value>().await?;
                return Err(anyhow!("Error listing mail folders: {:?}", json));
            }

            let folders = resp.json::<ListResponse<MailFolder>>().await?.value;
            let found = folders
                .into_iter()
                .find(|f| f.display_name == segment)
                .with_context(|| format!("Mail folder '{segment}' not found in '{path}'"))?;
            folder_id = Some(found.id);
        }

        folder_id.with_context(|| format!("Empty mail folder path: '{path}'"))
    }

    /// List every message in a folder, newest first, following pagination.
    pub async fn messages_in_folder(&self, folder_id: &str) -> anyhow::Result<Vec<MailMessage>> {
        let mut messages = Vec::new();
        let mut url = graph_url!("users", self.mailbox, "mailFolders", folder_id, "messages");
        let mut query = Some(vec![
            ("$top".to_string(), MAX_MESSAGES_PER_PAGE.to_string()),
            ("$orderby".to_string(), "receivedDateTime desc".to_string()),
        ]);

        loop {
            let mut req = self.http_client.get(&url).bearer_auth(&self.access_token);
            if let Some(query) = query.take() {
                req = req.query(&query);
            }
            let resp = req.send().await?;

            if !resp.status().is_success() {
                let json = resp.json::<serde_json::Value>().await?;
                return Err(anyhow!("Error listing messages: {:?}", json));
            }

            let page = resp.json::<ListResponse<MailMessage>>().await?;
            messages.extend(page.value);

            match page.next_link {
                // nextLink already carries the paging query
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(messages)
    }

    pub async fn list_attachments(&self, message_id: &str) -> anyhow::Result<Vec<Attachment>> {
        let resp = self
            .http_client
            .get(graph_url!(
                "users",
                self.mailbox,
                "messages",
                message_id,
                "attachments"
            ))
            .query(&[("$select", "id,name")])
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let json = resp.json::<serde_json::Value>().await?;
            return Err(anyhow!("Error listing attachments: {:?}", json));
        }

        Ok(resp.json::<ListResponse<Attachment>>().await?.value)
    }

    /// Download one attachment and decode its content as UTF-8 text.
    pub async fn attachment_text(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> anyhow::Result<String> {
        let resp = self
            .http_client
            .get(graph_url!(
                "users",
                self.mailbox,
                "messages",
                message_id,
                "attachments",
                attachment_id
            ))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let json = resp.json::<serde_json::Value>().await?;
            return Err(anyhow!("Error getting attachment: {:?}", json));
        }

        let attachment = resp.json::<Attachment>().await?;
        let content = attachment
            .content_bytes
            .with_context(|| format!("Attachment {attachment_id} has no contentBytes"))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(content)
            .context("Attachment content is not valid base64")?;

        String::from_utf8(bytes).context("Attachment content is not valid UTF-8")
    }

    pub async fn delete_message(&self, message_id: &str) -> anyhow::Result<()> {
        let resp = self
            .http_client
            .delete(graph_url!("users", self.mailbox, "messages", message_id))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !resp.status().is_success() {
            let json = resp.json::<serde_json::Value>().await?;
            return Err(anyhow!("Error deleting message {}: {:?}", message_id, json));
        }

        Ok(())
    }
}
