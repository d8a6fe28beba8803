//! Trait seams for the external collaborators, plus implementations for the
//! concrete clients in `lib-api-clients`. The pipeline stages only see these
//! traits, so tests drive them with in-memory fakes.

use lib_api_clients::bucket::BucketClient;
use lib_api_clients::graph::GraphMailClient;
use lib_api_clients::nova::{CaseRecord, Caseworker, NovaClient, NovaError};
use lib_api_clients::queue::{OrchestratorQueue, QueueElement, QueueStatus};
use lib_api_clients::smtp::SmtpRelay;

use crate::error::{AppError, AppResult};

/// One message pulled from the mailbox, body still raw HTML.
#[derive(Debug, Clone)]
pub struct InboundEmail {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
}

pub trait MailSource {
    /// All messages in the source folder, in retrieval order (newest first).
    async fn fetch_inbox(&self, folder_path: &str) -> AppResult<Vec<InboundEmail>>;
    /// Decoded text content of every attachment on a message.
    async fn attachment_texts(&self, email_id: &str) -> AppResult<Vec<String>>;
    async fn delete_email(&self, email_id: &str) -> AppResult<()>;
}

pub trait Notifier {
    async fn send(
        &self,
        recipient: &str,
        sender: &str,
        subject: &str,
        body: &str,
    ) -> AppResult<()>;
}

pub trait TaskQueue {
    async fn bulk_enqueue(
        &self,
        queue_name: &str,
        references: &[String],
        payloads: &[String],
        created_by: &str,
    ) -> AppResult<()>;
    async fn pop_next(&self, queue_name: &str) -> AppResult<Option<QueueElement>>;
    async fn set_status(
        &self,
        task_id: &str,
        status: QueueStatus,
        reason: Option<&str>,
    ) -> AppResult<()>;
}

pub trait CaseSystem {
    async fn cases_by_identifier(&self, identifier: &str) -> Result<Vec<CaseRecord>, NovaError>;
    async fn create_case(&self, case: &CaseRecord) -> Result<CaseRecord, NovaError>;
    async fn append_note(
        &self,
        case_uuid: &str,
        title: &str,
        text: &str,
        caseworker: &Caseworker,
        approved: bool,
    ) -> Result<(), NovaError>;
    async fn lookup_address_name(&self, identifier: &str) -> Result<Option<String>, NovaError>;
}

pub trait TextStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
}

impl MailSource for GraphMailClient {
    async fn fetch_inbox(&self, folder_path: &str) -> AppResult<Vec<InboundEmail>> {
        let folder_id = self
            .folder_id_by_path(folder_path)
            .await
            .map_err(AppError::Mail)?;
        let messages = self
            .messages_in_folder(&folder_id)
            .await
            .map_err(AppError::Mail)?;

        Ok(messages
            .into_iter()
            .map(|msg| InboundEmail {
                sender: msg.sender_address().unwrap_or_default().to_string(),
                subject: msg.subject.clone().unwrap_or_default(),
                body: msg.body.as_ref().map(|b| b.content.clone()).unwrap_or_default(),
                id: msg.id,
            })
            .collect())
    }

    async fn attachment_texts(&self, email_id: &str) -> AppResult<Vec<String>> {
        let attachments = self
            .list_attachments(email_id)
            .await
            .map_err(AppError::Mail)?;

        let mut texts = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let text = self
                .attachment_text(email_id, &attachment.id)
                .await
                .map_err(AppError::Mail)?;
            texts.push(text);
        }
        Ok(texts)
    }

    async fn delete_email(&self, email_id: &str) -> AppResult<()> {
        self.delete_message(email_id).await.map_err(AppError::Mail)
    }
}

impl Notifier for SmtpRelay {
    async fn send(
        &self,
        recipient: &str,
        sender: &str,
        subject: &str,
        body: &str,
    ) -> AppResult<()> {
        SmtpRelay::send(self, recipient, sender, subject, body)
            .await
            .map_err(AppError::Mail)
    }
}

impl TaskQueue for OrchestratorQueue {
    async fn bulk_enqueue(
        &self,
        queue_name: &str,
        references: &[String],
        payloads: &[String],
        created_by: &str,
    ) -> AppResult<()> {
        self.bulk_create(queue_name, references, payloads, created_by)
            .await
            .map_err(AppError::Queue)
    }

    async fn pop_next(&self, queue_name: &str) -> AppResult<Option<QueueElement>> {
        self.get_next(queue_name).await.map_err(AppError::Queue)
    }

    async fn set_status(
        &self,
        task_id: &str,
        status: QueueStatus,
        reason: Option<&str>,
    ) -> AppResult<()> {
        OrchestratorQueue::set_status(self, task_id, status, reason)
            .await
            .map_err(AppError::Queue)
    }
}

impl CaseSystem for NovaClient {
    async fn cases_by_identifier(&self, identifier: &str) -> Result<Vec<CaseRecord>, NovaError> {
        self.get_cases(identifier).await
    }

    async fn create_case(&self, case: &CaseRecord) -> Result<CaseRecord, NovaError> {
        self.add_case(case).await
    }

    async fn append_note(
        &self,
        case_uuid: &str,
        title: &str,
        text: &str,
        caseworker: &Caseworker,
        approved: bool,
    ) -> Result<(), NovaError> {
        self.add_text_note(case_uuid, title, text, caseworker, approved)
            .await
    }

    async fn lookup_address_name(&self, identifier: &str) -> Result<Option<String>, NovaError> {
        self.get_address_name(identifier).await
    }
}

impl TextStore for BucketClient {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        BucketClient::get(self, key).await.map_err(AppError::Internal)
    }
}
