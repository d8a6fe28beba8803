use derive_more::derive::Display;
use lib_api_clients::nova::NovaError;

pub type AppResult<T> = Result<T, AppError>;

/// Failure taxonomy for the pipeline.
///
/// Task-recoverable variants terminate one queue element as Failed and let
/// the consumer pass continue; everything else aborts the running pass.
#[derive(Debug, Display)]
pub enum AppError {
    /// Malformed email body or a missing required form field. The email is
    /// skipped and left in the mailbox for manual inspection.
    #[display("Kunne ikke læse formularfelt: {_0}")]
    Parse(String),
    /// A key missing from the static lookup tables, or an invalid config
    /// file. Not a data problem; the pass stops.
    #[display("Konfigurationsfejl: {_0}")]
    Config(String),
    /// `use_existing_case` was set but no case carried the submitted title.
    #[display("Sagsoverskrift '{title}' ikke fundet.")]
    CaseNotFound { title: String },
    /// Neither the address registry nor existing case parties yielded a
    /// display name for a new case's primary party.
    #[display("Intet navn fundet for ident '{identifier}'.")]
    NameNotFound { identifier: String },
    /// The note body looked like a bucket key but the bucket had no entry.
    #[display("Notat-nøgle '{key}' findes ikke i tekstlageret.")]
    TextKeyNotFound { key: String },
    /// A queue element carried a payload this version cannot decode.
    #[display("Ugyldigt kø-element: {_0}")]
    Payload(String),
    /// Transport-class failure from the case system. Recorded on the task
    /// and re-raised to abort the rest of the consumer pass.
    CaseSystem(NovaError),
    #[display("Kø-fejl: {_0}")]
    Queue(anyhow::Error),
    #[display("Mail-fejl: {_0}")]
    Mail(anyhow::Error),
    Internal(anyhow::Error),
}

impl std::error::Error for AppError {}

impl From<NovaError> for AppError {
    fn from(error: NovaError) -> Self {
        AppError::CaseSystem(error)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error)
    }
}

impl AppError {
    /// True for failures that terminate a single task without stopping the
    /// batch. Case-system transport errors are deliberately not in this set.
    pub fn is_task_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::CaseNotFound { .. }
                | AppError::NameNotFound { .. }
                | AppError::TextKeyNotFound { .. }
                | AppError::Payload(_)
        )
    }
}
