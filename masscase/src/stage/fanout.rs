//! Producer pass: drain the mailbox, gate each submission on the allow-list,
//! and fan accepted submissions out into one queue element per identifier.

use crate::clients::{InboundEmail, MailSource, Notifier, TaskQueue};
use crate::email::form::FormSubmission;
use crate::error::{AppError, AppResult};
use crate::robot_config::RobotConfig;

pub async fn run(
    cfg: &RobotConfig,
    mail: &impl MailSource,
    queue: &impl TaskQueue,
    notifier: &impl Notifier,
) -> AppResult<()> {
    let mut emails = mail.fetch_inbox(&cfg.mailbox.folder).await?;
    emails.retain(|e| e.sender == cfg.mailbox.sender && e.subject == cfg.mailbox.subject);
    // Retrieval order is newest first; process oldest submissions first.
    emails.reverse();

    tracing::info!("Found {} form emails to process", emails.len());

    for email in &emails {
        match process_email(cfg, mail, queue, notifier, email).await {
            Ok(()) => {}
            // A malformed email is skipped and left in place for manual
            // inspection; anything else stops the pass.
            Err(err @ AppError::Parse(_)) => {
                tracing::error!("Skipping unparseable email {}: {}", email.id, err);
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

async fn process_email(
    cfg: &RobotConfig,
    mail: &impl MailSource,
    queue: &impl TaskQueue,
    notifier: &impl Notifier,
    email: &InboundEmail,
) -> AppResult<()> {
    let submission = FormSubmission::from_html(&email.body, cfg)?;

    let accepted = cfg.is_worker_accepted(&submission.submitter_worker_code);
    send_status_mail(cfg, notifier, &submission, accepted).await?;

    if !accepted {
        tracing::warn!(
            "Worker {} is not on the accepted list, leaving email {} in place",
            submission.submitter_worker_code,
            email.id
        );
        return Ok(());
    }

    let identifiers = identifiers_from_attachments(&mail.attachment_texts(&email.id).await?);
    let payload = serde_json::to_string(&submission)
        .map_err(|e| AppError::Internal(anyhow::Error::from(e)))?;
    let payloads = vec![payload; identifiers.len()];

    queue
        .bulk_enqueue(&cfg.queue.name, &identifiers, &payloads, &cfg.queue.created_by)
        .await?;
    tracing::info!("Enqueued {} tasks for email {}", identifiers.len(), email.id);

    // Deleting only after a successful enqueue means a crash in between
    // re-ingests this email on the next run. Accepted at-least-once risk.
    mail.delete_email(&email.id).await?;

    Ok(())
}

/// Identifier lines across all attachments: whitespace-delimited, separator
/// hyphens stripped. Duplicates are kept; each line becomes its own task.
pub(crate) fn identifiers_from_attachments(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .flat_map(|text| text.split_whitespace())
        .map(|token| token.replace('-', ""))
        .collect()
}

async fn send_status_mail(
    cfg: &RobotConfig,
    notifier: &impl Notifier,
    submission: &FormSubmission,
    accepted: bool,
) -> AppResult<()> {
    let subject = format!(
        "Robotstatus for Masseoprettelse i KMD Nova: {}",
        if accepted { "STARTET" } else { "BLOKERET" }
    );
    let outcome = if accepted {
        "er startet og notater vil nu blive tilført de ønskede sagsnumre."
    } else {
        "er blevet blokeret. Sagsbehandleren som aktiverede robotten har ikke fået \
         tilladelse til at starte robotten. Kontakt venligst RPA-teamet ved at svare \
         på denne mail, hvis I har brug for at tilføje nye brugere."
    };
    let body = format!(
        "Robotten 'Masseoprettelse i KMD Nova' for sagen '{}' {}\n\nMvh. ITK RPA",
        submission.case_title, outcome
    );

    notifier
        .send(&submission.submitter_email, &cfg.smtp.status_sender, &subject, &body)
        .await
}
