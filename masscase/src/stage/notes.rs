//! Consumer pass: drain the task queue up to the per-run cap, resolve a case
//! for each task and append the submitted note, recording a terminal status.

use lib_api_clients::queue::{QueueElement, QueueStatus};

use crate::clients::{CaseSystem, TaskQueue, TextStore};
use crate::email::form::FormSubmission;
use crate::error::{AppError, AppResult};
use crate::robot_config::RobotConfig;
use crate::stage::resolve;

pub async fn run(
    cfg: &RobotConfig,
    queue: &impl TaskQueue,
    nova: &impl CaseSystem,
    texts: &impl TextStore,
) -> AppResult<()> {
    let mut processed = 0usize;

    while processed < cfg.queue.max_task_count {
        let Some(task) = queue.pop_next(&cfg.queue.name).await? else {
            break;
        };
        processed += 1;

        match handle_task(cfg, nova, texts, &task).await {
            Ok(()) => {
                queue.set_status(&task.id, QueueStatus::Done, None).await?;
            }
            Err(err) if err.is_task_recoverable() => {
                tracing::warn!("Task {} failed: {}", task.id, err);
                queue
                    .set_status(&task.id, QueueStatus::Failed, Some(&err.to_string()))
                    .await?;
            }
            Err(err) => {
                // A transport-class failure from the case system points at an
                // outage, not at this task. Record it, then stop the pass.
                queue
                    .set_status(&task.id, QueueStatus::Failed, Some(&err.to_string()))
                    .await?;
                return Err(err);
            }
        }
    }

    tracing::info!("Consumer pass finished after {} tasks", processed);
    Ok(())
}

async fn handle_task(
    cfg: &RobotConfig,
    nova: &impl CaseSystem,
    texts: &impl TextStore,
    task: &QueueElement,
) -> AppResult<()> {
    let submission: FormSubmission = serde_json::from_str(&task.data)
        .map_err(|e| AppError::Payload(format!("Kunne ikke læse data for {}: {e}", task.id)))?;

    let case = resolve::resolve_case(cfg, nova, &task.reference, &submission).await?;
    let note_text = resolve_note_text(texts, &submission.note_text_or_key).await?;

    nova.append_note(
        &case.uuid,
        &submission.note_title,
        &note_text,
        &cfg.caseworker,
        true,
    )
    .await?;

    Ok(())
}

/// A note body containing whitespace is the literal text; a body without any
/// is a key into the text store and resolves to the stored value verbatim.
pub(crate) async fn resolve_note_text(texts: &impl TextStore, raw: &str) -> AppResult<String> {
    if raw.chars().any(char::is_whitespace) {
        return Ok(raw.to_string());
    }
    match texts.get(raw).await? {
        Some(text) => Ok(text),
        None => Err(AppError::TextKeyNotFound {
            key: raw.to_string(),
        }),
    }
}
