//! Per-task case resolution: either find an existing case by exact title or
//! create a fresh one from the submission and the lookup tables.

use chrono::Utc;
use lib_api_clients::nova::{CaseParty, CaseRecord};
use uuid::Uuid;

use crate::clients::CaseSystem;
use crate::email::form::FormSubmission;
use crate::error::{AppError, AppResult};
use crate::robot_config::RobotConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStrategy {
    FindExisting,
    CreateNew,
}

impl CaseStrategy {
    pub fn for_submission(submission: &FormSubmission) -> Self {
        if submission.use_existing_case {
            CaseStrategy::FindExisting
        } else {
            CaseStrategy::CreateNew
        }
    }
}

pub async fn resolve_case(
    cfg: &RobotConfig,
    nova: &impl CaseSystem,
    identifier: &str,
    submission: &FormSubmission,
) -> AppResult<CaseRecord> {
    let cases = nova.cases_by_identifier(identifier).await?;

    match CaseStrategy::for_submission(submission) {
        CaseStrategy::FindExisting => find_matching_case(&submission.case_title, cases),
        CaseStrategy::CreateNew => {
            let name = resolve_party_name(nova, identifier, &cases).await?;
            let case = build_case(cfg, identifier, &name, submission)?;
            Ok(nova.create_case(&case).await?)
        }
    }
}

fn find_matching_case(case_title: &str, cases: Vec<CaseRecord>) -> AppResult<CaseRecord> {
    cases
        .into_iter()
        .find(|case| case.title == case_title)
        .ok_or_else(|| AppError::CaseNotFound {
            title: case_title.to_string(),
        })
}

/// Display name for the primary party: the address registry first, then a
/// scan of the identifier's existing case parties. Unregistered identifiers
/// with no named party anywhere fail the task.
async fn resolve_party_name(
    nova: &impl CaseSystem,
    identifier: &str,
    cases: &[CaseRecord],
) -> AppResult<String> {
    if let Some(name) = nova.lookup_address_name(identifier).await? {
        return Ok(name);
    }

    for case in cases {
        for party in &case.case_parties {
            if party.identification == identifier {
                if let Some(name) = party.name.as_deref().filter(|n| !n.is_empty()) {
                    return Ok(name.to_string());
                }
            }
        }
    }

    Err(AppError::NameNotFound {
        identifier: identifier.to_string(),
    })
}

fn build_case(
    cfg: &RobotConfig,
    identifier: &str,
    name: &str,
    submission: &FormSubmission,
) -> AppResult<CaseRecord> {
    let sensitivity = submission.sensitivity.clone().ok_or_else(|| {
        AppError::Payload("Følsomhed mangler i kø-elementet for en ny sag".to_string())
    })?;
    let security_unit_code = submission.security_unit_code.as_deref().ok_or_else(|| {
        AppError::Payload("Sikkerhedsenhed mangler i kø-elementet for en ny sag".to_string())
    })?;

    Ok(CaseRecord {
        uuid: Uuid::new_v4().to_string(),
        title: submission.case_title.clone(),
        case_date: Utc::now(),
        progress_state: "Opstaaet".to_string(),
        case_parties: vec![CaseParty {
            role: "Primær".to_string(),
            identification_type: identification_type(identifier).to_string(),
            identification: identifier.to_string(),
            name: Some(name.to_string()),
            uuid: None,
        }],
        kle_number: submission.kle_number.clone(),
        proceeding_facet: submission.proceeding_facet.clone(),
        sensitivity,
        caseworker: Some(cfg.caseworker.clone()),
        responsible_department: Some(cfg.department(&submission.department_code)?),
        security_unit: Some(cfg.department(security_unit_code)?),
    })
}

/// Organization identifiers are 8 digits, person identifiers 10.
fn identification_type(identifier: &str) -> &'static str {
    if identifier.len() == 8 {
        "CvrNummer"
    } else {
        "CprNummer"
    }
}
