//! Extraction of a structured submission from the semi-structured HTML body
//! of a form email. The body is a sequence of bold-faced labels, each
//! followed by free text up to the next label, plus a signature block with
//! the submitter's address and worker code.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::robot_config::RobotConfig;

pub const FIELD_CASE_TITLE: &str = "Sagsoverskrift";
pub const FIELD_KLE: &str = "KLE-nummer";
pub const FIELD_FACET: &str = "Handlingsfacet";
pub const FIELD_SENSITIVITY: &str = "Følsomhed";
pub const FIELD_DEPARTMENT: &str = "Afdeling";
pub const FIELD_USE_EXISTING: &str = "Brug eksisterende sag";
pub const FIELD_NOTE_TITLE: &str = "Notat overskrift";
pub const FIELD_NOTE_TEXT: &str = "Notat tekst";
pub const FIELD_SUBMITTER: &str = "Bruger";

/// Value the form puts in `Brug eksisterende sag` when the box is ticked.
pub const USE_EXISTING_SENTINEL: &str = "Valgt";
/// Value written back to the wire when the box is not ticked.
pub const USE_EXISTING_NOT_SELECTED: &str = "Ikke valgt";

lazy_static! {
    static ref RE_BOLD: Regex = Regex::new(r"(?is)<(?:b|strong)\b[^>]*>(.*?)</(?:b|strong)>").unwrap();
    static ref RE_TAG: Regex = Regex::new(r"(?s)<[^>]+>").unwrap();
    static ref RE_SPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref RE_EMAIL_ANCHOR: Regex =
        Regex::new(r"(?is)<a\b[^>]*>([^<]*@[^<]*)</a>([^<]*)").unwrap();
    static ref RE_WORKER_CODE: Regex = Regex::new(r"(?i)\baz\d+\b").unwrap();
    static ref RE_SUBMITTER_EMAIL: Regex = Regex::new(r"E-mail: (\S+),").unwrap();
}

/// One parsed form submission. (De)serializes through [`WireSubmission`], so
/// queue payloads keep the exact shape the historical system wrote and
/// elements enqueued by it still decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireSubmission", into = "WireSubmission")]
pub struct FormSubmission {
    pub case_title: String,
    pub kle_number: String,
    pub proceeding_facet: String,
    /// Canonical sensitivity level. Omitted when an existing case supplies
    /// its own sensitivity.
    pub sensitivity: Option<String>,
    pub department_code: String,
    /// Department code of the governing security unit. Omitted together
    /// with `sensitivity`.
    pub security_unit_code: Option<String>,
    pub use_existing_case: bool,
    pub note_title: String,
    /// Either the literal note body or a bucket key, discriminated later by
    /// the note writer.
    pub note_text_or_key: String,
    pub submitter_email: String,
    pub submitter_worker_code: String,
}

/// Queue payload shape: the form labels as field names, the checkbox as its
/// sentinel string and the submitter as the composite `Bruger` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireSubmission {
    #[serde(rename = "Sagsoverskrift")]
    case_title: String,
    #[serde(rename = "KLE-nummer")]
    kle_number: String,
    #[serde(rename = "Handlingsfacet")]
    proceeding_facet: String,
    #[serde(rename = "Følsomhed", default, skip_serializing_if = "Option::is_none")]
    sensitivity: Option<String>,
    #[serde(rename = "Afdeling")]
    department_code: String,
    #[serde(rename = "Sikkerhedsenhed", default, skip_serializing_if = "Option::is_none")]
    security_unit_code: Option<String>,
    #[serde(rename = "Brug eksisterende sag")]
    use_existing_case: String,
    #[serde(rename = "Notat overskrift")]
    note_title: String,
    #[serde(rename = "Notat tekst")]
    note_text_or_key: String,
    #[serde(rename = "Bruger")]
    submitter: String,
}

impl From<FormSubmission> for WireSubmission {
    fn from(submission: FormSubmission) -> Self {
        WireSubmission {
            case_title: submission.case_title,
            kle_number: submission.kle_number,
            proceeding_facet: submission.proceeding_facet,
            sensitivity: submission.sensitivity,
            department_code: submission.department_code,
            security_unit_code: submission.security_unit_code,
            use_existing_case: if submission.use_existing_case {
                USE_EXISTING_SENTINEL.to_string()
            } else {
                USE_EXISTING_NOT_SELECTED.to_string()
            },
            note_title: submission.note_title,
            note_text_or_key: submission.note_text_or_key,
            submitter: format!(
                "E-mail: {}, AZ-ident: {}",
                submission.submitter_email, submission.submitter_worker_code
            ),
        }
    }
}

impl TryFrom<WireSubmission> for FormSubmission {
    type Error = AppError;

    fn try_from(wire: WireSubmission) -> Result<Self, Self::Error> {
        let (submitter_email, submitter_worker_code) = parse_submitter(&wire.submitter)?;
        Ok(FormSubmission {
            case_title: wire.case_title,
            kle_number: wire.kle_number,
            proceeding_facet: wire.proceeding_facet,
            sensitivity: wire.sensitivity,
            department_code: wire.department_code,
            security_unit_code: wire.security_unit_code,
            use_existing_case: wire.use_existing_case == USE_EXISTING_SENTINEL,
            note_title: wire.note_title,
            note_text_or_key: wire.note_text_or_key,
            submitter_email,
            submitter_worker_code,
        })
    }
}

/// Split the composite `Bruger` value (`E-mail: <email>, AZ-ident: <code>`)
/// into its parts.
fn parse_submitter(submitter: &str) -> AppResult<(String, String)> {
    let email = RE_SUBMITTER_EMAIL
        .captures(submitter)
        .map(|c| c[1].to_string())
        .ok_or_else(|| AppError::Parse(format!("Ingen e-mail i '{FIELD_SUBMITTER}'")))?;
    let worker_code = RE_WORKER_CODE
        .find(submitter)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::Parse(format!("Ingen AZ-ident i '{FIELD_SUBMITTER}'")))?;
    Ok((email, worker_code))
}

impl FormSubmission {
    pub fn from_html(html: &str, cfg: &RobotConfig) -> AppResult<Self> {
        let fields = html_to_fields(html);
        Self::from_fields(&fields, cfg)
    }

    pub fn from_fields(fields: &HashMap<String, String>, cfg: &RobotConfig) -> AppResult<Self> {
        let submitter = required(fields, FIELD_SUBMITTER)?;
        let (submitter_email, submitter_worker_code) = parse_submitter(&submitter)?;

        let department_code = required(fields, FIELD_DEPARTMENT)?;
        let use_existing_case = required(fields, FIELD_USE_EXISTING)? == USE_EXISTING_SENTINEL;

        // An existing case supplies its own sensitivity and security unit;
        // otherwise both are derived through the lookup tables.
        let raw_sensitivity = required(fields, FIELD_SENSITIVITY)?;
        let (sensitivity, security_unit_code) = if use_existing_case {
            (None, None)
        } else {
            (
                Some(cfg.translate_sensitivity(&raw_sensitivity)?.to_string()),
                Some(cfg.security_unit_code(&department_code)?.to_string()),
            )
        };

        Ok(FormSubmission {
            case_title: required(fields, FIELD_CASE_TITLE)?,
            kle_number: required(fields, FIELD_KLE)?,
            proceeding_facet: required(fields, FIELD_FACET)?,
            sensitivity,
            department_code,
            security_unit_code,
            use_existing_case,
            note_title: required(fields, FIELD_NOTE_TITLE)?,
            note_text_or_key: required(fields, FIELD_NOTE_TEXT)?,
            submitter_email,
            submitter_worker_code,
        })
    }
}

fn required(fields: &HashMap<String, String>, label: &str) -> AppResult<String> {
    match fields.get(label) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(AppError::Parse(format!("'{label}' mangler eller er tomt"))),
    }
}

/// Map each bold label to the text between it and the next bold label (or
/// the submitter signature block, whichever comes first). The submitter
/// anchor and its trailing worker code become a composite `Bruger` field of
/// the form `E-mail: <email>, AZ-ident: <code>`.
pub fn html_to_fields(html: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();

    let anchor = RE_EMAIL_ANCHOR.captures(html);
    let anchor_start = anchor
        .as_ref()
        .and_then(|c| c.get(0))
        .map(|m| m.start())
        .unwrap_or(html.len());

    let bolds: Vec<_> = RE_BOLD.captures_iter(html).collect();
    for (i, capture) in bolds.iter().enumerate() {
        let label = clean_text(&capture[1]);
        if label.is_empty() {
            continue;
        }

        let value_start = capture.get(0).unwrap().end();
        let mut value_end = bolds
            .get(i + 1)
            .map(|next| next.get(0).unwrap().start())
            .unwrap_or(html.len());
        if anchor_start > value_start && anchor_start < value_end {
            value_end = anchor_start;
        }

        fields.insert(label, clean_text(&html[value_start..value_end]));
    }

    if let Some(capture) = anchor {
        let email = clean_text(&capture[1]);
        let worker_code = RE_WORKER_CODE.find(&capture[2]).map(|m| m.as_str());
        if let Some(code) = worker_code {
            fields.insert(
                FIELD_SUBMITTER.to_string(),
                format!("E-mail: {email}, AZ-ident: {code}"),
            );
        }
    }

    fields
}

/// Strip tags, decode the handful of entities the form mailer emits, and
/// collapse whitespace across the intervening text nodes.
fn clean_text(raw: &str) -> String {
    let no_tags = RE_TAG.replace_all(raw, " ");
    let decoded = decode_entities(&no_tags);
    RE_SPACE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
