//! Shared fixtures and in-memory fakes for the collaborator traits.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use lib_api_clients::nova::{CaseParty, CaseRecord, Caseworker, NovaError};
use lib_api_clients::queue::{QueueElement, QueueStatus};
use uuid::Uuid;

use crate::clients::{CaseSystem, InboundEmail, MailSource, Notifier, TaskQueue, TextStore};
use crate::error::AppResult;
use crate::robot_config::RobotConfig;

pub const TEST_CONFIG_TOML: &str = r##"
accepted_worker_codes = ["az12345"]

[mailbox]
user = "itk-rpa@mkb.aarhus.dk"
folder = "Indbakke/Masseoprettelse KMD Nova"
sender = "noreply@aarhus.dk"
subject = "Masseoprettelser i KMD Nova (fra Selvbetjening.aarhuskommune.dk)"

[smtp]
server = "smtp.aarhuskommune.local"
port = 25
status_sender = "itk-rpa@mkb.aarhus.dk"

[queue]
name = "Masseoprettelse i KMD Nova"
max_task_count = 100
created_by = "Robot"

[caseworker]
name = "svcitkopeno svcitkopeno"
ident = "AZX0080"
uuid = "0bacdddd-5c61-4676-9a61-b01a18cec1d5"

[departments.4BBORGER]
id = 818485
name = "Borgerservice"

[departments.4BFOLKEREG]
id = 818486
name = "Folkeregister og Sygesikring"

[departments.4BOPKRAEV]
id = 818487
name = "Opkrævningen"

[security_pairs]
"4BBORGER" = "4BBORGER"
"4BFOLKEREG" = "4BBORGER"
"4BOPKRAEV" = "4BOPKRAEV"

[sensitivity]
"Fortrolige oplysninger" = "Fortrolige"
"Ikke fortrolige oplysninger" = "IkkeFortrolige"
"Særligt følsomme oplysninger" = "SærligFølsomme"
"Følsomme oplysninger" = "Følsomme"
"##;

pub fn test_config() -> RobotConfig {
    RobotConfig::from_toml_str(TEST_CONFIG_TOML).unwrap()
}

/// HTML body in the shape the form mailer produces. `use_existing` goes into
/// the `Brug eksisterende sag` field ("Valgt" or anything else).
pub fn sample_email_html(use_existing: &str) -> String {
    format!(
        concat!(
            "<html><body>\n",
            "<p><b>Sagsoverskrift</b> Sag A</p>\n",
            "<p><b>KLE-nummer</b> 29.03.00</p>\n",
            "<p><b>Handlingsfacet</b> G01</p>\n",
            "<p><b>Følsomhed</b> Følsomme oplysninger</p>\n",
            "<p><b>Afdeling</b> 4BBORGER</p>\n",
            "<p><b>Brug eksisterende sag</b> {use_existing}</p>\n",
            "<p><b>Notat overskrift</b> Note</p>\n",
            "<p><b>Notat tekst</b> hello world</p>\n",
            "<p><a href=\"mailto:anne.jensen@aarhus.dk\">anne.jensen@aarhus.dk</a> AZ-ident: az12345</p>\n",
            "</body></html>"
        ),
        use_existing = use_existing
    )
}

pub fn sample_inbound_email(id: &str, use_existing: &str) -> InboundEmail {
    InboundEmail {
        id: id.to_string(),
        sender: "noreply@aarhus.dk".to_string(),
        subject: "Masseoprettelser i KMD Nova (fra Selvbetjening.aarhuskommune.dk)".to_string(),
        body: sample_email_html(use_existing),
    }
}

/// Minimal case record for seeding the fake case system.
pub fn sample_case(title: &str, identifier: &str, party_name: Option<&str>) -> CaseRecord {
    CaseRecord {
        uuid: Uuid::new_v4().to_string(),
        title: title.to_string(),
        case_date: Utc::now(),
        progress_state: "Opstaaet".to_string(),
        case_parties: vec![CaseParty {
            role: "Primær".to_string(),
            identification_type: "CprNummer".to_string(),
            identification: identifier.to_string(),
            name: party_name.map(str::to_string),
            uuid: None,
        }],
        kle_number: "29.03.00".to_string(),
        proceeding_facet: "G01".to_string(),
        sensitivity: "Følsomme".to_string(),
        caseworker: None,
        responsible_department: None,
        security_unit: None,
    }
}

#[derive(Default)]
pub struct FakeMail {
    pub emails: Mutex<Vec<InboundEmail>>,
    pub attachments: Mutex<HashMap<String, Vec<String>>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeMail {
    pub fn with_emails(emails: Vec<InboundEmail>) -> Self {
        Self {
            emails: Mutex::new(emails),
            ..Default::default()
        }
    }

    pub fn add_attachment(&self, email_id: &str, text: &str) {
        self.attachments
            .lock()
            .unwrap()
            .entry(email_id.to_string())
            .or_default()
            .push(text.to_string());
    }
}

impl MailSource for FakeMail {
    async fn fetch_inbox(&self, _folder_path: &str) -> AppResult<Vec<InboundEmail>> {
        Ok(self.emails.lock().unwrap().clone())
    }

    async fn attachment_texts(&self, email_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .attachments
            .lock()
            .unwrap()
            .get(email_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_email(&self, email_id: &str) -> AppResult<()> {
        self.deleted.lock().unwrap().push(email_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    /// (recipient, subject, body) per sent mail.
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl Notifier for FakeNotifier {
    async fn send(
        &self,
        recipient: &str,
        _sender: &str,
        subject: &str,
        body: &str,
    ) -> AppResult<()> {
        self.sent.lock().unwrap().push((
            recipient.to_string(),
            subject.to_string(),
            body.to_string(),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeQueue {
    pub elements: Mutex<Vec<QueueElement>>,
    /// References of each bulk enqueue call, in call order.
    pub bulk_calls: Mutex<Vec<Vec<String>>>,
}

impl FakeQueue {
    pub fn with_pending(tasks: Vec<(&str, String)>) -> Self {
        let queue = Self::default();
        for (reference, data) in tasks {
            queue.push_pending(reference, data);
        }
        queue
    }

    pub fn push_pending(&self, reference: &str, data: String) {
        let mut elements = self.elements.lock().unwrap();
        let id = format!("task-{}", elements.len() + 1);
        elements.push(QueueElement {
            id,
            reference: reference.to_string(),
            data,
            status: QueueStatus::New,
            message: None,
            created_by: Some("Robot".to_string()),
        });
    }

    pub fn status_of(&self, task_id: &str) -> (QueueStatus, Option<String>) {
        let elements = self.elements.lock().unwrap();
        let element = elements.iter().find(|e| e.id == task_id).unwrap();
        (element.status, element.message.clone())
    }

    pub fn count_with_status(&self, status: QueueStatus) -> usize {
        self.elements
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.status == status)
            .count()
    }
}

impl TaskQueue for FakeQueue {
    async fn bulk_enqueue(
        &self,
        _queue_name: &str,
        references: &[String],
        payloads: &[String],
        created_by: &str,
    ) -> AppResult<()> {
        assert_eq!(references.len(), payloads.len());
        self.bulk_calls.lock().unwrap().push(references.to_vec());

        let mut elements = self.elements.lock().unwrap();
        for (reference, data) in references.iter().zip(payloads) {
            let id = format!("task-{}", elements.len() + 1);
            elements.push(QueueElement {
                id,
                reference: reference.clone(),
                data: data.clone(),
                status: QueueStatus::New,
                message: None,
                created_by: Some(created_by.to_string()),
            });
        }
        Ok(())
    }

    async fn pop_next(&self, _queue_name: &str) -> AppResult<Option<QueueElement>> {
        let mut elements = self.elements.lock().unwrap();
        for element in elements.iter_mut() {
            if element.status == QueueStatus::New {
                element.status = QueueStatus::InProgress;
                return Ok(Some(element.clone()));
            }
        }
        Ok(None)
    }

    async fn set_status(
        &self,
        task_id: &str,
        status: QueueStatus,
        reason: Option<&str>,
    ) -> AppResult<()> {
        let mut elements = self.elements.lock().unwrap();
        let element = elements
            .iter_mut()
            .find(|e| e.id == task_id)
            .unwrap_or_else(|| panic!("unknown task id {task_id}"));
        element.status = status;
        element.message = reason.map(str::to_string);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeNova {
    /// identifier -> existing cases.
    pub cases: Mutex<HashMap<String, Vec<CaseRecord>>>,
    pub created: Mutex<Vec<CaseRecord>>,
    /// (case uuid, note title, note text) per appended note.
    pub notes: Mutex<Vec<(String, String, String)>>,
    /// identifier -> registered name in the address registry.
    pub addresses: Mutex<HashMap<String, String>>,
    /// When set, `append_note` answers with this HTTP failure.
    pub note_failure: Mutex<Option<(u16, String)>>,
}

impl FakeNova {
    pub fn add_case(&self, identifier: &str, case: CaseRecord) {
        self.cases
            .lock()
            .unwrap()
            .entry(identifier.to_string())
            .or_default()
            .push(case);
    }

    pub fn register_address(&self, identifier: &str, name: &str) {
        self.addresses
            .lock()
            .unwrap()
            .insert(identifier.to_string(), name.to_string());
    }

    pub fn fail_notes_with(&self, status: u16, title: &str) {
        *self.note_failure.lock().unwrap() = Some((status, title.to_string()));
    }
}

impl CaseSystem for FakeNova {
    async fn cases_by_identifier(&self, identifier: &str) -> Result<Vec<CaseRecord>, NovaError> {
        Ok(self
            .cases
            .lock()
            .unwrap()
            .get(identifier)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_case(&self, case: &CaseRecord) -> Result<CaseRecord, NovaError> {
        self.created.lock().unwrap().push(case.clone());
        Ok(case.clone())
    }

    async fn append_note(
        &self,
        case_uuid: &str,
        title: &str,
        text: &str,
        _caseworker: &Caseworker,
        _approved: bool,
    ) -> Result<(), NovaError> {
        if let Some((status, machine_title)) = self.note_failure.lock().unwrap().clone() {
            return Err(NovaError::Http {
                status,
                title: machine_title,
            });
        }
        self.notes.lock().unwrap().push((
            case_uuid.to_string(),
            title.to_string(),
            text.to_string(),
        ));
        Ok(())
    }

    async fn lookup_address_name(&self, identifier: &str) -> Result<Option<String>, NovaError> {
        Ok(self.addresses.lock().unwrap().get(identifier).cloned())
    }
}

#[derive(Default)]
pub struct FakeTexts {
    pub entries: Mutex<HashMap<String, String>>,
}

impl FakeTexts {
    pub fn with_entry(key: &str, text: &str) -> Self {
        let store = Self::default();
        store
            .entries
            .lock()
            .unwrap()
            .insert(key.to_string(), text.to_string());
        store
    }
}

impl TextStore for FakeTexts {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }
}
