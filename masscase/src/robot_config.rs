use std::{collections::HashMap, env, fs, path::Path};

use lib_api_clients::nova::{Caseworker, Department};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Environment variable holding the per-run process arguments as JSON.
pub const PROCESS_ARGS_ENV: &str = "ROBOT_PROCESS_ARGS";

#[derive(Debug, Clone, Deserialize)]
pub struct MailboxConfig {
    /// Shared mailbox the robot reads from.
    pub user: String,
    /// Display-name path of the source folder.
    pub folder: String,
    /// Only messages from this sender are processed.
    pub sender: String,
    /// Only messages with exactly this subject are processed.
    pub subject: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub status_sender: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub name: String,
    /// Cap on queue elements handled in one consumer pass.
    pub max_task_count: usize,
    pub created_by: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepartmentEntry {
    pub id: i64,
    pub name: String,
}

/// Per-run arguments handed down by the orchestrator.
#[derive(Debug, Deserialize)]
struct ProcessArgs {
    accepted_worker_codes: Vec<String>,
}

/// All static configuration, loaded once at startup and never mutated.
/// The lookup tables are complete by construction: `validate` runs as part
/// of loading and rejects dangling security pairings.
#[derive(Debug, Deserialize)]
pub struct RobotConfig {
    pub mailbox: MailboxConfig,
    pub smtp: SmtpConfig,
    pub queue: QueueConfig,
    pub caseworker: Caseworker,
    /// Department code -> numeric id and display name.
    pub departments: HashMap<String, DepartmentEntry>,
    /// Department code -> department code of its security unit.
    pub security_pairs: HashMap<String, String>,
    /// Free-text sensitivity phrase -> canonical sensitivity level.
    pub sensitivity: HashMap<String, String>,
    /// Worker codes allowed to trigger the robot, checked case-insensitively.
    #[serde(default)]
    pub accepted_worker_codes: Vec<String>,
}

impl RobotConfig {
    /// Load from `$APP_DIR/config.toml` (or `../config/config.toml` next to
    /// the crate during development) and merge the per-run process arguments
    /// from the environment.
    pub fn load() -> AppResult<Self> {
        let root = match env::var("APP_DIR") {
            Ok(dir) => dir,
            Err(_) => {
                let dir = env::var("CARGO_MANIFEST_DIR").map_err(|_| {
                    AppError::Config("CARGO_MANIFEST_DIR or APP_DIR is required".to_string())
                })?;
                let parent = Path::new(&dir)
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or(dir);
                format!("{parent}/config")
            }
        };

        let path = format!("{root}/config.toml");
        let raw = fs::read_to_string(&path)
            .map_err(|e| AppError::Config(format!("Could not read {path}: {e}")))?;
        let mut cfg = Self::from_toml_str(&raw)?;

        if let Ok(raw_args) = env::var(PROCESS_ARGS_ENV) {
            let args: ProcessArgs = serde_json::from_str(&raw_args)
                .map_err(|e| AppError::Config(format!("Invalid {PROCESS_ARGS_ENV}: {e}")))?;
            cfg.accepted_worker_codes = args.accepted_worker_codes;
        }

        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> AppResult<Self> {
        let cfg: RobotConfig = toml::from_str(raw)
            .map_err(|e| AppError::Config(format!("Invalid config file: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> AppResult<()> {
        if self.departments.is_empty() {
            return Err(AppError::Config("Department table is empty".to_string()));
        }
        if self.sensitivity.is_empty() {
            return Err(AppError::Config("Sensitivity table is empty".to_string()));
        }
        for (code, unit_code) in &self.security_pairs {
            if !self.departments.contains_key(code) {
                return Err(AppError::Config(format!(
                    "Security pairing references unknown department '{code}'"
                )));
            }
            if !self.departments.contains_key(unit_code) {
                return Err(AppError::Config(format!(
                    "Security unit '{unit_code}' for department '{code}' is not in the department table"
                )));
            }
        }
        Ok(())
    }

    pub fn department(&self, code: &str) -> AppResult<Department> {
        let entry = self
            .departments
            .get(code)
            .ok_or_else(|| AppError::Config(format!("Ukendt afdeling '{code}'")))?;
        Ok(Department {
            id: entry.id,
            name: entry.name.clone(),
            user_key: code.to_string(),
        })
    }

    /// Department code of the security unit governing the given department.
    pub fn security_unit_code(&self, department_code: &str) -> AppResult<&str> {
        self.security_pairs
            .get(department_code)
            .map(String::as_str)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Ingen sikkerhedsenhed for afdeling '{department_code}'"
                ))
            })
    }

    /// Translate a raw sensitivity phrase into the canonical level. Unknown
    /// phrases fail rather than default.
    pub fn translate_sensitivity(&self, phrase: &str) -> AppResult<&str> {
        self.sensitivity
            .get(phrase)
            .map(String::as_str)
            .ok_or_else(|| AppError::Config(format!("Ukendt følsomhed '{phrase}'")))
    }

    pub fn is_worker_accepted(&self, worker_code: &str) -> bool {
        self.accepted_worker_codes
            .iter()
            .any(|code| code.eq_ignore_ascii_case(worker_code))
    }
}
