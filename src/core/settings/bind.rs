//! Environment-name → field binding table.
//!
//! Each entry names one environment variable, the coercion applied to its
//! raw text and the field it writes. Fields with no entry found in any
//! source keep the value from [`Settings::default`].

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::source::{Origin, Sources};
use super::types::Settings;

/// One field that could not be coerced to its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Environment name of the field.
    pub field: &'static str,
    /// The rejected text. `None` for secret fields and non-Unicode values.
    pub value: Option<String>,
    pub reason: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}: {} (got {value:?})", self.field, self.reason),
            None => write!(f, "{}: {}", self.field, self.reason),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    #[error("invalid settings: {}", join_errors(.0))]
    Invalid(Vec<FieldError>),

    #[error("cannot load env file {}: {message}", .path.display())]
    EnvFile { path: PathBuf, message: String },
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Which source won for each bound field, in table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance(Vec<(&'static str, Origin)>);

impl Provenance {
    pub fn get(&self, field: &str) -> Option<Origin> {
        self.0
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, origin)| *origin)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Origin)> + '_ {
        self.0.iter().copied()
    }
}

/// A successfully bound record together with where each value came from.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub settings: Settings,
    pub provenance: Provenance,
}

type Apply = fn(&mut Settings, &str) -> Result<(), String>;

struct Binding {
    env: &'static str,
    secret: bool,
    apply: Apply,
}

const BINDINGS: &[Binding] = &[
    Binding {
        env: "SECRET_KEY",
        secret: true,
        apply: |s, v| {
            s.secret_key = v.to_string();
            Ok(())
        },
    },
    Binding {
        env: "ALGORITHM",
        secret: false,
        apply: |s, v| {
            s.algorithm = v.to_string();
            Ok(())
        },
    },
    Binding {
        env: "ACCESS_TOKEN_EXPIRE_MINUTES",
        secret: false,
        apply: |s, v| {
            s.access_token_expire_minutes = parse_u64(v)?;
            Ok(())
        },
    },
    Binding {
        env: "DATABASE_URL",
        secret: false,
        apply: |s, v| {
            s.database_url = v.to_string();
            Ok(())
        },
    },
    Binding {
        env: "REDIS_URL",
        secret: false,
        apply: |s, v| {
            s.queue_broker_url = v.to_string();
            Ok(())
        },
    },
    Binding {
        env: "ADMIN_EMAIL",
        secret: false,
        apply: |s, v| {
            s.admin_email = v.to_string();
            Ok(())
        },
    },
    Binding {
        env: "ADMIN_PASSWORD",
        secret: true,
        apply: |s, v| {
            s.admin_password = v.to_string();
            Ok(())
        },
    },
    Binding {
        env: "CODE_EXECUTION_TIMEOUT",
        secret: false,
        apply: |s, v| {
            s.code_execution_timeout_seconds = parse_u64(v)?;
            Ok(())
        },
    },
    Binding {
        env: "CODE_EXECUTION_MEMORY_LIMIT",
        secret: false,
        apply: |s, v| {
            s.code_execution_memory_limit_mb = parse_u64(v)?;
            Ok(())
        },
    },
    Binding {
        env: "JAVA_HOME",
        secret: false,
        apply: |s, v| {
            s.java_home_path = PathBuf::from(v);
            Ok(())
        },
    },
    Binding {
        env: "GOOGLE_DRIVE_FOLDER_ID",
        secret: false,
        apply: |s, v| {
            s.drive_folder_id = v.to_string();
            Ok(())
        },
    },
    Binding {
        env: "GOOGLE_DRIVE_SERVICE_ACCOUNT_JSON",
        secret: true,
        apply: |s, v| {
            s.drive_service_account_json = v.to_string();
            Ok(())
        },
    },
    Binding {
        env: "MAX_FILE_SIZE",
        secret: false,
        apply: |s, v| {
            s.max_file_size_bytes = parse_u64(v)?;
            Ok(())
        },
    },
    Binding {
        env: "ALLOWED_EXTENSIONS",
        secret: false,
        apply: |s, v| {
            s.allowed_extensions = parse_string_set(v)?;
            Ok(())
        },
    },
];

/// Environment names of every bound field, in table order.
pub fn field_names() -> impl Iterator<Item = &'static str> {
    BINDINGS.iter().map(|b| b.env)
}

fn parse_u64(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("expected a non-negative integer, got an empty value".to_string());
    }
    trimmed
        .parse::<u64>()
        .map_err(|e| format!("expected a non-negative integer: {e}"))
}

fn parse_string_set(raw: &str) -> Result<BTreeSet<String>, String> {
    serde_json::from_str::<BTreeSet<String>>(raw).map_err(|e| {
        // `KEY=[".csv"]` in a .env file loses its inner quotes to dotenv.
        let trimmed = raw.trim();
        if trimmed.starts_with('[') && !trimmed.contains('"') {
            format!(
                "expected a JSON array of strings: {e}; \
                 in a .env file, single-quote the value: '[\".csv\"]'"
            )
        } else {
            format!("expected a JSON array of strings: {e}")
        }
    })
}

impl Settings {
    /// Bind every field from `sources`, falling back to the defaults.
    ///
    /// All failing fields are reported together in
    /// [`SettingsError::Invalid`]; no partially-bound record is returned.
    pub fn from_sources(sources: &Sources) -> Result<Loaded, SettingsError> {
        let mut settings = Settings::default();
        let mut provenance = Vec::with_capacity(BINDINGS.len());
        let mut errors = Vec::new();

        for binding in BINDINGS {
            let Some(found) = sources.lookup(binding.env) else {
                provenance.push((binding.env, Origin::Default));
                continue;
            };
            provenance.push((binding.env, found.origin));

            let Some(text) = found.text else {
                errors.push(FieldError {
                    field: binding.env,
                    value: None,
                    reason: "value is not valid unicode".to_string(),
                });
                continue;
            };

            if let Err(reason) = (binding.apply)(&mut settings, text) {
                errors.push(FieldError {
                    field: binding.env,
                    value: (!binding.secret).then(|| text.to_string()),
                    reason,
                });
            }
        }

        if !errors.is_empty() {
            return Err(SettingsError::Invalid(errors));
        }

        Ok(Loaded { settings, provenance: Provenance(provenance) })
    }
}
