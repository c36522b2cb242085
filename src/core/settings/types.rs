//! The resolved configuration record and the helpers derived from it.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const REDACTED: &str = "<redacted>";

/// Fully-resolved application settings.
///
/// Built once at startup by [`Settings::from_sources`](super::Settings::from_sources)
/// and shared read-only afterwards (`&'static` via
/// [`get_settings`](super::get_settings), or `Arc<Settings>` when injected).
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    /// Token-signing secret (`SECRET_KEY`).
    pub secret_key: String,
    /// Token-signing algorithm identifier (`ALGORITHM`).
    pub algorithm: String,
    /// Access token lifetime in minutes (`ACCESS_TOKEN_EXPIRE_MINUTES`).
    pub access_token_expire_minutes: u64,
    /// Storage backend location (`DATABASE_URL`).
    pub database_url: String,
    /// Job-queue broker location (`REDIS_URL`).
    pub queue_broker_url: String,
    /// Bootstrap admin account (`ADMIN_EMAIL` / `ADMIN_PASSWORD`).
    pub admin_email: String,
    pub admin_password: String,
    /// Wall-clock budget for sandboxed code runs (`CODE_EXECUTION_TIMEOUT`).
    pub code_execution_timeout_seconds: u64,
    /// Memory budget for sandboxed code runs (`CODE_EXECUTION_MEMORY_LIMIT`).
    pub code_execution_memory_limit_mb: u64,
    /// External Java runtime used by the sandbox (`JAVA_HOME`).
    pub java_home_path: PathBuf,
    /// Optional document-storage integration. Empty means disabled.
    pub drive_folder_id: String,
    pub drive_service_account_json: String,
    /// Upload size ceiling (`MAX_FILE_SIZE`).
    pub max_file_size_bytes: u64,
    /// Upload filter, dotted and lower-case by convention (`ALLOWED_EXTENSIONS`).
    pub allowed_extensions: BTreeSet<String>,
}

/// Borrowed view of the document-storage integration, present only when a
/// folder id is configured.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DriveSettings<'a> {
    pub folder_id: &'a str,
    /// Service-account credential blob; may be empty when ambient
    /// credentials are used instead.
    pub service_account_json: &'a str,
}

impl fmt::Debug for DriveSettings<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveSettings")
            .field("folder_id", &self.folder_id)
            .field("service_account_json", &redact(self.service_account_json))
            .finish()
    }
}

pub(crate) fn default_secret_key() -> String { "dev-secret-key-change-in-production".to_string() }
pub(crate) fn default_algorithm() -> String { "HS256".to_string() }
pub(crate) fn default_access_token_expire_minutes() -> u64 { 60 * 24 }
pub(crate) fn default_database_url() -> String { "sqlite:///./mercer_hr.db".to_string() }
pub(crate) fn default_queue_broker_url() -> String { "redis://red-d2oo9oqdbo4c73brj9pg:6379".to_string() }
pub(crate) fn default_admin_email() -> String { "admin@mercer.com".to_string() }
pub(crate) fn default_admin_password() -> String { "admin123".to_string() }
pub(crate) fn default_code_execution_timeout_seconds() -> u64 { 10 }
pub(crate) fn default_code_execution_memory_limit_mb() -> u64 { 128 }
pub(crate) fn default_java_home_path() -> PathBuf { PathBuf::from("/usr/lib/jvm/java-17-openjdk-amd64") }
pub(crate) fn default_max_file_size_bytes() -> u64 { 10 * 1024 * 1024 }
pub(crate) fn default_allowed_extensions() -> BTreeSet<String> {
    BTreeSet::from([".csv".to_string(), ".txt".to_string()])
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            algorithm: default_algorithm(),
            access_token_expire_minutes: default_access_token_expire_minutes(),
            database_url: default_database_url(),
            queue_broker_url: default_queue_broker_url(),
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
            code_execution_timeout_seconds: default_code_execution_timeout_seconds(),
            code_execution_memory_limit_mb: default_code_execution_memory_limit_mb(),
            java_home_path: default_java_home_path(),
            drive_folder_id: String::new(),
            drive_service_account_json: String::new(),
            max_file_size_bytes: default_max_file_size_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl Settings {
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expire_minutes.saturating_mul(60))
    }

    pub fn code_execution_timeout(&self) -> Duration {
        Duration::from_secs(self.code_execution_timeout_seconds)
    }

    pub fn code_execution_memory_limit_bytes(&self) -> u64 {
        self.code_execution_memory_limit_mb.saturating_mul(1024 * 1024)
    }

    /// Returns `true` if `file_name` ends in one of the allowed extensions.
    ///
    /// Only the final extension counts (`report.tar.csv` is a `.csv`), and
    /// the comparison ignores ASCII case. Names without an extension, including
    /// bare dotfiles such as `.csv`, are rejected.
    pub fn allows_extension(&self, file_name: &str) -> bool {
        let Some(ext) = Path::new(file_name).extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let dotted = format!(".{ext}");
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&dotted))
    }

    /// Returns `true` if an upload of `len` bytes fits under the ceiling.
    pub fn within_upload_limit(&self, len: u64) -> bool {
        len <= self.max_file_size_bytes
    }

    pub fn drive(&self) -> Option<DriveSettings<'_>> {
        if self.drive_folder_id.is_empty() {
            return None;
        }
        Some(DriveSettings {
            folder_id: &self.drive_folder_id,
            service_account_json: &self.drive_service_account_json,
        })
    }

    /// Env names of credential fields that still carry their built-in
    /// placeholder values. Fine for local development, never for a deployment.
    pub fn insecure_defaults(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.secret_key == default_secret_key() {
            out.push("SECRET_KEY");
        }
        if self.admin_password == default_admin_password() {
            out.push("ADMIN_PASSWORD");
        }
        out
    }
}

fn redact(value: &str) -> &str {
    if value.is_empty() { "" } else { REDACTED }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("secret_key", &redact(&self.secret_key))
            .field("algorithm", &self.algorithm)
            .field("access_token_expire_minutes", &self.access_token_expire_minutes)
            .field("database_url", &self.database_url)
            .field("queue_broker_url", &self.queue_broker_url)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &redact(&self.admin_password))
            .field("code_execution_timeout_seconds", &self.code_execution_timeout_seconds)
            .field("code_execution_memory_limit_mb", &self.code_execution_memory_limit_mb)
            .field("java_home_path", &self.java_home_path)
            .field("drive_folder_id", &self.drive_folder_id)
            .field("drive_service_account_json", &redact(&self.drive_service_account_json))
            .field("max_file_size_bytes", &self.max_file_size_bytes)
            .field("allowed_extensions", &self.allowed_extensions)
            .finish()
    }
}
