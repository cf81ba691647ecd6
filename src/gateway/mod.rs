//! Remote/local storage seam. The core only ever talks to [`PersistenceGateway`];
//! every call is at-most-once and failures are returned, never retried here.

mod sheets;
mod sqlite;

pub use sheets::{SheetsGateway, SheetsOptions};
pub use sqlite::SqliteGateway;

use crate::model::{BimesterConfig, ClassGroup, PartialSnapshot, PendingChange, Snapshot, Student};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum GatewayError {
    #[error("transport error ({kind}): {detail}")]
    Transport { kind: &'static str, detail: String },

    #[error("endpoint answered http {0}")]
    Status(u16),

    #[error("endpoint rejected the request: {0}")]
    Rejected(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<rusqlite::Error> for GatewayError {
    fn from(e: rusqlite::Error) -> Self {
        GatewayError::Storage(e.to_string())
    }
}

pub trait PersistenceGateway: Send + Sync {
    /// Short label for logs, e.g. `sqlite` or `sheets`.
    fn kind(&self) -> &'static str;

    fn load_all(&self) -> Result<Snapshot, GatewayError>;

    fn save_attendance_cell(&self, change: &PendingChange) -> Result<(), GatewayError>;

    fn save_config(&self, key: &str, value: &serde_json::Value) -> Result<(), GatewayError>;

    fn save_class(&self, class: &ClassGroup) -> Result<(), GatewayError>;

    fn save_student(&self, student: &Student) -> Result<(), GatewayError>;

    fn save_bimesters(&self, bimesters: &[BimesterConfig]) -> Result<(), GatewayError>;

    /// Removes the class, its students and their attendance.
    fn delete_class(&self, class_id: &str) -> Result<(), GatewayError>;

    /// Removes the student and their attendance.
    fn delete_student(&self, student_id: &str) -> Result<(), GatewayError>;

    fn sync_all(&self, snapshot: &PartialSnapshot) -> Result<(), GatewayError>;
}
