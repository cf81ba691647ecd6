use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// ISO calendar date used as the key of every per-day map (`YYYY-MM-DD` on the wire).
pub type DateKey = NaiveDate;

pub type StudentId = String;
pub type ClassId = String;

/// Per-lesson attendance marks for one student on one date, indexed by lesson slot.
pub type DailyRecord = Vec<AttendanceStatus>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttendanceStatus {
    #[default]
    Undefined,
    Present,
    Absent,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Undefined => "UNDEFINED",
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Excused => "EXCUSED",
        }
    }

    /// Lenient decode: blank or unrecognized codes read as `Undefined`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "PRESENT" => AttendanceStatus::Present,
            "ABSENT" => AttendanceStatus::Absent,
            "EXCUSED" => AttendanceStatus::Excused,
            _ => AttendanceStatus::Undefined,
        }
    }

    /// Strict decode for request parameters, where a typo should be reported.
    pub fn parse_strict(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "UNDEFINED" => Some(AttendanceStatus::Undefined),
            "PRESENT" => Some(AttendanceStatus::Present),
            "ABSENT" => Some(AttendanceStatus::Absent),
            "EXCUSED" => Some(AttendanceStatus::Excused),
            _ => None,
        }
    }
}

impl Serialize for AttendanceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AttendanceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(s)) => AttendanceStatus::from_code(&s),
            _ => AttendanceStatus::Undefined,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Transferred,
    Dropped,
    #[serde(other)]
    Inactive,
}

impl EnrollmentStatus {
    pub fn is_active(self) -> bool {
        self == EnrollmentStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub id: ClassId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub class_id: ClassId,
    #[serde(default)]
    pub status: EnrollmentStatus,
}

/// A named grading period. Ranges are inclusive and deliberately unvalidated:
/// they may overlap or leave gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BimesterConfig {
    pub id: String,
    pub name: String,
    pub start: DateKey,
    pub end: DateKey,
}

impl BimesterConfig {
    pub fn contains(&self, date: DateKey) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub student_id: StudentId,
    pub date: DateKey,
    pub lesson_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub student_id: StudentId,
    pub date: DateKey,
    pub lesson_index: u32,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub topic: String,
}

impl PendingChange {
    pub fn key(&self) -> CellKey {
        CellKey {
            student_id: self.student_id.clone(),
            date: self.date,
            lesson_index: self.lesson_index,
        }
    }

    pub fn same_cell(&self, other: &PendingChange) -> bool {
        self.student_id == other.student_id
            && self.date == other.date
            && self.lesson_index == other.lesson_index
    }
}

/// Everything `loadAll` returns. `config` stays raw so the lesson normalizer can
/// decide per entry what is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub classes: Vec<ClassGroup>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub bimesters: Vec<BimesterConfig>,
    #[serde(default)]
    pub attendance: HashMap<StudentId, BTreeMap<DateKey, DailyRecord>>,
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

/// Payload for a bulk `syncAll`; absent sections are left alone by the sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<ClassGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<Student>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bimesters: Option<Vec<BimesterConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance: Option<HashMap<StudentId, BTreeMap<DateKey, DailyRecord>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<BTreeMap<String, serde_json::Value>>,
}

impl From<Snapshot> for PartialSnapshot {
    fn from(s: Snapshot) -> Self {
        PartialSnapshot {
            classes: Some(s.classes),
            students: Some(s.students),
            bimesters: Some(s.bimesters),
            attendance: Some(s.attendance),
            config: Some(s.config),
        }
    }
}

pub fn parse_date_key(raw: &str) -> Option<DateKey> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_decodes_leniently() {
        let v: Vec<AttendanceStatus> =
            serde_json::from_value(json!(["PRESENT", "absent", null, "", "??", "EXCUSED"]))
                .expect("decode statuses");
        assert_eq!(
            v,
            vec![
                AttendanceStatus::Present,
                AttendanceStatus::Absent,
                AttendanceStatus::Undefined,
                AttendanceStatus::Undefined,
                AttendanceStatus::Undefined,
                AttendanceStatus::Excused,
            ]
        );
        assert_eq!(AttendanceStatus::parse_strict("maybe"), None);
    }

    #[test]
    fn enrollment_defaults_and_unknowns() {
        let s: Student = serde_json::from_value(json!({
            "id": "s1", "name": "Ana", "classId": "c1"
        }))
        .expect("decode student");
        assert_eq!(s.status, EnrollmentStatus::Active);

        let s: Student = serde_json::from_value(json!({
            "id": "s2", "name": "Bia", "classId": "c1", "status": "ON_LEAVE"
        }))
        .expect("decode student");
        assert_eq!(s.status, EnrollmentStatus::Inactive);
    }
}
