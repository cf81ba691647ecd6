use crate::model::{AttendanceStatus, DailyRecord, DateKey, StudentId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

pub type StudentRecords = BTreeMap<DateKey, Arc<DailyRecord>>;

/// Student -> date -> per-lesson statuses.
///
/// Date records are shared behind `Arc` and written copy-on-write, so a record
/// handed out by [`AttendanceStore::record`] never changes underneath its holder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttendanceStore {
    records: HashMap<StudentId, StudentRecords>,
}

impl AttendanceStore {
    pub fn from_plain(raw: HashMap<StudentId, BTreeMap<DateKey, DailyRecord>>) -> Self {
        let records = raw
            .into_iter()
            .map(|(sid, days)| {
                let days = days.into_iter().map(|(d, r)| (d, Arc::new(r))).collect();
                (sid, days)
            })
            .collect();
        AttendanceStore { records }
    }

    pub fn to_plain(&self) -> HashMap<StudentId, BTreeMap<DateKey, DailyRecord>> {
        self.records
            .iter()
            .map(|(sid, days)| {
                let days = days.iter().map(|(d, r)| (*d, r.as_ref().clone())).collect();
                (sid.clone(), days)
            })
            .collect()
    }

    pub fn record(&self, student_id: &str, date: DateKey) -> Option<Arc<DailyRecord>> {
        self.records.get(student_id)?.get(&date).cloned()
    }

    pub fn status_at(&self, student_id: &str, date: DateKey, lesson_index: u32) -> AttendanceStatus {
        self.records
            .get(student_id)
            .and_then(|days| days.get(&date))
            .and_then(|r| r.get(lesson_index as usize).copied())
            .unwrap_or_default()
    }

    pub fn records_for(&self, student_id: &str) -> Option<&StudentRecords> {
        self.records.get(student_id)
    }

    /// Writes one cell, growing the record to at least `min_len` slots.
    pub fn set_status(
        &mut self,
        student_id: &str,
        date: DateKey,
        lesson_index: u32,
        status: AttendanceStatus,
        min_len: usize,
    ) {
        let days = self.records.entry(student_id.to_string()).or_default();
        let record = days.entry(date).or_default();
        let cells = Arc::make_mut(record);
        let needed = min_len.max(lesson_index as usize + 1);
        if cells.len() < needed {
            cells.resize(needed, AttendanceStatus::Undefined);
        }
        cells[lesson_index as usize] = status;
    }

    pub fn remove_student(&mut self, student_id: &str) -> Option<StudentRecords> {
        self.records.remove(student_id)
    }

    pub fn restore_student(&mut self, student_id: &str, days: StudentRecords) {
        self.records.insert(student_id.to_string(), days);
    }

    pub fn remove_students(&mut self, ids: &HashSet<StudentId>) -> HashMap<StudentId, StudentRecords> {
        let mut removed = HashMap::new();
        for id in ids {
            if let Some(days) = self.records.remove(id) {
                removed.insert(id.clone(), days);
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::parse_date_key;
    use AttendanceStatus::*;

    fn d(s: &str) -> DateKey {
        parse_date_key(s).expect("date")
    }

    #[test]
    fn missing_cells_read_as_undefined() {
        let store = AttendanceStore::default();
        assert_eq!(store.status_at("s1", d("2024-03-01"), 2), Undefined);
        assert!(store.record("s1", d("2024-03-01")).is_none());
    }

    #[test]
    fn set_status_grows_lazily_and_never_shrinks() {
        let mut store = AttendanceStore::default();
        store.set_status("s1", d("2024-03-01"), 1, Present, 3);
        let r = store.record("s1", d("2024-03-01")).expect("record");
        assert_eq!(r.as_slice(), &[Undefined, Present, Undefined]);

        store.set_status("s1", d("2024-03-01"), 0, Absent, 1);
        let r = store.record("s1", d("2024-03-01")).expect("record");
        assert_eq!(r.len(), 3);
        assert_eq!(r[0], Absent);
    }

    #[test]
    fn handed_out_records_are_not_mutated() {
        let mut store = AttendanceStore::default();
        store.set_status("s1", d("2024-03-01"), 0, Present, 1);
        let before = store.record("s1", d("2024-03-01")).expect("record");

        store.set_status("s1", d("2024-03-01"), 0, Absent, 1);
        assert_eq!(before[0], Present);
        assert_eq!(store.status_at("s1", d("2024-03-01"), 0), Absent);
    }

    #[test]
    fn plain_roundtrip_keeps_cells() {
        let mut raw = HashMap::new();
        raw.insert(
            "s1".to_string(),
            BTreeMap::from([(d("2024-03-05"), vec![Present, Excused])]),
        );
        let store = AttendanceStore::from_plain(raw.clone());
        assert_eq!(store.status_at("s1", d("2024-03-05"), 1), Excused);
        assert_eq!(store.to_plain(), raw);
    }
}
