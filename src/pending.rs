//! Attendance edits applied locally but not yet confirmed by the gateway.

use crate::gateway::{GatewayError, PersistenceGateway};
use crate::model::{CellKey, PendingChange};
use std::thread;

/// One entry per (student, date, lesson); a newer edit to the same cell
/// replaces the older one in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingQueue {
    entries: Vec<PendingChange>,
}

impl PendingQueue {
    pub fn enqueue(&mut self, change: PendingChange) {
        match self.entries.iter_mut().find(|c| c.same_cell(&change)) {
            Some(slot) => *slot = change,
            None => self.entries.push(change),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PendingChange] {
        &self.entries
    }

    /// Batch to hand to [`flush_batch`]. The queue itself is left untouched.
    pub fn snapshot(&self) -> Vec<PendingChange> {
        self.entries.clone()
    }

    /// Drops entries that were persisted by a fully successful flush. An entry
    /// edited again since the batch was taken no longer matches and stays queued.
    pub fn settle(&mut self, flushed: &[PendingChange]) {
        self.entries.retain(|c| !flushed.contains(c));
    }

    pub fn retain_students<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.entries.retain(|c| keep(&c.student_id));
    }
}

#[derive(Debug)]
pub struct FlushOutcome {
    pub attempted: usize,
    pub failures: Vec<(CellKey, GatewayError)>,
}

/// Issues one `save_attendance_cell` per entry, all at once, and waits for all.
/// An entry whose writer thread cannot be started counts as a failed write.
pub fn flush_batch(gateway: &dyn PersistenceGateway, batch: &[PendingChange]) -> FlushOutcome {
    let results: Vec<(CellKey, Result<(), GatewayError>)> = thread::scope(|scope| {
        let handles: Vec<_> = batch
            .iter()
            .map(|change| {
                let spawned = thread::Builder::new()
                    .name("attendance-writer".to_string())
                    .spawn_scoped(scope, move || gateway.save_attendance_cell(change));
                (change.key(), spawned)
            })
            .collect();
        handles
            .into_iter()
            .map(|(key, spawned)| {
                let result = match spawned {
                    Ok(handle) => handle.join().unwrap_or_else(|_| {
                        Err(GatewayError::Transport {
                            kind: "panic",
                            detail: "attendance writer panicked".to_string(),
                        })
                    }),
                    Err(e) => Err(spawn_failure(&e)),
                };
                (key, result)
            })
            .collect()
    });

    FlushOutcome {
        attempted: batch.len(),
        failures: results
            .into_iter()
            .filter_map(|(key, r)| r.err().map(|e| (key, e)))
            .collect(),
    }
}

fn spawn_failure(e: &std::io::Error) -> GatewayError {
    GatewayError::Transport {
        kind: "spawn",
        detail: format!("could not start attendance writer: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{parse_date_key, AttendanceStatus};

    fn change(student: &str, lesson: u32, status: AttendanceStatus, subject: &str) -> PendingChange {
        PendingChange {
            student_id: student.to_string(),
            date: parse_date_key("2024-03-05").expect("date"),
            lesson_index: lesson,
            status,
            subject: subject.to_string(),
            topic: String::new(),
        }
    }

    #[test]
    fn same_cell_edits_collapse_to_latest() {
        let mut q = PendingQueue::default();
        q.enqueue(change("s1", 0, AttendanceStatus::Present, "Math"));
        q.enqueue(change("s2", 0, AttendanceStatus::Present, "Math"));
        q.enqueue(change("s1", 0, AttendanceStatus::Absent, "History"));
        assert_eq!(q.len(), 2);
        assert_eq!(q.entries()[0].status, AttendanceStatus::Absent);
        assert_eq!(q.entries()[0].subject, "History");
        assert_eq!(q.entries()[1].student_id, "s2");
    }

    #[test]
    fn settle_keeps_entries_edited_after_snapshot() {
        let mut q = PendingQueue::default();
        q.enqueue(change("s1", 0, AttendanceStatus::Present, ""));
        q.enqueue(change("s2", 1, AttendanceStatus::Absent, ""));
        let batch = q.snapshot();

        q.enqueue(change("s1", 0, AttendanceStatus::Excused, ""));
        q.enqueue(change("s3", 0, AttendanceStatus::Present, ""));
        q.settle(&batch);

        assert_eq!(q.len(), 2);
        assert_eq!(q.entries()[0].student_id, "s1");
        assert_eq!(q.entries()[0].status, AttendanceStatus::Excused);
        assert_eq!(q.entries()[1].student_id, "s3");
    }

    #[test]
    fn spawn_errors_become_transport_failures() {
        let e = std::io::Error::new(std::io::ErrorKind::WouldBlock, "thread limit reached");
        match spawn_failure(&e) {
            GatewayError::Transport { kind, detail } => {
                assert_eq!(kind, "spawn");
                assert!(detail.contains("thread limit reached"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
