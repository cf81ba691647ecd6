//! The application controller: sole owner of the in-memory state and the only
//! way to change it.
//!
//! Attendance edits are applied locally at once and queued; they reach the
//! gateway on [`AttendanceApp::save_pending`], or in two steps through
//! [`AttendanceApp::begin_flush`] and [`AttendanceApp::finish_flush`] when the
//! writes run elsewhere. Lesson configuration is handed to a background writer
//! and its failures are only logged. Roster and bimester edits are applied
//! locally, sent, and reverted if the gateway refuses them.

use crate::config_writer::ConfigWriter;
use crate::cycle::resolve_next;
use crate::error::AppError;
use crate::gateway::PersistenceGateway;
use crate::lessons::{
    is_lesson_index, LessonPlan, LessonSlots, LESSON_SLOTS_KEY, LESSON_SUBJECTS_KEY,
    LESSON_TOPICS_KEY, MAX_LESSONS_PER_DAY,
};
use crate::model::{
    AttendanceStatus, BimesterConfig, ClassGroup, DateKey, EnrollmentStatus, PendingChange,
    Snapshot, Student,
};
use crate::pending::{flush_batch, FlushOutcome, PendingQueue};
use crate::reports::{self, MonthGrid, StudentReport};
use crate::stats::{self, ClassStats, StudentStats};
use crate::store::AttendanceStore;
use log::{info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct AppData {
    pub classes: Vec<ClassGroup>,
    pub students: Vec<Student>,
    pub bimesters: Vec<BimesterConfig>,
    pub attendance: AttendanceStore,
    pub lessons: LessonPlan,
    pub pending: PendingQueue,
}

impl AppData {
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        AppData {
            lessons: LessonPlan::from_config(&snapshot.config),
            attendance: AttendanceStore::from_plain(snapshot.attendance),
            classes: snapshot.classes,
            students: snapshot.students,
            bimesters: snapshot.bimesters,
            pending: PendingQueue::default(),
        }
    }

    pub fn class(&self, class_id: &str) -> Option<&ClassGroup> {
        self.classes.iter().find(|c| c.id == class_id)
    }

    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == student_id)
    }

    /// Students of a class, ordered by name the way the register lists them.
    pub fn students_in_class(&self, class_id: &str) -> Vec<&Student> {
        let mut out: Vec<&Student> = self
            .students
            .iter()
            .filter(|s| s.class_id == class_id)
            .collect();
        out.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub class_id: Option<String>,
    pub status: Option<EnrollmentStatus>,
}

pub struct AttendanceApp {
    gateway: Arc<dyn PersistenceGateway>,
    config_writer: ConfigWriter,
    data: AppData,
    loaded: bool,
}

impl AttendanceApp {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        AttendanceApp {
            config_writer: ConfigWriter::spawn(gateway.clone()),
            gateway,
            data: AppData::default(),
            loaded: false,
        }
    }

    /// Builds the controller and performs the initial load.
    pub fn open(gateway: Arc<dyn PersistenceGateway>) -> Result<Self, AppError> {
        let mut app = AttendanceApp::new(gateway);
        app.reload()?;
        Ok(app)
    }

    pub fn gateway_kind(&self) -> &'static str {
        self.gateway.kind()
    }

    /// Shared handle for writes that run off the caller's thread.
    pub fn gateway(&self) -> Arc<dyn PersistenceGateway> {
        self.gateway.clone()
    }

    pub fn data(&self) -> &AppData {
        &self.data
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Replaces all state with the gateway's. On failure the state is emptied.
    pub fn reload(&mut self) -> Result<(), AppError> {
        match self.gateway.load_all() {
            Ok(snapshot) => {
                let discarded = self.data.pending.len();
                self.data = AppData::from_snapshot(snapshot);
                self.loaded = true;
                info!(
                    "event=data_load module=app status=ok source={} classes={} students={} discarded_pending={}",
                    self.gateway.kind(),
                    self.data.classes.len(),
                    self.data.students.len(),
                    discarded
                );
                Ok(())
            }
            Err(e) => {
                self.data = AppData::default();
                self.loaded = false;
                warn!(
                    "event=data_load module=app status=failed source={} error={}",
                    self.gateway.kind(),
                    e
                );
                Err(AppError::LoadFailure(e))
            }
        }
    }

    /// Cycles (or forces) one cell. Returns the queued change, or `None` when
    /// the cell already holds the resulting status.
    pub fn toggle_attendance(
        &mut self,
        student_id: &str,
        date: DateKey,
        lesson_index: u32,
        forced: Option<AttendanceStatus>,
    ) -> Result<Option<PendingChange>, AppError> {
        check_lesson_index(lesson_index)?;
        let current = self.data.attendance.status_at(student_id, date, lesson_index);
        let next = resolve_next(current, forced);
        if next == current {
            return Ok(None);
        }

        let min_len = self.data.lessons.record_len(date, lesson_index);
        self.data
            .attendance
            .set_status(student_id, date, lesson_index, next, min_len);

        let change = PendingChange {
            student_id: student_id.to_string(),
            date,
            lesson_index,
            status: next,
            subject: self
                .data
                .lessons
                .subject(date, lesson_index)
                .unwrap_or_default()
                .to_string(),
            topic: self
                .data
                .lessons
                .topic(date, lesson_index)
                .unwrap_or_default()
                .to_string(),
        };
        self.data.pending.enqueue(change.clone());
        Ok(Some(change))
    }

    /// Marks `target` on one lesson for every visible, active student whose cell
    /// is still unmarked. Existing marks are never overwritten.
    pub fn bulk_update(
        &mut self,
        date: DateKey,
        lesson_index: u32,
        target: AttendanceStatus,
        visible_student_ids: &[String],
    ) -> Result<usize, AppError> {
        check_lesson_index(lesson_index)?;
        let eligible: Vec<String> = visible_student_ids
            .iter()
            .filter(|id| {
                self.data
                    .student(id)
                    .map(|s| s.status.is_active())
                    .unwrap_or(false)
            })
            .filter(|id| {
                self.data.attendance.status_at(id, date, lesson_index)
                    == AttendanceStatus::Undefined
            })
            .cloned()
            .collect();

        let mut updated = 0;
        for id in &eligible {
            if self
                .toggle_attendance(id, date, lesson_index, Some(target))?
                .is_some()
            {
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Writes every queued change. The queue is cleared only when all writes
    /// succeed; otherwise it is kept whole for a manual retry.
    pub fn save_pending(&mut self) -> Result<usize, AppError> {
        let Some(batch) = self.begin_flush() else {
            return Ok(0);
        };
        let outcome = flush_batch(self.gateway.as_ref(), &batch);
        self.finish_flush(&batch, outcome)
    }

    /// Batch for a flush, or `None` when nothing is queued. The queue stays
    /// open for edits while the batch is being written.
    pub fn begin_flush(&self) -> Option<Vec<PendingChange>> {
        if self.data.pending.is_empty() {
            return None;
        }
        Some(self.data.pending.snapshot())
    }

    /// Settles a batch taken by [`Self::begin_flush`]. Entries edited after the
    /// batch was taken stay queued either way.
    pub fn finish_flush(
        &mut self,
        batch: &[PendingChange],
        outcome: FlushOutcome,
    ) -> Result<usize, AppError> {
        let failed = outcome.failures.len();
        let Some((key, first)) = outcome.failures.into_iter().next() else {
            self.data.pending.settle(batch);
            info!(
                "event=attendance_flush module=app status=ok written={} still_pending={}",
                batch.len(),
                self.data.pending.len()
            );
            return Ok(batch.len());
        };
        warn!(
            "event=attendance_flush module=app status=failed failed={} total={} first_student={} first_date={} error={}",
            failed,
            outcome.attempted,
            key.student_id,
            key.date,
            first
        );
        Err(AppError::FlushFailure {
            failed,
            total: outcome.attempted,
            first,
        })
    }

    pub fn set_lesson_slots(&mut self, date: DateKey, slots: LessonSlots) -> Result<(), AppError> {
        if !self.data.lessons.set_slots(date, slots) {
            return Err(AppError::InvalidInput(format!(
                "a day holds at most {} lessons, indexed 0..{}",
                MAX_LESSONS_PER_DAY, MAX_LESSONS_PER_DAY
            )));
        }
        self.persist_config(LESSON_SLOTS_KEY);
        Ok(())
    }

    pub fn add_lesson(&mut self, date: DateKey) -> Result<u32, AppError> {
        let Some(idx) = self.data.lessons.add_lesson(date) else {
            return Err(AppError::InvalidInput(format!(
                "{date} already has its last lesson slot"
            )));
        };
        self.persist_config(LESSON_SLOTS_KEY);
        Ok(idx)
    }

    pub fn remove_lesson(&mut self, date: DateKey, lesson_index: u32) -> Result<(), AppError> {
        if !self.data.lessons.remove_lesson(date, lesson_index) {
            return Err(AppError::not_found(
                "lesson",
                format!("{date}#{lesson_index}"),
            ));
        }
        self.persist_config(LESSON_SLOTS_KEY);
        Ok(())
    }

    pub fn set_lesson_subject(
        &mut self,
        date: DateKey,
        lesson_index: u32,
        subject: &str,
    ) -> Result<(), AppError> {
        check_lesson_index(lesson_index)?;
        self.data.lessons.set_subject(date, lesson_index, subject);
        self.persist_config(LESSON_SUBJECTS_KEY);
        Ok(())
    }

    pub fn set_lesson_topic(
        &mut self,
        date: DateKey,
        lesson_index: u32,
        topic: &str,
    ) -> Result<(), AppError> {
        check_lesson_index(lesson_index)?;
        self.data.lessons.set_topic(date, lesson_index, topic);
        self.persist_config(LESSON_TOPICS_KEY);
        Ok(())
    }

    fn persist_config(&self, key: &str) {
        if let Some(value) = self.data.lessons.to_config_value(key) {
            self.config_writer.submit(key, value);
        }
    }

    /// Blocks until queued lesson-config saves have been attempted.
    pub fn wait_config_writes(&self) {
        self.config_writer.wait_idle();
    }

    pub fn create_class(&mut self, name: &str) -> Result<ClassGroup, AppError> {
        let name = required_name(name)?;
        let class = ClassGroup {
            id: Uuid::new_v4().to_string(),
            name,
        };
        self.data.classes.push(class.clone());
        if let Err(e) = self.gateway.save_class(&class) {
            self.data.classes.retain(|c| c.id != class.id);
            return Err(diverged("create class", e));
        }
        Ok(class)
    }

    pub fn rename_class(&mut self, class_id: &str, name: &str) -> Result<ClassGroup, AppError> {
        let name = required_name(name)?;
        let Some(pos) = self.data.classes.iter().position(|c| c.id == class_id) else {
            return Err(AppError::not_found("class", class_id));
        };
        let prior = self.data.classes[pos].clone();
        self.data.classes[pos].name = name;
        let updated = self.data.classes[pos].clone();
        if let Err(e) = self.gateway.save_class(&updated) {
            self.data.classes[pos] = prior;
            return Err(diverged("rename class", e));
        }
        Ok(updated)
    }

    /// Deletes a class with its students, their attendance and queued edits.
    /// Returns the number of students removed.
    pub fn delete_class(&mut self, class_id: &str) -> Result<usize, AppError> {
        let Some(pos) = self.data.classes.iter().position(|c| c.id == class_id) else {
            return Err(AppError::not_found("class", class_id));
        };
        let ids: HashSet<String> = self
            .data
            .students
            .iter()
            .filter(|s| s.class_id == class_id)
            .map(|s| s.id.clone())
            .collect();

        let class = self.data.classes.remove(pos);
        let prior_students = self.data.students.clone();
        let prior_pending = self.data.pending.clone();
        self.data.students.retain(|s| s.class_id != class_id);
        let removed_records = self.data.attendance.remove_students(&ids);
        self.data.pending.retain_students(|sid| !ids.contains(sid));

        if let Err(e) = self.gateway.delete_class(class_id) {
            self.data.classes.insert(pos, class);
            self.data.students = prior_students;
            for (sid, days) in removed_records {
                self.data.attendance.restore_student(&sid, days);
            }
            self.data.pending = prior_pending;
            return Err(diverged("delete class", e));
        }
        info!(
            "event=class_delete module=app status=ok students_removed={}",
            ids.len()
        );
        Ok(ids.len())
    }

    pub fn create_student(
        &mut self,
        class_id: &str,
        name: &str,
        status: EnrollmentStatus,
    ) -> Result<Student, AppError> {
        let name = required_name(name)?;
        if self.data.class(class_id).is_none() {
            return Err(AppError::not_found("class", class_id));
        }
        let student = Student {
            id: Uuid::new_v4().to_string(),
            name,
            class_id: class_id.to_string(),
            status,
        };
        self.data.students.push(student.clone());
        if let Err(e) = self.gateway.save_student(&student) {
            self.data.students.retain(|s| s.id != student.id);
            return Err(diverged("create student", e));
        }
        Ok(student)
    }

    pub fn update_student(
        &mut self,
        student_id: &str,
        patch: StudentPatch,
    ) -> Result<Student, AppError> {
        let Some(pos) = self.data.students.iter().position(|s| s.id == student_id) else {
            return Err(AppError::not_found("student", student_id));
        };
        let name = patch.name.as_deref().map(required_name).transpose()?;
        if let Some(class_id) = patch.class_id.as_deref() {
            if self.data.class(class_id).is_none() {
                return Err(AppError::not_found("class", class_id));
            }
        }

        let prior = self.data.students[pos].clone();
        let student = &mut self.data.students[pos];
        if let Some(name) = name {
            student.name = name;
        }
        if let Some(class_id) = patch.class_id {
            student.class_id = class_id;
        }
        if let Some(status) = patch.status {
            student.status = status;
        }
        let updated = student.clone();

        if let Err(e) = self.gateway.save_student(&updated) {
            self.data.students[pos] = prior;
            return Err(diverged("update student", e));
        }
        Ok(updated)
    }

    pub fn delete_student(&mut self, student_id: &str) -> Result<(), AppError> {
        let Some(pos) = self.data.students.iter().position(|s| s.id == student_id) else {
            return Err(AppError::not_found("student", student_id));
        };
        let student = self.data.students.remove(pos);
        let records = self.data.attendance.remove_student(student_id);
        let prior_pending = self.data.pending.clone();
        self.data.pending.retain_students(|sid| sid != student_id);

        if let Err(e) = self.gateway.delete_student(student_id) {
            self.data.students.insert(pos, student);
            if let Some(days) = records {
                self.data.attendance.restore_student(student_id, days);
            }
            self.data.pending = prior_pending;
            return Err(diverged("delete student", e));
        }
        Ok(())
    }

    /// Replaces the bimester set. Ranges are stored as given.
    pub fn save_bimesters(&mut self, bimesters: Vec<BimesterConfig>) -> Result<(), AppError> {
        let prior = std::mem::replace(&mut self.data.bimesters, bimesters);
        if let Err(e) = self.gateway.save_bimesters(&self.data.bimesters) {
            self.data.bimesters = prior;
            return Err(diverged("save bimesters", e));
        }
        Ok(())
    }

    /// Full in-memory state in `loadAll` shape, pending edits included.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            classes: self.data.classes.clone(),
            students: self.data.students.clone(),
            bimesters: self.data.bimesters.clone(),
            attendance: self.data.attendance.to_plain(),
            config: self.data.lessons.to_config(),
        }
    }

    /// Pushes the whole in-memory state through `sync_all`.
    pub fn push_all(&self) -> Result<(), AppError> {
        self.gateway.sync_all(&self.snapshot().into())?;
        Ok(())
    }

    /// Writes a snapshot through the gateway and reloads from it.
    pub fn restore(&mut self, snapshot: Snapshot) -> Result<(), AppError> {
        self.gateway.sync_all(&snapshot.into())?;
        self.reload()
    }

    pub fn student_stats(&self, student_id: &str) -> Result<StudentStats, AppError> {
        if self.data.student(student_id).is_none() {
            return Err(AppError::not_found("student", student_id));
        }
        Ok(stats::student_stats(
            self.data.attendance.records_for(student_id),
            &self.data.bimesters,
        ))
    }

    pub fn class_stats(&self, class_id: &str) -> Result<ClassStats, AppError> {
        if self.data.class(class_id).is_none() {
            return Err(AppError::not_found("class", class_id));
        }
        Ok(stats::class_stats(
            class_id,
            &self.data.students_in_class(class_id),
            &self.data.attendance,
            &self.data.bimesters,
        ))
    }

    pub fn month_grid(&self, class_id: &str, year: i32, month: u32) -> Result<MonthGrid, AppError> {
        reports::month_grid(&self.data, class_id, year, month)
    }

    pub fn student_report(&self, student_id: &str) -> Result<StudentReport, AppError> {
        reports::student_report(&self.data, student_id)
    }
}

fn check_lesson_index(lesson_index: u32) -> Result<(), AppError> {
    if !is_lesson_index(lesson_index) {
        return Err(AppError::InvalidInput(format!(
            "lessonIndex must be below {}",
            MAX_LESSONS_PER_DAY
        )));
    }
    Ok(())
}

fn required_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

fn diverged(action: &'static str, source: crate::gateway::GatewayError) -> AppError {
    warn!(
        "event=remote_write module=app status=reverted action=\"{}\" error={}",
        action, source
    );
    AppError::Diverged { action, source }
}
