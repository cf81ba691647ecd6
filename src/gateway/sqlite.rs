use super::{GatewayError, PersistenceGateway};
use crate::lessons::MAX_LESSONS_PER_DAY;
use crate::model::{
    AttendanceStatus, BimesterConfig, ClassGroup, DailyRecord, DateKey, EnrollmentStatus,
    PartialSnapshot, PendingChange, Snapshot, Student, StudentId,
};
use anyhow::Context;
use rusqlite::{Connection, Transaction};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub const DB_FILE_NAME: &str = "attendance.sqlite3";

/// Workspace-local store. One connection, serialized behind a mutex so
/// concurrent flush writers queue up on it.
pub struct SqliteGateway {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace).with_context(|| {
            format!("failed to create workspace {}", workspace.to_string_lossy())
        })?;
        let path = workspace.join(DB_FILE_NAME);
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open database {}", path.to_string_lossy()))?;
        init_schema(&conn).context("failed to initialize schema")?;
        Ok(SqliteGateway {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, GatewayError> {
        self.conn
            .lock()
            .map_err(|_| GatewayError::Storage("connection lock poisoned".to_string()))
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bimesters(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;
    // No FK to students: cells may be written for a student the roster has not
    // synced yet, and deletes cascade explicitly.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_cells(
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            lesson_index INTEGER NOT NULL,
            status TEXT NOT NULL,
            subject TEXT NOT NULL DEFAULT '',
            topic TEXT NOT NULL DEFAULT '',
            updated_at TEXT,
            PRIMARY KEY(student_id, date, lesson_index)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_cells_student ON attendance_cells(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn enrollment_code(status: EnrollmentStatus) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "ACTIVE".to_string())
}

fn parse_enrollment(code: &str) -> EnrollmentStatus {
    serde_json::from_value(serde_json::Value::String(code.to_string())).unwrap_or_default()
}

fn parse_stored_date(raw: &str) -> Result<chrono::NaiveDate, GatewayError> {
    crate::model::parse_date_key(raw)
        .ok_or_else(|| GatewayError::Decode(format!("bad stored date: {raw}")))
}

fn load_students(conn: &Connection) -> rusqlite::Result<Vec<Student>> {
    let mut stmt =
        conn.prepare("SELECT id, name, class_id, status FROM students ORDER BY name, id")?;
    let rows = stmt
        .query_map([], |r| {
            let status: String = r.get(3)?;
            Ok(Student {
                id: r.get(0)?,
                name: r.get(1)?,
                class_id: r.get(2)?,
                status: parse_enrollment(&status),
            })
        })?
        .collect::<Result<Vec<_>, _>>();
    rows
}

fn upsert_class(tx: &Connection, class: &ClassGroup) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO classes(id, name) VALUES(?, ?)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        (&class.id, &class.name),
    )?;
    Ok(())
}

fn upsert_student(tx: &Connection, student: &Student) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO students(id, class_id, name, status) VALUES(?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           class_id = excluded.class_id,
           name = excluded.name,
           status = excluded.status",
        (
            &student.id,
            &student.class_id,
            &student.name,
            enrollment_code(student.status),
        ),
    )?;
    Ok(())
}

fn replace_bimesters(tx: &Transaction<'_>, bimesters: &[BimesterConfig]) -> rusqlite::Result<()> {
    tx.execute("DELETE FROM bimesters", [])?;
    for (i, b) in bimesters.iter().enumerate() {
        tx.execute(
            "INSERT INTO bimesters(id, name, start_date, end_date, sort_order)
             VALUES(?, ?, ?, ?, ?)",
            (
                &b.id,
                &b.name,
                b.start.to_string(),
                b.end.to_string(),
                i as i64,
            ),
        )?;
    }
    Ok(())
}

fn upsert_cell(tx: &Connection, change: &PendingChange) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO attendance_cells(student_id, date, lesson_index, status, subject, topic, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, date, lesson_index) DO UPDATE SET
           status = excluded.status,
           subject = excluded.subject,
           topic = excluded.topic,
           updated_at = excluded.updated_at",
        (
            &change.student_id,
            change.date.to_string(),
            change.lesson_index as i64,
            change.status.as_str(),
            &change.subject,
            &change.topic,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}

/// Writes only the status of a cell; subject and topic already stored stay.
fn upsert_cell_status(
    tx: &Connection,
    student_id: &str,
    date: &str,
    lesson_index: i64,
    status: AttendanceStatus,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO attendance_cells(student_id, date, lesson_index, status, subject, topic, updated_at)
         VALUES(?, ?, ?, ?, '', '', ?)
         ON CONFLICT(student_id, date, lesson_index) DO UPDATE SET
           status = excluded.status,
           updated_at = excluded.updated_at",
        (
            student_id,
            date,
            lesson_index,
            status.as_str(),
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}

fn replace_attendance(
    tx: &Connection,
    attendance: &HashMap<StudentId, BTreeMap<DateKey, DailyRecord>>,
) -> rusqlite::Result<()> {
    let mut kept: HashSet<(String, String, i64)> = HashSet::new();
    for (student_id, days) in attendance {
        for (date, record) in days {
            let date = date.to_string();
            for (i, status) in record.iter().enumerate() {
                upsert_cell_status(tx, student_id, &date, i as i64, *status)?;
                kept.insert((student_id.clone(), date.clone(), i as i64));
            }
        }
    }

    let mut stmt = tx.prepare("SELECT student_id, date, lesson_index FROM attendance_cells")?;
    let stored = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for key in stored.into_iter().filter(|k| !kept.contains(k)) {
        tx.execute(
            "DELETE FROM attendance_cells WHERE student_id = ? AND date = ? AND lesson_index = ?",
            (&key.0, &key.1, key.2),
        )?;
    }
    Ok(())
}

fn save_setting(tx: &Connection, key: &str, value: &serde_json::Value) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}

impl PersistenceGateway for SqliteGateway {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    fn load_all(&self) -> Result<Snapshot, GatewayError> {
        let conn = self.conn()?;
        let mut snapshot = Snapshot::default();

        let mut stmt = conn.prepare("SELECT id, name FROM classes ORDER BY name, id")?;
        snapshot.classes = stmt
            .query_map([], |r| {
                Ok(ClassGroup {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        snapshot.students = load_students(&conn)?;

        let mut stmt = conn.prepare(
            "SELECT id, name, start_date, end_date FROM bimesters ORDER BY sort_order",
        )?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (id, name, start, end) in rows {
            snapshot.bimesters.push(BimesterConfig {
                id,
                name,
                start: parse_stored_date(&start)?,
                end: parse_stored_date(&end)?,
            });
        }

        let mut stmt =
            conn.prepare("SELECT student_id, date, lesson_index, status FROM attendance_cells")?;
        let rows = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (student_id, date, lesson_index, status) in rows {
            if lesson_index < 0 || lesson_index >= i64::from(MAX_LESSONS_PER_DAY) {
                continue;
            }
            let date = parse_stored_date(&date)?;
            let idx = lesson_index as usize;
            let record = snapshot
                .attendance
                .entry(student_id)
                .or_default()
                .entry(date)
                .or_default();
            if record.len() <= idx {
                record.resize(idx + 1, AttendanceStatus::Undefined);
            }
            record[idx] = AttendanceStatus::from_code(&status);
        }

        let mut stmt = conn.prepare("SELECT key, value_json FROM settings")?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        for (key, raw) in rows {
            // Unparseable values load as null and fall to defaults downstream.
            let value = serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null);
            snapshot.config.insert(key, value);
        }

        Ok(snapshot)
    }

    fn save_attendance_cell(&self, change: &PendingChange) -> Result<(), GatewayError> {
        let conn = self.conn()?;
        upsert_cell(&conn, change)?;
        Ok(())
    }

    fn save_config(&self, key: &str, value: &serde_json::Value) -> Result<(), GatewayError> {
        let conn = self.conn()?;
        save_setting(&conn, key, value)?;
        Ok(())
    }

    fn save_class(&self, class: &ClassGroup) -> Result<(), GatewayError> {
        let conn = self.conn()?;
        upsert_class(&conn, class)?;
        Ok(())
    }

    fn save_student(&self, student: &Student) -> Result<(), GatewayError> {
        let conn = self.conn()?;
        let class_exists = conn
            .query_row(
                "SELECT COUNT(*) FROM classes WHERE id = ?",
                [&student.class_id],
                |r| r.get::<_, i64>(0),
            )?
            > 0;
        if !class_exists {
            return Err(GatewayError::Rejected(format!(
                "class {} does not exist",
                student.class_id
            )));
        }
        upsert_student(&conn, student)?;
        Ok(())
    }

    fn save_bimesters(&self, bimesters: &[BimesterConfig]) -> Result<(), GatewayError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        replace_bimesters(&tx, bimesters)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_class(&self, class_id: &str) -> Result<(), GatewayError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        // Dependency order; there is no ON DELETE CASCADE.
        tx.execute(
            "DELETE FROM attendance_cells
             WHERE student_id IN (SELECT id FROM students WHERE class_id = ?)",
            [class_id],
        )?;
        tx.execute("DELETE FROM students WHERE class_id = ?", [class_id])?;
        let removed = tx.execute("DELETE FROM classes WHERE id = ?", [class_id])?;
        if removed == 0 {
            return Err(GatewayError::Rejected(format!(
                "class {class_id} does not exist"
            )));
        }
        tx.commit()?;
        Ok(())
    }

    fn delete_student(&self, student_id: &str) -> Result<(), GatewayError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM attendance_cells WHERE student_id = ?",
            [student_id],
        )?;
        tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
        tx.commit()?;
        Ok(())
    }

    /// Each provided section replaces the stored one wholesale. Attendance
    /// cells keep their stored subject/topic; cells absent from the snapshot
    /// are deleted.
    fn sync_all(&self, snapshot: &PartialSnapshot) -> Result<(), GatewayError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if let Some(attendance) = &snapshot.attendance {
            replace_attendance(&tx, attendance)?;
        }
        match (&snapshot.classes, &snapshot.students) {
            (Some(classes), students) => {
                // Students of surviving classes are kept when no roster was sent.
                let keep = match students {
                    Some(s) => s.clone(),
                    None => load_students(&tx)?
                        .into_iter()
                        .filter(|s| classes.iter().any(|c| c.id == s.class_id))
                        .collect(),
                };
                tx.execute("DELETE FROM students", [])?;
                tx.execute("DELETE FROM classes", [])?;
                for c in classes {
                    upsert_class(&tx, c)?;
                }
                for s in &keep {
                    upsert_student(&tx, s)?;
                }
            }
            (None, Some(students)) => {
                tx.execute("DELETE FROM students", [])?;
                for s in students {
                    upsert_student(&tx, s)?;
                }
            }
            (None, None) => {}
        }
        if let Some(bimesters) = &snapshot.bimesters {
            replace_bimesters(&tx, bimesters)?;
        }
        if let Some(config) = &snapshot.config {
            for (key, value) in config {
                save_setting(&tx, key, value)?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}
