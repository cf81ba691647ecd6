use crate::app::AppData;
use crate::error::AppError;
use crate::model::{AttendanceStatus, ClassGroup, DailyRecord, DateKey, Student};
use crate::stats::{self, PeriodStats, StudentStats};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLesson {
    pub index: u32,
    pub subject: String,
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDay {
    pub date: DateKey,
    pub configured: bool,
    pub lessons: Vec<GridLesson>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    pub student: Student,
    /// Parallel to `MonthGrid::days`; each record padded to that day's lesson count.
    pub records: Vec<DailyRecord>,
    pub month: PeriodStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthGrid {
    pub class: ClassGroup,
    pub year: i32,
    pub month: u32,
    pub days: Vec<GridDay>,
    pub rows: Vec<GridRow>,
}

/// The monthly register for a class: every weekday of the month plus any
/// configured date that falls on a weekend.
pub fn month_grid(data: &AppData, class_id: &str, year: i32, month: u32) -> Result<MonthGrid, AppError> {
    let class = data
        .class(class_id)
        .cloned()
        .ok_or_else(|| AppError::not_found("class", class_id))?;
    let (first, last) = stats::month_bounds(year, month)
        .ok_or_else(|| AppError::InvalidInput(format!("invalid month {year}-{month:02}")))?;

    let mut dates: BTreeSet<DateKey> = first
        .iter_days()
        .take_while(|d| *d <= last)
        .filter(|d| stats::is_weekday(*d))
        .collect();
    dates.extend(
        data.lessons
            .configured_slots()
            .range(first..=last)
            .map(|(d, _)| *d),
    );

    let days: Vec<GridDay> = dates
        .iter()
        .map(|date| GridDay {
            date: *date,
            configured: data.lessons.is_configured(*date),
            lessons: data
                .lessons
                .active_lessons(*date)
                .into_iter()
                .map(|index| GridLesson {
                    index,
                    subject: data.lessons.subject(*date, index).unwrap_or_default().to_string(),
                    topic: data.lessons.topic(*date, index).unwrap_or_default().to_string(),
                })
                .collect(),
        })
        .collect();

    let rows = data
        .students_in_class(class_id)
        .into_iter()
        .map(|student| {
            let records = days
                .iter()
                .map(|day| {
                    let mut cells: DailyRecord = data
                        .attendance
                        .record(&student.id, day.date)
                        .map(|r| r.as_ref().clone())
                        .unwrap_or_default();
                    let len = day
                        .lessons
                        .iter()
                        .map(|l| l.index as usize + 1)
                        .max()
                        .unwrap_or(0);
                    if cells.len() < len {
                        cells.resize(len, AttendanceStatus::Undefined);
                    }
                    cells
                })
                .collect();
            GridRow {
                month: stats::month_stats(data.attendance.records_for(&student.id), year, month),
                student: student.clone(),
                records,
            }
        })
        .collect();

    Ok(MonthGrid {
        class,
        year,
        month,
        days,
        rows,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedLesson {
    pub date: DateKey,
    pub lesson_index: u32,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: Student,
    pub class_name: String,
    pub stats: StudentStats,
    pub absences: Vec<MarkedLesson>,
    pub excused: Vec<MarkedLesson>,
}

pub fn student_report(data: &AppData, student_id: &str) -> Result<StudentReport, AppError> {
    let student = data
        .student(student_id)
        .cloned()
        .ok_or_else(|| AppError::not_found("student", student_id))?;
    let class_name = data
        .class(&student.class_id)
        .map(|c| c.name.clone())
        .unwrap_or_default();
    let records = data.attendance.records_for(student_id);

    let mut absences = Vec::new();
    let mut excused = Vec::new();
    for (date, record) in records.into_iter().flatten() {
        for (i, status) in record.iter().enumerate() {
            let target = match status {
                AttendanceStatus::Absent => &mut absences,
                AttendanceStatus::Excused => &mut excused,
                _ => continue,
            };
            let lesson_index = i as u32;
            target.push(MarkedLesson {
                date: *date,
                lesson_index,
                subject: data
                    .lessons
                    .subject(*date, lesson_index)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }

    Ok(StudentReport {
        stats: stats::student_stats(records, &data.bimesters),
        student,
        class_name,
        absences,
        excused,
    })
}
