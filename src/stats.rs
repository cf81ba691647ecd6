//! Present/absent/excused counts over date ranges.
//!
//! Only marked lessons count toward `total`; `UNDEFINED` slots are ignored.
//! `percentage` is `(present + excused) / total * 100`, and `0.0` for an empty
//! period.

use crate::model::{AttendanceStatus, BimesterConfig, DateKey, Student};
use crate::store::{AttendanceStore, StudentRecords};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

pub const AT_RISK_THRESHOLD_PERCENT: f64 = 75.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStats {
    pub present: u32,
    pub absent: u32,
    pub excused: u32,
    pub total: u32,
    pub percentage: f64,
}

impl PeriodStats {
    fn count(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::Excused => self.excused += 1,
            AttendanceStatus::Undefined => return,
        }
        self.total += 1;
    }

    fn finish(mut self) -> Self {
        self.percentage = if self.total > 0 {
            f64::from(self.present + self.excused) / f64::from(self.total) * 100.0
        } else {
            0.0
        };
        self
    }

    /// Sums counts and recomputes the percentage over the summed totals.
    pub fn combine<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a PeriodStats>,
    {
        let mut out = PeriodStats::default();
        for p in parts {
            out.present += p.present;
            out.absent += p.absent;
            out.excused += p.excused;
            out.total += p.total;
        }
        out.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BimesterStats {
    pub bimester_id: String,
    pub name: String,
    pub stats: PeriodStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub bimesters: Vec<BimesterStats>,
    pub annual: PeriodStats,
    pub at_risk: bool,
}

/// Counts every slot of every date in `start..=end`.
pub fn period_stats(records: Option<&StudentRecords>, start: DateKey, end: DateKey) -> PeriodStats {
    let mut out = PeriodStats::default();
    if let Some(days) = records {
        if start <= end {
            for (_, record) in days.range(start..=end) {
                for status in record.iter() {
                    out.count(*status);
                }
            }
        }
    }
    out.finish()
}

/// Per-bimester buckets plus their roll-up. A date inside two overlapping
/// bimesters counts in both; dates outside every range count nowhere.
pub fn student_stats(records: Option<&StudentRecords>, bimesters: &[BimesterConfig]) -> StudentStats {
    let buckets: Vec<BimesterStats> = bimesters
        .iter()
        .map(|b| BimesterStats {
            bimester_id: b.id.clone(),
            name: b.name.clone(),
            stats: period_stats(records, b.start, b.end),
        })
        .collect();
    let annual = PeriodStats::combine(buckets.iter().map(|b| &b.stats));
    StudentStats {
        at_risk: is_at_risk(&annual),
        bimesters: buckets,
        annual,
    }
}

pub fn is_at_risk(annual: &PeriodStats) -> bool {
    annual.percentage < AT_RISK_THRESHOLD_PERCENT
}

pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

pub fn month_stats(records: Option<&StudentRecords>, year: i32, month: u32) -> PeriodStats {
    match month_bounds(year, month) {
        Some((start, end)) => period_stats(records, start, end),
        None => PeriodStats::default(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStatsRow {
    pub student_id: String,
    pub name: String,
    pub active: bool,
    pub stats: StudentStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub class_id: String,
    pub rows: Vec<ClassStatsRow>,
    pub annual: PeriodStats,
    pub at_risk_count: usize,
}

/// One row per student of the class in the given order; roll-up over all rows.
pub fn class_stats(
    class_id: &str,
    students: &[&Student],
    store: &AttendanceStore,
    bimesters: &[BimesterConfig],
) -> ClassStats {
    let rows: Vec<ClassStatsRow> = students
        .iter()
        .map(|s| ClassStatsRow {
            student_id: s.id.clone(),
            name: s.name.clone(),
            active: s.status.is_active(),
            stats: student_stats(store.records_for(&s.id), bimesters),
        })
        .collect();
    let annual = PeriodStats::combine(rows.iter().map(|r| &r.stats.annual));
    ClassStats {
        class_id: class_id.to_string(),
        at_risk_count: rows
            .iter()
            .filter(|r| r.active && r.stats.at_risk)
            .count(),
        rows,
        annual,
    }
}

pub fn is_weekday(date: NaiveDate) -> bool {
    date.weekday().number_from_monday() <= 5
}
