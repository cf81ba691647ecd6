//! Lesson-slot configuration per date, plus the free-text subject/topic notes
//! attached to individual lessons.
//!
//! Persisted slot entries come in two shapes: the legacy plain count `N`
//! (meaning lessons `0..N`) and an explicit index list such as `[0, 2, 3]`.
//! Both are decoded once, at load, into index lists. Entries that fit neither
//! shape are dropped without error so older and newer stores stay readable.

use crate::model::{parse_date_key, DateKey};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

pub const LESSON_SLOTS_KEY: &str = "lessonConfig";
pub const LESSON_SUBJECTS_KEY: &str = "lessonSubjects";
pub const LESSON_TOPICS_KEY: &str = "lessonTopics";

/// Slots used for a date that has no configuration of its own.
pub const DEFAULT_LESSON_INDICES: &[u32] = &[0];

/// Upper bound on lessons in one day. Indices run `0..MAX_LESSONS_PER_DAY`.
pub const MAX_LESSONS_PER_DAY: u32 = 32;

pub type LessonNotes = BTreeMap<DateKey, BTreeMap<u32, String>>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LessonSlots {
    Count(u32),
    Indices(Vec<u32>),
}

impl LessonSlots {
    /// Index list for the day, or `None` when it would exceed
    /// [`MAX_LESSONS_PER_DAY`].
    pub fn into_indices(self) -> Option<Vec<u32>> {
        match self {
            LessonSlots::Count(n) if n <= MAX_LESSONS_PER_DAY => Some((0..n).collect()),
            LessonSlots::Count(_) => None,
            LessonSlots::Indices(v)
                if v.len() <= MAX_LESSONS_PER_DAY as usize
                    && v.iter().all(|i| is_lesson_index(*i)) =>
            {
                Some(v)
            }
            LessonSlots::Indices(_) => None,
        }
    }
}

pub fn is_lesson_index(lesson_index: u32) -> bool {
    lesson_index < MAX_LESSONS_PER_DAY
}

pub fn normalize_lesson_slots(raw: &serde_json::Value) -> BTreeMap<DateKey, Vec<u32>> {
    let mut out = BTreeMap::new();
    let Some(obj) = raw.as_object() else {
        return out;
    };
    for (key, value) in obj {
        let Some(date) = parse_date_key(key) else {
            continue;
        };
        if let Some(indices) = LessonSlots::deserialize(value)
            .ok()
            .and_then(LessonSlots::into_indices)
        {
            out.insert(date, indices);
        }
    }
    out
}

pub fn normalize_lesson_notes(raw: &serde_json::Value) -> LessonNotes {
    let mut out = BTreeMap::new();
    let Some(obj) = raw.as_object() else {
        return out;
    };
    for (key, value) in obj {
        let Some(date) = parse_date_key(key) else {
            continue;
        };
        if let Ok(notes) = BTreeMap::<u32, String>::deserialize(value) {
            out.insert(date, notes);
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LessonPlan {
    slots: BTreeMap<DateKey, Vec<u32>>,
    subjects: LessonNotes,
    topics: LessonNotes,
}

impl LessonPlan {
    pub fn from_config(config: &BTreeMap<String, serde_json::Value>) -> Self {
        let read = |key: &str| config.get(key).cloned().unwrap_or(serde_json::Value::Null);
        LessonPlan {
            slots: normalize_lesson_slots(&read(LESSON_SLOTS_KEY)),
            subjects: normalize_lesson_notes(&read(LESSON_SUBJECTS_KEY)),
            topics: normalize_lesson_notes(&read(LESSON_TOPICS_KEY)),
        }
    }

    pub fn configured_slots(&self) -> &BTreeMap<DateKey, Vec<u32>> {
        &self.slots
    }

    pub fn is_configured(&self, date: DateKey) -> bool {
        self.slots.contains_key(&date)
    }

    pub fn active_lessons(&self, date: DateKey) -> Vec<u32> {
        self.slots
            .get(&date)
            .cloned()
            .unwrap_or_else(|| DEFAULT_LESSON_INDICES.to_vec())
    }

    /// Minimum record length for `date` once `lesson_index` is touched: covers
    /// the index itself and every active index of the day.
    pub fn record_len(&self, date: DateKey, lesson_index: u32) -> usize {
        let configured_max = self
            .active_lessons(date)
            .into_iter()
            .max()
            .map(|m| m as usize + 1)
            .unwrap_or(0);
        configured_max.max(lesson_index as usize + 1)
    }

    /// Returns false, leaving the day unchanged, when the slots are out of range.
    pub fn set_slots(&mut self, date: DateKey, slots: LessonSlots) -> bool {
        let Some(indices) = slots.into_indices() else {
            return false;
        };
        self.slots.insert(date, indices);
        true
    }

    /// Appends the next free index after the highest active one and returns it,
    /// or `None` when the day is already at its last index.
    pub fn add_lesson(&mut self, date: DateKey) -> Option<u32> {
        let mut current = self.active_lessons(date);
        let next = current.iter().max().map(|m| m + 1).unwrap_or(0);
        if !is_lesson_index(next) || current.len() >= MAX_LESSONS_PER_DAY as usize {
            return None;
        }
        current.push(next);
        self.slots.insert(date, current);
        Some(next)
    }

    /// Removes an index from the day. Returns false when it was not active.
    /// Notes for the removed slot are kept; stored attendance is untouched.
    pub fn remove_lesson(&mut self, date: DateKey, lesson_index: u32) -> bool {
        let mut current = self.active_lessons(date);
        let before = current.len();
        current.retain(|i| *i != lesson_index);
        if current.len() == before {
            return false;
        }
        self.slots.insert(date, current);
        true
    }

    pub fn subject(&self, date: DateKey, lesson_index: u32) -> Option<&str> {
        note(&self.subjects, date, lesson_index)
    }

    pub fn topic(&self, date: DateKey, lesson_index: u32) -> Option<&str> {
        note(&self.topics, date, lesson_index)
    }

    pub fn set_subject(&mut self, date: DateKey, lesson_index: u32, text: &str) {
        set_note(&mut self.subjects, date, lesson_index, text);
    }

    pub fn set_topic(&mut self, date: DateKey, lesson_index: u32, text: &str) {
        set_note(&mut self.topics, date, lesson_index, text);
    }

    /// Persisted JSON for one of the three config keys, or `None` for a key this
    /// plan does not own.
    pub fn to_config_value(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            LESSON_SLOTS_KEY => Some(json!(self
                .slots
                .iter()
                .map(|(d, v)| (d.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>())),
            LESSON_SUBJECTS_KEY => Some(notes_json(&self.subjects)),
            LESSON_TOPICS_KEY => Some(notes_json(&self.topics)),
            _ => None,
        }
    }

    pub fn to_config(&self) -> BTreeMap<String, serde_json::Value> {
        [LESSON_SLOTS_KEY, LESSON_SUBJECTS_KEY, LESSON_TOPICS_KEY]
            .into_iter()
            .filter_map(|k| self.to_config_value(k).map(|v| (k.to_string(), v)))
            .collect()
    }
}

fn note(map: &LessonNotes, date: DateKey, lesson_index: u32) -> Option<&str> {
    map.get(&date)
        .and_then(|m| m.get(&lesson_index))
        .map(|s| s.as_str())
}

fn set_note(map: &mut LessonNotes, date: DateKey, lesson_index: u32, text: &str) {
    let day = map.entry(date).or_default();
    if text.trim().is_empty() {
        day.remove(&lesson_index);
        if day.is_empty() {
            map.remove(&date);
        }
    } else {
        day.insert(lesson_index, text.to_string());
    }
}

fn notes_json(map: &LessonNotes) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    for (date, day) in map {
        let inner: serde_json::Map<String, serde_json::Value> = day
            .iter()
            .map(|(i, s)| (i.to_string(), json!(s)))
            .collect();
        out.insert(date.to_string(), serde_json::Value::Object(inner));
    }
    serde_json::Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> DateKey {
        parse_date_key(s).expect("date")
    }

    #[test]
    fn legacy_count_expands_to_indices() {
        let n = normalize_lesson_slots(&json!({ "2024-03-01": 3 }));
        assert_eq!(n.get(&d("2024-03-01")), Some(&vec![0, 1, 2]));
    }

    #[test]
    fn index_lists_pass_through_unchanged() {
        let n = normalize_lesson_slots(&json!({
            "2024-03-01": [0, 2],
            "2024-03-02": [3, 1, 1]
        }));
        assert_eq!(n.get(&d("2024-03-01")), Some(&vec![0, 2]));
        assert_eq!(n.get(&d("2024-03-02")), Some(&vec![3, 1, 1]));
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let n = normalize_lesson_slots(&json!({
            "2024-03-01": "bad",
            "2024-03-02": -1,
            "2024-03-03": [0, "x"],
            "not-a-date": 2,
            "2024-03-04": 0
        }));
        assert_eq!(n.len(), 1);
        assert_eq!(n.get(&d("2024-03-04")), Some(&vec![]));
        assert!(normalize_lesson_slots(&json!("nope")).is_empty());
    }

    #[test]
    fn oversized_entries_are_skipped() {
        let n = normalize_lesson_slots(&json!({
            "2024-03-01": 4_000_000_000u64,
            "2024-03-02": 33,
            "2024-03-03": [0, 32],
            "2024-03-04": 32,
            "2024-03-05": [31]
        }));
        assert_eq!(n.len(), 2);
        assert_eq!(n.get(&d("2024-03-04")).map(|v| v.len()), Some(32));
        assert_eq!(n.get(&d("2024-03-05")), Some(&vec![31]));
    }

    #[test]
    fn plan_rejects_out_of_range_slots() {
        let mut plan = LessonPlan::default();
        let date = d("2024-03-01");
        assert!(!plan.set_slots(date, LessonSlots::Count(20_000_000)));
        assert!(!plan.set_slots(date, LessonSlots::Indices(vec![0, 4_294_967_295])));
        assert!(!plan.is_configured(date));

        assert!(plan.set_slots(date, LessonSlots::Indices(vec![30, 31])));
        assert_eq!(plan.add_lesson(date), None);
        assert_eq!(plan.active_lessons(date), vec![30, 31]);
    }

    #[test]
    fn record_len_covers_configured_slots() {
        let mut plan = LessonPlan::default();
        assert_eq!(plan.record_len(d("2024-03-01"), 0), 1);
        assert!(plan.set_slots(d("2024-03-01"), LessonSlots::Indices(vec![0, 2, 3])));
        assert_eq!(plan.record_len(d("2024-03-01"), 0), 4);
        assert_eq!(plan.record_len(d("2024-03-01"), 6), 7);
    }

    #[test]
    fn add_and_remove_lessons() {
        let mut plan = LessonPlan::default();
        let date = d("2024-04-10");
        assert_eq!(plan.add_lesson(date), Some(1));
        assert_eq!(plan.active_lessons(date), vec![0, 1]);
        assert!(plan.remove_lesson(date, 0));
        assert!(!plan.remove_lesson(date, 0));
        assert_eq!(plan.active_lessons(date), vec![1]);
        assert_eq!(plan.add_lesson(date), Some(2));
    }

    #[test]
    fn notes_roundtrip_through_config() {
        let mut plan = LessonPlan::default();
        plan.set_subject(d("2024-03-05"), 1, "Math");
        plan.set_topic(d("2024-03-05"), 1, "Fractions");
        let reloaded = LessonPlan::from_config(&plan.to_config());
        assert_eq!(reloaded.subject(d("2024-03-05"), 1), Some("Math"));
        assert_eq!(reloaded.topic(d("2024-03-05"), 1), Some("Fractions"));
        assert_eq!(reloaded.subject(d("2024-03-05"), 0), None);

        plan.set_subject(d("2024-03-05"), 1, "  ");
        assert_eq!(plan.subject(d("2024-03-05"), 1), None);
    }
}
