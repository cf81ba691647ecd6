//! Free-text attendance summaries produced by an external language model.
//! The model is a black box: we render a prompt and accept whatever text
//! comes back.

use crate::reports::StudentReport;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error as ThisError;

const MAX_LISTED_DATES: usize = 30;

#[derive(Debug, ThisError)]
pub enum SummaryError {
    #[error("summary service call failed ({kind})")]
    Call { kind: &'static str, status: Option<u16> },

    #[error("summary service returned no text")]
    Empty,
}

pub trait TextSummarizer: Send + Sync {
    fn summarize(&self, prompt: &str) -> Result<String, SummaryError>;
}

pub fn build_prompt(report: &StudentReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Write a short, factual attendance summary for a teacher's report card comment."
    );
    let _ = writeln!(out, "Student: {}", report.student.name);
    if !report.class_name.is_empty() {
        let _ = writeln!(out, "Class: {}", report.class_name);
    }
    for b in &report.stats.bimesters {
        let _ = writeln!(
            out,
            "{}: present {}, absent {}, excused {}, attendance {:.1}%",
            b.name, b.stats.present, b.stats.absent, b.stats.excused, b.stats.percentage
        );
    }
    let a = &report.stats.annual;
    let _ = writeln!(
        out,
        "Year: present {}, absent {}, excused {}, attendance {:.1}%",
        a.present, a.absent, a.excused, a.percentage
    );
    if report.stats.at_risk {
        let _ = writeln!(out, "Attendance is below the 75% minimum.");
    }
    if !report.absences.is_empty() {
        let listed: Vec<String> = report
            .absences
            .iter()
            .take(MAX_LISTED_DATES)
            .map(|m| {
                if m.subject.is_empty() {
                    m.date.to_string()
                } else {
                    format!("{} ({})", m.date, m.subject)
                }
            })
            .collect();
        let _ = write!(out, "Absences: {}", listed.join(", "));
        if report.absences.len() > MAX_LISTED_DATES {
            let _ = write!(out, " and {} more", report.absences.len() - MAX_LISTED_DATES);
        }
        out.push('\n');
    }
    out
}

#[derive(Debug, Clone)]
pub struct HttpSummarizerConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u32,
}

/// OpenAI-style chat completions client.
pub struct HttpSummarizer {
    config: HttpSummarizerConfig,
    agent: ureq::Agent,
}

impl HttpSummarizer {
    pub fn new(config: HttpSummarizerConfig) -> Self {
        let timeout = Duration::from_millis(u64::from(config.timeout_ms).max(100));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        HttpSummarizer { config, agent }
    }
}

impl TextSummarizer for HttpSummarizer {
    fn summarize(&self, prompt: &str) -> Result<String, SummaryError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": "You write concise school attendance summaries." },
                { "role": "user", "content": prompt }
            ]
        });
        let response = self
            .agent
            .post(&self.config.endpoint)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", self.config.api_key))
            .set("Accept", "application/json")
            .send_json(payload)
            .map_err(|e| match e {
                ureq::Error::Status(status, _) => SummaryError::Call {
                    kind: "http_non_200",
                    status: Some(status),
                },
                ureq::Error::Transport(_) => SummaryError::Call {
                    kind: "transport",
                    status: None,
                },
            })?;
        let body: Value = serde_json::from_reader(response.into_reader()).map_err(|_| {
            SummaryError::Call {
                kind: "json_parse",
                status: None,
            }
        })?;
        extract_completion_text(&body).ok_or(SummaryError::Empty)
    }
}

fn extract_completion_text(body: &Value) -> Option<String> {
    let text = body
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?
        .trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
