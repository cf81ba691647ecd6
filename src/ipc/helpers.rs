use crate::ipc::error::HandlerErr;
use crate::lessons::{is_lesson_index, MAX_LESSONS_PER_DAY};
use crate::model::{parse_date_key, AttendanceStatus, DateKey, EnrollmentStatus};

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_date(params: &serde_json::Value, key: &str) -> Result<DateKey, HandlerErr> {
    let raw = get_required_str(params, key)?;
    parse_date_key(&raw).ok_or_else(|| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

/// Lesson slot index, bounded by the per-day lesson limit.
pub fn get_lesson_index(params: &serde_json::Value, key: &str) -> Result<u32, HandlerErr> {
    let Some(raw) = params.get(key).and_then(|v| v.as_u64()) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    u32::try_from(raw)
        .ok()
        .filter(|i| is_lesson_index(*i))
        .ok_or_else(|| {
            HandlerErr::bad_params(format!("{} must be below {}", key, MAX_LESSONS_PER_DAY))
        })
}

pub fn get_status(params: &serde_json::Value, key: &str) -> Result<Option<AttendanceStatus>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    let Some(s) = v.as_str() else {
        return Err(HandlerErr::bad_params(format!("{} must be a string or null", key)));
    };
    AttendanceStatus::parse_strict(s)
        .map(Some)
        .ok_or_else(|| {
            HandlerErr::bad_params(format!(
                "{} must be one of UNDEFINED, PRESENT, ABSENT, EXCUSED",
                key
            ))
        })
}

pub fn get_enrollment(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<EnrollmentStatus>, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|_| HandlerErr::bad_params(format!("invalid {}", key))),
    }
}

/// `YYYY-MM` month key.
pub fn parse_month_key(month: &str) -> Result<(i32, u32), HandlerErr> {
    let t = month.trim();
    let Some((y, m)) = t.split_once('-') else {
        return Err(HandlerErr::bad_params("month must be YYYY-MM"));
    };
    let year = y
        .parse::<i32>()
        .map_err(|_| HandlerErr::bad_params("month year must be numeric"))?;
    let month_num = m
        .parse::<u32>()
        .map_err(|_| HandlerErr::bad_params("month must be YYYY-MM"))?;
    if !(1..=12).contains(&month_num) {
        return Err(HandlerErr::bad_params("month must be between 01 and 12"));
    }
    Ok((year, month_num))
}
