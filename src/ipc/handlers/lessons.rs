use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_date, get_lesson_index};
use crate::ipc::types::{AppState, Request};
use crate::lessons::{LessonPlan, LessonSlots};
use crate::model::DateKey;
use serde_json::json;

fn day_view(plan: &LessonPlan, date: DateKey) -> serde_json::Value {
    let lessons: Vec<serde_json::Value> = plan
        .active_lessons(date)
        .into_iter()
        .map(|idx| {
            json!({
                "index": idx,
                "subject": plan.subject(date, idx).unwrap_or_default(),
                "topic": plan.topic(date, idx).unwrap_or_default(),
            })
        })
        .collect();
    json!({
        "date": date,
        "configured": plan.is_configured(date),
        "lessons": lessons,
    })
}

fn get_text(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(HandlerErr::bad_params(format!("{} must be a string", key))),
    }
}

fn lessons_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date(params, "date")?;
    Ok(day_view(&state.app()?.data().lessons, date))
}

fn lessons_set_slots(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date(params, "date")?;
    let Some(raw) = params.get("slots") else {
        return Err(HandlerErr::bad_params("missing slots"));
    };
    let slots: LessonSlots = serde_json::from_value(raw.clone()).map_err(|_| {
        HandlerErr::bad_params("slots must be a lesson count or an array of lesson indices")
    })?;
    let app = state.app_mut()?;
    app.set_lesson_slots(date, slots)?;
    Ok(day_view(&app.data().lessons, date))
}

fn lessons_add(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date(params, "date")?;
    let app = state.app_mut()?;
    let index = app.add_lesson(date)?;
    let mut view = day_view(&app.data().lessons, date);
    view["added"] = json!(index);
    Ok(view)
}

fn lessons_remove(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date(params, "date")?;
    let lesson_index = get_lesson_index(params, "lessonIndex")?;
    let app = state.app_mut()?;
    app.remove_lesson(date, lesson_index)?;
    Ok(day_view(&app.data().lessons, date))
}

fn lessons_set_subject(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date(params, "date")?;
    let lesson_index = get_lesson_index(params, "lessonIndex")?;
    let subject = get_text(params, "subject")?;
    let app = state.app_mut()?;
    app.set_lesson_subject(date, lesson_index, &subject)?;
    Ok(day_view(&app.data().lessons, date))
}

fn lessons_set_topic(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date(params, "date")?;
    let lesson_index = get_lesson_index(params, "lessonIndex")?;
    let topic = get_text(params, "topic")?;
    let app = state.app_mut()?;
    app.set_lesson_topic(date, lesson_index, &topic)?;
    Ok(day_view(&app.data().lessons, date))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lessons.get" => Some(respond(&req.id, lessons_get(state, &req.params))),
        "lessons.setSlots" => Some(respond(&req.id, lessons_set_slots(state, &req.params))),
        "lessons.addLesson" => Some(respond(&req.id, lessons_add(state, &req.params))),
        "lessons.removeLesson" => Some(respond(&req.id, lessons_remove(state, &req.params))),
        "lessons.setSubject" => Some(respond(&req.id, lessons_set_subject(state, &req.params))),
        "lessons.setTopic" => Some(respond(&req.id, lessons_set_topic(state, &req.params))),
        _ => None,
    }
}
