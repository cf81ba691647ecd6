use crate::app::AttendanceApp;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::gateway::PersistenceGateway;
use crate::ipc::error::HandlerErr;
use crate::model::PendingChange;
use crate::pending::FlushOutcome;
use crate::summary::TextSummarizer;
use serde::Deserialize;
use std::sync::mpsc;
use std::sync::Arc;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A flush that ran on a worker thread, handed back to the request loop.
#[derive(Debug)]
pub struct FlushFinished {
    pub request_id: String,
    pub batch: Vec<PendingChange>,
    pub outcome: FlushOutcome,
}

/// Everything the request loop reacts to.
#[derive(Debug)]
pub enum IpcEvent {
    Line(String),
    InputClosed,
    FlushFinished(FlushFinished),
}

pub struct AppState {
    pub config: AppConfig,
    /// Human-readable data source: a workspace path or an endpoint url.
    pub source: Option<String>,
    pub app: Option<AttendanceApp>,
    pub summarizer: Option<Box<dyn TextSummarizer>>,
    /// When set, `attendance.save` writes on a worker thread and its reply
    /// arrives later as [`IpcEvent::FlushFinished`].
    pub events: Option<mpsc::Sender<IpcEvent>>,
    /// Request id of the save currently running on a worker thread.
    pub flush_in_flight: Option<String>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        AppState {
            config,
            source: None,
            app: None,
            summarizer: None,
            events: None,
            flush_in_flight: None,
        }
    }

    /// Fails while a background save is running. Guards requests that replace
    /// or rewrite the loaded data wholesale.
    pub fn ensure_no_flush(&self) -> Result<(), HandlerErr> {
        match &self.flush_in_flight {
            Some(id) => Err(HandlerErr::new(
                "flush_in_progress",
                format!("save {} is still running", id),
            )),
            None => Ok(()),
        }
    }

    /// Switches to a new data source and loads it. A failed load still leaves
    /// the source attached, with empty state, so `data.reload` can retry.
    pub fn attach(
        &mut self,
        gateway: Arc<dyn PersistenceGateway>,
        source: String,
    ) -> Result<(), AppError> {
        let mut app = AttendanceApp::new(gateway);
        let loaded = app.reload();
        self.app = Some(app);
        self.source = Some(source);
        loaded
    }

    pub fn app(&self) -> Result<&AttendanceApp, HandlerErr> {
        self.app
            .as_ref()
            .ok_or_else(|| AppError::ConfigurationMissing.into())
    }

    pub fn app_mut(&mut self) -> Result<&mut AttendanceApp, HandlerErr> {
        self.app
            .as_mut()
            .ok_or_else(|| AppError::ConfigurationMissing.into())
    }
}
