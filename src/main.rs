use attendanced::config::AppConfig;
use attendanced::gateway::{SheetsGateway, SqliteGateway};
use attendanced::ipc;
use attendanced::logging::init_logging;
use attendanced::summary::HttpSummarizer;
use clap::Parser;
use log::{info, warn};
use std::io::{self, BufRead, Write};
use std::sync::{mpsc, Arc};
use std::thread;

fn attach_configured_source(state: &mut ipc::AppState) {
    if let Some(workspace) = state.config.workspace.clone() {
        match SqliteGateway::open(&workspace) {
            Ok(gateway) => {
                let label = workspace.to_string_lossy().to_string();
                if let Err(e) = state.attach(Arc::new(gateway), label) {
                    warn!("event=startup_attach module=main status=failed source=sqlite error={}", e);
                }
            }
            Err(e) => warn!(
                "event=startup_attach module=main status=failed source=sqlite error={:?}",
                e
            ),
        }
        return;
    }
    if let Some(endpoint) = state.config.endpoint.clone() {
        match SheetsGateway::new(&endpoint, &state.config.sheets_options()) {
            Ok(gateway) => {
                if let Err(e) = state.attach(Arc::new(gateway), endpoint) {
                    warn!("event=startup_attach module=main status=failed source=sheets error={}", e);
                }
            }
            Err(e) => warn!(
                "event=startup_attach module=main status=failed source=sheets error={}",
                e
            ),
        }
        return;
    }
    info!("event=startup_attach module=main status=skipped reason=no_source");
}

fn main() {
    let config = AppConfig::parse();
    if let Err(e) = init_logging(&config.log_level, config.log_dir.as_deref()) {
        eprintln!("attendanced: logging disabled: {}", e);
    }

    let summarizer = config.summarizer_config().map(HttpSummarizer::new);
    let mut state = ipc::AppState::new(config);
    if let Some(s) = summarizer {
        state.summarizer = Some(Box::new(s));
    }
    attach_configured_source(&mut state);

    let (tx, rx) = mpsc::channel();
    state.events = Some(tx.clone());
    if let Err(e) = spawn_stdin_reader(tx) {
        warn!("event=startup module=main status=failed reason=stdin_reader error={}", e);
        return;
    }

    let mut stdout = io::stdout();
    let mut input_open = true;
    while let Ok(event) = rx.recv() {
        let resp = match event {
            ipc::IpcEvent::Line(line) => handle_line(&mut state, &line),
            ipc::IpcEvent::FlushFinished(done) => Some(ipc::complete_flush(&mut state, done)),
            ipc::IpcEvent::InputClosed => {
                input_open = false;
                None
            }
        };
        if let Some(resp) = resp {
            let _ = writeln!(
                stdout,
                "{}",
                serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
            );
            let _ = stdout.flush();
        }
        if !input_open && state.flush_in_flight.is_none() {
            break;
        }
    }
    if let Some(app) = &state.app {
        app.wait_config_writes();
    }
    info!("event=shutdown module=main status=ok");
}

/// Forwards stdin lines to the request loop so background saves can report
/// back between requests.
fn spawn_stdin_reader(tx: mpsc::Sender<ipc::IpcEvent>) -> io::Result<()> {
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(ipc::IpcEvent::Line(line)).is_err() {
                    return;
                }
            }
            let _ = tx.send(ipc::IpcEvent::InputClosed);
        })?;
    Ok(())
}

fn handle_line(state: &mut ipc::AppState, line: &str) -> Option<serde_json::Value> {
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<ipc::Request>(line) {
        Ok(req) => ipc::handle_request(state, req),
        Err(e) => {
            // Echo the id back when the line is JSON but not a valid request.
            let id = serde_json::from_str::<serde_json::Value>(line)
                .ok()
                .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string))
                .unwrap_or_default();
            warn!("event=ipc_request module=main status=bad_json error={}", e);
            Some(ipc::err(&id, "bad_json", e.to_string(), None))
        }
    }
}
