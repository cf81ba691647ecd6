//! Background writer for lesson-config saves.
//!
//! Saves are queued to one detached thread that owns its own handle on the
//! gateway, so an edit returns before the round trip does. A single thread
//! keeps writes for the same key in submission order. Failures are logged and
//! otherwise dropped.

use crate::gateway::PersistenceGateway;
use log::warn;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

enum WriteMsg {
    Save { key: String, value: serde_json::Value },
    Barrier(mpsc::Sender<()>),
}

pub struct ConfigWriter {
    gateway: Arc<dyn PersistenceGateway>,
    tx: Option<mpsc::Sender<WriteMsg>>,
}

impl ConfigWriter {
    pub fn spawn(gateway: Arc<dyn PersistenceGateway>) -> Self {
        let (tx, rx) = mpsc::channel::<WriteMsg>();
        let worker_gateway = gateway.clone();
        let spawned = thread::Builder::new()
            .name("config-writer".to_string())
            .spawn(move || {
                for msg in rx {
                    match msg {
                        WriteMsg::Save { key, value } => {
                            save_logged(worker_gateway.as_ref(), &key, &value)
                        }
                        WriteMsg::Barrier(done) => {
                            let _ = done.send(());
                        }
                    }
                }
            });
        let tx = match spawned {
            Ok(_) => Some(tx),
            Err(e) => {
                warn!(
                    "event=config_writer module=config_writer status=inline error={}",
                    e
                );
                None
            }
        };
        ConfigWriter { gateway, tx }
    }

    /// Queues a save. Without a live worker thread the save runs inline.
    pub fn submit(&self, key: &str, value: serde_json::Value) {
        let msg = WriteMsg::Save {
            key: key.to_string(),
            value,
        };
        let unsent = match &self.tx {
            Some(tx) => tx.send(msg).err().map(|mpsc::SendError(m)| m),
            None => Some(msg),
        };
        if let Some(WriteMsg::Save { key, value }) = unsent {
            save_logged(self.gateway.as_ref(), &key, &value);
        }
    }

    /// Blocks until every save submitted so far has been attempted.
    pub fn wait_idle(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (done_tx, done_rx) = mpsc::channel();
        if tx.send(WriteMsg::Barrier(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

fn save_logged(gateway: &dyn PersistenceGateway, key: &str, value: &serde_json::Value) {
    if let Err(e) = gateway.save_config(key, value) {
        warn!(
            "event=config_save module=config_writer status=failed key={} error={}",
            key, e
        );
    }
}
