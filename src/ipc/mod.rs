mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use error::{err, ok};
pub use handlers::attendance::complete_flush;
pub use router::handle_request;
pub use types::{AppState, FlushFinished, IpcEvent, Request};
