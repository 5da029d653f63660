//! Rideshare realtime service.
//!
//! Serves rider-to-trip route matching over HTTP and live trip locations over
//! a WebSocket, with location reports flowing through a broker to the
//! consumer that fans them out.

mod broker;
mod config;
mod http;
mod messaging;
mod session;

pub use broker::*;
pub use config::*;
pub use http::{AppState, HttpError, router};
pub use messaging::*;
pub use session::*;
use trip_location::LocationEngine;

/// Location engine wired to the in-process broker.
pub type Engine = LocationEngine<LocalBroker>;
