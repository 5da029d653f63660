//! Live location distribution for open trips.
//!
//! Reports published for a trip are recorded as the trip's last known
//! location, handed to a [`realtime::Broker`], and fanned out to every
//! connection subscribed to the trip when the broker delivers them back.

mod engine;
mod hub;
mod key_locker;
mod protocol;
mod registry;
mod report;

pub use engine::*;
pub use hub::*;
pub use key_locker::*;
pub use protocol::*;
pub use registry::*;
pub use report::*;
