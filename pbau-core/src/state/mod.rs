pub mod connection;
pub mod control;
pub mod discovery;

pub use connection::ConnectionPhase;
pub use control::{ControlState, Effect, InFlight, WatchDelta};
pub use discovery::{Discovery, DiscoveryStep};
