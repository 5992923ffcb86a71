pub mod connection;

pub use connection::{
    Connection, ConnectionGuard, ConnectionInfo, ConnectionSender, DEFAULT_PORT, Inbound,
    PbauConnection,
};
