pub mod hub;
pub mod routes;
pub mod sink;
pub mod wire;

pub use hub::BroadcastHub;
pub use routes::{router, serve, AppState};
pub use sink::{AggregateSink, SinkError};
pub use wire::AggregateMessage;
