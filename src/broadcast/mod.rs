//! Broadcast engine
//!
//! Delivers one notification to every matching client in a registry
//! snapshot and prunes recipients that cannot be reached.

pub mod engine;
pub mod results;

pub use engine::BroadcastEngine;
pub use results::FanOutReport;
