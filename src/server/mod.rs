//! Server core functionality
//!
//! Binds both transports and runs their loops side by side over one
//! shared client registry.

pub mod core;

pub use core::Server;
