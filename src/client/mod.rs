//! Client management
//!
//! Client identities, records, held connection handles, and the shared
//! registry every channel reads and mutates.

pub mod handle;
pub mod registry;
pub mod state;

pub use handle::StreamHandle;
pub use registry::ClientRegistry;
pub use state::{ClientKey, ClientRecord, PeerHandle, Protocol, ProtocolFilter};
