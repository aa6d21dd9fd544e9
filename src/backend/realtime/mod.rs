//! Real-time Module
//!
//! Rooms, fan-out and websocket sessions.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs        - Module exports and documentation
//! ├── authz.rs      - Join authorization against the directory
//! ├── topology.rs   - Session registry, room index, broadcast
//! ├── fanout.rs     - Target rooms per event variant
//! ├── dispatcher.rs - EventSink trait and the injected Dispatcher
//! ├── session.rs    - ConnectionSession lifecycle
//! └── ws.rs         - axum websocket handler
//! ```
//!
//! # Delivery
//!
//! Events are fire-and-forget per session. A session that is not joined to a
//! target room at publish time never sees the event; nothing is buffered for
//! later. Clients resynchronize over REST when they navigate.

pub mod authz;
pub mod dispatcher;
pub mod fanout;
pub mod session;
pub mod topology;
pub mod ws;

pub use dispatcher::{Dispatcher, EventSink};
pub use fanout::target_rooms;
pub use session::ConnectionSession;
pub use topology::{JoinOutcome, PublishReport, RoomTopology, SessionHandle, SessionId};
pub use ws::ws_handler;
