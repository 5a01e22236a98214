//! WebSocket layer: upgrade handling, inbound classification and the
//! per-connection session dispatcher.
//!
//! The endpoint at `/ws/{client_name}` carries plain UTF-8 text frames in
//! both directions; binary frames are treated as audio clips.

pub mod command;
pub mod handler;
pub mod session;
