//! # prism-echo
//!
//! Real-time group-chat and debate backend. Clients hold a WebSocket open,
//! send text (or audio), and receive a moderated, fanned-out stream of every
//! participant's messages augmented with AI summaries and opening
//! questions.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket /ws/{name}, REST /api/v1)
//!     │
//!     ├── Session dispatcher (ws/)       one task per connection
//!     │       │
//!     │       ├── ModerationGate (service/)   blocklist + classifier, fail-open
//!     │       ├── Augmenter (service/)        summaries, transcripts, questions
//!     │       │       └── Capability (llm/)   Gemini or absent
//!     │       │
//!     │       └── ConnectionRegistry (domain/)  add / remove / broadcast
//!     │
//!     └── REST handlers (api/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod llm;
pub mod service;
pub mod ws;
