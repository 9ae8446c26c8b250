//! Interview rehearsal: voice-driven mock interviews with heuristic feedback.
//!
//! ```text
//! intake (voice wizard | manual) ─▶ interview::generate ─▶ store
//!                                                           │
//! session (voice | typed) ◀─────────────────────────────────┘
//!   └─▶ feedback::score ─▶ store (results_<user>)
//! ```

pub mod account;
pub mod config;
pub mod feedback;
pub mod intake;
pub mod interview;
pub mod session;
pub mod signal;
pub mod speech;
pub mod store;
