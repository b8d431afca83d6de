//! Session and Feedback Memory
//!
//! Durable per-session state: the append-only conversation history and the
//! append-only judged-answer (feedback) log. Both stores persist whole JSON
//! files per session with read-modify-write semantics.
//!
//! There is no cross-invocation locking: two concurrent requests against
//! the same session id may race on the read-modify-write and lose updates
//! (last writer wins).

pub mod feedback;
pub mod session;

pub use feedback::{FeedbackRecord, FeedbackStore};
pub use session::{HistoryRecord, Role, SessionStore};

/// Current wall-clock time as fractional UNIX seconds.
pub(crate) fn now_ts() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
