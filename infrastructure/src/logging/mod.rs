//! Logging infrastructure: the JSONL event log.
//!
//! [`JsonlEventLog`] is an [`AgentEventSink`](warden_application::AgentEventSink)
//! observer; it never influences tool outcomes.

mod event_log;

pub use event_log::JsonlEventLog;
