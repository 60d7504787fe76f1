//! Live rendering of agent events.

pub mod reporter;
