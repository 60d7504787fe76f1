//! Event sink port
//!
//! Observers (console renderer, JSONL log, tests) receive every
//! [`AgentEvent`] through an [`AgentEventSink`]. Emission is synchronous, so
//! handlers must be fast.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use warden_domain::AgentEvent;

pub trait AgentEventSink: Send + Sync {
    fn emit(&self, event: &AgentEvent);
}

/// No-op sink.
pub struct NoEvents;

impl AgentEventSink for NoEvents {
    fn emit(&self, _event: &AgentEvent) {}
}

/// Forwards events to an unbounded channel. A dropped receiver is ignored.
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<AgentEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::UnboundedSender<AgentEvent>) -> Self {
        Self { tx }
    }
}

impl AgentEventSink for ChannelEventSink {
    fn emit(&self, event: &AgentEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Fans each event out to several sinks, in registration order.
#[derive(Default)]
pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn AgentEventSink>>,
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AgentEventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AgentEventSink for CompositeEventSink {
    fn emit(&self, event: &AgentEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<AgentEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Wire names of the recorded events, in order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events().iter().map(AgentEvent::kind).collect()
    }
}

impl AgentEventSink for RecordingEventSink {
    fn emit(&self, event: &AgentEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
