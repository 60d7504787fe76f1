//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure and presentation adapters
//! must implement.

pub mod approval;
pub mod event_sink;
pub mod llm_gateway;
pub mod tool;
