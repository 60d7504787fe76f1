//! Terminal approval prompt for high-risk tool calls.
//!
//! ```text
//! ⚠ Approval required
//!   rm -rf build
//!
//! > [y] Accept
//!   [a] Accept all (this session)
//!   [n] Reject
//! Choice:
//! ```
//!
//! Input is line based so it works over plain pipes: a shortcut key picks
//! directly, `j`/`k` move, `/text` filters and Enter confirms the highlighted
//! choice. Rejecting asks for an optional reason that is handed back to the
//! model.

mod prompt;

pub use prompt::{ApprovalChoice, InteractiveApproval, run_prompt};
