//! Token budget for tool output.
//!
//! Output over the limit is replaced wholesale by a short notice; it is
//! never partially emitted. The notice always fits under the smallest
//! accepted limit, and a notice fed back in is passed through untouched,
//! so budgeting is idempotent.

use super::token_counter::TokenCounter;
use crate::tool::ToolOutcome;
use tracing::warn;

/// Limits below this are raised to it so the notice itself always fits.
pub const MIN_TOKEN_LIMIT: usize = 100;

const NOTICE_PREFIX: &str = "Output of ";
const NOTICE_MARKER: &str = "exceeds maximum allowed tokens";

/// Result of budgeting one piece of tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetedOutput {
    pub text: String,
    pub token_count: usize,
    pub was_truncated: bool,
    pub limit: usize,
}

impl BudgetedOutput {
    pub fn into_outcome(self) -> ToolOutcome {
        if self.was_truncated {
            ToolOutcome::Truncated {
                notice: self.text,
                token_count: self.token_count,
                limit: self.limit,
            }
        } else {
            ToolOutcome::Ok(self.text)
        }
    }
}

/// Clamp a configured ceiling to the smallest usable limit.
pub fn effective_limit(limit: usize) -> usize {
    limit.max(MIN_TOKEN_LIMIT)
}

/// The fixed-format notice that replaces oversized output.
pub fn truncation_notice(label: &str, token_count: usize, limit: usize) -> String {
    format!(
        "{NOTICE_PREFIX}{label} ({token_count} tokens) {NOTICE_MARKER} ({limit}). \
         Narrow the request, e.g. read a line range or use a more specific search."
    )
}

/// Whether `text` is already a truncation notice.
pub fn is_truncation_notice(text: &str) -> bool {
    text.starts_with(NOTICE_PREFIX) && text.contains(NOTICE_MARKER) && text.len() < 512
}

/// Meter `text` against `limit` tokens.
///
/// `label` names the producer in the notice ("command", "read_file").
/// A counter failure is logged and counted as zero tokens; the text passes
/// through unchanged.
pub fn budget(label: &str, text: String, counter: &dyn TokenCounter, limit: usize) -> BudgetedOutput {
    let limit = effective_limit(limit);

    if is_truncation_notice(&text) {
        return BudgetedOutput {
            token_count: counter.count(&text).unwrap_or(0),
            text,
            was_truncated: false,
            limit,
        };
    }

    let token_count = match counter.count(&text) {
        Ok(count) => count,
        Err(e) => {
            warn!(label, error = %e, "Token counting failed; passing output through");
            0
        }
    };

    if token_count <= limit {
        return BudgetedOutput {
            text,
            token_count,
            was_truncated: false,
            limit,
        };
    }

    BudgetedOutput {
        text: truncation_notice(label, token_count, limit),
        token_count,
        was_truncated: true,
        limit,
    }
}
