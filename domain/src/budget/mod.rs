//! Output metering against a token budget.

pub mod output_budget;
pub mod token_counter;

pub use output_budget::{
    BudgetedOutput, MIN_TOKEN_LIMIT, budget, effective_limit, is_truncation_notice,
    truncation_notice,
};
pub use token_counter::{HeuristicTokenCounter, TokenCountError, TokenCounter};
