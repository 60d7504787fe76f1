//! Console formatting for agent events, tool outcomes and the tool list.
//!
//! Everything here returns strings; printing (and spinners) is left to
//! [`ConsoleRenderer`](crate::progress::reporter::ConsoleRenderer).

use colored::Colorize;
use warden_application::TurnOutput;
use warden_domain::{AgentEvent, StopReason, ToolOutcome, ToolSpec, truncate};

const PREVIEW_LEN: usize = 80;

/// Formats events and results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// One status line for an event, or `None` when the event has no line
    /// of its own (text deltas are streamed raw).
    pub fn event_line(event: &AgentEvent, verbose: bool) -> Option<String> {
        match event {
            AgentEvent::StepStart { step } if verbose => {
                Some(format!("── step {} ──", step).dimmed().to_string())
            }
            AgentEvent::ToolCallStart {
                tool_name,
                arguments,
                ..
            } => Some(format!(
                "{} {} {}",
                "⚙".cyan(),
                tool_name.bold(),
                truncate(arguments, PREVIEW_LEN).dimmed()
            )),
            AgentEvent::ToolCallUpdate { message, .. } => {
                Some(format!("  {}", message).dimmed().to_string())
            }
            AgentEvent::ToolCallEnd {
                tool_name, outcome, ..
            } => Some(Self::outcome_line(tool_name, outcome)),
            AgentEvent::ToolCallError {
                tool_name, error, ..
            } => Some(format!(
                "{} {} {}",
                "✗".red().bold(),
                tool_name.bold(),
                Self::first_line(error).red()
            )),
            AgentEvent::AgentStop { reason } if verbose || !matches!(reason, StopReason::Completed) => {
                Some(Self::stop_line(reason))
            }
            _ => None,
        }
    }

    fn outcome_line(tool_name: &str, outcome: &ToolOutcome) -> String {
        match outcome {
            ToolOutcome::Ok(_) => format!(
                "{} {} {}",
                "✓".green().bold(),
                tool_name.bold(),
                Self::outcome_summary(outcome).dimmed()
            ),
            ToolOutcome::Truncated { .. } => format!(
                "{} {} {}",
                "✓".yellow().bold(),
                tool_name.bold(),
                Self::outcome_summary(outcome).yellow()
            ),
            ToolOutcome::Failed(_) => format!(
                "{} {} {}",
                "✗".red().bold(),
                tool_name.bold(),
                Self::outcome_summary(outcome).red()
            ),
        }
    }

    /// Short description of an outcome for a status line.
    pub fn outcome_summary(outcome: &ToolOutcome) -> String {
        match outcome {
            ToolOutcome::Ok(text) => match text.lines().count() {
                0 => "(no output)".to_string(),
                1 => truncate(text.trim_end(), PREVIEW_LEN),
                n => format!("({} lines)", n),
            },
            ToolOutcome::Truncated {
                token_count, limit, ..
            } => format!("(output withheld: {} tokens > {})", token_count, limit),
            ToolOutcome::Failed(reason) => Self::first_line(reason),
        }
    }

    fn first_line(text: &str) -> String {
        truncate(text.lines().next().unwrap_or(""), PREVIEW_LEN)
    }

    fn stop_line(reason: &StopReason) -> String {
        match reason {
            StopReason::Completed => "■ completed".green().to_string(),
            StopReason::MaxSteps => "■ stopped: step limit reached".yellow().to_string(),
            StopReason::Cancelled => "■ cancelled".yellow().to_string(),
            StopReason::Failed(detail) => format!("■ failed: {}", detail).red().to_string(),
        }
    }

    /// Full text of an outcome, as printed by `warden call`.
    pub fn outcome_body(outcome: &ToolOutcome) -> String {
        match outcome {
            ToolOutcome::Ok(text) => text.clone(),
            ToolOutcome::Truncated { notice, .. } => notice.yellow().to_string(),
            ToolOutcome::Failed(reason) => format!("{} {}", "Error:".red().bold(), reason),
        }
    }

    /// Closing summary of a turn.
    pub fn turn_summary(output: &TurnOutput) -> String {
        let steps = if output.steps == 1 { "step" } else { "steps" };
        format!(
            "{} {} {} · {} tokens in / {} out",
            "Done:".cyan().bold(),
            output.steps,
            steps,
            output.usage.input_tokens,
            output.usage.output_tokens
        )
    }

    /// Tools sorted by name, with parameters and aliases.
    pub fn tool_list(spec: &ToolSpec, aliases: &[(&str, &str)]) -> String {
        let mut out = String::new();
        for name in spec.names() {
            let Some(def) = spec.get(name) else {
                continue;
            };
            let risk = if def.is_high_risk() {
                def.risk_level.as_str().red().to_string()
            } else {
                def.risk_level.as_str().green().to_string()
            };
            out.push_str(&format!("{} [{}]\n", def.name.bold(), risk));
            out.push_str(&format!("  {}\n", def.description));
            for param in &def.parameters {
                let marker = if param.required { "*" } else { " " };
                out.push_str(&format!(
                    "  {}{} ({}) {}\n",
                    marker,
                    param.name.cyan(),
                    param.param_type.as_str(),
                    param.description.dimmed()
                ));
            }
            let mut names: Vec<&str> = aliases
                .iter()
                .filter(|(_, canonical)| *canonical == name)
                .map(|(alias, _)| *alias)
                .collect();
            if !names.is_empty() {
                names.sort_unstable();
                out.push_str(&format!("  aliases: {}\n", names.join(", ")));
            }
            out.push('\n');
        }
        out
    }
}
