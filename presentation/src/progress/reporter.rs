//! Live console rendering of the agent event stream.

use crate::output::console::ConsoleFormatter;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use warden_application::AgentEventSink;
use warden_domain::AgentEvent;

/// Renders [`AgentEvent`]s to the terminal.
///
/// With spinners enabled each running tool call gets one; the final status
/// line replaces it when the call closes. Spinners should be off while the
/// approval prompt may be reading the terminal.
pub struct ConsoleRenderer {
    multi: MultiProgress,
    spinners: Mutex<HashMap<String, ProgressBar>>,
    /// Whether the current model message has printed text without a newline
    mid_line: Mutex<bool>,
    show_spinners: bool,
    verbose: bool,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            spinners: Mutex::new(HashMap::new()),
            mid_line: Mutex::new(false),
            show_spinners: false,
            verbose: false,
        }
    }

    pub fn with_spinners(mut self, show: bool) -> Self {
        self.show_spinners = show;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn print_line(&self, line: &str) {
        let mut mid_line = self.mid_line.lock().unwrap_or_else(PoisonError::into_inner);
        let needs_break = std::mem::take(&mut *mid_line);
        self.multi.suspend(|| {
            if needs_break {
                println!();
            }
            println!("{}", line);
        });
    }

    fn print_text(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut mid_line = self.mid_line.lock().unwrap_or_else(PoisonError::into_inner);
        *mid_line = !text.ends_with('\n');
        self.multi.suspend(|| {
            print!("{}", text);
            let _ = std::io::stdout().flush();
        });
    }

    fn start_spinner(&self, tool_call_id: &str, tool_name: &str) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::spinner_style());
        pb.set_prefix(tool_name.to_string());
        pb.set_message("running...");
        pb.enable_steady_tick(Duration::from_millis(100));
        self.spinners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tool_call_id.to_string(), pb);
    }

    fn update_spinner(&self, tool_call_id: &str, message: &str) -> bool {
        match self
            .spinners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tool_call_id)
        {
            Some(pb) => {
                pb.set_message(message.to_string());
                true
            }
            None => false,
        }
    }

    fn finish_spinner(&self, tool_call_id: &str) {
        let removed = self
            .spinners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(tool_call_id);
        if let Some(pb) = removed {
            pb.finish_and_clear();
            self.multi.remove(&pb);
        }
    }
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentEventSink for ConsoleRenderer {
    fn emit(&self, event: &AgentEvent) {
        match event {
            AgentEvent::Message { text, .. } => {
                self.print_text(text);
                return;
            }
            AgentEvent::MessageEnd { .. } => {
                let mut mid_line = self.mid_line.lock().unwrap_or_else(PoisonError::into_inner);
                if std::mem::take(&mut *mid_line) {
                    println!();
                }
                return;
            }
            AgentEvent::ToolCallStart {
                tool_call_id,
                tool_name,
                ..
            } if self.show_spinners => {
                self.start_spinner(tool_call_id, tool_name);
                if !self.verbose {
                    return;
                }
            }
            AgentEvent::ToolCallUpdate {
                tool_call_id,
                message,
            } if self.show_spinners && self.update_spinner(tool_call_id, message) => {
                return;
            }
            AgentEvent::ToolCallEnd { tool_call_id, .. }
            | AgentEvent::ToolCallError { tool_call_id, .. } => {
                self.finish_spinner(tool_call_id);
            }
            AgentEvent::AgentStop { .. } => {
                let leftover: Vec<String> = self
                    .spinners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .keys()
                    .cloned()
                    .collect();
                for id in leftover {
                    self.finish_spinner(&id);
                }
            }
            _ => {}
        }

        if let Some(line) = ConsoleFormatter::event_line(event, self.verbose) {
            self.print_line(&line);
        }
    }
}
