use crate::selector::{
    self, SelectorItem, SelectorState, SelectorStatus, events_from_line, reduce,
};
use async_trait::async_trait;
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;
use warden_application::{ApprovalError, ApprovalPort};
use warden_domain::ApprovalDecision;

const DEFAULT_REJECT_REASON: &str = "No reason given";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalChoice {
    Accept,
    AcceptAll,
    Reject,
}

impl ApprovalChoice {
    pub const ALL: [ApprovalChoice; 3] = [
        ApprovalChoice::Accept,
        ApprovalChoice::AcceptAll,
        ApprovalChoice::Reject,
    ];
}

impl SelectorItem for ApprovalChoice {
    fn label(&self) -> &str {
        match self {
            ApprovalChoice::Accept => "Accept",
            ApprovalChoice::AcceptAll => "Accept all (this session)",
            ApprovalChoice::Reject => "Reject",
        }
    }

    fn shortcut(&self) -> Option<char> {
        match self {
            ApprovalChoice::Accept => Some('y'),
            ApprovalChoice::AcceptAll => Some('a'),
            ApprovalChoice::Reject => Some('n'),
        }
    }
}

/// Run one approval prompt over `input`/`output`.
///
/// End of input before a choice is made is reported as
/// [`io::ErrorKind::UnexpectedEof`]. Cancelling the menu (`q`) rejects.
pub fn run_prompt(
    description: &str,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> io::Result<ApprovalDecision> {
    writeln!(output)?;
    writeln!(output, "{}", "⚠ Approval required".yellow().bold())?;
    for line in description.lines() {
        writeln!(output, "  {}", line.cyan())?;
    }
    writeln!(output)?;

    let mut state = SelectorState::new(ApprovalChoice::ALL.to_vec());
    while state.is_open() {
        for line in selector::render(&state) {
            writeln!(output, "{}", line)?;
        }
        write!(output, "{} ", "Choice [y/a/n, Enter confirms]:".bold())?;
        output.flush()?;

        let line = read_line(input)?;
        let events = events_from_line(&line);
        if events.is_empty() {
            writeln!(output, "{}", "Unrecognised input.".red())?;
            continue;
        }
        state = events.into_iter().fold(state, reduce);
    }

    let choice = match state.status() {
        SelectorStatus::Confirmed(_) => state.selected().copied(),
        _ => None,
    };
    debug!(choice = ?choice, "Approval prompt closed");

    match choice {
        Some(ApprovalChoice::Accept) => Ok(ApprovalDecision::Accept),
        Some(ApprovalChoice::AcceptAll) => {
            writeln!(
                output,
                "{}",
                "Auto-accepting further calls for this session.".green()
            )?;
            Ok(ApprovalDecision::AcceptAll)
        }
        Some(ApprovalChoice::Reject) => {
            write!(output, "{} ", "Reason (optional):".bold())?;
            output.flush()?;
            let reason = match read_line(input) {
                Ok(line) => line.trim().to_string(),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => String::new(),
                Err(e) => return Err(e),
            };
            Ok(ApprovalDecision::reject(if reason.is_empty() {
                DEFAULT_REJECT_REASON.to_string()
            } else {
                reason
            }))
        }
        None => Ok(ApprovalDecision::reject(DEFAULT_REJECT_REASON)),
    }
}

fn read_line(input: &mut dyn BufRead) -> io::Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before a choice was made",
        ));
    }
    Ok(line)
}

type SharedReader = Arc<Mutex<Box<dyn BufRead + Send>>>;

/// [`ApprovalPort`] backed by the terminal.
///
/// The blocking read runs on the blocking pool. Cancellation is handled by
/// the gate, which stops awaiting this future.
pub struct InteractiveApproval {
    input: SharedReader,
}

impl InteractiveApproval {
    pub fn stdin() -> Self {
        Self::with_reader(Box::new(io::BufReader::new(io::stdin())))
    }

    pub fn with_reader(reader: Box<dyn BufRead + Send>) -> Self {
        Self {
            input: Arc::new(Mutex::new(reader)),
        }
    }
}

#[async_trait]
impl ApprovalPort for InteractiveApproval {
    async fn request_approval(&self, description: &str) -> Result<ApprovalDecision, ApprovalError> {
        let input = self.input.clone();
        let description = description.to_string();

        let result = tokio::task::spawn_blocking(move || {
            let mut reader = input.lock().unwrap_or_else(PoisonError::into_inner);
            let stdout = io::stdout();
            let mut out = stdout.lock();
            run_prompt(&description, &mut **reader, &mut out)
        })
        .await
        .map_err(|e| ApprovalError::IoError(e.to_string()))?;

        result.map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::Interrupted => ApprovalError::Cancelled,
            _ => ApprovalError::IoError(e.to_string()),
        })
    }
}
