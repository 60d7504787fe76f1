//! Allow-list gate for shell command lines.
//!
//! This is a defense-in-depth filter over unparsed shell text, not a shell
//! parser. It rejects any command line containing a construct from
//! [`DANGEROUS_PATTERNS`] and requires the program name to be a literal member
//! of the allow-list. Argument paths are checked in a separate pass
//! ([`CommandValidator::check_argument_paths`]) through [`PathGuard`].

use super::path_guard::PathGuard;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How `|` is treated. One policy applies to a whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipePolicy {
    /// Pipes are rejected like any other operator.
    #[default]
    Strict,
    /// Single `|` is allowed; every pipeline stage must pass the allow-list.
    Validated,
}

impl PipePolicy {
    pub fn as_str(&self) -> &str {
        match self {
            PipePolicy::Strict => "strict",
            PipePolicy::Validated => "validated",
        }
    }
}

impl std::fmt::Display for PipePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PipePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(PipePolicy::Strict),
            "validated" => Ok(PipePolicy::Validated),
            _ => Err(format!("Invalid pipe policy: {}. Valid: strict, validated", s)),
        }
    }
}

/// Shell feature classes the validator disables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellConstruct {
    Substitution,
    Pipe,
    Redirection,
    Chaining,
    Background,
    Newline,
    Expansion,
}

impl ShellConstruct {
    pub fn describe(&self) -> &'static str {
        match self {
            ShellConstruct::Substitution => "command substitution",
            ShellConstruct::Pipe => "pipes",
            ShellConstruct::Redirection => "redirection",
            ShellConstruct::Chaining => "command chaining",
            ShellConstruct::Background => "background execution",
            ShellConstruct::Newline => "multi-line commands",
            ShellConstruct::Expansion => "variable and home-directory expansion",
        }
    }
}

/// Every construct the scan rejects. Longer tokens come first so the
/// reported class is the most specific one.
pub const DANGEROUS_PATTERNS: &[(&str, ShellConstruct)] = &[
    ("`", ShellConstruct::Substitution),
    ("$(", ShellConstruct::Substitution),
    ("||", ShellConstruct::Chaining),
    ("&&", ShellConstruct::Chaining),
    (";", ShellConstruct::Chaining),
    (">>", ShellConstruct::Redirection),
    ("<<", ShellConstruct::Redirection),
    (">", ShellConstruct::Redirection),
    ("<", ShellConstruct::Redirection),
    ("&", ShellConstruct::Background),
    ("\n", ShellConstruct::Newline),
    ("\r", ShellConstruct::Newline),
    ("|", ShellConstruct::Pipe),
];

/// `find` primaries that run another program or write files. Allowing
/// `find` must not allow these.
pub const FIND_ACTIONS: &[&str] = &[
    "-exec", "-execdir", "-ok", "-okdir", "-delete", "-fls", "-fprint", "-fprint0", "-fprintf",
];

/// Outcome of a validation pass. Never an error type: a rejection is data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid,
    Invalid { reason: String },
}

impl ValidationResult {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ValidationResult::Invalid {
            reason: reason.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid { reason } => Some(reason),
        }
    }

    pub fn into_result(self) -> Result<(), String> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid { reason } => Err(reason),
        }
    }
}

/// Validates command lines against an allow-list under a [`PipePolicy`].
#[derive(Debug, Clone)]
pub struct CommandValidator {
    allowed_programs: Vec<String>,
    pipe_policy: PipePolicy,
}

impl CommandValidator {
    pub fn new<I, S>(allowed_programs: I, pipe_policy: PipePolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_programs: allowed_programs.into_iter().map(Into::into).collect(),
            pipe_policy,
        }
    }

    pub fn allowed_programs(&self) -> &[String] {
        &self.allowed_programs
    }

    pub fn pipe_policy(&self) -> PipePolicy {
        self.pipe_policy
    }

    /// Validate the raw command line. Quotes are not stripped before the
    /// dangerous-pattern scan, so `echo ";"` is rejected too.
    pub fn validate(&self, command: &str) -> ValidationResult {
        if command.trim().is_empty() {
            return ValidationResult::invalid("Command cannot be empty");
        }

        if let Some(construct) = self.find_dangerous(command) {
            return ValidationResult::invalid(dangerous_message(construct));
        }
        // The line runs under `sh`, which would rewrite arguments after the
        // path check has seen them
        if has_shell_expansion(command) {
            return ValidationResult::invalid(dangerous_message(ShellConstruct::Expansion));
        }

        let command = command.trim();

        match self.pipe_policy {
            PipePolicy::Strict => self.check_program(command),
            PipePolicy::Validated => {
                for stage in command.split('|') {
                    let stage = stage.trim();
                    if stage.is_empty() {
                        return ValidationResult::invalid(
                            "Command not allowed: empty pipeline stage",
                        );
                    }
                    let result = self.check_program(stage);
                    if !result.is_valid() {
                        return result;
                    }
                }
                ValidationResult::Valid
            }
        }
    }

    /// The first dangerous construct present in `command`, if any.
    pub fn find_dangerous(&self, command: &str) -> Option<ShellConstruct> {
        DANGEROUS_PATTERNS
            .iter()
            .filter(|(_, construct)| {
                !(*construct == ShellConstruct::Pipe && self.pipe_policy == PipePolicy::Validated)
            })
            .find(|(pattern, _)| command.contains(pattern))
            .map(|(_, construct)| *construct)
    }

    fn check_program(&self, command: &str) -> ValidationResult {
        let program = command
            .split_once(' ')
            .map(|(program, _)| program)
            .unwrap_or(command);

        if self.allowed_programs.iter().any(|p| p == program) {
            if program == "find" {
                return check_find_actions(command);
            }
            ValidationResult::Valid
        } else {
            ValidationResult::invalid(format!(
                "Command not allowed: '{}' is not in the allowed list. Allowed commands: {}",
                program,
                self.allowed_programs.join(", ")
            ))
        }
    }

    /// Check every path-like argument against the guard.
    ///
    /// Runs after [`validate`](Self::validate). A token is path-like when it
    /// contains `/` or starts with `.` or `~`, and is not an option flag.
    pub fn check_argument_paths(
        &self,
        command: &str,
        guard: &PathGuard,
        working_dir: &Path,
    ) -> ValidationResult {
        let tokens = match shell_words::split(command) {
            Ok(tokens) => tokens,
            Err(e) => {
                return ValidationResult::invalid(format!(
                    "Command not allowed: could not parse arguments ({})",
                    e
                ));
            }
        };

        for token in tokens.iter().filter(|t| is_path_like(t)) {
            if let Err(err) = guard.check_argument(token, working_dir) {
                let resolved = err
                    .resolved_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                tracing::debug!(token = %token, error = %err, "Argument path rejected");
                return ValidationResult::invalid(format!(
                    "Argument '{}' resolves outside the project directory ({})",
                    token, resolved
                ));
            }
        }
        ValidationResult::Valid
    }
}

fn dangerous_message(construct: ShellConstruct) -> String {
    format!(
        "Command not allowed: {} is disabled. Shell operators (pipes, redirection, chaining, \
         substitution, background jobs and newlines) cannot be used; run one allowed program per call.",
        construct.describe()
    )
}

fn check_find_actions(command: &str) -> ValidationResult {
    let tokens = shell_words::split(command)
        .unwrap_or_else(|_| command.split_whitespace().map(str::to_string).collect());
    match tokens.iter().find(|t| FIND_ACTIONS.contains(&t.as_str())) {
        Some(action) => ValidationResult::invalid(format!(
            "Command not allowed: find {} can run programs or write files; use find only to list paths",
            action
        )),
        None => ValidationResult::Valid,
    }
}

/// Whether `sh` would expand a `$` parameter or a `~user` prefix somewhere in
/// `command`. Single quotes and backslashes suppress both; double quotes
/// suppress only the tilde.
fn has_shell_expansion(command: &str) -> bool {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut word_start = true;
    let mut chars = command.chars().peekable();
    while let Some(c) = chars.next() {
        if escaped {
            escaped = false;
            word_start = false;
            continue;
        }
        match c {
            '\\' if !in_single => escaped = true,
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '$' if !in_single => return true,
            '~' if word_start && !in_single && !in_double => {
                if !matches!(chars.peek(), None | Some('/') | Some(' ') | Some('\t')) {
                    return true;
                }
            }
            _ => {}
        }
        let unquoted = !in_single && !in_double;
        word_start = unquoted && (c.is_whitespace() || c == '=' || c == ':');
    }
    false
}

/// Whether a token should be treated as a filesystem path.
pub fn is_path_like(token: &str) -> bool {
    !token.starts_with('-')
        && (token.contains('/') || token.starts_with('.') || token.starts_with('~'))
}
