//! Path containment for every path-bearing tool argument.
//!
//! [`PathGuard`] resolves a requested path against the working directory and
//! accepts it only if it lands inside one of the allowed roots, both lexically
//! and after symlinks are resolved on disk.
//!
//! ```text
//! "~/x", "../y", "/abs" ──▶ expand ~ ──▶ absolutize ──▶ resolve . and ..
//!                                                         │
//!                              lexical prefix check ◀─────┘  OutsideAllowedRoots
//!                                       │
//!              exists?  ── yes ──▶ canonicalize(path)    ─┐
//!                       ── no  ──▶ canonicalize(parent)  ─┴─▶ prefix check  SymlinkEscape
//!                                   (parent missing)  ParentMissing
//! ```
//!
//! The guard only reads filesystem metadata; it never creates or removes anything.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Why a requested path was refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Path '{requested}' resolves outside the project directory ({})", resolved.display())]
    OutsideAllowedRoots { requested: String, resolved: PathBuf },

    #[error("Path '{requested}' resolves outside the project directory through a symlink ({})", real.display())]
    SymlinkEscape { requested: String, real: PathBuf },

    #[error("Parent directory of '{requested}' does not exist ({})", parent.display())]
    ParentMissing { requested: String, parent: PathBuf },

    #[error("Path must not be empty")]
    Empty,
}

impl AccessError {
    /// The resolved location that failed the check, when one was computed.
    pub fn resolved_path(&self) -> Option<&Path> {
        match self {
            AccessError::OutsideAllowedRoots { resolved, .. } => Some(resolved),
            AccessError::SymlinkEscape { real, .. } => Some(real),
            AccessError::ParentMissing { parent, .. } => Some(parent),
            AccessError::Empty => None,
        }
    }
}

/// Resolves paths against a fixed set of allowed roots.
#[derive(Debug, Clone)]
pub struct PathGuard {
    roots: Vec<PathBuf>,
}

impl PathGuard {
    /// Build a guard over the given roots.
    ///
    /// Existing roots are canonicalized so that comparisons against real paths
    /// work when a root itself sits behind a symlink (e.g. `/tmp` on macOS).
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = roots
            .into_iter()
            .map(|root| {
                let root = normalize_path(root.as_ref());
                root.canonicalize().unwrap_or(root)
            })
            .collect();
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Human-readable list of roots for error messages
    pub fn roots_display(&self) -> String {
        self.roots
            .iter()
            .map(|r| r.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whether `path` equals or descends from an allowed root (lexically).
    pub fn is_within_roots(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }

    /// Resolve `requested` relative to `working_dir`.
    ///
    /// On success the returned path is absolute, free of `.`/`..` components,
    /// and is the real on-disk location for existing paths (or the real parent
    /// joined with the final component for paths about to be created).
    pub fn resolve(&self, requested: &str, working_dir: &Path) -> Result<PathBuf, AccessError> {
        if requested.trim().is_empty() {
            return Err(AccessError::Empty);
        }

        let expanded = expand_home(requested);
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            working_dir.join(expanded)
        };
        let normalized = normalize_through_links(&absolute);

        if !self.is_within_roots(&normalized) {
            return Err(AccessError::OutsideAllowedRoots {
                requested: requested.to_string(),
                resolved: normalized,
            });
        }

        // symlink_metadata so a dangling link still counts as "exists"
        if std::fs::symlink_metadata(&normalized).is_ok() {
            let real = normalized
                .canonicalize()
                .map_err(|_| AccessError::SymlinkEscape {
                    requested: requested.to_string(),
                    real: normalized.clone(),
                })?;
            if !self.is_within_roots(&real) {
                return Err(AccessError::SymlinkEscape {
                    requested: requested.to_string(),
                    real,
                });
            }
            return Ok(real);
        }

        let (parent, file_name) = match (normalized.parent(), normalized.file_name()) {
            (Some(parent), Some(name)) => (parent.to_path_buf(), name.to_os_string()),
            // Only "/" has no parent, and it exists
            _ => {
                return Err(AccessError::ParentMissing {
                    requested: requested.to_string(),
                    parent: normalized,
                });
            }
        };

        let real_parent = parent
            .canonicalize()
            .map_err(|_| AccessError::ParentMissing {
                requested: requested.to_string(),
                parent: parent.clone(),
            })?;
        if !self.is_within_roots(&real_parent) {
            return Err(AccessError::SymlinkEscape {
                requested: requested.to_string(),
                real: real_parent,
            });
        }

        Ok(real_parent.join(file_name))
    }
}

impl PathGuard {
    /// Like [`resolve`](Self::resolve), but a missing parent is not fatal: the
    /// nearest existing ancestor must still be inside the roots, and the
    /// lexical path is returned.
    pub fn check_argument(
        &self,
        requested: &str,
        working_dir: &Path,
    ) -> Result<PathBuf, AccessError> {
        match self.resolve(requested, working_dir) {
            Err(AccessError::ParentMissing { requested, parent }) => {
                let existing = parent
                    .ancestors()
                    .find(|a| std::fs::symlink_metadata(a).is_ok())
                    .map(Path::to_path_buf);
                match existing.and_then(|a| a.canonicalize().ok()) {
                    Some(real) if self.is_within_roots(&real) => {
                        Ok(match Path::new(&requested).file_name() {
                            Some(name) => parent.join(name),
                            None => parent,
                        })
                    }
                    Some(real) => Err(AccessError::SymlinkEscape { requested, real }),
                    None => Err(AccessError::SymlinkEscape {
                        requested,
                        real: parent,
                    }),
                }
            }
            other => other,
        }
    }
}

/// Expand a leading `~` or `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Resolve `.` and `..` the way the kernel walks a path: a `..` after an
/// existing prefix climbs from that prefix's real location, so `link/..`
/// lands next to the link target rather than next to the link.
fn normalize_through_links(path: &Path) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if let Ok(real) = resolved.canonicalize() {
                    resolved = real;
                }
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved
}

/// Normalize a path by resolving `.` and `..` components without touching
/// the filesystem. `..` never climbs above the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            Component::CurDir => {}
            _ => components.push(component),
        }
    }
    components.iter().collect()
}
