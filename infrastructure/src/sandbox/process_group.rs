//! Hard kill for a child's whole process group.

use std::io;

/// Kills the process group when dropped, unless already killed.
pub(crate) struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    pub(crate) fn new(pgid: Option<u32>) -> Self {
        Self { pgid }
    }

    pub(crate) fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take()
            && let Err(e) = kill_process_group(pgid)
        {
            tracing::warn!(pgid, error = %e, "Failed to kill process group");
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
pub(crate) fn kill_process_group(process_group_id: u32) -> io::Result<()> {
    let pgid = process_group_id as libc::pid_t;
    // SAFETY: getpgrp has no preconditions
    let self_pgid = unsafe { libc::getpgrp() };
    if pgid == self_pgid {
        // Never kill our own process group.
        return Ok(());
    }

    // SAFETY: killpg only sends a signal; an unknown group yields ESRCH
    let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }

    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn kill_process_group(_process_group_id: u32) -> io::Result<()> {
    Ok(())
}
