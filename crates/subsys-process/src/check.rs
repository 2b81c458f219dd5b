//! Process-group existence checking.

use subsys_common::SubsystemResult;

/// Check whether any process in group `pgid` still exists.
///
/// On Unix this sends signal 0 to the group, which performs the permission
/// and existence checks without delivering anything.
///
/// * `Ok(true)` - at least one member exists
/// * `Ok(false)` - the group is empty
/// * `Err(_)` - the check itself failed
pub fn group_exists(pgid: i32) -> SubsystemResult<bool> {
    #[cfg(unix)]
    {
        group_exists_unix(pgid)
    }

    #[cfg(not(unix))]
    {
        Err(subsys_common::SubsystemError::signal_failed(
            pgid,
            "process groups are not supported on this platform",
        ))
    }
}

#[cfg(unix)]
fn group_exists_unix(pgid: i32) -> SubsystemResult<bool> {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid), None) {
        Ok(()) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        // Exists, but belongs to someone else.
        Err(nix::errno::Errno::EPERM) => Ok(true),
        Err(e) => Err(subsys_common::SubsystemError::signal_failed(
            pgid,
            format!("Failed to check process group: {e}"),
        )),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_own_group_exists() {
        let own = nix::unistd::getpgrp();
        assert!(group_exists(own.as_raw()).unwrap());
    }
}
