//! Process memory probe used by the health task.

use sysinfo::System;
use tracing::warn;

/// Resident memory of the current process in MiB.
pub fn resident_memory_mb() -> Option<u64> {
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(e) => {
            warn!(error = %e, "failed to resolve current process id");
            return None;
        }
    };
    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return None;
    }
    sys.process(pid).map(|p| p.memory() / 1024 / 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_some_memory_for_this_process() {
        let mb = resident_memory_mb();
        assert!(mb.is_some());
    }
}
