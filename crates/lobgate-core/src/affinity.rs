//! Pin the calling thread to one CPU before entering the hot loop.

use crate::error::AffinityError;

/// Restrict the current thread to `cpu`.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(cpu: usize) -> Result<(), AffinityError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    if cpu >= CpuSet::count() {
        return Err(AffinityError::InvalidCpu { cpu });
    }
    let mut set = CpuSet::new();
    set.set(cpu).map_err(|_| AffinityError::InvalidCpu { cpu })?;
    sched_setaffinity(Pid::from_raw(0), &set).map_err(|errno| match errno {
        nix::errno::Errno::EINVAL => AffinityError::InvalidCpu { cpu },
        other => AffinityError::Syscall {
            cpu,
            reason: other.desc().to_string(),
        },
    })?;
    tracing::debug!(cpu, "Pinned thread");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_cpu: usize) -> Result<(), AffinityError> {
    Err(AffinityError::Unsupported)
}
