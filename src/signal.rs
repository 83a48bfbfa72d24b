//! Process termination signals.
//!
//! SIGINT and SIGTERM are blocked before any thread is spawned, so every
//! thread inherits the mask and none of them gets interrupted. The main
//! thread then consumes the signals with `sigwait`: no handler runs and
//! `wait()` blocks properly instead of polling.

use std::io;

fn termination_set() -> libc::sigset_t {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGINT);
        libc::sigaddset(&mut set, libc::SIGTERM);
        set
    }
}

/// Block SIGINT and SIGTERM for the calling thread and every thread it
/// spawns afterwards. Must run before the reactor thread starts.
pub fn block() -> io::Result<()> {
    let set = termination_set();
    let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(())
}

/// Block the calling thread until a termination signal is delivered.
/// Returns the signal number consumed.
pub fn wait() -> io::Result<libc::c_int> {
    let set = termination_set();
    let mut sig: libc::c_int = 0;
    let rc = unsafe { libc::sigwait(&set, &mut sig) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(sig)
}
