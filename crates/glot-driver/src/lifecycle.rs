//! Child process teardown.

use std::io;
use std::process::Child;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::DRIVER_TARGET;

/// How long a driver may take to exit after `exit` before it is killed.
const EXIT_GRACE: Duration = Duration::from_millis(200);

/// Waits briefly for the child to exit, killing it if it does not.
pub(crate) fn terminate_child(child: &mut Child, instance: &str) -> io::Result<()> {
    if exited(child, instance) {
        return Ok(());
    }
    thread::sleep(EXIT_GRACE);
    if exited(child, instance) {
        return Ok(());
    }

    warn!(
        target: DRIVER_TARGET,
        instance,
        "driver did not exit within the grace period, killing"
    );
    kill_child(child)
}

/// Kills the child and reaps it.
pub(crate) fn kill_child(child: &mut Child) -> io::Result<()> {
    match child.kill() {
        Ok(()) => child.wait().map(drop),
        Err(error) if error.kind() == io::ErrorKind::InvalidInput => Ok(()),
        Err(error) => Err(error),
    }
}

fn exited(child: &mut Child, instance: &str) -> bool {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(target: DRIVER_TARGET, instance, ?status, "driver exited");
            true
        }
        Ok(None) => false,
        Err(error) => {
            warn!(
                target: DRIVER_TARGET,
                instance,
                error = %error,
                "failed to check driver status"
            );
            false
        }
    }
}
