// SPDX-License-Identifier: GPL-3.0-only

use super::cmd::run_command;

/// Wait for udev to process queued events, giving up after `timeout_secs`.
///
/// A timeout or a missing udevadm is logged and otherwise ignored.
pub fn settle(timeout_secs: u64) {
    let timeout = format!("--timeout={timeout_secs}");
    if let Err(error) = run_command("udevadm", &["settle", &timeout]) {
        tracing::debug!("udevadm settle did not complete: {error}");
    }
}
