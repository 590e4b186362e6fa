// SPDX-License-Identifier: GPL-3.0-only

//! Running external tools

use crate::{Result, SysError};

/// Whether `command` can be found on `PATH`
pub fn tool_available(command: &str) -> bool {
    which::which(command).is_ok()
}

fn ensure_available(command: &str) -> Result<()> {
    if tool_available(command) {
        Ok(())
    } else {
        Err(SysError::ToolMissing(command.to_string()))
    }
}

fn finish(command: &str, args: &[&str], output: std::process::Output) -> Result<String> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SysError::CommandFailed {
            command: format!("{command} {}", args.join(" ")),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Run `command` and return its standard output
pub fn run_command(command: &str, args: &[&str]) -> Result<String> {
    ensure_available(command)?;
    tracing::debug!("running {command} {}", args.join(" "));
    let output = duct::cmd(command, args)
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()?;
    finish(command, args, output)
}

/// Run `command` with `input` on its standard input
pub fn run_with_input(command: &str, args: &[&str], input: &str) -> Result<String> {
    ensure_available(command)?;
    tracing::debug!("running {command} {} with scripted input", args.join(" "));
    let output = duct::cmd(command, args)
        .stdin_bytes(input.as_bytes().to_vec())
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()?;
    finish(command, args, output)
}

/// Split a `KEY=value` line as printed by `blkid -o export` and friends
pub fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}
