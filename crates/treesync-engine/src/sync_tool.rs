//! Invocation of the external directory-synchronization tool.

use std::process::Stdio;

use tokio::process::Command;
use treesync_config::SyncToolConfig;

/// Which kind of run to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Report what would change without touching the target.
    Preview,
    /// Make the target mirror the source.
    Mirror,
}

/// Build the argument list for one invocation.
///
/// Both paths get a trailing `/` so the tool copies directory contents rather
/// than nesting the source directory inside the target.
pub fn args(config: &SyncToolConfig, mode: SyncMode, source: &str, target: &str) -> Vec<String> {
    let mut args = config.base_args.clone();
    if mode == SyncMode::Preview {
        args.extend(config.preview_args.iter().cloned());
    }
    args.push(dir_arg(source));
    args.push(dir_arg(target));
    args
}

/// Build a command with stdin closed.
pub fn build_command(
    config: &SyncToolConfig,
    mode: SyncMode,
    source: &str,
    target: &str,
) -> Command {
    let mut cmd = Command::new(&config.program);
    cmd.args(args(config, mode, source, target))
        .stdin(Stdio::null());
    cmd
}

/// Whether one line of itemized preview output describes a pending change.
///
/// Itemized lines whose update type is `.` only change attributes.
pub fn is_change_line(line: &str, include_metadata: bool) -> bool {
    let line = line.trim_end();
    if line.is_empty() {
        return false;
    }
    include_metadata || !line.starts_with('.')
}

/// Make a job ID safe for use in a file name.
pub fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn dir_arg(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}
