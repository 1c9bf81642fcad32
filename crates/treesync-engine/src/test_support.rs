//! Helpers shared by unit tests.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use treesync_config::SyncToolConfig;

/// Write an executable shell script standing in for the sync tool.
pub(crate) fn fake_tool(dir: &Path, body: &str) -> SyncToolConfig {
    let path = dir.join("fake-rsync");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    SyncToolConfig {
        program: path.to_string_lossy().into_owned(),
        ..SyncToolConfig::default()
    }
}
