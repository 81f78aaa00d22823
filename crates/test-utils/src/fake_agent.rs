use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable `/bin/sh` script standing in for the agent binary.
///
/// The script receives the agent argv and reads the prompt on stdin.
pub fn write_agent_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-agent.sh");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake agent script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("make fake agent executable");
    path
}

/// Write a prompt file of `contents` and return its path.
pub fn write_prompt(dir: &Path, contents: &[u8]) -> PathBuf {
    let path = dir.join("prompt.txt");
    fs::write(&path, contents).expect("write prompt file");
    path
}
