#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub use agentpipe_test_utils::builders::RunPlanBuilder;
pub use agentpipe_test_utils::fake_agent::{write_agent_script, write_prompt};
pub use agentpipe_test_utils::{init_tracing, with_timeout};

/// Every file in `dir` whose name starts with `prefix`.
pub fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .expect("read work dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
        })
        .collect()
}

/// The prompt channel must be gone once a run has finished.
pub fn assert_no_prompt_channel(dir: &Path) {
    let leftovers = files_with_prefix(dir, "claude_prompt_pipe");
    assert!(leftovers.is_empty(), "prompt channel left behind: {leftovers:?}");
}
