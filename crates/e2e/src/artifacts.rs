//! Failure artifacts captured before a session is released

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::FlowResult;

/// A file written for a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

/// Writes screenshots under `<root>/screenshots`
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    screenshot_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: &Path) -> FlowResult<Self> {
        let screenshot_dir = root.join("screenshots");
        std::fs::create_dir_all(&screenshot_dir)?;
        Ok(Self { screenshot_dir })
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    /// Save a PNG for `scenario`, replacing one from an earlier run
    pub fn save_screenshot(&self, scenario: &str, png: &[u8]) -> FlowResult<Artifact> {
        let path = self.screenshot_dir.join(format!("{}.png", file_stem(scenario)));
        std::fs::write(&path, png)?;

        let sha256 = sha256_hex(png);

        info!("Saved screenshot for '{}' to {}", scenario, path.display());
        Ok(Artifact {
            path,
            sha256,
            bytes: png.len() as u64,
        })
    }

    /// Remove screenshots left over from earlier runs
    pub fn clean(&self) -> FlowResult<()> {
        for entry in std::fs::read_dir(&self.screenshot_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Readable part of the name plus a digest of the whole name, so names that
/// sanitize alike still get their own file
fn file_stem(name: &str) -> String {
    let readable: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}-{}", readable, &sha256_hex(name.as_bytes())[..8])
}
