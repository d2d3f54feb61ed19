//! Persist the best score to disk (XDG config or ~/.config/puyotui).

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FILENAME: &str = "best";

/// Returns the path to the best score file (config dir / puyotui / best).
pub fn config_path() -> PathBuf {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    };
    base.join("puyotui").join(FILENAME)
}

/// Load the best score. 0 on missing file or parse error.
pub fn load_best(path: &Path) -> u32 {
    match fs::read_to_string(path) {
        Ok(content) => content
            .lines()
            .next()
            .and_then(|l| l.trim().parse::<u32>().ok())
            .unwrap_or_else(|| {
                warn!(path = %path.display(), "unreadable best score, starting from 0");
                0
            }),
        Err(_) => {
            debug!(path = %path.display(), "no best score yet");
            0
        }
    }
}

/// Save the best score. Creates the config directory if needed.
pub fn save_best(path: &Path, best: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{best}\n"))?;
    debug!(path = %path.display(), best, "saved best score");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("puyotui-test-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn missing_file_reads_as_zero() {
        let dir = scratch_dir("missing");
        assert_eq!(load_best(&dir.join("best")), 0);
    }

    #[test]
    fn save_then_load() {
        let dir = scratch_dir("roundtrip");
        let path = dir.join("nested").join("best");
        save_best(&path, 1230).unwrap();
        assert_eq!(load_best(&path), 1230);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn garbage_reads_as_zero() {
        let dir = scratch_dir("garbage");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("best");
        fs::write(&path, "not a number\n").unwrap();
        assert_eq!(load_best(&path), 0);
        let _ = fs::remove_dir_all(&dir);
    }
}
