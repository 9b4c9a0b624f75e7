use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

pub const SCREENSHOT1_FILE: &str = "screenshot1.png";
pub const SCREENSHOT2_FILE: &str = "screenshot2.png";
pub const DIFF_FILE: &str = "diff.png";

fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
}

fn write_png(dir: &Path, name: &str, png: &[u8]) -> Result<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(name);
    std::fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), bytes = png.len(), "wrote file");
    Ok(path)
}

/// Write capture `n` (1 or 2) as `screenshotN.png`, replacing any earlier one.
pub fn write_screenshot(out_dir: &Path, n: u8, png: &[u8]) -> Result<PathBuf> {
    let name = if n == 1 { SCREENSHOT1_FILE } else { SCREENSHOT2_FILE };
    write_png(out_dir, name, png)
}

/// Write `diff.png`. An empty diff writes nothing and removes a stale
/// `diff.png` left by an earlier run.
pub fn write_diff(out_dir: &Path, diff_png: &[u8]) -> Result<Option<PathBuf>> {
    if !diff_png.is_empty() {
        return write_png(out_dir, DIFF_FILE, diff_png).map(Some);
    }
    let stale = out_dir.join(DIFF_FILE);
    if stale.exists() {
        std::fs::remove_file(&stale)
            .with_context(|| format!("Failed to remove {}", stale.display()))?;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screenshots_land_in_a_created_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/out");
        let first = write_screenshot(&out, 1, b"first").unwrap();
        let second = write_screenshot(&out, 2, b"second").unwrap();

        assert_eq!(first, out.join("screenshot1.png"));
        assert_eq!(second, out.join("screenshot2.png"));
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"second");
    }

    #[test]
    fn overwrites_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("screenshot1.png"), b"old").unwrap();
        std::fs::write(dir.path().join("diff.png"), b"old").unwrap();
        write_screenshot(dir.path(), 1, b"first").unwrap();
        let diff = write_diff(dir.path(), b"diff").unwrap();

        assert_eq!(std::fs::read(dir.path().join("screenshot1.png")).unwrap(), b"first");
        assert_eq!(std::fs::read(diff.unwrap()).unwrap(), b"diff");
    }

    #[test]
    fn empty_diff_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("diff.png"), b"stale").unwrap();
        assert!(write_diff(dir.path(), &[]).unwrap().is_none());
        assert!(!dir.path().join("diff.png").exists());
    }
}
