use anyhow::Result;
use std::fs;
use std::path::Path;

/// Creates a few directories to export, each with a marker file.
pub fn setup_exports(base: &Path, exports: &[&str]) -> Result<()> {
    for export in exports {
        let dir = base.join(export.trim_start_matches('/'));
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("README"), format!("exported from {}\n", dir.display()))?;
    }
    Ok(())
}
