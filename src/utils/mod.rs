pub mod size;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use which::which;

/// Finds the mongodump executable, either the explicitly configured one or
/// the first match on PATH.
pub fn find_mongodump_executable(configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(path) => which(path).with_context(|| {
            format!("mongodump executable {} not found or not executable", path.display())
        }),
        None => which("mongodump").context(
            "mongodump executable not found in PATH. Please ensure MongoDB database tools are installed and in your PATH.",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_executable_is_resolved() -> Result<()> {
        let sh = which("sh")?;
        assert_eq!(find_mongodump_executable(Some(&sh))?, sh);
        Ok(())
    }

    #[test]
    fn test_missing_configured_executable_errors() {
        let missing = Path::new("/nonexistent/bin/mongodump");
        assert!(find_mongodump_executable(Some(missing)).is_err());
    }
}
