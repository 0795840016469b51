//! Resolves the application's home directory: an explicit override, a
//! `~`-prefixed user path, or the platform default.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

fn platform_home() -> Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        env::var_os("APPDATA")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("APPDATA is not set"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set"))
    }
}

fn expand_tilde(path: &str, home: &std::path::Path) -> PathBuf {
    match path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        Some(rest) => home.join(rest),
        None if path == "~" => home.to_path_buf(),
        None => PathBuf::from(path),
    }
}

/// Resolve `override_path` against the platform home directory, falling
/// back to `<platform_home>/<default_subdir>` when unset. Expands a leading
/// `~`. Creates the resolved directory when `create` is true.
pub fn resolve_home_dir(
    override_path: Option<String>,
    default_subdir: &str,
    create: bool,
) -> Result<PathBuf> {
    let home = platform_home().context("resolving platform home directory")?;

    let resolved = match override_path {
        Some(p) if !p.trim().is_empty() => expand_tilde(p.trim(), &home),
        _ => home.join(default_subdir),
    };

    if create {
        std::fs::create_dir_all(&resolved)
            .with_context(|| format!("creating home_dir at {}", resolved.display()))?;
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_tilde_against_home() {
        let home = PathBuf::from("/home/demo");
        assert_eq!(expand_tilde("~/.app", &home), PathBuf::from("/home/demo/.app"));
    }

    #[test]
    fn leaves_absolute_paths_untouched() {
        let home = PathBuf::from("/home/demo");
        assert_eq!(expand_tilde("/etc/app", &home), PathBuf::from("/etc/app"));
    }
}
