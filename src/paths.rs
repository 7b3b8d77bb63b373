use anyhow::Context;
use std::env;
use std::path::{Path, PathBuf};

/// Project-local override, looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".parley.toml";

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = env::var_os("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home))
}

fn ensure_dir(path: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))?;
    Ok(path.to_path_buf())
}

fn parley_home() -> Option<PathBuf> {
    env::var_os("PARLEY_HOME").map(PathBuf::from)
}

pub fn config_dir() -> anyhow::Result<PathBuf> {
    if let Some(base) = parley_home() {
        return ensure_dir(&base.join("config"));
    }

    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return ensure_dir(&xdg.join("parley"));
    }

    ensure_dir(&home_dir()?.join(".config").join("parley"))
}

/// Config files in load order: global first, then the working directory.
pub fn config_layers() -> anyhow::Result<Vec<PathBuf>> {
    let global = config_dir()?.join("config.toml");
    let local = env::current_dir()
        .context("failed to resolve working directory")?
        .join(LOCAL_CONFIG_FILE);
    Ok(vec![global, local])
}
