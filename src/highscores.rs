//! Persist the best score to disk (XDG config or ~/.config/bitcrunch).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DIRNAME: &str = "bitcrunch";
const FILENAME: &str = "highscore";
/// Key of the single stored value.
const KEY: &str = "best";

#[derive(Debug, Error)]
pub enum HighScoreError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed high score line {0:?}")]
    Parse(String),
}

/// Config base directory: $XDG_CONFIG_HOME, else $HOME/.config, else cwd.
fn config_base() -> PathBuf {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from(".")),
    }
}

#[derive(Debug, Clone)]
pub struct HighScoreStore {
    path: PathBuf,
}

impl HighScoreStore {
    /// `<config dir>/bitcrunch/highscore`.
    pub fn default_location() -> Self {
        Self::at(config_base().join(DIRNAME).join(FILENAME))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored best score. A missing file is 0.
    pub fn load(&self) -> Result<u32, HighScoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(HighScoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        parse(&content)
    }

    /// Stored best, or 0 on any error (logged).
    pub fn load_or_zero(&self) -> u32 {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read best score");
            0
        })
    }

    /// Write `best`. Creates the config directory if needed.
    pub fn save(&self, best: u32) -> Result<(), HighScoreError> {
        let io_err = |source: std::io::Error| HighScoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut f = fs::File::create(&self.path).map_err(io_err)?;
        writeln!(f, "{KEY}={best}").map_err(io_err)?;
        tracing::info!(best, path = %self.path.display(), "best score saved");
        Ok(())
    }
}

fn parse(content: &str) -> Result<u32, HighScoreError> {
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((key, value)) = line.split_once('=') else {
            return Err(HighScoreError::Parse(line.to_string()));
        };
        if key.trim() == KEY {
            return value
                .trim()
                .parse()
                .map_err(|_| HighScoreError::Parse(line.to_string()));
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = HighScoreStore::at(dir.path().join("none"));
        assert_eq!(store.load().unwrap(), 0);
    }

    #[test]
    fn save_then_load_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = HighScoreStore::at(dir.path().join("nested/bitcrunch/highscore"));
        store.save(1234).unwrap();
        assert_eq!(store.load().unwrap(), 1234);
        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, "best=1234\n");
        store.save(99).unwrap();
        assert_eq!(store.load().unwrap(), 99);
    }

    #[test]
    fn garbage_is_an_error_but_load_or_zero_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("highscore");
        fs::write(&path, "best=lots\n").unwrap();
        let store = HighScoreStore::at(&path);
        assert!(matches!(store.load(), Err(HighScoreError::Parse(_))));
        assert_eq!(store.load_or_zero(), 0);
    }

    #[test]
    fn unknown_keys_are_skipped() {
        assert_eq!(parse("theme=dark\n best = 77 \n").unwrap(), 77);
        assert_eq!(parse("").unwrap(), 0);
    }
}
