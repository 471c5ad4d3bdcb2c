use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

pub const DEFAULT_DB_URL: &str = "sqlite://dev.sqlite3";

/// Turn a bare path or `sqlite:` URL into an absolute `sqlite://` URL.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Make sure the database file and its directory exist before connecting.
pub fn prepare_file(db_url: &str) -> Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let Some(rest) = db_url.strip_prefix("sqlite://") else {
        bail!("invalid database url: {db_url}");
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() {
        bail!("invalid database url: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_pass_through() {
        assert_eq!(normalize("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(normalize(" sqlite:///tmp/x.db "), "sqlite:///tmp/x.db");
    }

    #[test]
    fn absolute_paths_gain_scheme() {
        assert_eq!(normalize("/var/exam.sqlite3"), "sqlite:///var/exam.sqlite3");
        assert_eq!(normalize("sqlite:/var/exam.sqlite3"), "sqlite:///var/exam.sqlite3");
    }

    #[test]
    fn relative_paths_become_absolute() {
        let url = normalize("data/exam.sqlite3");
        let path = url.strip_prefix("sqlite://").unwrap();
        assert!(Path::new(path).is_absolute());
        assert!(path.ends_with("data/exam.sqlite3"));
    }

    #[test]
    fn malformed_urls_are_rejected() {
        assert!(prepare_file("sqlite://").is_err());
        assert!(prepare_file("postgres://db").is_err());
        assert!(prepare_file("sqlite::memory:").is_ok());
    }
}
