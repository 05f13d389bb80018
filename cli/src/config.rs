use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "sugarlog").context("Could not determine home directory")?;
        Self::in_dir(proj_dirs.data_dir().to_path_buf())
    }

    /// Use `data_dir` for the database and API key, creating it if needed.
    pub fn in_dir(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("sugarlog.db");
        tracing::debug!(path = %db_path.display(), "using database");

        Ok(Config { db_path, data_dir })
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        tracing::info!(path = %path.display(), "generated new API key");
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("sugarlog");
        let config = Config::in_dir(dir.clone()).unwrap();
        assert!(dir.is_dir());
        assert_eq!(config.db_path, dir.join("sugarlog.db"));
    }

    #[test]
    fn api_key_is_generated_once() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::in_dir(tmp.path().to_path_buf()).unwrap();

        let (key, created) = config.load_or_create_api_key().unwrap();
        assert!(created);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));

        let (again, created) = config.load_or_create_api_key().unwrap();
        assert!(!created);
        assert_eq!(again, key);
    }

    #[cfg(unix)]
    #[test]
    fn api_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let config = Config::in_dir(tmp.path().to_path_buf()).unwrap();
        config.load_or_create_api_key().unwrap();

        let mode = std::fs::metadata(tmp.path().join("api_key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
