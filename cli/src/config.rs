use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const DB_FILE: &str = "bob.db";
const API_KEY_FILE: &str = "api_key";
const API_KEY_BYTES: usize = 32;

/// Filesystem home for bob's state: the SQLite database and the server's
/// API key live side by side in one data directory. `BOB_DATA_DIR`
/// overrides the platform default so scripts can point at a scratch dir.
pub struct Config {
    data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os("BOB_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => ProjectDirs::from("", "", "bob")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        Self::at(data_dir)
    }

    pub fn at(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        Ok(Config { data_dir })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }

    fn api_key_path(&self) -> PathBuf {
        self.data_dir.join(API_KEY_FILE)
    }

    /// Bearer token for `bob serve`. Reuses the stored key when one exists,
    /// otherwise generates a fresh one and persists it with owner-only
    /// permissions.
    pub fn api_key(&self) -> Result<ApiKey> {
        let path = self.api_key_path();
        if let Some(key) = read_key_file(&path)? {
            return Ok(ApiKey {
                key,
                generated: false,
            });
        }

        let key = random_hex_key();
        std::fs::write(&path, &key)
            .with_context(|| format!("Failed to write API key file: {}", path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        Ok(ApiKey {
            key,
            generated: true,
        })
    }
}

/// An API key plus whether this process just minted it, so `serve` can
/// announce a fresh key exactly once.
pub struct ApiKey {
    key: String,
    generated: bool,
}

impl ApiKey {
    pub fn reveal(&self) -> &str {
        &self.key
    }

    pub fn is_new(&self) -> bool {
        self.generated
    }

    /// Abbreviated form for log output. The key file is user-editable, so
    /// keys too short to elide safely are hidden entirely.
    pub fn masked(&self) -> String {
        mask_key(&self.key)
    }

    pub fn into_inner(self) -> String {
        self.key
    }
}

fn read_key_file(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let stored = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read API key file: {}", path.display()))?;
    let stored = stored.trim();
    if stored.is_empty() {
        return Ok(None);
    }
    Ok(Some(stored.to_string()))
}

fn random_hex_key() -> String {
    use rand::Rng;
    use std::fmt::Write;

    let bytes: [u8; API_KEY_BYTES] = rand::rng().random();
    bytes
        .iter()
        .fold(String::with_capacity(API_KEY_BYTES * 2), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

pub fn mask_key(key: &str) -> String {
    if key.len() >= 8 && key.is_ascii() {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        "****".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_generated_once_then_reused() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at(dir.path()).unwrap();

        let first = config.api_key().unwrap();
        assert!(first.is_new());
        assert_eq!(first.reveal().len(), API_KEY_BYTES * 2);
        assert!(first.reveal().chars().all(|c| c.is_ascii_hexdigit()));

        let second = config.api_key().unwrap();
        assert!(!second.is_new());
        assert_eq!(second.reveal(), first.reveal());
    }

    #[test]
    fn test_api_key_ignores_blank_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at(dir.path()).unwrap();
        std::fs::write(dir.path().join(API_KEY_FILE), "  \n").unwrap();

        let key = config.api_key().unwrap();
        assert!(key.is_new());
        assert!(!key.reveal().is_empty());
    }

    #[test]
    fn test_db_path_lives_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at(dir.path()).unwrap();
        assert_eq!(config.db_path(), dir.path().join("bob.db"));
    }

    #[test]
    fn test_mask_key_elides_the_middle() {
        assert_eq!(mask_key("abcd1234wxyz"), "abcd...wxyz");
    }

    // A hand-edited key file can hold anything; masking must not slice
    // short or non-ASCII keys.
    #[test]
    fn test_mask_key_hides_short_or_non_ascii_keys() {
        assert_eq!(mask_key("short"), "****");
        assert_eq!(mask_key(""), "****");
        assert_eq!(mask_key("clé-secrète-émise"), "****");
    }
}
