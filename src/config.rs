use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_leaderboard_size() -> usize {
    10
}

fn default_suggestion_size() -> usize {
    4
}

fn default_model() -> String {
    "vader".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasConfig {
    pub database: Option<String>,
    /// Entries per home-tab leaderboard
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
    /// Entries in an emoji suggestion modal
    #[serde(default = "default_suggestion_size")]
    pub suggestion_size: usize,
    /// Model name analyses are stored under
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            database: None,
            leaderboard_size: default_leaderboard_size(),
            suggestion_size: default_suggestion_size(),
            model: default_model(),
        }
    }
}

impl AtlasConfig {
    /// Database path from the config, falling back to `.emoji-atlas/atlas.db` under `base`
    pub fn database_path_in(&self, base: &Path) -> PathBuf {
        self.database
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_database_path_in(base))
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("emoji-atlas.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".emoji-atlas").join("atlas.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<AtlasConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: AtlasConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &AtlasConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).unwrap().is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emoji-atlas.toml");
        std::fs::write(&path, "database = \"reactions.db\"\nleaderboard_size = 5\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.database.as_deref(), Some("reactions.db"));
        assert_eq!(config.leaderboard_size, 5);
        assert_eq!(config.suggestion_size, 4);
        assert_eq!(config.model, "vader");
    }

    #[test]
    fn test_write_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emoji-atlas.toml");
        let config = AtlasConfig::default();

        write_config(&path, &config, false).unwrap();
        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(config));
    }

    #[test]
    fn test_ensure_db_dir_and_default_path() {
        let dir = tempfile::tempdir().unwrap();
        let db = AtlasConfig::default().database_path_in(dir.path());
        assert_eq!(db, dir.path().join(".emoji-atlas").join("atlas.db"));

        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
    }
}
