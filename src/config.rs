use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub browse: BrowseConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Path fragments that mark a JSON member as a post container.
    #[serde(default = "default_post_path_segments")]
    pub post_path_segments: Vec<String>,
    /// Decompression ceiling for a single archive member.
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: u64,
    /// Globs used to pick archives out of a directory.
    #[serde(default = "default_archive_globs")]
    pub archive_globs: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            post_path_segments: default_post_path_segments(),
            max_entry_bytes: default_max_entry_bytes(),
            archive_globs: default_archive_globs(),
        }
    }
}

fn default_post_path_segments() -> Vec<String> {
    vec![
        "your_facebook_activity/posts/".to_string(),
        "this_profile's_activity_across_facebook/posts/".to_string(),
    ]
}
fn default_max_entry_bytes() -> u64 {
    512 * 1024 * 1024
}
fn default_archive_globs() -> Vec<String> {
    vec!["**/*.zip".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct DigestConfig {
    #[serde(default = "default_digest_provider")]
    pub provider: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            provider: default_digest_provider(),
        }
    }
}

fn default_digest_provider() -> String {
    "auto".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowseConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_summary_length")]
    pub summary_length: usize,
    #[serde(default = "default_error_display_limit")]
    pub error_display_limit: usize,
    /// `local` or `utc`; governs month grouping and date display.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            summary_length: default_summary_length(),
            error_display_limit: default_error_display_limit(),
            timezone: default_timezone(),
        }
    }
}

fn default_page_size() -> usize {
    50
}
fn default_summary_length() -> usize {
    60
}
fn default_error_display_limit() -> usize {
    8
}
fn default_timezone() -> String {
    "local".to_string()
}

impl BrowseConfig {
    pub fn use_utc(&self) -> bool {
        self.timezone == "utc"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to defaults.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    // Validate ingest
    if config.ingest.post_path_segments.is_empty()
        || config
            .ingest
            .post_path_segments
            .iter()
            .any(|s| s.trim().is_empty())
    {
        anyhow::bail!("ingest.post_path_segments must contain at least one non-empty segment");
    }
    if config.ingest.max_entry_bytes == 0 {
        anyhow::bail!("ingest.max_entry_bytes must be > 0");
    }

    // Validate browse
    if config.browse.page_size == 0 {
        anyhow::bail!("browse.page_size must be >= 1");
    }
    if config.browse.summary_length == 0 {
        anyhow::bail!("browse.summary_length must be >= 1");
    }
    match config.browse.timezone.as_str() {
        "local" | "utc" => {}
        other => anyhow::bail!(
            "Unknown browse.timezone: '{}'. Must be local or utc.",
            other
        ),
    }

    // Validate digest
    match config.digest.provider.as_str() {
        "auto" | "library" | "builtin" => {}
        other => anyhow::bail!(
            "Unknown digest provider: '{}'. Must be auto, library, or builtin.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_file_yields_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.browse.page_size, 50);
        assert_eq!(config.browse.summary_length, 60);
        assert_eq!(config.browse.error_display_limit, 8);
        assert_eq!(config.ingest.post_path_segments.len(), 2);
        assert_eq!(config.digest.provider, "auto");
    }

    #[test]
    fn overrides_are_applied() {
        let file = write_config(
            r#"
[ingest]
post_path_segments = ["exports/posts/"]

[browse]
page_size = 10
timezone = "utc"
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.ingest.post_path_segments, vec!["exports/posts/"]);
        assert_eq!(config.browse.page_size, 10);
        assert!(config.browse.use_utc());
        assert_eq!(config.browse.summary_length, 60);
    }

    #[test]
    fn zero_page_size_rejected() {
        let file = write_config("[browse]\npage_size = 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn unknown_digest_provider_rejected() {
        let file = write_config("[digest]\nprovider = \"md5\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("digest provider"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:7341");
    }
}
