use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::Path;

/// Parses and validates configuration text
///
/// # Arguments
///
/// * `content` - TOML document with at least a `[site]` section
///
/// # Returns
///
/// * `Ok(Config)` - Parsed configuration that passed validation
/// * `Err(ConfigError)` - The text is not valid TOML or a value is out of range
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads and validates the configuration file at `path`
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use listing_harvester::config::load_config;
///
/// let config = load_config(Path::new("harvester.toml")).unwrap();
/// println!("Page stride: {}", config.crawler.page_stride);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    parse_config(&read_config_file(path)?)
}

/// Hex-encoded SHA-256 of configuration text
pub fn hash_config_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Loads a configuration and the SHA-256 of the text it was parsed from
///
/// The hash is stored with each run, so runs can later be matched to the exact
/// file they were started with. The file is read once, so the hash always
/// describes the parsed content.
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = read_config_file(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_config_content(&content)))
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::NotFound(path.display().to_string()),
        _ => ConfigError::Io(e),
    })
}
