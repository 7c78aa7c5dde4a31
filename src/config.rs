//! Repository and working-tree configuration: `~/.config/hoard.ini`'s
//! `[defaults]` section layered under a `.hoard/config`'s single
//! `[repository.<name>]`-shaped section (§6 "Configuration file").
//! Grounded on the teacher's `config::load()` (home-dir discovery, missing
//! file tolerated as defaults) restructured around `configparser::ini::Ini`
//! sections instead of `toml`.

use std::fs;
use std::io;

use anyhow::{Context, Result, anyhow};
use camino::Utf8PathBuf;
use configparser::ini::Ini;

use crate::error::HoardError;

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_PARALLELISM: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendType {
    File,
    Memory,
}

/// A fully-resolved repository configuration: `[defaults]` with a
/// `[repository.<name>]` section layered on top.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub backend: BackendType,
    pub encode_command: Vec<String>,
    pub decode_command: Vec<String>,
    pub keep_versions: Option<u32>,
    pub keep_days: Option<u32>,
    pub parallelism: usize,
    pub timeout_secs: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::File,
            encode_command: vec!["cat".to_string()],
            decode_command: vec!["cat".to_string()],
            keep_versions: None,
            keep_days: None,
            parallelism: DEFAULT_PARALLELISM,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RepositoryConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Loads `~/.config/hoard.ini`'s `[defaults]` section, tolerating a missing
/// file as all-defaults (§7: config absence isn't an error).
fn load_user_defaults() -> Result<Ini> {
    let mut ini = Ini::new();
    let home: Utf8PathBuf = home::home_dir()
        .ok_or_else(|| anyhow!("couldn't find the home directory"))?
        .try_into()
        .context("home directory isn't UTF-8")?;
    let path = home.join(".config").join("hoard.ini");

    match fs::read_to_string(&path) {
        Ok(text) => {
            ini.read(text).map_err(|e| anyhow!("couldn't parse {path}: {e}"))?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("couldn't read {path}")),
    }
    Ok(ini)
}

/// Loads a working tree's `.hoard/config`, if present. The file holds bare
/// `key=value` lines (no section header of its own); they're parsed by
/// wrapping them in a synthetic `[repository.<name>]` header so the same
/// per-layer lookup code in [`resolve`] can treat it like any other
/// section (§6: "read as a single `[repository.<name>]`-shaped section").
fn load_tree_overlay(hoard_dir: &camino::Utf8Path, section: &str) -> Result<Ini> {
    let mut ini = Ini::new();
    let path = hoard_dir.join("config");
    match fs::read_to_string(&path) {
        Ok(text) => {
            let wrapped = format!("[{section}]\n{text}");
            ini.read(wrapped).map_err(|e| anyhow!("couldn't parse {path}: {e}"))?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("couldn't read {path}")),
    }
    Ok(ini)
}

/// Resolves just `~/.config/hoard.ini`'s `[defaults]` section, for callers
/// with no particular archive in view (e.g. listing every archive in a
/// repository).
pub fn resolve_defaults() -> Result<RepositoryConfig> {
    let user_ini = load_user_defaults()?;
    let mut config = RepositoryConfig::default();
    apply_layer(&mut config, &user_ini, "defaults")?;
    Ok(config)
}

/// Resolves a named repository's configuration from `~/.config/hoard.ini`
/// alone: `[defaults]` with `[repository.<name>]` layered on top. For
/// callers that don't have a working tree's `.hoard/config` in hand (e.g.
/// `restore` into a fresh directory).
pub fn resolve_user_only(name: &str) -> Result<RepositoryConfig> {
    let user_ini = load_user_defaults()?;
    let section = format!("repository.{name}");
    let mut config = RepositoryConfig::default();
    apply_layer(&mut config, &user_ini, "defaults")?;
    apply_layer(&mut config, &user_ini, &section)?;
    Ok(config)
}

/// Resolves a named repository's configuration, applying layers from least
/// to most specific: `~/.config/hoard.ini`'s `[defaults]`, that same file's
/// `[repository.<name>]` (if present), then the working tree's own
/// `.hoard/config` overlay.
pub fn resolve(hoard_dir: &camino::Utf8Path, name: &str) -> Result<RepositoryConfig> {
    let mut config = resolve_user_only(name)?;
    let section = format!("repository.{name}");
    let tree_ini = load_tree_overlay(hoard_dir, &section)?;
    apply_layer(&mut config, &tree_ini, &section)?;
    Ok(config)
}

fn apply_layer(config: &mut RepositoryConfig, ini: &Ini, section: &str) -> Result<()> {
    if let Some(v) = ini.get(section, "type") {
        config.backend = match v.as_str() {
            "memory" => BackendType::Memory,
            _ => BackendType::File,
        };
    }
    if let Some(v) = ini.get(section, "encode-command") {
        config.encode_command =
            split_command(&v).map_err(|e| anyhow!("bad encode-command {v:?}: {e}"))?;
    }
    if let Some(v) = ini.get(section, "decode-command") {
        config.decode_command =
            split_command(&v).map_err(|e| anyhow!("bad decode-command {v:?}: {e}"))?;
    }
    if let Some(v) = get_uint(ini, section, "trim.keep-versions")? {
        config.keep_versions = Some(v as u32);
    }
    if let Some(v) = get_uint(ini, section, "trim.keep-days")? {
        config.keep_days = Some(v as u32);
    }
    if let Some(v) = get_uint(ini, section, "parallelism")? {
        config.parallelism = v as usize;
    }
    if let Some(v) = get_uint(ini, section, "timeout-secs")? {
        config.timeout_secs = v;
    }
    Ok(())
}

fn get_uint(ini: &Ini, section: &str, key: &str) -> Result<Option<u64>> {
    ini.getuint(section, key)
        .map_err(|e| anyhow!("bad integer value for {key}: {e}"))
}

/// Splits a shell-style command string into argv honoring single/double
/// quotes and backslash escapes -- not full shell grammar (the open
/// question this resolves: no globbing, no variable expansion, no
/// pipelines).
pub fn split_command(s: &str) -> Result<Vec<String>, HoardError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = s.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else if c == '\\' && q == '"' {
                    if let Some(&next) = chars.peek() {
                        current.push(next);
                        chars.next();
                    }
                } else {
                    current.push(c);
                }
            }
            None => match c {
                ' ' | '\t' => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                '\'' | '"' => {
                    quote = Some(c);
                    in_word = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                        in_word = true;
                    }
                }
                _ => {
                    current.push(c);
                    in_word = true;
                }
            },
        }
    }

    if quote.is_some() {
        return Err(HoardError::InvalidIndex(format!(
            "unterminated quote in command {s:?}"
        )));
    }
    if in_word {
        words.push(current);
    }
    if words.is_empty() {
        return Err(HoardError::InvalidIndex(format!("empty command {s:?}")));
    }
    Ok(words)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn splits_simple_words() {
        assert_eq!(split_command("cat").unwrap(), vec!["cat"]);
        assert_eq!(
            split_command("gpg --encrypt --recipient me").unwrap(),
            vec!["gpg", "--encrypt", "--recipient", "me"]
        );
    }

    #[test]
    fn honors_quotes_and_escapes() {
        assert_eq!(
            split_command(r#"sh -c "echo hi""#).unwrap(),
            vec!["sh", "-c", "echo hi"]
        );
        assert_eq!(split_command(r"a\ b c").unwrap(), vec!["a b", "c"]);
    }

    #[test]
    fn rejects_unterminated_quote() {
        assert!(split_command("\"unterminated").is_err());
    }

    #[test]
    fn rejects_empty_command() {
        assert!(split_command("   ").is_err());
    }

    #[test]
    fn default_config_has_sane_values() {
        let config = RepositoryConfig::default();
        assert_eq!(config.parallelism, 1);
        assert_eq!(config.timeout_secs, 60);
    }
}
