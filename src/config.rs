use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::convert::DEFAULT_PLACEHOLDER;

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_CONTENT_FIELD: &str = "Notes";
pub const DEFAULT_ATTACHMENT_FIELD: &str = "Files";
pub const DEFAULT_IMAGE_WIDTH: u32 = 900;
pub const DEFAULT_SCRIPT_URL: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/tinymce/5.2.0/tinymce.min.js";

/// Resolved settings for an editor session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub debounce_ms: u64,
    pub content_field: String,
    pub attachment_field: String,
    pub image_width: u32,
    pub script_url: String,
    pub placeholder: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            content_field: DEFAULT_CONTENT_FIELD.to_string(),
            attachment_field: DEFAULT_ATTACHMENT_FIELD.to_string(),
            image_width: DEFAULT_IMAGE_WIDTH,
            script_url: DEFAULT_SCRIPT_URL.to_string(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub verbose: bool,
    pub debounce_ms: Option<u64>,
    pub content_field: Option<String>,
    pub attachment_field: Option<String>,
    pub image_width: Option<u32>,
    pub script_url: Option<String>,
    pub placeholder: Option<String>,
}

impl ConfigFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            watch: self.watch || other.watch,
            verbose: self.verbose || other.verbose,
            debounce_ms: other.debounce_ms.or(self.debounce_ms),
            content_field: other
                .content_field
                .clone()
                .or_else(|| self.content_field.clone()),
            attachment_field: other
                .attachment_field
                .clone()
                .or_else(|| self.attachment_field.clone()),
            image_width: other.image_width.or(self.image_width),
            script_url: other.script_url.clone().or_else(|| self.script_url.clone()),
            placeholder: other
                .placeholder
                .clone()
                .or_else(|| self.placeholder.clone()),
        }
    }

    /// Fill unset options with defaults.
    pub fn settings(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        SessionConfig {
            debounce_ms: self.debounce_ms.unwrap_or(defaults.debounce_ms),
            content_field: self.content_field.clone().unwrap_or(defaults.content_field),
            attachment_field: self
                .attachment_field
                .clone()
                .unwrap_or(defaults.attachment_field),
            image_width: self.image_width.unwrap_or(defaults.image_width),
            script_url: self.script_url.clone().unwrap_or(defaults.script_url),
            placeholder: self.placeholder.clone().unwrap_or(defaults.placeholder),
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("richnote").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("richnote")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("richnote").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("richnote")
                .join("config");
        }
    }

    PathBuf::from(".richnoterc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".richnoterc")
}

/// Read a config file: one flag per line, the value (if any) is the rest of the line.
pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| match line.split_once(char::is_whitespace) {
            Some((flag, value)) => vec![flag.to_string(), value.trim().to_string()],
            None => vec![line.to_string()],
        })
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = Vec::new();
    lines.push("# richnote defaults (saved with --save)".to_string());
    if flags.watch {
        lines.push("--watch".to_string());
    }
    if flags.verbose {
        lines.push("--verbose".to_string());
    }
    if let Some(ms) = flags.debounce_ms {
        lines.push(format!("--debounce-ms {ms}"));
    }
    if let Some(field) = &flags.content_field {
        lines.push(format!("--content-field {field}"));
    }
    if let Some(field) = &flags.attachment_field {
        lines.push(format!("--attachment-field {field}"));
    }
    if let Some(width) = flags.image_width {
        lines.push(format!("--image-width {width}"));
    }
    if let Some(url) = &flags.script_url {
        lines.push(format!("--script-url {url}"));
    }
    if let Some(text) = &flags.placeholder {
        lines.push(format!("--placeholder {text}"));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        if token == "--watch" {
            flags.watch = true;
        } else if token == "--verbose" || token == "-v" {
            flags.verbose = true;
        } else if let Some((flag, value)) = flag_value(tokens, &mut i) {
            match flag {
                "--debounce-ms" => flags.debounce_ms = value.parse().ok(),
                "--content-field" => flags.content_field = Some(value),
                "--attachment-field" => flags.attachment_field = Some(value),
                "--image-width" => flags.image_width = value.parse().ok(),
                "--script-url" => flags.script_url = Some(value),
                "--placeholder" => flags.placeholder = Some(value),
                _ => {}
            }
        }
        i += 1;
    }
    flags
}

const VALUE_FLAGS: &[&str] = &[
    "--debounce-ms",
    "--content-field",
    "--attachment-field",
    "--image-width",
    "--script-url",
    "--placeholder",
];

/// Match `--flag value` (advancing `i` past the value) or `--flag=value`.
fn flag_value(tokens: &[String], i: &mut usize) -> Option<(&'static str, String)> {
    let token = tokens[*i].as_str();
    for &flag in VALUE_FLAGS {
        if token == flag {
            let value = tokens.get(*i + 1)?.clone();
            *i += 1;
            return Some((flag, value));
        }
        if let Some(value) = token
            .strip_prefix(flag)
            .and_then(|rest| rest.strip_prefix('='))
        {
            return Some((flag, value.to_string()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let args = vec![
            "richnote".to_string(),
            "--watch".to_string(),
            "--debounce-ms".to_string(),
            "250".to_string(),
            "--content-field=Body".to_string(),
            "--image-width".to_string(),
            "640".to_string(),
            "edit".to_string(),
        ];
        let flags = parse_flag_tokens(&args);
        assert!(flags.watch);
        assert_eq!(flags.debounce_ms, Some(250));
        assert_eq!(flags.content_field.as_deref(), Some("Body"));
        assert_eq!(flags.image_width, Some(640));
        assert_eq!(flags.attachment_field, None);
    }

    #[test]
    fn test_unparseable_number_is_ignored() {
        let args = vec!["--debounce-ms".to_string(), "soon".to_string()];
        assert_eq!(parse_flag_tokens(&args).debounce_ms, None);
    }

    #[test]
    fn test_config_union_merges_cli_over_file_for_options() {
        let file = ConfigFlags {
            watch: true,
            debounce_ms: Some(300),
            content_field: Some("Body".to_string()),
            ..ConfigFlags::default()
        };
        let cli = ConfigFlags {
            verbose: true,
            debounce_ms: Some(100),
            ..ConfigFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.watch);
        assert!(merged.verbose);
        assert_eq!(merged.debounce_ms, Some(100));
        assert_eq!(merged.content_field.as_deref(), Some("Body"));
    }

    #[test]
    fn test_settings_fill_defaults() {
        let settings = ConfigFlags::default().settings();
        assert_eq!(settings, SessionConfig::default());
        assert_eq!(settings.debounce_ms, 500);
        assert_eq!(settings.content_field, "Notes");
        assert_eq!(settings.attachment_field, "Files");
        assert_eq!(settings.image_width, 900);
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".richnoterc");
        let flags = ConfigFlags {
            watch: true,
            verbose: true,
            debounce_ms: Some(750),
            content_field: Some("Body".to_string()),
            attachment_field: Some("Images".to_string()),
            image_width: Some(480),
            script_url: Some("https://cdn/editor.js".to_string()),
            placeholder: Some("Start typing here".to_string()),
        };

        save_config_flags(&path, &flags).unwrap();
        let loaded = load_config_flags(&path).unwrap();
        assert_eq!(loaded, flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempdir().unwrap();
        let loaded = load_config_flags(&dir.path().join("absent")).unwrap();
        assert_eq!(loaded, ConfigFlags::default());
    }
}
