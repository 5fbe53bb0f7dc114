//! `deexport.config` parser
//!
//! Line oriented:
//!
//! ```text
//! # comment
//! export.scaling 0.01
//! armature.bones.ignore 'ik_.*' 'ctrl_.*'
//! armature.bones.ignore 'helper'
//! ```
//!
//! Each entry is a key followed by one or more values. Values are single-quoted
//! strings (backslash escapes the next character) or signed decimals. Repeating a key
//! appends another value list.

use anyhow::{Context, Result};
use hashbrown::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Name of the sidecar file looked up next to the scene.
pub const CONFIG_FILE_NAME: &str = "deexport.config";

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Number(f64),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(value) => Some(value),
            ConfigValue::Number(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(value) => Some(*value),
            ConfigValue::String(value) => value.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("line {line}: invalid key '{key}'")]
    InvalidKey { line: usize, key: String },

    #[error("line {line}: key '{key}' has no value")]
    MissingValue { line: usize, key: String },

    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },

    #[error("line {line}: invalid value '{text}'")]
    InvalidValue { line: usize, text: String },
}

/// Parsed configuration. Keys map to every value list declared for them, in file order.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    entries: HashMap<String, Vec<Vec<ConfigValue>>>,
}

impl Configuration {
    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Load `deexport.config` from a directory if present, otherwise defaults.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            tracing::debug!("Using configuration {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut entries: HashMap<String, Vec<Vec<ConfigValue>>> = HashMap::new();
        for (index, line) in text.lines().enumerate() {
            if let Some((key, values)) = parse_line(line, index + 1)? {
                entries.entry(key).or_default().push(values);
            }
        }
        Ok(Self { entries })
    }

    /// First value of the first list declared for `key`.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries
            .get(key)
            .and_then(|lists| lists.first())
            .and_then(|values| values.first())
    }

    /// Every value list declared for `key`.
    pub fn get_all(&self, key: &str) -> &[Vec<ConfigValue>] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(ConfigValue::as_f64).map(|v| v as f32)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ConfigValue::as_f64).map(|v| v != 0.0)
    }

    /// All string values of all lists declared for `key`, flattened.
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.get_all(key)
            .iter()
            .flatten()
            .filter_map(ConfigValue::as_str)
            .map(str::to_string)
            .collect()
    }

    // ========================================================================
    // Known keys
    // ========================================================================

    pub fn scaling(&self) -> f32 {
        self.get_f32("export.scaling").unwrap_or(1.0)
    }

    pub fn fps(&self) -> Option<f32> {
        self.get_f32("export.fps").filter(|fps| *fps > 0.0)
    }

    pub fn bone_ignore_filters(&self) -> Vec<String> {
        self.strings("armature.bones.ignore")
    }

    pub fn threshold_position(&self) -> Option<f32> {
        self.get_f32("animation.threshold.position")
    }

    pub fn threshold_rotation(&self) -> Option<f32> {
        self.get_f32("animation.threshold.rotation")
    }

    pub fn threshold_scale(&self) -> Option<f32> {
        self.get_f32("animation.threshold.scale")
    }

    pub fn threshold_weight(&self) -> Option<f32> {
        self.get_f32("animation.threshold.weight")
    }

    pub fn variable_scale_limit(&self) -> Option<f32> {
        self.get_f32("animation.limits.variable.scale")
    }

    pub fn short_format(&self) -> Option<bool> {
        self.get_bool("animation.shortFormat")
    }

    pub fn move_filters(&self) -> Vec<String> {
        self.strings("moves.filter")
    }

    pub fn log_level(&self) -> Option<tracing::Level> {
        self.get("log.level")
            .and_then(ConfigValue::as_str)
            .and_then(|level| tracing::Level::from_str(level).ok())
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
}

fn tokenize(line: &str, number: usize) -> Result<Vec<Token>, ConfigError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '\'' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some(escaped) => value.push(escaped),
                        None => break,
                    },
                    '\'' => {
                        closed = true;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            if !closed {
                return Err(ConfigError::UnterminatedString { line: number });
            }
            tokens.push(Token::Str(value));
        } else {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Word(word));
        }
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

fn parse_line(line: &str, number: usize) -> Result<Option<(String, Vec<ConfigValue>)>, ConfigError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = tokenize(trimmed, number)?.into_iter();
    let key = match tokens.next() {
        Some(Token::Word(word)) if is_valid_key(&word) => word,
        Some(Token::Word(word)) => return Err(ConfigError::InvalidKey { line: number, key: word }),
        Some(Token::Str(text)) => return Err(ConfigError::InvalidKey { line: number, key: text }),
        None => return Ok(None),
    };

    let mut values = Vec::new();
    for token in tokens {
        match token {
            Token::Str(text) => values.push(ConfigValue::String(text)),
            Token::Word(text) => {
                if !is_decimal(&text) {
                    return Err(ConfigError::InvalidValue { line: number, text });
                }
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ConfigError::InvalidValue { line: number, text: text.clone() })?;
                values.push(ConfigValue::Number(value));
            }
        }
    }

    if values.is_empty() {
        return Err(ConfigError::MissingValue { line: number, key });
    }
    Ok(Some((key, values)))
}

/// `[A-Za-z][A-Za-z0-9_]*` segments joined by dots.
fn is_valid_key(key: &str) -> bool {
    key.split('.').all(|segment| {
        let mut chars = segment.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

/// Optional sign, digits, optional fractional part.
fn is_decimal(text: &str) -> bool {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    match fraction {
        Some(fraction) => {
            digits(whole) && digits(fraction) && !(whole.is_empty() && fraction.is_empty())
        }
        None => !whole.is_empty() && digits(whole),
    }
}
