use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::buffer::BufferSize;
use crate::encoding::TextEncoding;
use crate::error::ClientError;

/// When the client should launch a new editor instead of attaching.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreationPolicy {
    Always,
    #[default]
    IfNotFound,
    Never,
}

/// When the client should terminate the editor at teardown.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnershipPolicy {
    Always,
    #[default]
    IfCreated,
    Never,
}

/// How the handshake waits for posted characters to land in the buffer.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitMode {
    /// Sleep once, then scan once.
    Fixed,
    /// Rescan at intervals until the marker shows up.
    #[default]
    Poll,
}

impl CreationPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::IfNotFound => "if-not-found",
            Self::Never => "never",
        }
    }
}

impl OwnershipPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::IfCreated => "if-created",
            Self::Never => "never",
        }
    }

    /// Whether teardown kills the process, given whether this client started it.
    pub const fn should_terminate(self, created: bool) -> bool {
        match self {
            Self::Always => true,
            Self::IfCreated => created,
            Self::Never => false,
        }
    }
}

impl WaitMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Poll => "poll",
        }
    }
}

impl FromStr for CreationPolicy {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "if-not-found" => Ok(Self::IfNotFound),
            "never" => Ok(Self::Never),
            other => Err(ClientError::InvalidConfiguration(format!(
                "unknown creation policy `{other}` (expected always, if-not-found or never)"
            ))),
        }
    }
}

impl FromStr for OwnershipPolicy {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(Self::Always),
            "if-created" => Ok(Self::IfCreated),
            "never" => Ok(Self::Never),
            other => Err(ClientError::InvalidConfiguration(format!(
                "unknown ownership policy `{other}` (expected always, if-created or never)"
            ))),
        }
    }
}

impl FromStr for WaitMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "poll" => Ok(Self::Poll),
            other => Err(ClientError::InvalidConfiguration(format!(
                "unknown wait mode `{other}` (expected fixed or poll)"
            ))),
        }
    }
}

/// Everything the client needs to know about the target editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorProfile {
    /// Name used to look up a running instance.
    pub process_name: String,
    /// Program launched when no instance is attached.
    pub program: String,
    /// Class of the text input surface.
    pub class_name: String,
    pub buffer_size: BufferSize,
    pub encoding: TextEncoding,
    /// Outer window size at which the visible area holds exactly `buffer_size` cells.
    pub window_size: (i32, i32),
    /// How long to wait for a freshly started editor to show its window.
    pub window_timeout: Duration,
}

impl Default for EditorProfile {
    fn default() -> Self {
        Self {
            process_name: "notepad".to_string(),
            program: "notepad.exe".to_string(),
            class_name: "Edit".to_string(),
            buffer_size: BufferSize::new(131, 30),
            encoding: TextEncoding::Utf16Le,
            window_size: (1365, 768),
            window_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub create: Option<CreationPolicy>,
    pub ownership: Option<OwnershipPolicy>,
    pub wait: Option<WaitMode>,
    pub wait_ms: Option<u64>,
    pub verbose: bool,
    pub json: bool,
}

impl ConfigFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            create: other.create.or(self.create),
            ownership: other.ownership.or(self.ownership),
            wait: other.wait.or(self.wait),
            wait_ms: other.wait_ms.or(self.wait_ms),
            verbose: self.verbose || other.verbose,
            json: self.json || other.json,
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("notepad-gui").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("notepad-gui")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("notepad-gui").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("notepad-gui")
                .join("config");
        }
    }

    PathBuf::from(".notepadrc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".notepadrc")
}

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
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    parse_flag_tokens(&tokens).with_context(|| format!("Invalid config {}", path.display()))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = Vec::new();
    lines.push("# notepad-gui defaults (saved with --save)".to_string());
    if let Some(create) = flags.create {
        lines.push(format!("--create {}", create.as_str()));
    }
    if let Some(ownership) = flags.ownership {
        lines.push(format!("--ownership {}", ownership.as_str()));
    }
    if let Some(wait) = flags.wait {
        lines.push(format!("--wait {}", wait.as_str()));
    }
    if let Some(ms) = flags.wait_ms {
        lines.push(format!("--wait-ms {ms}"));
    }
    if flags.verbose {
        lines.push("--verbose".to_string());
    }
    if flags.json {
        lines.push("--json".to_string());
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

/// Extract the persistable flags from a token list.
///
/// Unknown tokens are ignored so the full command line can be passed in.
///
/// # Errors
/// Returns [`ClientError::InvalidConfiguration`] for a malformed policy, wait
/// mode or duration, or when a value-taking flag has no value.
pub fn parse_flag_tokens(tokens: &[String]) -> Result<ConfigFlags, ClientError> {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline) = match token.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name, Some(value)),
            _ => (token, None),
        };
        let takes_value = matches!(name, "--create" | "--ownership" | "--wait" | "--wait-ms");
        let value = if takes_value && inline.is_none() {
            i += 1;
            Some(tokens.get(i).map(String::as_str).ok_or_else(|| {
                ClientError::InvalidConfiguration(format!("missing value for {name}"))
            })?)
        } else {
            inline
        };
        match (name, value) {
            ("--create", Some(v)) => flags.create = Some(v.parse()?),
            ("--ownership", Some(v)) => flags.ownership = Some(v.parse()?),
            ("--wait", Some(v)) => flags.wait = Some(v.parse()?),
            ("--wait-ms", Some(v)) => {
                flags.wait_ms = Some(v.parse().map_err(|_| {
                    ClientError::InvalidConfiguration(format!("`{v}` is not a duration in ms"))
                })?);
            }
            ("--verbose" | "-v", None) => flags.verbose = true,
            ("--json", None) => flags.json = true,
            _ => {}
        }
        i += 1;
    }
    Ok(flags)
}
