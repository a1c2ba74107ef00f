//! # Platform-specific utilities
//!
//! Questo modulo centralizza la logica per trovare i tool esterni usati dalla
//! pipeline (`ffmpeg`, `ffprobe`, `jpegtran`) in modo cross-platform.
//!
//! ## Strategia di risoluzione:
//! 1. `TIMELAPSER_TOOLS_DIR` (override esplicito, es. tool bundled)
//! 2. Directory del `PATH`
//! 3. Fallback: `which` / `where`

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Environment variable pointing at a directory of bundled tools
pub const TOOLS_DIR_ENV: &str = "TIMELAPSER_TOOLS_DIR";

/// Platform-specific command manager with tool resolution
pub struct PlatformCommands {
    commands: HashMap<&'static str, &'static str>,
    which_command: &'static str,
    tools_dir: Option<PathBuf>,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    fn new() -> Self {
        let mut commands = HashMap::new();
        let which_command = if cfg!(windows) {
            commands.insert("ffmpeg", "ffmpeg.exe");
            commands.insert("ffprobe", "ffprobe.exe");
            commands.insert("jpegtran", "jpegtran.exe");
            "where"
        } else {
            commands.insert("ffmpeg", "ffmpeg");
            commands.insert("ffprobe", "ffprobe");
            commands.insert("jpegtran", "jpegtran");
            "which"
        };

        let tools_dir = env::var_os(TOOLS_DIR_ENV)
            .map(PathBuf::from)
            .filter(|dir| dir.is_dir());
        if let Some(ref dir) = tools_dir {
            debug!("Using tools directory from {}: {}", TOOLS_DIR_ENV, dir.display());
        }

        Self {
            commands,
            which_command,
            tools_dir,
        }
    }

    /// Get the platform-specific command name
    pub fn get_command<'a>(&self, base_name: &'a str) -> &'a str {
        self.commands.get(base_name).copied().unwrap_or(base_name)
    }

    /// Resolve a tool to an executable path (tools dir first, then PATH)
    pub fn get_tool_path(&self, base_name: &str) -> Option<PathBuf> {
        let command = self.get_command(base_name);

        if let Some(ref dir) = self.tools_dir {
            let candidate = dir.join(command);
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }

        let path_var = env::var_os("PATH")?;
        env::split_paths(&path_var)
            .map(|dir| dir.join(command))
            .find(|candidate| is_executable(candidate))
    }

    /// Path to invoke for a tool, falling back to the bare command name
    pub fn command_path(&self, base_name: &str) -> PathBuf {
        self.get_tool_path(base_name)
            .unwrap_or_else(|| PathBuf::from(self.get_command(base_name)))
    }

    /// Check if a command is available on the system or bundled
    pub async fn is_command_available(&self, base_name: &str) -> bool {
        if self.get_tool_path(base_name).is_some() {
            return true;
        }

        let result = tokio::process::Command::new(self.which_command)
            .arg(self.get_command(base_name))
            .output()
            .await;

        match result {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}

fn is_executable(path: &Path) -> bool {
    path.is_file()
}
