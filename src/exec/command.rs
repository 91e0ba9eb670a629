//! Build tool command-line construction.
//!
//! Builder pattern for assembling one invocation of the external build tool:
//! startup flags, the command verb, command flags, targets, and the flags this
//! crate always passes (event-output file, non-interactive text UI).

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// Command verbs understood by the build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildCommand {
    Build,
    Test,
    Run,
}

impl BuildCommand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Test => "test",
            Self::Run => "run",
        }
    }
}

/// Builder for one build tool invocation.
#[derive(Debug, Clone)]
pub struct BazelCommandBuilder {
    binary: PathBuf,
    command: BuildCommand,
    startup_flags: Vec<String>,
    command_flags: Vec<String>,
    targets: Vec<String>,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl BazelCommandBuilder {
    /// Create a builder for the given binary and command verb.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, command: BuildCommand) -> Self {
        Self {
            binary: binary.into(),
            command,
            startup_flags: Vec::new(),
            command_flags: Vec::new(),
            targets: Vec::new(),
            working_dir: None,
            env: Vec::new(),
        }
    }

    /// Add a startup flag (before the command verb).
    #[must_use]
    pub fn startup_flag(mut self, flag: impl Into<String>) -> Self {
        self.startup_flags.push(flag.into());
        self
    }

    /// Add a command flag (after the command verb).
    #[must_use]
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.command_flags.push(flag.into());
        self
    }

    /// Add command flags.
    #[must_use]
    pub fn flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command_flags.extend(flags.into_iter().map(Into::into));
        self
    }

    /// Add a target label.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    /// Add target labels.
    #[must_use]
    pub fn targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets.extend(targets.into_iter().map(Into::into));
        self
    }

    /// Set the working directory (the workspace root).
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment override for the subprocess.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    #[must_use]
    pub fn get_working_dir(&self) -> Option<&PathBuf> {
        self.working_dir.as_ref()
    }

    #[must_use]
    pub fn get_env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Build the argument list, instructing the tool to write its event
    /// stream to `event_file` and to run without interactive terminal codes.
    #[must_use]
    pub fn build_args(&self, event_file: &Path) -> Vec<String> {
        let mut args = self.startup_flags.clone();
        args.push(self.command.as_str().to_string());
        args.push("--curses=no".to_string());
        args.push(format!(
            "--build_event_binary_file={}",
            event_file.display()
        ));
        args.extend(self.command_flags.iter().cloned());
        args.push("--".to_string());
        args.extend(self.targets.iter().cloned());
        args
    }

    /// Shell-quoted rendition of the full command line, for logging.
    #[must_use]
    pub fn display_command(&self, event_file: &Path) -> String {
        let mut parts = vec![self.binary.display().to_string()];
        parts.extend(self.build_args(event_file));
        parts
            .into_iter()
            .map(|p| shell_escape::escape(Cow::from(p)).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
