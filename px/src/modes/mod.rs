//! Task modes
//!
//! Every task names an owning mode. The mode fixes the model, the prompt
//! template, and whether output is parsed into files or kept as one document.

mod embedded;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

pub use embedded::template_for;

/// Placeholder replaced by the task description
pub const DESCRIPTION_PLACEHOLDER: &str = "{{description}}";

const DEFAULT_MODEL: &str = "gpt-4";

/// Closed set of task modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    PlanManager,
    Architect,
    Code,
    Debug,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::PlanManager, Mode::Architect, Mode::Code, Mode::Debug];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::PlanManager => "plan-manager",
            Mode::Architect => "architect",
            Mode::Code => "code",
            Mode::Debug => "debug",
        }
    }

    /// How this mode's model output is turned into workspace changes
    pub fn output_kind(&self) -> OutputKind {
        match self {
            Mode::Code | Mode::Debug => OutputKind::Files,
            Mode::PlanManager | Mode::Architect => OutputKind::Document,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode name not in the registry
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown mode: {0}")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    /// Case-insensitive; `pm` is accepted for `plan-manager`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plan-manager" | "pm" => Ok(Mode::PlanManager),
            "architect" => Ok(Mode::Architect),
            "code" => Ok(Mode::Code),
            "debug" => Ok(Mode::Debug),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// Output handling for a mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Parse fenced code blocks into files
    Files,
    /// Store the whole output as one markdown document
    Document,
}

/// Model and prompt for one mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModeConfig {
    pub model: String,
    pub prompt_template: String,
}

impl ModeConfig {
    /// Substitute `description` into this mode's template
    pub fn build_prompt(&self, description: &str) -> String {
        build_prompt(&self.prompt_template, description)
    }
}

/// Replace the first placeholder in `template` with `description`
///
/// All other template text is left byte-identical, including any later
/// placeholders and any placeholder text inside `description`.
pub fn build_prompt(template: &str, description: &str) -> String {
    template.replacen(DESCRIPTION_PLACEHOLDER, description, 1)
}

/// Static mode table
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    modes: BTreeMap<Mode, ModeConfig>,
}

impl Default for ModeRegistry {
    fn default() -> Self {
        let modes = Mode::ALL
            .into_iter()
            .map(|mode| {
                (
                    mode,
                    ModeConfig {
                        model: DEFAULT_MODEL.to_string(),
                        prompt_template: template_for(mode).to_string(),
                    },
                )
            })
            .collect();
        Self { modes }
    }
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in registry with per-mode model overrides (mode name -> model)
    pub fn with_model_overrides(overrides: &HashMap<String, String>) -> Result<Self, UnknownMode> {
        debug!(?overrides, "ModeRegistry::with_model_overrides: called");
        let mut registry = Self::default();
        for (name, model) in overrides {
            let mode: Mode = name.parse()?;
            registry.set_model(mode, model.clone());
        }
        Ok(registry)
    }

    pub fn set_model(&mut self, mode: Mode, model: impl Into<String>) {
        if let Some(config) = self.modes.get_mut(&mode) {
            config.model = model.into();
        }
    }

    pub fn set_template(&mut self, mode: Mode, template: impl Into<String>) {
        if let Some(config) = self.modes.get_mut(&mode) {
            config.prompt_template = template.into();
        }
    }

    /// Look up a task's owner mode by name
    pub fn resolve(&self, name: &str) -> Result<(Mode, &ModeConfig), UnknownMode> {
        let mode: Mode = name.parse()?;
        self.modes
            .get(&mode)
            .map(|config| (mode, config))
            .ok_or_else(|| UnknownMode(name.to_string()))
    }

    pub fn get(&self, mode: Mode) -> Option<&ModeConfig> {
        self.modes.get(&mode)
    }

    /// Registered modes in declaration order
    pub fn list(&self) -> impl Iterator<Item = (Mode, &ModeConfig)> {
        self.modes.iter().map(|(mode, config)| (*mode, config))
    }
}
