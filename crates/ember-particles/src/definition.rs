//! Particle system definitions.
//!
//! Definitions are TOML documents with one `[[system]]` table per system:
//!
//! ```toml
//! [[system]]
//! name = "Fountain"
//! params = { quota = 200, material = "Droplet", renderer = "null" }
//!
//! [[system.emitters]]
//! type = "Point"
//! params = { emission_rate = 50, angle = 15, direction = [0, 1, 0] }
//!
//! [[system.affectors]]
//! type = "LinearForce"
//! params = { force_vector = "0 -9.8 0" }
//! ```
//!
//! Values are turned into their text form and applied through each
//! component's `set_parameter`. Within one `params` table they are applied
//! in alphabetical order of name, except `renderer`, which is installed
//! before any other system parameter. System parameters the system does not
//! know are offered to its renderer.

use crate::manager::ParticleSystemManager;
use crate::params;
use crate::system::ParticleSystem;
use ember_common::{EmberError, EmberResult, ParamError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// How to treat rejected parameters and unknown component types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadMode {
    /// Fail on the first problem and register nothing.
    #[default]
    Strict,
    /// Log and skip what cannot be applied.
    Lenient,
}

/// A parameter value as written in a definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// `true` / `false`
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String, passed through as is
    String(String),
    /// Array of values, joined with spaces (e.g. a vector)
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Text form fed to `set_parameter`.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Bool(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::String(v) => v.clone(),
            Self::List(items) => items
                .iter()
                .map(Self::to_text)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// An emitter or affector entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Registered type name
    #[serde(rename = "type")]
    pub kind: String,
    /// Parameters by name
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

/// One particle system template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDefinition {
    /// Template name
    pub name: String,
    /// System parameters by name
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    /// Emitters in registration order
    #[serde(default)]
    pub emitters: Vec<ComponentDefinition>,
    /// Affectors in registration order
    #[serde(default)]
    pub affectors: Vec<ComponentDefinition>,
}

/// A whole definition document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DefinitionFile {
    /// Systems in document order
    #[serde(default)]
    pub system: Vec<SystemDefinition>,
}

impl DefinitionFile {
    /// Parses a TOML definition document.
    pub fn parse(text: &str) -> EmberResult<Self> {
        toml::from_str(text).map_err(|e| EmberError::Definition(e.to_string()))
    }
}

/// Keeps going past a rejected value in lenient mode.
fn check<E>(result: Result<(), E>, mode: LoadMode, context: &str) -> EmberResult<()>
where
    E: Into<EmberError> + fmt::Display,
{
    match result {
        Ok(()) => Ok(()),
        Err(e) if mode == LoadMode::Lenient => {
            warn!(context, "Skipping definition entry: {e}");
            Ok(())
        },
        Err(e) => Err(e.into()),
    }
}

impl SystemDefinition {
    /// Builds a system from this definition using the manager's factories
    /// and settings.
    pub fn build(
        &self,
        manager: &ParticleSystemManager,
        mode: LoadMode,
    ) -> EmberResult<ParticleSystem> {
        let mut system = manager.new_system(&self.name);

        if let Some(renderer) = self.params.get("renderer") {
            let result = manager
                .create_renderer(&renderer.to_text())
                .map(|r| system.set_renderer(Some(r)));
            check(result, mode, &self.name)?;
        }

        for (name, value) in self.params.iter().filter(|(n, _)| *n != "renderer") {
            let text = value.to_text();
            let result = match system.set_parameter(name, &text) {
                Err(ParamError::UnknownParameter { .. }) => match system.renderer_mut() {
                    Some(renderer) => renderer.set_parameter(name, &text),
                    None => Err(params::unknown(&self.name, name)),
                },
                other => other,
            };
            check(result, mode, &self.name)?;
        }

        for component in &self.emitters {
            let mut emitter = match manager.create_emitter(&component.kind) {
                Ok(emitter) => emitter,
                Err(e) => {
                    check(Err(e), mode, &self.name)?;
                    continue;
                },
            };
            for (name, value) in &component.params {
                check(emitter.set_parameter(name, &value.to_text()), mode, &self.name)?;
            }
            system.add_emitter(emitter);
        }

        for component in &self.affectors {
            let mut affector = match manager.create_affector(&component.kind) {
                Ok(affector) => affector,
                Err(e) => {
                    check(Err(e), mode, &self.name)?;
                    continue;
                },
            };
            for (name, value) in &component.params {
                check(affector.set_parameter(name, &value.to_text()), mode, &self.name)?;
            }
            system.add_affector(affector);
        }

        Ok(system)
    }
}
