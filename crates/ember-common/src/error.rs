//! Error types for Ember.

use thiserror::Error;

/// Top-level error type for Ember operations.
#[derive(Debug, Error)]
pub enum EmberError {
    /// Parameter binding errors
    #[error("Parameter error: {0}")]
    Param(#[from] ParamError),

    /// Factory and template registry errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Malformed particle system definition
    #[error("Definition error: {0}")]
    Definition(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the string-keyed property binder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// No parameter with that name exists on the target
    #[error("{owner} has no parameter named '{name}'")]
    UnknownParameter {
        /// Type that was being configured
        owner: String,
        /// Parameter name that was requested
        name: String,
    },

    /// The value could not be converted to the parameter's type
    #[error("Invalid value '{value}' for '{name}': expected {expected}")]
    InvalidValue {
        /// Parameter name
        name: String,
        /// Offending value
        value: String,
        /// Human readable description of the expected form
        expected: &'static str,
    },
}

/// Errors raised when resolving emitter/affector/renderer types or templates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No emitter factory registered under that type name
    #[error("Cannot find emitter type '{0}'")]
    UnknownEmitterType(String),

    /// No affector factory registered under that type name
    #[error("Cannot find affector type '{0}'")]
    UnknownAffectorType(String),

    /// No renderer factory registered under that type name
    #[error("Cannot find renderer type '{0}'")]
    UnknownRendererType(String),

    /// A template with this name already exists
    #[error("Particle system template '{0}' already exists")]
    DuplicateTemplate(String),

    /// No template with this name exists
    #[error("Cannot find particle system template '{0}'")]
    TemplateNotFound(String),
}

/// Result type alias for Ember operations.
pub type EmberResult<T> = Result<T, EmberError>;
