//! # Ember Particles
//!
//! Pooled particle systems for the Ember engine.
//!
//! This crate provides:
//! - Particle systems with quota-bounded pools and proportional throttling
//! - Point, box and ellipsoid emitters, including emitters emitted as particles
//! - Linear force, colour fader, scaler and rotator affectors
//! - Renderer notifications with a headless default
//! - A manager holding factories, templates and TOML system definitions
//! - Text parameters on every component

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod affector;
pub mod affectors;
pub mod definition;
pub mod emitter;
pub mod emitters;
pub mod manager;
pub mod params;
pub mod particle;
pub mod pool;
pub mod renderer;
pub mod settings;
pub mod system;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::affector::ParticleAffector;
    pub use crate::affectors::*;
    pub use crate::definition::{
        ComponentDefinition, DefinitionFile, LoadMode, ParamValue, SystemDefinition,
    };
    pub use crate::emitter::{EmitterCore, ParticleEmitter};
    pub use crate::emitters::*;
    pub use crate::manager::{
        AffectorFactory, EmitterFactory, ParticleSystemManager, RendererFactory,
    };
    pub use crate::params::{ParamDef, ParamKind};
    pub use crate::particle::{Particle, ParticleKind};
    pub use crate::pool::{ActiveParticles, EmittedEmitter, ParticleRef, Particles};
    pub use crate::renderer::{CameraView, NullRenderer, ParticleSystemRenderer, SortMode};
    pub use crate::settings::{ParticleSettings, SETTINGS_FILE};
    pub use crate::system::ParticleSystem;
}

pub use prelude::*;
