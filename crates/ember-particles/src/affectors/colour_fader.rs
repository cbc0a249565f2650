//! Fades particle colours at a constant rate.

use crate::affector::ParticleAffector;
use crate::params::{self, ParamDef, ParamKind};
use crate::pool::ActiveParticles;
use ember_common::convert::parse_real;
use ember_common::{Colour, ParamError};

/// Adds a per-second delta to each colour channel, clamped to `[0, 1]`.
#[derive(Debug, Clone, Default)]
pub struct ColourFaderAffector {
    red: f32,
    green: f32,
    blue: f32,
    alpha: f32,
}

impl ColourFaderAffector {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "ColourFader";

    /// Creates a fader with the given per-second channel deltas.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }
}

macro_rules! channel_param {
    ($field:ident, $name:literal, $desc:literal) => {
        ParamDef {
            name: $name,
            description: $desc,
            kind: ParamKind::Real,
            get: |a| a.$field.to_string(),
            set: |a, v| {
                a.$field = parse_real($name, v)?;
                Ok(())
            },
        }
    };
}

static COLOUR_FADER_PARAMS: &[ParamDef<ColourFaderAffector>] = &[
    channel_param!(red, "red", "The amount by which to adjust the red component of particles per second."),
    channel_param!(green, "green", "The amount by which to adjust the green component of particles per second."),
    channel_param!(blue, "blue", "The amount by which to adjust the blue component of particles per second."),
    channel_param!(alpha, "alpha", "The amount by which to adjust the alpha component of particles per second."),
];

impl ParticleAffector for ColourFaderAffector {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn affect_particles(&mut self, particles: &mut ActiveParticles<'_>, dt: f32) {
        let delta = Colour::new(self.red * dt, self.green * dt, self.blue * dt, self.alpha * dt);
        particles.for_each_mut(|p| {
            p.colour = Colour::new(
                p.colour.r + delta.r,
                p.colour.g + delta.g,
                p.colour.b + delta.b,
                p.colour.a + delta.a,
            )
            .saturated();
        });
    }

    fn clone_affector(&self) -> Box<dyn ParticleAffector> {
        Box::new(self.clone())
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        params::set_in(COLOUR_FADER_PARAMS, self, name, value)
            .unwrap_or_else(|| Err(params::unknown(Self::TYPE_NAME, name)))
    }

    fn parameter(&self, name: &str) -> Option<String> {
        params::get_in(COLOUR_FADER_PARAMS, self, name)
    }

    fn parameter_names(&self) -> Vec<&'static str> {
        params::names_of(COLOUR_FADER_PARAMS)
    }
}
