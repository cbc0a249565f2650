//! Built-in affector kinds.

mod colour_fader;
mod linear_force;
mod rotator;
mod scaler;

pub use colour_fader::ColourFaderAffector;
pub use linear_force::{ForceApplication, LinearForceAffector};
pub use rotator::RotatorAffector;
pub use scaler::ScalerAffector;
