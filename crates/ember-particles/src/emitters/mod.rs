//! Built-in emitter kinds.

mod area;
mod point;

pub use area::{AreaEmitter, AreaShape};
pub use point::PointEmitter;
