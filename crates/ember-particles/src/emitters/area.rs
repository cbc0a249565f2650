//! Emitters that scatter particles through a volume.

use crate::emitter::{EmitterCore, ParticleEmitter};
use crate::params::{self, ParamDef, ParamKind};
use crate::particle::Particle;
use ember_common::convert::parse_real;
use ember_common::ParamError;
use glam::Vec3;

/// Volume an [`AreaEmitter`] fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaShape {
    /// Axis-aligned (in emitter space) box
    Box,
    /// Ellipsoid inscribed in the box
    Ellipsoid,
}

impl AreaShape {
    /// Registered type name of emitters with this shape.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Box => "Box",
            Self::Ellipsoid => "Ellipsoid",
        }
    }
}

/// Emits particles uniformly inside a box or ellipsoid oriented by the
/// emitter's direction (depth) and up vector (height).
#[derive(Debug, Clone)]
pub struct AreaEmitter {
    core: EmitterCore,
    size: Vec3,
    shape: AreaShape,
}

impl AreaEmitter {
    /// Creates an emitter with a 100 unit cube volume facing +Z.
    #[must_use]
    pub fn new(shape: AreaShape) -> Self {
        let mut core = EmitterCore::new();
        core.set_direction(Vec3::Z);
        core.set_up(Vec3::Y);
        Self {
            core,
            size: Vec3::splat(100.0),
            shape,
        }
    }

    /// Box shaped emitter.
    #[must_use]
    pub fn cuboid() -> Self {
        Self::new(AreaShape::Box)
    }

    /// Ellipsoid shaped emitter.
    #[must_use]
    pub fn ellipsoid() -> Self {
        Self::new(AreaShape::Ellipsoid)
    }

    /// The volume shape.
    #[must_use]
    pub const fn shape(&self) -> AreaShape {
        self.shape
    }

    /// Width, height and depth of the volume.
    #[must_use]
    pub const fn size(&self) -> Vec3 {
        self.size
    }

    /// Resizes the volume.
    pub fn set_size(&mut self, size: Vec3) {
        self.size = size;
    }

    /// Half extents along the emitter's left, up and direction axes.
    fn ranges(&self) -> (Vec3, Vec3, Vec3) {
        let up = self.core.up();
        let direction = self.core.direction();
        let left = up.cross(direction);
        (
            left * (self.size.x * 0.5),
            up * (self.size.y * 0.5),
            direction * (self.size.z * 0.5),
        )
    }

    fn sample_offset(&mut self) -> (f32, f32, f32) {
        let rng = self.core.rng_mut();
        let mut symmetric = || rng.f32() * 2.0 - 1.0;
        match self.shape {
            AreaShape::Box => (symmetric(), symmetric(), symmetric()),
            AreaShape::Ellipsoid => loop {
                let (x, y, z) = (symmetric(), symmetric(), symmetric());
                if x * x + y * y + z * z <= 1.0 {
                    break (x, y, z);
                }
            },
        }
    }
}

static AREA_PARAMS: &[ParamDef<AreaEmitter>] = &[
    ParamDef {
        name: "width",
        description: "Width of the shape in world coordinates.",
        kind: ParamKind::Real,
        get: |e| e.size.x.to_string(),
        set: |e, v| {
            e.size.x = parse_real("width", v)?;
            Ok(())
        },
    },
    ParamDef {
        name: "height",
        description: "Height of the shape in world coordinates.",
        kind: ParamKind::Real,
        get: |e| e.size.y.to_string(),
        set: |e, v| {
            e.size.y = parse_real("height", v)?;
            Ok(())
        },
    },
    ParamDef {
        name: "depth",
        description: "Depth of the shape in world coordinates.",
        kind: ParamKind::Real,
        get: |e| e.size.z.to_string(),
        set: |e, v| {
            e.size.z = parse_real("depth", v)?;
            Ok(())
        },
    },
];

impl ParticleEmitter for AreaEmitter {
    fn type_name(&self) -> &str {
        self.shape.type_name()
    }

    fn core(&self) -> &EmitterCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EmitterCore {
        &mut self.core
    }

    fn init_particle(&mut self, particle: &mut Particle) {
        let (x_range, y_range, z_range) = self.ranges();
        let (x, y, z) = self.sample_offset();
        let position = self.core.position() + x_range * x + y_range * y + z_range * z;
        self.core.init_particle_at(particle, position);
    }

    fn clone_emitter(&self) -> Box<dyn ParticleEmitter> {
        Box::new(self.clone())
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        params::set_in(AREA_PARAMS, self, name, value)
            .or_else(|| self.core.apply_parameter(name, value))
            .unwrap_or_else(|| Err(params::unknown(self.shape.type_name(), name)))
    }

    fn parameter(&self, name: &str) -> Option<String> {
        params::get_in(AREA_PARAMS, self, name).or_else(|| self.core.read_parameter(name))
    }

    fn parameter_names(&self) -> Vec<&'static str> {
        let mut names = params::names_of(AREA_PARAMS);
        names.extend(params::names_of(crate::emitter::EMITTER_PARAMS));
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(shape: AreaShape) -> AreaEmitter {
        let mut emitter = AreaEmitter::new(shape);
        emitter.core_mut().reseed(5);
        emitter
    }

    #[test]
    fn test_box_particles_stay_inside() {
        let mut emitter = seeded(AreaShape::Box);
        emitter.set_parameter("width", "10").unwrap();
        emitter.set_parameter("height", "20").unwrap();
        emitter.set_parameter("depth", "4").unwrap();
        emitter.set_parameter("position", "0 5 0").unwrap();

        for _ in 0..200 {
            let mut p = Particle::default();
            emitter.init_particle(&mut p);
            let local = p.position - Vec3::new(0.0, 5.0, 0.0);
            // direction +Z, up +Y, so left is +X
            assert!(local.x.abs() <= 5.0 + 1e-4);
            assert!(local.y.abs() <= 10.0 + 1e-4);
            assert!(local.z.abs() <= 2.0 + 1e-4);
        }
    }

    #[test]
    fn test_ellipsoid_particles_stay_inside() {
        let mut emitter = seeded(AreaShape::Ellipsoid);
        emitter.set_size(Vec3::new(10.0, 4.0, 6.0));
        for _ in 0..200 {
            let mut p = Particle::default();
            emitter.init_particle(&mut p);
            let n = p.position / Vec3::new(5.0, 2.0, 3.0);
            assert!(n.length_squared() <= 1.0 + 1e-4);
        }
    }

    #[test]
    fn test_layered_parameters() {
        let mut emitter = AreaEmitter::ellipsoid();
        assert_eq!(emitter.type_name(), "Ellipsoid");
        emitter.set_parameter("depth", "7").unwrap();
        emitter.set_parameter("emission_rate", "3").unwrap();
        assert_eq!(emitter.parameter("depth").as_deref(), Some("7"));
        assert_eq!(emitter.parameter("emission_rate").as_deref(), Some("3"));
        assert!(emitter.parameter_names().contains(&"width"));
        assert!(emitter.parameter_names().contains(&"angle"));

        let err = emitter.set_parameter("radius", "1").unwrap_err();
        assert!(err.to_string().contains("Ellipsoid"));
    }

    #[test]
    fn test_clone_keeps_shape_and_size() {
        let mut emitter = AreaEmitter::cuboid();
        emitter.set_size(Vec3::new(1.0, 2.0, 3.0));
        let copy = emitter.clone_emitter();
        assert_eq!(copy.type_name(), "Box");
        assert_eq!(copy.parameter("height").as_deref(), Some("2"));
    }
}
