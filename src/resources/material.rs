use glam::Vec3;

use crate::error::Result;
use crate::gpu::{ShaderProgram, UniformSlot};

/// Phong surface response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMaterial {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub shininess: f32,
}

impl SurfaceMaterial {
    pub const fn new(ambient: Vec3, diffuse: Vec3, specular: Vec3, shininess: f32) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            shininess,
        }
    }

    pub const BRONZE: Self = Self::new(
        Vec3::new(0.2125, 0.1275, 0.054),
        Vec3::new(0.714, 0.4284, 0.18144),
        Vec3::new(0.393548, 0.271906, 0.166721),
        0.2,
    );
    pub const SILVER: Self = Self::new(
        Vec3::splat(0.19225),
        Vec3::splat(0.50754),
        Vec3::splat(0.508273),
        1.0,
    );
    pub const WOOD: Self = Self::new(Vec3::splat(0.4), Vec3::splat(0.8), Vec3::ONE, 32.0);
    pub const METAL: Self = Self::new(
        Vec3::splat(0.4),
        Vec3::splat(0.9),
        Vec3::splat(0.974597),
        70.0,
    );
    pub const WALL: Self = Self::new(Vec3::splat(0.1), Vec3::ONE, Vec3::ONE, 2.0);
    pub const PLASTIC: Self = Self::new(Vec3::splat(0.4), Vec3::splat(0.8), Vec3::splat(0.8), 1.0);
    pub const DARK_PLASTIC: Self =
        Self::new(Vec3::ZERO, Vec3::splat(0.1), Vec3::splat(0.1), 1.0);
    pub const GLASS: Self = Self::new(Vec3::splat(0.5), Vec3::ONE, Vec3::ONE, 128.0);
}

/// Uniform slots written for every mesh draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderUniforms {
    pub pvm_matrix: UniformSlot,
    pub model_matrix: UniformSlot,
    pub normal_matrix: UniformSlot,
    pub ambient_color: UniformSlot,
    pub diffuse_color: UniformSlot,
    pub specular_color: UniformSlot,
    pub shininess: UniformSlot,
}

impl ShaderUniforms {
    pub fn resolve(shader: &ShaderProgram) -> Result<Self> {
        Ok(Self {
            pvm_matrix: shader.require_uniform("pvm_matrix")?,
            model_matrix: shader.require_uniform("model_matrix")?,
            normal_matrix: shader.require_uniform("normal_matrix")?,
            ambient_color: shader.require_uniform("material_ambient_color")?,
            diffuse_color: shader.require_uniform("material_diffuse_color")?,
            specular_color: shader.require_uniform("material_specular_color")?,
            shininess: shader.require_uniform("material_shininess")?,
        })
    }
}
