use log::debug;

use crate::error::{Error, Result};
use crate::gpu::{Gpu, GpuHandle, UniformSlot};

/// Vertex input declared by a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: &'static str,
    pub location: u32,
    pub components: u32,
}

/// Loose uniform declared by a program, addressed by its byte offset inside
/// the per-draw constant block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub offset: u32,
}

/// Precompiled program together with its reflected interface.
///
/// Backends never parse `wgsl`; names are resolved through the declared
/// tables so the headless backend can answer the same lookups.
#[derive(Debug)]
pub struct ProgramSource {
    pub label: &'static str,
    pub wgsl: &'static str,
    pub attributes: &'static [AttributeDecl],
    pub uniforms: &'static [UniformDecl],
    pub constants_size: u32,
    /// Uniform block names; the block index is the position in this list.
    pub blocks: &'static [&'static str],
}

impl ProgramSource {
    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    pub fn uniform_slot(&self, name: &str) -> Option<UniformSlot> {
        self.uniforms
            .iter()
            .position(|decl| decl.name == name)
            .map(|index| UniformSlot(index as u32))
    }

    pub fn uniform(&self, slot: UniformSlot) -> Option<&UniformDecl> {
        self.uniforms.get(slot.0 as usize)
    }

    pub fn block_index(&self, name: &str) -> Option<u32> {
        self.blocks
            .iter()
            .position(|block| *block == name)
            .map(|index| index as u32)
    }
}

/// Owning handle of a linked program.
pub struct ShaderProgram {
    gpu: Gpu,
    program: GpuHandle,
}

impl ShaderProgram {
    pub fn new(gpu: Gpu, source: &'static ProgramSource) -> Result<Self> {
        let program = gpu.create_program(source);
        if program.is_empty() {
            return Err(Error::ResourceCreation {
                resource: "shader program",
            });
        }
        debug!("created program {} ({})", program.raw(), source.label);
        Ok(Self { gpu, program })
    }

    pub fn handle(&self) -> GpuHandle {
        self.program
    }

    pub fn set_active(&self) {
        self.gpu.use_program(self.program);
    }

    pub fn set_inactive(&self) {
        self.gpu.use_program(GpuHandle::EMPTY);
    }

    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.gpu.attribute_location(self.program, name)
    }

    pub fn uniform_location(&self, name: &str) -> Option<UniformSlot> {
        self.gpu.uniform_location(self.program, name)
    }

    /// Like [`Self::uniform_location`] but treats a missing uniform as fatal.
    pub fn require_uniform(&self, name: &str) -> Result<UniformSlot> {
        self.uniform_location(name)
            .ok_or_else(|| Error::MissingShaderSymbol {
                name: name.to_string(),
            })
    }

    pub fn uniform_block_index(&self, name: &str) -> Result<u32> {
        self.gpu
            .uniform_block_index(self.program, name)
            .ok_or_else(|| Error::MissingShaderSymbol {
                name: name.to_string(),
            })
    }

    pub fn uniform_block_binding(&self, block: u32, binding: u32) {
        self.gpu.uniform_block_binding(self.program, block, binding);
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        let program = self.program.take();
        if !program.is_empty() {
            self.gpu.delete_program(program);
        }
    }
}

/// The single program every scene object is drawn with.
pub static SCENE_PROGRAM: ProgramSource = ProgramSource {
    label: "scene-program",
    wgsl: SCENE_WGSL,
    attributes: &[
        AttributeDecl {
            name: "position",
            location: 0,
            components: 3,
        },
        AttributeDecl {
            name: "normal",
            location: 1,
            components: 3,
        },
        AttributeDecl {
            name: "texel",
            location: 2,
            components: 2,
        },
    ],
    uniforms: &[
        UniformDecl {
            name: "pvm_matrix",
            offset: 0,
        },
        UniformDecl {
            name: "model_matrix",
            offset: 64,
        },
        UniformDecl {
            name: "normal_matrix",
            offset: 128,
        },
        UniformDecl {
            name: "material_ambient_color",
            offset: 176,
        },
        UniformDecl {
            name: "material_diffuse_color",
            offset: 192,
        },
        UniformDecl {
            name: "material_specular_color",
            offset: 208,
        },
        UniformDecl {
            name: "material_shininess",
            offset: 220,
        },
        UniformDecl {
            name: "eye_position",
            offset: 224,
        },
        UniformDecl {
            name: "texture_type",
            offset: 236,
        },
        UniformDecl {
            name: "texture_sampler",
            offset: 240,
        },
        UniformDecl {
            name: "num_point_lights",
            offset: 244,
        },
        UniformDecl {
            name: "num_spot_lights",
            offset: 248,
        },
        UniformDecl {
            name: "flip_texel_v",
            offset: 252,
        },
    ],
    constants_size: 256,
    blocks: &["point_lights_data", "spot_lights_data"],
};

const SCENE_WGSL: &str = r#"
const MAX_LIGHTS: u32 = 5u;

const TEXTURE_SAMPLED: i32 = 1;
const TEXTURE_WOOD: i32 = 2;
const TEXTURE_BRICKS: i32 = 3;
const TEXTURE_CARPET: i32 = 4;

struct DrawConstants {
    pvm_matrix: mat4x4<f32>,
    model_matrix: mat4x4<f32>,
    normal_matrix: mat3x3<f32>,
    material_ambient_color: vec3<f32>,
    material_diffuse_color: vec3<f32>,
    material_specular_color: vec3<f32>,
    material_shininess: f32,
    eye_position: vec3<f32>,
    texture_type: i32,
    texture_sampler: i32,
    num_point_lights: i32,
    num_spot_lights: i32,
    flip_texel_v: i32,
}

struct PointLight {
    position: vec4<f32>,
    ambient_color: vec3<f32>,
    diffuse_color: vec3<f32>,
    specular_color: vec3<f32>,
}

struct SpotLight {
    position: vec4<f32>,
    direction: vec3<f32>,
    ambient_color: vec3<f32>,
    diffuse_color: vec3<f32>,
    specular_color: vec3<f32>,
    angle: f32,
}

struct PointLights {
    lights: array<PointLight, 5>,
}

struct SpotLights {
    lights: array<SpotLight, 5>,
}

@group(0) @binding(0)
var<uniform> constants: DrawConstants;

@group(1) @binding(0)
var<uniform> point_lights_data: PointLights;

@group(1) @binding(1)
var<uniform> spot_lights_data: SpotLights;

@group(2) @binding(0)
var texture_data: texture_2d<f32>;

@group(2) @binding(1)
var texture_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) texel: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) texel: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    output.clip_position = constants.pvm_matrix * vec4<f32>(input.position, 1.0);
    output.world_position = (constants.model_matrix * vec4<f32>(input.position, 1.0)).xyz;
    output.normal = normalize(constants.normal_matrix * input.normal);
    output.texel = input.texel;
    return output;
}

fn phong(light_dir: vec3<f32>, normal: vec3<f32>, view_dir: vec3<f32>,
         ambient: vec3<f32>, diffuse: vec3<f32>, specular: vec3<f32>,
         base: vec3<f32>) -> vec3<f32> {
    let n_dot_l = max(dot(normal, light_dir), 0.0);
    let reflected = reflect(-light_dir, normal);
    let shine = pow(max(dot(view_dir, reflected), 0.0), max(constants.material_shininess, 1.0));
    return ambient * constants.material_ambient_color * base
        + diffuse * constants.material_diffuse_color * base * n_dot_l
        + specular * constants.material_specular_color * shine;
}

fn wood(p: vec3<f32>) -> vec3<f32> {
    let rings = fract(length(p.xz) * 4.0 + sin(p.y * 3.0) * 0.2);
    return mix(vec3<f32>(0.55, 0.35, 0.17), vec3<f32>(0.75, 0.52, 0.28), smoothstep(0.2, 0.8, rings));
}

fn bricks(p: vec3<f32>) -> vec3<f32> {
    let size = vec2<f32>(1.0, 0.5);
    var uv = vec2<f32>(p.x + p.z, p.y) / size;
    if (fract(uv.y * 0.5) > 0.5) {
        uv.x = uv.x + 0.5;
    }
    let edge = fract(uv);
    let mortar = step(0.06, edge.x) * step(0.08, edge.y);
    return mix(vec3<f32>(0.8, 0.8, 0.78), vec3<f32>(0.62, 0.24, 0.18), mortar);
}

fn carpet(p: vec3<f32>) -> vec3<f32> {
    let checker = (i32(floor(p.x * 0.5)) + i32(floor(p.z * 0.5))) & 1;
    let fibre = 0.9 + 0.1 * sin(p.x * 40.0) * sin(p.z * 40.0);
    let base = select(vec3<f32>(0.45, 0.12, 0.12), vec3<f32>(0.35, 0.08, 0.1), checker == 1);
    return base * fibre;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var base = vec3<f32>(1.0, 1.0, 1.0);
    var texel = input.texel;
    if (constants.flip_texel_v != 0) {
        texel.y = 1.0 - texel.y;
    }
    let sampled = textureSample(texture_data, texture_sampler, texel);
    if (constants.texture_type == TEXTURE_SAMPLED) {
        base = sampled.rgb;
    } else if (constants.texture_type == TEXTURE_WOOD) {
        base = wood(input.world_position);
    } else if (constants.texture_type == TEXTURE_BRICKS) {
        base = bricks(input.world_position);
    } else if (constants.texture_type == TEXTURE_CARPET) {
        base = carpet(input.world_position);
    }

    let normal = normalize(input.normal);
    let view_dir = normalize(constants.eye_position - input.world_position);
    var color = vec3<f32>(0.0, 0.0, 0.0);

    for (var i = 0u; i < MAX_LIGHTS; i = i + 1u) {
        if (i32(i) >= constants.num_point_lights) {
            break;
        }
        let light = point_lights_data.lights[i];
        let light_dir = normalize(light.position.xyz - input.world_position);
        color = color + phong(light_dir, normal, view_dir,
            light.ambient_color, light.diffuse_color, light.specular_color, base);
    }

    for (var i = 0u; i < MAX_LIGHTS; i = i + 1u) {
        if (i32(i) >= constants.num_spot_lights) {
            break;
        }
        let light = spot_lights_data.lights[i];
        let light_dir = normalize(light.position.xyz - input.world_position);
        let cone = dot(-light_dir, normalize(light.direction));
        var contribution = light.ambient_color * constants.material_ambient_color * base;
        if (cone > cos(light.angle)) {
            contribution = phong(light_dir, normal, view_dir,
                light.ambient_color, light.diffuse_color, light.specular_color, base);
        }
        color = color + contribution;
    }

    return vec4<f32>(min(color, vec3<f32>(1.0, 1.0, 1.0)), 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_program_resolves_names() {
        assert_eq!(SCENE_PROGRAM.attribute("texel").map(|a| a.location), Some(2));
        assert_eq!(SCENE_PROGRAM.block_index("spot_lights_data"), Some(1));
        let slot = SCENE_PROGRAM.uniform_slot("eye_position").unwrap();
        assert_eq!(SCENE_PROGRAM.uniform(slot).map(|d| d.offset), Some(224));
        assert!(SCENE_PROGRAM.uniform_slot("missing").is_none());
    }

    #[test]
    fn texel_flip_fills_the_last_constant_word() {
        let slot = SCENE_PROGRAM.uniform_slot("flip_texel_v").unwrap();
        assert_eq!(
            SCENE_PROGRAM.uniform(slot).map(|d| d.offset + 4),
            Some(SCENE_PROGRAM.constants_size)
        );
    }

    #[test]
    fn uniform_offsets_fit_constant_block() {
        for decl in SCENE_PROGRAM.uniforms {
            assert!(decl.offset < SCENE_PROGRAM.constants_size, "{}", decl.name);
        }
    }
}
