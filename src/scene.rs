//! The furnished room: every drawable, texture, light and animation, plus
//! the per-frame draw sequence including the mirror pass.

use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, FRAC_PI_8, PI, TAU};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, Timelike};
use glam::Vec3;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::animation::{Bounce, Levitation};
use crate::assets::AssetLoader;
use crate::camera::Camera;
use crate::config::ViewerConfig;
use crate::error::Result;
use crate::gpu::shader::SCENE_PROGRAM;
use crate::gpu::{Gpu, ShaderProgram, UniformSlot, UniformValue};
use crate::lights::{LightBinding, LightBuffers, PointLight, SpotLight};
use crate::mirror::Mirror;
use crate::resources::{
    Mesh, ShaderUniforms, SurfaceMaterial, Texture, Transform, VertexAttributes,
};
use crate::rubik::{Axis, RubikCube};

pub const ROOM_WIDTH: f32 = 50.0;
pub const ROOM_HEIGHT: f32 = 17.0;
pub const ROOM_LENGTH: f32 = 30.0;

/// Eye mask mirroring the camera across the mirror wall.
pub const MIRROR_REFLECTION: Vec3 = Vec3::new(1.0, 1.0, -1.0);

pub const POINT_LIGHTS_BINDING: u32 = 0;
pub const SPOT_LIGHTS_BINDING: u32 = 1;

/// Draw calls per pass that do not belong to the Rubik's cube.
const FIXED_DRAWS: usize = 31;

/// Surface source selected in the fragment shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum TextureMode {
    /// Sample the texture bound on unit 0.
    Sampled = 1,
    ProceduralWood = 2,
    ProceduralBricks = 3,
    ProceduralCarpet = 4,
    None = 5,
}

/// Time of day shown by the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WallTime {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl WallTime {
    /// Current local time of day.
    pub fn now() -> Self {
        Self::from_time(&Local::now())
    }

    pub fn from_time(time: &impl Timelike) -> Self {
        Self {
            hour: time.hour(),
            minute: time.minute(),
            second: time.second(),
        }
    }

    /// Hand angles around +Z for hours, minutes and seconds.
    pub fn hand_angles(&self) -> (f32, f32, f32) {
        (
            TAU / 12.0 * (12 - self.hour % 12) as f32,
            TAU / 60.0 * (60 - self.minute % 60) as f32,
            TAU / 60.0 * (60 - self.second % 60) as f32,
        )
    }
}

pub type Clock = Box<dyn Fn() -> WallTime + Send>;

struct Meshes {
    wall: Mesh,
    bin: Mesh,
    box_: Mesh,
    chair: Mesh,
    table: Mesh,
    shelves_with_mini_table: Mesh,
    door: Mesh,
    sphere: Mesh,
    cube: Mesh,
    notebook: Mesh,
    notebook_display: Mesh,
    clock: Mesh,
    clock_hand: Mesh,
    lamp: Mesh,
    bulb: Mesh,
}

impl Meshes {
    fn load(gpu: &Gpu, assets: &dyn AssetLoader, attributes: &VertexAttributes) -> Result<Self> {
        let load = |name: &str| -> Result<Mesh> {
            let mesh = Mesh::new(gpu.clone(), &assets.load_geometry(name)?, attributes)?;
            debug!("mesh '{}' ready ({} vertices)", name, mesh.vertex_count());
            Ok(mesh)
        };
        Ok(Self {
            wall: load("Wall")?,
            bin: load("Bin")?,
            box_: load("Box")?,
            chair: load("Chair")?,
            table: load("Table")?,
            shelves_with_mini_table: load("ShelvesWithMiniTable")?,
            door: load("Door")?,
            sphere: load("Sphere")?,
            cube: load("Cube")?,
            notebook: load("Notebook")?,
            notebook_display: load("NotebookDisplay")?,
            clock: load("Clock")?,
            clock_hand: load("ClockHand")?,
            lamp: load("Lamp")?,
            bulb: load("Bulb")?,
        })
    }
}

struct Textures {
    bin: Texture,
    birchwood: Texture,
    doorwood: Texture,
    /// Loaded with the set; no object samples it.
    _metal: Texture,
    box_: Texture,
    wall: Texture,
    notebook_display_content: Texture,
}

impl Textures {
    fn load(gpu: &Gpu, assets: &dyn AssetLoader) -> Result<Self> {
        let load = |name: &str| -> Result<Texture> {
            Texture::from_image(gpu.clone(), &assets.load_image(name)?)
        };
        Ok(Self {
            bin: load("Bin")?,
            birchwood: load("Birchwood")?,
            _metal: load("Metal")?,
            box_: load("Box")?,
            wall: load("Wall")?,
            doorwood: load("Doorwood")?,
            notebook_display_content: load("NotebookDisplayContent")?,
        })
    }
}

/// Slots outside [`ShaderUniforms`] that the scene writes itself.
#[derive(Debug, Clone, Copy)]
struct SceneUniforms {
    eye_position: UniformSlot,
    texture_sampler: UniformSlot,
    texture_type: UniformSlot,
    flip_texel_v: UniformSlot,
}

pub struct Scene {
    gpu: Gpu,
    shader: ShaderProgram,
    uniforms: ShaderUniforms,
    scene_uniforms: SceneUniforms,
    meshes: Meshes,
    textures: Textures,
    lights: LightBuffers,
    mirror: Mirror,
    point_light_positions: [Vec3; 2],
    spot_light_positions: [Vec3; 2],
    rubik: RubikCube,
    levitation: Levitation,
    bounce: Bounce,
    rng: StdRng,
    clock: Clock,
}

impl Scene {
    /// Compiles the program, uploads every mesh and texture, creates the
    /// default lights and the mirror target.
    pub fn new(gpu: Gpu, assets: &dyn AssetLoader, config: &ViewerConfig) -> Result<Self> {
        let shader = ShaderProgram::new(gpu.clone(), &SCENE_PROGRAM)?;
        let uniforms = ShaderUniforms::resolve(&shader)?;
        let scene_uniforms = SceneUniforms {
            eye_position: shader.require_uniform("eye_position")?,
            texture_sampler: shader.require_uniform("texture_sampler")?,
            texture_type: shader.require_uniform("texture_type")?,
            flip_texel_v: shader.require_uniform("flip_texel_v")?,
        };
        let attributes = VertexAttributes::from_program(&shader);

        let meshes = Meshes::load(&gpu, assets, &attributes)?;
        let textures = Textures::load(&gpu, assets)?;

        let (lights, point_light_positions, spot_light_positions) =
            create_lights(&gpu, &shader)?;
        let mirror = Mirror::new(gpu.clone(), config.mirror_size, config.mirror_size)?;

        let seed = config.seed.unwrap_or_else(seed_from_time);
        info!(
            "scene ready: {} point lights, {} spot lights, {}x{} mirror, seed {}",
            lights.point_lights().len(),
            lights.spot_lights().len(),
            mirror.width(),
            mirror.height(),
            seed
        );

        Ok(Self {
            gpu,
            shader,
            uniforms,
            scene_uniforms,
            meshes,
            textures,
            lights,
            mirror,
            point_light_positions,
            spot_light_positions,
            rubik: RubikCube::new(),
            levitation: Levitation::new(),
            bounce: Bounce::new(),
            rng: StdRng::seed_from_u64(seed),
            clock: Box::new(WallTime::now),
        })
    }

    /// Replaces the wall clock time source.
    pub fn set_clock(&mut self, clock: impl Fn() -> WallTime + Send + 'static) {
        self.clock = Box::new(clock);
    }

    pub fn shader(&self) -> &ShaderProgram {
        &self.shader
    }

    pub fn lights(&self) -> &LightBuffers {
        &self.lights
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    pub fn rubik(&self) -> &RubikCube {
        &self.rubik
    }

    pub fn levitation(&self) -> &Levitation {
        &self.levitation
    }

    pub fn bounce(&self) -> &Bounce {
        &self.bounce
    }

    /// Draw calls issued for one rendering of the room without the mirror.
    pub fn draws_per_pass(&self) -> usize {
        FIXED_DRAWS + self.rubik.draw_count()
    }

    pub fn update(&mut self, dt: f32) {
        self.rubik.update(dt);

        self.levitation.advance(dt);
        if !self.rubik.is_rotating() {
            let axis = Axis::ALL[self.rng.gen_range(0..Axis::ALL.len())];
            let layer = self.rng.gen_range(0..3);
            let clockwise = self.rng.gen_bool(0.5);
            self.rubik.rotate(axis, layer, clockwise);
        }

        self.bounce.advance(dt);
    }

    /// Renders the reflected room into the mirror, then the room itself,
    /// then the mirror surface.
    pub fn draw(&self, camera: &Camera) {
        self.lights.send_data_into_gpu();
        self.shader.set_active();
        self.lights.send_data_into_shader();
        self.gpu.set_uniform(
            self.scene_uniforms.eye_position,
            UniformValue::Vec3(camera.eye_position()),
        );

        self.mirror.set_active();
        self.draw_scene_without_mirror(&self.mirror.reflected_camera(camera, MIRROR_REFLECTION));
        self.mirror.set_inactive();

        self.draw_scene_without_mirror(camera);
        self.draw_mirror(camera);

        self.shader.set_inactive();
    }

    fn set_texture_mode(&self, mode: TextureMode) {
        self.gpu
            .set_uniform(self.scene_uniforms.texture_type, UniformValue::Int(mode as i32));
        self.set_texel_flip(false);
        if mode == TextureMode::Sampled {
            self.gpu
                .set_uniform(self.scene_uniforms.texture_sampler, UniformValue::Int(0));
        }
    }

    fn set_texel_flip(&self, flip: bool) {
        self.gpu.set_uniform(
            self.scene_uniforms.flip_texel_v,
            UniformValue::Int(i32::from(flip)),
        );
    }

    fn draw_mesh(
        &self,
        camera: &Camera,
        mesh: &Mesh,
        material: &SurfaceMaterial,
        transform: Transform,
    ) {
        mesh.draw(camera, material, &transform, &self.uniforms);
    }

    fn draw_scene_without_mirror(&self, camera: &Camera) {
        self.draw_room(camera);
        self.draw_shelves_with_mini_table(camera);
        self.draw_bin(camera);
        self.draw_door(camera);
        self.draw_table(camera);
        self.draw_chairs(camera);
        self.draw_laptop(camera);
        self.draw_clock(camera);
        self.draw_boxes(camera);
        for position in self.spot_light_positions {
            self.draw_lamp(camera, position);
        }
        for position in self.point_light_positions {
            self.draw_bulb(camera, position);
        }
        self.draw_levitating_rubik_cube(camera);
        self.draw_bouncing_balls(camera);
    }

    fn draw_room(&self, camera: &Camera) {
        let m = &self.meshes;

        self.set_texture_mode(TextureMode::ProceduralBricks);
        self.draw_mesh(
            camera,
            &m.cube,
            &SurfaceMaterial::WALL,
            room_transform(),
        );

        // Floor
        self.set_texture_mode(TextureMode::ProceduralCarpet);
        self.draw_mesh(
            camera,
            &m.wall,
            &SurfaceMaterial::WALL,
            Transform::new()
                .translate(Vec3::new(0.0, -ROOM_HEIGHT / 2.0 + 0.01, 0.0))
                .scale(Vec3::new(ROOM_WIDTH / 2.0, 1.0, ROOM_LENGTH / 2.0)),
        );

        // Ceiling
        self.set_texture_mode(TextureMode::Sampled);
        self.textures.wall.bind();
        self.draw_mesh(
            camera,
            &m.wall,
            &SurfaceMaterial::WALL,
            Transform::new()
                .rotate(PI, Vec3::X)
                .translate(Vec3::new(0.0, -ROOM_HEIGHT / 2.0 + 0.01, 0.0))
                .scale(Vec3::new(ROOM_WIDTH / 2.0, 1.0, ROOM_LENGTH)),
        );
        self.textures.wall.unbind();
    }

    fn draw_clock(&self, camera: &Camera) {
        let m = &self.meshes;
        let face = Transform::new()
            .rotate(PI, Vec3::Y)
            .translate(Vec3::new(0.0, 4.0, -ROOM_LENGTH / 2.0));

        self.set_texture_mode(TextureMode::None);
        self.draw_mesh(
            camera,
            &m.clock,
            &SurfaceMaterial::PLASTIC,
            face.scale(Vec3::splat(0.05)),
        );

        let (hour, minute, second) = (self.clock)().hand_angles();
        for (angle, scale) in [
            (hour, Vec3::new(0.05, 0.05, 0.05)),
            (minute, Vec3::new(0.05, 0.06, 0.05)),
            (second, Vec3::new(0.02, 0.09, 0.05)),
        ] {
            self.set_texture_mode(TextureMode::None);
            self.draw_mesh(
                camera,
                &m.clock_hand,
                &SurfaceMaterial::DARK_PLASTIC,
                face.rotate(angle, Vec3::Z)
                    .translate(Vec3::new(0.0, 0.15, 0.0))
                    .scale(scale),
            );
        }
    }

    fn draw_shelves_with_mini_table(&self, camera: &Camera) {
        self.set_texture_mode(TextureMode::Sampled);
        self.textures.birchwood.bind();
        self.draw_mesh(
            camera,
            &self.meshes.shelves_with_mini_table,
            &SurfaceMaterial::WOOD,
            Transform::new()
                .translate(Vec3::new(4.0, -ROOM_HEIGHT / 2.0, 2.5))
                .scale(Vec3::splat(4.0)),
        );
        self.textures.birchwood.unbind();
    }

    fn draw_laptop(&self, camera: &Camera) {
        let m = &self.meshes;
        let base = Transform::new()
            .rotate(PI, Vec3::Y)
            .translate(Vec3::new(0.0, -3.5, -12.0));

        self.set_texture_mode(TextureMode::None);
        self.draw_mesh(
            camera,
            &m.notebook,
            &SurfaceMaterial::PLASTIC,
            base.scale(Vec3::splat(0.05)),
        );

        self.set_texture_mode(TextureMode::None);
        self.draw_mesh(
            camera,
            &m.notebook_display,
            &SurfaceMaterial::PLASTIC,
            base.scale(Vec3::splat(0.05)),
        );

        // Screen content on a plane tilted with the display
        self.set_texture_mode(TextureMode::Sampled);
        self.textures.notebook_display_content.bind();
        self.draw_mesh(
            camera,
            &m.wall,
            &SurfaceMaterial::PLASTIC,
            base.rotate(FRAC_PI_4 * 1.45, Vec3::X)
                .translate(Vec3::new(0.0, 0.0, -0.62))
                .scale(Vec3::new(0.85, 1.0, 0.58)),
        );
        self.textures.notebook_display_content.unbind();
    }

    fn draw_bin(&self, camera: &Camera) {
        self.set_texture_mode(TextureMode::Sampled);
        self.textures.bin.bind();
        self.draw_mesh(
            camera,
            &self.meshes.bin,
            &SurfaceMaterial::SILVER,
            Transform::new()
                .translate(Vec3::new(
                    ROOM_WIDTH / 2.0 - 2.0,
                    -ROOM_HEIGHT / 2.0,
                    -ROOM_LENGTH / 2.0 + 2.0,
                ))
                .scale(Vec3::splat(0.08)),
        );
        self.textures.bin.unbind();
    }

    fn draw_door(&self, camera: &Camera) {
        self.set_texture_mode(TextureMode::Sampled);
        self.textures.doorwood.bind();
        self.draw_mesh(
            camera,
            &self.meshes.door,
            &SurfaceMaterial::WOOD,
            Transform::new()
                .translate(Vec3::new(ROOM_WIDTH / 2.0, -ROOM_HEIGHT / 2.0, 0.0))
                .rotate(FRAC_PI_2, Vec3::Y)
                .scale(Vec3::new(8.0, 5.0, 4.0)),
        );
        self.textures.doorwood.unbind();
    }

    fn draw_table(&self, camera: &Camera) {
        self.set_texture_mode(TextureMode::ProceduralWood);
        self.draw_mesh(
            camera,
            &self.meshes.table,
            &SurfaceMaterial::WOOD,
            Transform::new()
                .translate(Vec3::new(0.0, -ROOM_HEIGHT / 2.0, ROOM_LENGTH / 2.0 - 3.0))
                .scale(Vec3::splat(0.07)),
        );
    }

    fn draw_chairs(&self, camera: &Camera) {
        let chair = |position: Vec3, angle: f32| {
            Transform::new()
                .translate(position)
                .rotate(angle, Vec3::Y)
                .scale(Vec3::splat(1.8))
        };
        let floor = -ROOM_HEIGHT / 2.0 + 1.5;

        self.set_texture_mode(TextureMode::ProceduralWood);
        self.draw_mesh(
            camera,
            &self.meshes.chair,
            &SurfaceMaterial::WOOD,
            chair(Vec3::new(0.0, floor, 3.0), -FRAC_PI_2),
        );

        self.set_texture_mode(TextureMode::Sampled);
        self.textures.doorwood.bind();
        self.draw_mesh(
            camera,
            &self.meshes.chair,
            &SurfaceMaterial::WOOD,
            chair(Vec3::new(-6.0, floor, 5.0), -FRAC_PI_4),
        );
        self.textures.doorwood.unbind();

        self.set_texture_mode(TextureMode::Sampled);
        self.textures.birchwood.bind();
        self.draw_mesh(
            camera,
            &self.meshes.chair,
            &SurfaceMaterial::WOOD,
            chair(Vec3::new(6.0, floor, 5.0), -PI + FRAC_PI_4),
        );
        self.textures.birchwood.unbind();
    }

    fn draw_boxes(&self, camera: &Camera) {
        let mesh = &self.meshes.box_;
        let placed = |position: Vec3, angle: f32, scale: Vec3| {
            Transform::new()
                .translate(position)
                .rotate(angle, Vec3::Y)
                .scale(scale)
        };
        let floor = -ROOM_HEIGHT / 2.0;
        let corner_x = ROOM_WIDTH / 2.0 - 3.0;
        let corner_z = ROOM_LENGTH / 2.0 - 3.0;

        self.set_texture_mode(TextureMode::Sampled);
        self.textures.box_.bind();
        self.draw_mesh(
            camera,
            mesh,
            &SurfaceMaterial::WOOD,
            placed(
                Vec3::new(-corner_x, floor, corner_z),
                FRAC_PI_4,
                Vec3::splat(0.07),
            ),
        );

        self.set_texture_mode(TextureMode::Sampled);
        self.draw_mesh(
            camera,
            mesh,
            &SurfaceMaterial::WOOD,
            placed(
                Vec3::new(corner_x, floor, corner_z),
                FRAC_PI_4,
                Vec3::splat(0.04),
            ),
        );
        self.textures.box_.unbind();

        self.set_texture_mode(TextureMode::Sampled);
        self.textures.birchwood.bind();
        self.draw_mesh(
            camera,
            mesh,
            &SurfaceMaterial::WOOD,
            placed(
                Vec3::new(corner_x, floor + 2.5, corner_z),
                FRAC_PI_2,
                Vec3::new(0.03, 0.03, 0.04),
            ),
        );
        self.textures.birchwood.unbind();

        self.set_texture_mode(TextureMode::ProceduralWood);
        self.draw_mesh(
            camera,
            mesh,
            &SurfaceMaterial::WOOD,
            placed(
                Vec3::new(corner_x, floor, ROOM_LENGTH / 2.0 - 8.0),
                FRAC_PI_2 + 1.0,
                Vec3::splat(0.05),
            ),
        );

        // Doorwood stays bound after this box; later sampled draws bind
        // their own texture first.
        self.set_texture_mode(TextureMode::Sampled);
        self.textures.doorwood.bind();
        self.draw_mesh(
            camera,
            mesh,
            &SurfaceMaterial::WOOD,
            placed(
                Vec3::new(corner_x, floor + 3.0, ROOM_LENGTH / 2.0 - 7.0),
                FRAC_PI_4,
                Vec3::splat(0.06),
            ),
        );
        self.textures.doorwood.bind();
    }

    fn draw_bulb(&self, camera: &Camera, position: Vec3) {
        self.set_texture_mode(TextureMode::None);
        self.draw_mesh(
            camera,
            &self.meshes.bulb,
            &SurfaceMaterial::GLASS,
            Transform::new().translate(position).scale(Vec3::splat(0.02)),
        );
    }

    /// Desk lamp with its own tilted bulb.
    fn draw_lamp(&self, camera: &Camera, position: Vec3) {
        let base = Transform::new()
            .translate(position)
            .rotate(PI - 0.5, Vec3::Y);

        self.set_texture_mode(TextureMode::None);
        self.draw_mesh(
            camera,
            &self.meshes.bulb,
            &SurfaceMaterial::GLASS,
            base.translate(Vec3::new(-0.5, 1.7, 0.0))
                .rotate(-0.5, Vec3::Z)
                .scale(Vec3::splat(0.02)),
        );

        self.set_texture_mode(TextureMode::Sampled);
        self.textures.bin.bind();
        self.draw_mesh(
            camera,
            &self.meshes.lamp,
            &SurfaceMaterial::BRONZE,
            base.scale(Vec3::splat(0.1)),
        );
        self.textures.bin.unbind();
    }

    fn draw_levitating_rubik_cube(&self, camera: &Camera) {
        self.set_texture_mode(TextureMode::None);
        let outer = Transform::new()
            .translate(Vec3::new(
                -ROOM_WIDTH / 2.0 + 3.0,
                self.levitation.height_offset,
                ROOM_LENGTH / 2.0 - 3.0,
            ))
            .rotate(self.levitation.angle, Vec3::ONE)
            .scale(Vec3::splat(2.0));
        self.rubik
            .draw(camera, &self.meshes.cube, &outer, &self.uniforms);
    }

    fn draw_bouncing_balls(&self, camera: &Camera) {
        let ball = |x: f32| {
            Transform::new()
                .translate(Vec3::new(
                    x,
                    -self.bounce.height_offset,
                    -ROOM_LENGTH / 2.0 + 2.0,
                ))
                .scale(Vec3::new(1.0, self.bounce.scale, 1.0))
        };

        self.set_texture_mode(TextureMode::None);
        self.draw_mesh(
            camera,
            &self.meshes.sphere,
            &SurfaceMaterial::BRONZE,
            ball(-ROOM_WIDTH / 4.0),
        );

        // The bin texture is left bound by both remaining balls.
        self.set_texture_mode(TextureMode::Sampled);
        self.textures.bin.bind();
        self.draw_mesh(
            camera,
            &self.meshes.sphere,
            &SurfaceMaterial::BRONZE,
            ball(-ROOM_WIDTH / 6.0),
        );
        self.textures.bin.bind();

        self.set_texture_mode(TextureMode::ProceduralWood);
        self.textures.bin.bind();
        self.draw_mesh(
            camera,
            &self.meshes.sphere,
            &SurfaceMaterial::WOOD,
            ball(-ROOM_WIDTH / 10.0),
        );
        self.textures.bin.bind();
    }

    fn draw_mirror(&self, camera: &Camera) {
        self.set_texture_mode(TextureMode::Sampled);
        // Loaded images are stored bottom row first, rendered targets top row first.
        self.set_texel_flip(true);
        self.mirror.bind_as_texture();
        self.draw_mesh(
            camera,
            &self.meshes.wall,
            &SurfaceMaterial::GLASS,
            Transform::new()
                .translate(Vec3::new(-10.0, 0.0, ROOM_LENGTH / 2.0 - 0.5))
                .rotate(FRAC_PI_2, Vec3::X)
                .scale(Vec3::new(5.0, 1.0, 3.0)),
        );
        self.mirror.unbind_as_texture();
        self.set_texel_flip(false);
    }
}

/// Stretches the unit `Cube` mesh over the whole room.
fn room_transform() -> Transform {
    Transform::new().scale(Vec3::new(ROOM_WIDTH, ROOM_HEIGHT, ROOM_LENGTH))
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("lights", &self.lights)
            .field("mirror", &self.mirror)
            .field("levitation", &self.levitation)
            .field("bounce", &self.bounce)
            .field("rubik_rotating", &self.rubik.is_rotating())
            .finish()
    }
}

type LightPositions = [Vec3; 2];

fn create_lights(
    gpu: &Gpu,
    shader: &ShaderProgram,
) -> Result<(LightBuffers, LightPositions, LightPositions)> {
    let point_block = shader.uniform_block_index("point_lights_data")?;
    let spot_block = shader.uniform_block_index("spot_lights_data")?;
    shader.uniform_block_binding(point_block, POINT_LIGHTS_BINDING);
    shader.uniform_block_binding(spot_block, SPOT_LIGHTS_BINDING);

    let mut lights = LightBuffers::new(
        gpu.clone(),
        LightBinding {
            binding: POINT_LIGHTS_BINDING,
            count_uniform: shader.require_uniform("num_point_lights")?,
        },
        LightBinding {
            binding: SPOT_LIGHTS_BINDING,
            count_uniform: shader.require_uniform("num_spot_lights")?,
        },
    )?;

    let ambient = Vec3::splat(0.3);
    let point_positions = [
        Vec3::new(15.0, ROOM_HEIGHT / 2.0 - 0.5, 0.0),
        Vec3::new(-15.0, ROOM_HEIGHT / 2.0 - 0.5, 0.0),
    ];
    for position in point_positions {
        lights.add_point_light(PointLight::new(
            position.extend(1.0),
            ambient,
            Vec3::ONE,
            Vec3::ONE,
        ))?;
    }

    let spot_positions = [Vec3::new(3.0, -3.5, 12.0), Vec3::new(4.0, 0.5, -12.0)];
    for position in spot_positions {
        lights.add_spot_light(SpotLight::new(
            position.extend(1.0),
            Vec3::new(1.0, -1.0, 0.5),
            ambient,
            Vec3::ONE,
            Vec3::ONE,
            FRAC_PI_8,
        ))?;
    }

    Ok((lights, point_positions, spot_positions))
}

fn seed_from_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::BuiltinAssets;

    #[test]
    fn builtin_room_box_meets_the_floor() {
        let cube = BuiltinAssets.load_geometry("Cube").unwrap();
        let matrix = room_transform().matrix();
        let (low, high) = cube
            .positions
            .chunks_exact(3)
            .map(|p| matrix.transform_point3(Vec3::from_slice(p)))
            .fold((Vec3::MAX, Vec3::MIN), |(low, high), p| (low.min(p), high.max(p)));
        assert!((low.y + ROOM_HEIGHT / 2.0).abs() < 1e-4);
        assert!((high - Vec3::new(ROOM_WIDTH, ROOM_HEIGHT, ROOM_LENGTH) / 2.0)
            .abs()
            .max_element()
            < 1e-4);
        // Floor plane sits just above the box bottom.
        assert!(-ROOM_HEIGHT / 2.0 + 0.01 - low.y < 0.02);
    }

    #[test]
    fn hand_angles_follow_the_clock_face() {
        let noon = WallTime {
            hour: 12,
            minute: 0,
            second: 0,
        };
        let (hour, minute, second) = noon.hand_angles();
        assert!((hour - TAU).abs() < 1e-6);
        assert!((minute - TAU).abs() < 1e-6);
        assert!((second - TAU).abs() < 1e-6);

        let quarter_past_three = WallTime {
            hour: 15,
            minute: 15,
            second: 30,
        };
        let (hour, minute, second) = quarter_past_three.hand_angles();
        assert!((hour - TAU * 9.0 / 12.0).abs() < 1e-5);
        assert!((minute - TAU * 45.0 / 60.0).abs() < 1e-5);
        assert!((second - PI).abs() < 1e-5);
    }

    #[test]
    fn wall_time_is_in_range() {
        let now = WallTime::now();
        assert!(now.hour < 24 && now.minute < 60 && now.second < 60);
    }

    #[test]
    fn wall_time_keeps_the_local_hour() {
        let time = chrono::NaiveTime::from_hms_opt(21, 7, 42).unwrap();
        assert_eq!(
            WallTime::from_time(&time),
            WallTime {
                hour: 21,
                minute: 7,
                second: 42,
            }
        );
    }

    #[test]
    fn texture_modes_match_shader_selector() {
        assert_eq!(TextureMode::Sampled as i32, 1);
        assert_eq!(TextureMode::ProceduralWood as i32, 2);
        assert_eq!(TextureMode::ProceduralBricks as i32, 3);
        assert_eq!(TextureMode::ProceduralCarpet as i32, 4);
        assert_eq!(TextureMode::None as i32, 5);
    }
}
