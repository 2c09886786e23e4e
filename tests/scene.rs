use std::sync::Arc;

use glam::Vec2;
use mirror_room::gpu::{ObjectKind, UniformValue};
use mirror_room::{
    BuiltinAssets, Camera, CameraInput, Error, Gpu, GpuHandle, HeadlessDevice, MouseButton,
    Scene, TextureMode, ViewerConfig, WallTime,
};

fn config() -> ViewerConfig {
    ViewerConfig {
        seed: Some(7),
        ..ViewerConfig::default()
    }
}

fn build() -> (Arc<HeadlessDevice>, Scene) {
    let device = Arc::new(HeadlessDevice::new());
    let gpu: Gpu = device.clone();
    let scene = Scene::new(gpu, &BuiltinAssets, &config()).expect("scene builds");
    (device, scene)
}

#[test]
fn light_counts_reach_the_shader() {
    let (device, scene) = build();
    scene.draw(&Camera::new(800.0, 600.0));

    let program = scene.shader().handle();
    assert_eq!(
        device.uniform(program, "num_point_lights"),
        Some(UniformValue::Int(2))
    );
    assert_eq!(
        device.uniform(program, "num_spot_lights"),
        Some(UniformValue::Int(2))
    );
    assert_eq!(device.bound_buffer(0), scene.lights().point_light_buffer());
    assert_eq!(device.bound_buffer(1), scene.lights().spot_light_buffer());
    assert_eq!(device.block_binding(program, 0), Some(0));
    assert_eq!(device.block_binding(program, 1), Some(1));
}

#[test]
fn reflected_pass_then_real_pass_then_mirror_surface() {
    let (device, scene) = build();
    let camera = Camera::new(800.0, 600.0);
    device.clear_draws();
    scene.draw(&camera);

    let draws = device.draws();
    let per_pass = scene.draws_per_pass();
    assert_eq!(draws.len(), 2 * per_pass + 1);

    let mirror = scene.mirror().framebuffer();
    assert!(draws[..per_pass]
        .iter()
        .all(|draw| draw.framebuffer == mirror));
    assert!(draws[per_pass..]
        .iter()
        .all(|draw| draw.framebuffer == GpuHandle::EMPTY));

    let surface = draws.last().unwrap();
    assert_eq!(surface.texture, scene.mirror().color_texture().handle());
    assert_eq!(surface.texture_type, Some(TextureMode::Sampled as i32));
    assert!(draws
        .iter()
        .all(|draw| draw.program == scene.shader().handle()));
    assert!(device.current_program().is_empty());
}

#[test]
fn only_the_mirror_surface_samples_with_flipped_rows() {
    let (device, scene) = build();
    device.clear_draws();
    scene.draw(&Camera::new(800.0, 600.0));

    let draws = device.draws();
    let (surface, rest) = draws.split_last().unwrap();
    assert!(surface.flip_texel_v);
    assert!(rest.iter().all(|draw| !draw.flip_texel_v));

    // The flag does not leak into the next frame's reflected pass.
    device.clear_draws();
    scene.draw(&Camera::new(800.0, 600.0));
    assert!(!device.draws()[0].flip_texel_v);
}

#[test]
fn eye_uniform_uses_the_real_camera() {
    let (device, scene) = build();
    let mut camera = Camera::new(800.0, 600.0);
    camera.rotate(25.0, -10.0);
    scene.draw(&camera);
    assert_eq!(
        device.uniform(scene.shader().handle(), "eye_position"),
        Some(UniformValue::Vec3(camera.eye_position()))
    );
}

#[test]
fn camera_input_drives_what_is_drawn() {
    let (device, scene) = build();
    let mut camera = Camera::new(800.0, 600.0);
    let mut input = CameraInput::new();
    input.mouse_button(MouseButton::Left, true);
    input.cursor_moved(&mut camera, Vec2::new(10.0, 10.0));
    input.cursor_moved(&mut camera, Vec2::new(20.0, 12.0));
    scene.draw(&camera);
    assert_ne!(camera.eye_position(), Camera::new(800.0, 600.0).eye_position());
    assert_eq!(
        device.uniform(scene.shader().handle(), "eye_position"),
        Some(UniformValue::Vec3(camera.eye_position()))
    );
}

#[test]
fn same_seed_scrambles_the_same_way() {
    let (_first_device, mut first) = build();
    let (_second_device, mut second) = build();
    for _ in 0..90 {
        first.update(1.0 / 30.0);
        second.update(1.0 / 30.0);
    }
    assert_eq!(first.rubik(), second.rubik());
    assert_eq!(first.bounce(), second.bounce());
    assert_eq!(first.levitation(), second.levitation());
}

#[test]
fn update_always_keeps_the_cube_turning() {
    let (_device, mut scene) = build();
    for _ in 0..120 {
        scene.update(1.0 / 30.0);
        assert!(scene.rubik().is_rotating());
        assert!(scene.bounce().height_offset <= 8.0);
    }
}

#[test]
fn injected_clock_is_read_every_draw() {
    let (_device, mut scene) = build();
    let reads = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&reads);
    scene.set_clock(move || {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        WallTime {
            hour: 3,
            minute: 0,
            second: 0,
        }
    });
    scene.draw(&Camera::new(800.0, 600.0));
    // Once for the reflected pass and once for the real one.
    assert_eq!(reads.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[test]
fn dropping_the_scene_releases_every_object() {
    let (device, mut scene) = build();
    scene.update(1.0 / 30.0);
    scene.draw(&Camera::new(800.0, 600.0));
    assert!(device.live_objects() > 0);
    drop(scene);
    assert_eq!(device.live_objects(), 0);
}

#[test]
fn failed_construction_leaves_nothing_behind() {
    let device = Arc::new(HeadlessDevice::new());
    device.fail_creation_of(ObjectKind::Framebuffer);
    let gpu: Gpu = device.clone();
    let err = Scene::new(gpu, &BuiltinAssets, &config()).unwrap_err();
    assert!(matches!(err, Error::ResourceCreation { .. }));
    assert_eq!(device.live_objects(), 0);
}
