use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};

/// Multiplicative radius step applied by one zoom notch.
pub const ZOOM: f32 = 1.1;
/// Radians of orbit per pixel of mouse drag.
pub const ROTATION_SENSITIVITY: f32 = 0.01;
pub const MIN_RADIUS: f32 = 2.0;
pub const MAX_RADIUS: f32 = 14.0;

const DEFAULT_RADIUS: f32 = 10.0;
const DEFAULT_X_ANGLE: f32 = 0.0;
const DEFAULT_Y_ANGLE: f32 = 0.3;
const POLE_MARGIN: f32 = 0.01;
const FOV_Y_DEGREES: f32 = 45.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

/// Arcball camera orbiting the origin.
///
/// The eye is derived from two angles and a radius; it always looks at the
/// origin with +Y up. [`Camera::set_eye_position_manual`] overrides the eye
/// for one-shot snapshots such as the mirror camera: the next
/// rotate/zoom/reset recomputes the eye from the stored angles.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    projection: Mat4,
    eye: Vec3,
    x_angle: f32,
    y_angle: f32,
    radius: f32,
    window_width: f32,
    window_height: f32,
}

impl Camera {
    pub fn new(window_width: f32, window_height: f32) -> Self {
        let mut camera = Self {
            projection: Mat4::IDENTITY,
            eye: Vec3::ZERO,
            x_angle: DEFAULT_X_ANGLE,
            y_angle: DEFAULT_Y_ANGLE,
            radius: DEFAULT_RADIUS,
            window_width: 1.0,
            window_height: 1.0,
        };
        camera.resize(window_width, window_height);
        camera.recalculate_eye();
        camera
    }

    /// Updates the projection aspect; zero or negative sizes clamp to one.
    pub fn resize(&mut self, window_width: f32, window_height: f32) {
        self.window_width = window_width.max(1.0);
        self.window_height = window_height.max(1.0);
        self.projection = Mat4::perspective_rh(
            FOV_Y_DEGREES.to_radians(),
            self.window_width / self.window_height,
            Z_NEAR,
            Z_FAR,
        );
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) -> &mut Self {
        let limit = FRAC_PI_2 - POLE_MARGIN;
        self.x_angle += dx * ROTATION_SENSITIVITY;
        self.y_angle = (self.y_angle + dy * ROTATION_SENSITIVITY).clamp(-limit, limit);
        self.recalculate_eye();
        self
    }

    pub fn zoom_in(&mut self) -> &mut Self {
        self.radius = (self.radius / ZOOM).clamp(MIN_RADIUS, MAX_RADIUS);
        self.recalculate_eye();
        self
    }

    pub fn zoom_out(&mut self) -> &mut Self {
        self.radius = (self.radius * ZOOM).clamp(MIN_RADIUS, MAX_RADIUS);
        self.recalculate_eye();
        self
    }

    pub fn reset(&mut self) -> &mut Self {
        self.x_angle = DEFAULT_X_ANGLE;
        self.y_angle = DEFAULT_Y_ANGLE;
        self.radius = DEFAULT_RADIUS;
        self.recalculate_eye();
        self
    }

    pub fn set_eye_position_manual(&mut self, eye: Vec3) {
        self.eye = eye;
    }

    /// Projection × view.
    pub fn matrix(&self) -> Mat4 {
        self.projection * self.view_matrix()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, Vec3::ZERO, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn eye_position(&self) -> Vec3 {
        self.eye
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn angles(&self) -> (f32, f32) {
        (self.x_angle, self.y_angle)
    }

    pub fn window_width(&self) -> f32 {
        self.window_width
    }

    pub fn window_height(&self) -> f32 {
        self.window_height
    }

    fn recalculate_eye(&mut self) {
        let (sin_x, cos_x) = self.x_angle.sin_cos();
        let (sin_y, cos_y) = self.y_angle.sin_cos();
        self.eye = self.radius * Vec3::new(cos_y * sin_x, sin_y, cos_y * cos_x);
    }
}
