//! Self-contained 3×3×3 Rubik's cube with animated quarter turns.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{IVec3, Quat, Vec3};
use log::trace;

use crate::camera::Camera;
use crate::resources::{Mesh, ShaderUniforms, SurfaceMaterial, Transform};

/// Angular speed of a layer turn in radians per second.
pub const TURN_SPEED: f32 = PI;

/// Distance between neighbouring cubie centres in cube space.
const SPACING: f32 = 2.0 / 3.0;
/// Half extent of a cubie body; slightly under `SPACING / 2` to leave seams.
const CUBIE_HALF: f32 = 0.31;
const STICKER_HALF: f32 = 0.26;
const STICKER_DEPTH: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }

    fn component(self, position: IVec3) -> i32 {
        match self {
            Axis::X => position.x,
            Axis::Y => position.y,
            Axis::Z => position.z,
        }
    }
}

/// Sticker colours keyed by the outward face normal of the solved cube.
const FACES: [(IVec3, Vec3); 6] = [
    (IVec3::X, Vec3::new(0.8, 0.05, 0.05)),
    (IVec3::NEG_X, Vec3::new(1.0, 0.45, 0.0)),
    (IVec3::Y, Vec3::new(0.95, 0.95, 0.95)),
    (IVec3::NEG_Y, Vec3::new(1.0, 0.85, 0.0)),
    (IVec3::Z, Vec3::new(0.0, 0.6, 0.15)),
    (IVec3::NEG_Z, Vec3::new(0.05, 0.2, 0.8)),
];

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cubie {
    /// Grid cell, each component in `-1..=1`.
    position: IVec3,
    /// Cell in the solved state; decides which faces carry stickers.
    home: IVec3,
    orientation: Quat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Turn {
    axis: Axis,
    layer: i32,
    /// Signed target angle, `±π/2`.
    target: f32,
    progress: f32,
}

impl Turn {
    fn contains(&self, position: IVec3) -> bool {
        self.axis.component(position) == self.layer
    }

    fn current_angle(&self) -> f32 {
        self.target.signum() * self.progress
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RubikCube {
    cubies: Vec<Cubie>,
    turn: Option<Turn>,
}

impl RubikCube {
    /// Solved cube.
    pub fn new() -> Self {
        let mut cubies = Vec::with_capacity(27);
        for x in -1..=1 {
            for y in -1..=1 {
                for z in -1..=1 {
                    let position = IVec3::new(x, y, z);
                    cubies.push(Cubie {
                        position,
                        home: position,
                        orientation: Quat::IDENTITY,
                    });
                }
            }
        }
        Self {
            cubies,
            turn: None,
        }
    }

    pub fn is_rotating(&self) -> bool {
        self.turn.is_some()
    }

    /// Starts a quarter turn of `layer` (0, 1 or 2 along `axis`). Clockwise
    /// is judged looking down the positive axis. Returns `false` and does
    /// nothing while another turn is in progress or the layer is invalid.
    pub fn rotate(&mut self, axis: Axis, layer: u32, clockwise: bool) -> bool {
        if self.turn.is_some() || layer > 2 {
            return false;
        }
        let target = if clockwise { -FRAC_PI_2 } else { FRAC_PI_2 };
        trace!("rubik turn {:?} layer {} clockwise={}", axis, layer, clockwise);
        self.turn = Some(Turn {
            axis,
            layer: layer as i32 - 1,
            target,
            progress: 0.0,
        });
        true
    }

    pub fn update(&mut self, dt: f32) {
        let Some(turn) = self.turn.as_mut() else {
            return;
        };
        turn.progress += TURN_SPEED * dt;
        if turn.progress < FRAC_PI_2 {
            return;
        }

        let turn = *turn;
        let rotation = Quat::from_axis_angle(turn.axis.unit(), turn.target);
        for cubie in self.cubies.iter_mut().filter(|c| turn.contains(c.position)) {
            cubie.position = (rotation * cubie.position.as_vec3()).round().as_ivec3();
            cubie.orientation = (rotation * cubie.orientation).normalize();
        }
        self.turn = None;
    }

    /// True when every cubie sits in its solved cell with its solved
    /// orientation.
    pub fn is_solved(&self) -> bool {
        self.turn.is_none()
            && self.cubies.iter().all(|cubie| {
                // q and -q encode the same rotation.
                cubie.position == cubie.home && 1.0 - cubie.orientation.w.abs() < 1e-4
            })
    }

    /// Number of meshes drawn per frame: one body per cubie plus a sticker
    /// per outward face.
    pub fn draw_count(&self) -> usize {
        self.cubies
            .iter()
            .map(|cubie| 1 + sticker_faces(cubie.home).count())
            .sum()
    }

    /// Draws every cubie with `cube` (a unit mesh spanning `[-0.5, 0.5]³`) placed
    /// inside `outer`. The caller selects the texture mode.
    pub fn draw(
        &self,
        camera: &Camera,
        cube: &Mesh,
        outer: &Transform,
        uniforms: &ShaderUniforms,
    ) {
        for cubie in &self.cubies {
            let mut placement = *outer;
            if let Some(turn) = self.turn.filter(|turn| turn.contains(cubie.position)) {
                placement = placement.rotate(turn.current_angle(), turn.axis.unit());
            }
            let placement = placement
                .translate(cubie.position.as_vec3() * SPACING)
                .then(Transform::from_matrix(glam::Mat4::from_quat(
                    cubie.orientation,
                )));

            cube.draw(
                camera,
                &SurfaceMaterial::DARK_PLASTIC,
                &placement.scale(Vec3::splat(2.0 * CUBIE_HALF)),
                uniforms,
            );

            for (normal, color) in sticker_faces(cubie.home) {
                let normal = normal.as_vec3();
                let extent = Vec3::splat(STICKER_HALF) * (Vec3::ONE - normal.abs())
                    + normal.abs() * STICKER_DEPTH;
                let sticker = placement
                    .translate(normal * (CUBIE_HALF + STICKER_DEPTH))
                    .scale(extent * 2.0);
                let material = SurfaceMaterial::new(color * 0.3, color, Vec3::splat(0.6), 16.0);
                cube.draw(camera, &material, &sticker, uniforms);
            }
        }
    }
}

impl Default for RubikCube {
    fn default() -> Self {
        Self::new()
    }
}

fn sticker_faces(home: IVec3) -> impl Iterator<Item = (IVec3, Vec3)> {
    FACES.into_iter().filter(move |(normal, _)| {
        let outward = *normal * home;
        outward.x + outward.y + outward.z == 1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finish(cube: &mut RubikCube) {
        while cube.is_rotating() {
            cube.update(1.0 / 30.0);
        }
    }

    #[test]
    fn new_cube_is_solved_with_54_stickers() {
        let cube = RubikCube::new();
        assert!(cube.is_solved());
        assert_eq!(cube.draw_count(), 27 + 54);
    }

    #[test]
    fn rotate_is_rejected_while_turning() {
        let mut cube = RubikCube::new();
        assert!(cube.rotate(Axis::X, 0, true));
        assert!(!cube.rotate(Axis::Y, 1, false));
        assert!(cube.is_rotating());
        finish(&mut cube);
        assert!(cube.rotate(Axis::Y, 1, false));
    }

    #[test]
    fn invalid_layer_is_rejected() {
        let mut cube = RubikCube::new();
        assert!(!cube.rotate(Axis::Z, 3, true));
        assert!(!cube.is_rotating());
    }

    #[test]
    fn quarter_turn_takes_half_a_second() {
        let mut cube = RubikCube::new();
        cube.rotate(Axis::Y, 2, true);
        cube.update(0.49);
        assert!(cube.is_rotating());
        cube.update(0.02);
        assert!(!cube.is_rotating());
        assert!(!cube.is_solved());
    }

    #[test]
    fn four_quarter_turns_restore_the_cube() {
        let mut cube = RubikCube::new();
        for _ in 0..4 {
            assert!(cube.rotate(Axis::Z, 0, false));
            finish(&mut cube);
        }
        assert!(cube.is_solved());
    }

    #[test]
    fn opposite_turns_cancel() {
        let mut cube = RubikCube::new();
        cube.rotate(Axis::X, 1, true);
        finish(&mut cube);
        cube.rotate(Axis::X, 1, false);
        finish(&mut cube);
        assert!(cube.is_solved());
    }

    #[test]
    fn turned_layer_keeps_positions_on_grid() {
        let mut cube = RubikCube::new();
        cube.rotate(Axis::X, 2, true);
        finish(&mut cube);
        for cubie in &cube.cubies {
            assert!(cubie.position.abs().max_element() <= 1);
        }
        let mut cells: Vec<_> = cube.cubies.iter().map(|c| c.position.to_array()).collect();
        cells.sort();
        cells.dedup();
        assert_eq!(cells.len(), 27);
    }
}
