//! Frame-stepped kinematics for the levitating cube and the bouncing balls.

use std::f32::consts::TAU;

/// Slow spin plus vertical oscillation between `-MAX_OFFSET` and
/// `MAX_OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levitation {
    pub angle: f32,
    pub height_offset: f32,
    pub direction: f32,
}

impl Levitation {
    pub const VELOCITY: f32 = 0.5;
    pub const MAX_OFFSET: f32 = 2.0;

    pub fn new() -> Self {
        Self {
            angle: 0.0,
            height_offset: 0.0,
            direction: 1.0,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.angle += dt;
        if self.angle >= TAU {
            self.angle = 0.0;
        }

        self.height_offset += dt * Self::VELOCITY * self.direction;
        if self.height_offset.abs() > Self::MAX_OFFSET {
            self.height_offset = Self::MAX_OFFSET * self.direction;
            self.direction = -self.direction;
        }
    }
}

impl Default for Levitation {
    fn default() -> Self {
        Self::new()
    }
}

/// Ball accelerating towards the ceiling offset, squashing on impact and
/// falling back with the accumulated speed.
///
/// `height_offset` grows towards [`Bounce::CEILING`]; the scene translates
/// the balls by its negation, so larger offsets place them lower.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounce {
    pub height_offset: f32,
    pub velocity: f32,
    pub direction: f32,
    pub scale: f32,
}

impl Bounce {
    pub const ACCELERATION: f32 = 9.81;
    pub const MIN_SQUASH: f32 = 0.7;
    pub const SQUASH_DISTANCE: f32 = 0.5;
    pub const CEILING: f32 = 7.5;

    pub fn new() -> Self {
        Self {
            height_offset: 0.0,
            velocity: 0.0,
            direction: 1.0,
            scale: 1.0,
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.height_offset += dt * self.velocity * self.direction;
        self.velocity += self.direction * Self::ACCELERATION * dt;
        // Caps the speed so every bounce peaks at the same height.
        self.velocity = self.velocity.min(Self::ACCELERATION);

        self.scale = 1.0;
        if self.height_offset > Self::CEILING {
            self.scale = ((Self::SQUASH_DISTANCE - self.height_offset + Self::CEILING)
                / Self::SQUASH_DISTANCE)
                .max(Self::MIN_SQUASH);
            if self.height_offset - Self::SQUASH_DISTANCE > Self::CEILING {
                self.direction = -1.0;
                self.height_offset = Self::CEILING + Self::SQUASH_DISTANCE;
            }
        } else if self.velocity < 0.0 {
            self.direction = 1.0;
            self.velocity = 0.0;
        }
    }
}

impl Default for Bounce {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levitation_reverses_at_bound() {
        let mut levitation = Levitation::new();
        levitation.height_offset = 1.99;
        levitation.advance(0.1);
        assert_eq!(levitation.height_offset, Levitation::MAX_OFFSET);
        assert_eq!(levitation.direction, -1.0);
        levitation.advance(0.1);
        assert!(levitation.height_offset < Levitation::MAX_OFFSET);
    }

    #[test]
    fn levitation_angle_wraps() {
        let mut levitation = Levitation::new();
        levitation.angle = TAU - 0.01;
        levitation.advance(0.02);
        assert_eq!(levitation.angle, 0.0);
    }

    #[test]
    fn levitation_stays_within_bounds() {
        let mut levitation = Levitation::new();
        for _ in 0..10_000 {
            levitation.advance(1.0 / 30.0);
            assert!(levitation.height_offset.abs() <= Levitation::MAX_OFFSET);
        }
    }

    #[test]
    fn bounce_stays_between_floor_and_overshoot() {
        let mut bounce = Bounce::new();
        let mut flips = 0;
        let mut last_direction = bounce.direction;
        for _ in 0..5_000 {
            bounce.advance(1.0 / 30.0);
            assert!(bounce.height_offset <= Bounce::CEILING + Bounce::SQUASH_DISTANCE);
            assert!(bounce.height_offset >= 0.0);
            assert!(bounce.scale >= Bounce::MIN_SQUASH && bounce.scale <= 1.0);
            if bounce.direction != last_direction {
                flips += 1;
                last_direction = bounce.direction;
            }
        }
        assert!(flips > 4, "ball should keep bouncing, saw {flips} flips");
    }

    #[test]
    fn squash_starts_past_ceiling() {
        let mut bounce = Bounce::new();
        bounce.height_offset = Bounce::CEILING + 0.2;
        bounce.velocity = 0.0;
        bounce.advance(0.0);
        assert!((bounce.scale - 0.6_f32.max(Bounce::MIN_SQUASH)).abs() < 1e-5);
        assert_eq!(bounce.direction, 1.0);
    }

    #[test]
    fn overshoot_turns_the_ball_around() {
        let mut bounce = Bounce::new();
        bounce.height_offset = Bounce::CEILING + 0.49;
        bounce.velocity = 9.0;
        bounce.advance(0.1);
        assert_eq!(bounce.direction, -1.0);
        assert_eq!(bounce.height_offset, 8.0);
        assert_eq!(bounce.scale, Bounce::MIN_SQUASH);
    }
}
