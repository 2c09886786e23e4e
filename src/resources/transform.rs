use glam::{Mat3, Mat4, Vec3};

/// Model transform built by composing operations in call order.
///
/// `Transform::new().translate(t).rotate(a, axis).scale(s)` yields
/// `T * R * S`, so the last operation applies to the vertices first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform(Mat4);

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform {
    pub const fn new() -> Self {
        Self(Mat4::IDENTITY)
    }

    pub fn from_matrix(matrix: Mat4) -> Self {
        Self(matrix)
    }

    pub fn translate(self, offset: Vec3) -> Self {
        Self(self.0 * Mat4::from_translation(offset))
    }

    /// Rotates by `angle` radians around `axis`; the axis need not be unit
    /// length.
    pub fn rotate(self, angle: f32, axis: Vec3) -> Self {
        Self(self.0 * Mat4::from_axis_angle(axis.normalize_or_zero(), angle))
    }

    pub fn scale(self, factors: Vec3) -> Self {
        Self(self.0 * Mat4::from_scale(factors))
    }

    /// Appends another transform after this one.
    pub fn then(self, other: Transform) -> Self {
        Self(self.0 * other.0)
    }

    pub fn matrix(&self) -> Mat4 {
        self.0
    }

    /// Inverse-transpose of the upper 3×3 block.
    pub fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(self.0).inverse().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_compose_in_call_order() {
        let transform = Transform::new()
            .translate(Vec3::new(1.0, 0.0, 0.0))
            .scale(Vec3::splat(2.0));
        let point = transform.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(point, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let transform = Transform::new().scale(Vec3::new(2.0, 1.0, 1.0));
        let normal = transform.normal_matrix() * Vec3::X;
        assert!((normal - Vec3::new(0.5, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn rotate_normalizes_axis() {
        let a = Transform::new().rotate(0.5, Vec3::new(0.0, 3.0, 0.0));
        let b = Transform::new().rotate(0.5, Vec3::Y);
        assert!(a.matrix().abs_diff_eq(b.matrix(), 1e-6));
    }
}
