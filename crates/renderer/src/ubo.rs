//! Per-image uniform data.
//!
//! Must match the `UniformBufferObject` block at binding 0 of `shader.vert`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Degrees of rotation about +Z per second of elapsed time.
pub const DEGREES_PER_SECOND: f32 = 90.0;

/// Vertical field of view in degrees.
pub const FOV_Y_DEGREES: f32 = 45.0;

pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 10.0;

/// Eye position of the fixed camera; it looks at the origin with +Z up.
pub const EYE: Vec3 = Vec3::new(2.0, 2.0, 2.0);

/// Model, view and projection matrices.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

impl UniformBufferObject {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Matrices for a frame `elapsed_secs` after the first frame.
    ///
    /// This is a pure function of its inputs.
    pub fn at(elapsed_secs: f32, aspect: f32) -> Self {
        let model = Mat4::from_rotation_z(rotation_angle(elapsed_secs));
        let view = Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Z);

        let mut proj = Mat4::perspective_rh(
            FOV_Y_DEGREES.to_radians(),
            aspect,
            NEAR_PLANE,
            FAR_PLANE,
        );
        // Vulkan clip space has Y pointing down.
        proj.y_axis.y *= -1.0;

        Self { model, view, proj }
    }

    /// Model-view-projection product.
    pub fn mvp(&self) -> Mat4 {
        self.proj * self.view * self.model
    }
}

/// Rotation about +Z in radians after `elapsed_secs`.
pub fn rotation_angle(elapsed_secs: f32) -> f32 {
    (elapsed_secs * DEGREES_PER_SECOND).to_radians()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    const ASPECT: f32 = 800.0 / 600.0;

    #[test]
    fn test_size_matches_shader_block() {
        assert_eq!(UniformBufferObject::SIZE, 192);
    }

    #[test]
    fn test_same_time_is_bit_identical() {
        let a = UniformBufferObject::at(1.234, ASPECT);
        let b = UniformBufferObject::at(1.234, ASPECT);
        assert_eq!(bytemuck::bytes_of(&a), bytemuck::bytes_of(&b));
    }

    #[test]
    fn test_start_has_no_rotation() {
        let ubo = UniformBufferObject::at(0.0, ASPECT);
        assert_eq!(ubo.model, Mat4::IDENTITY);
    }

    #[test]
    fn test_one_second_is_quarter_turn() {
        let ubo = UniformBufferObject::at(1.0, ASPECT);
        let rotated = ubo.model.transform_vector3(Vec3::X);
        assert!(rotated.abs_diff_eq(Vec3::Y, 1e-6), "got {rotated}");
        assert!((rotation_angle(2.0) - std::f32::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn test_projection_flips_y() {
        let ubo = UniformBufferObject::at(0.0, ASPECT);
        let unflipped = Mat4::perspective_rh(
            FOV_Y_DEGREES.to_radians(),
            ASPECT,
            NEAR_PLANE,
            FAR_PLANE,
        );
        assert!(ubo.proj.y_axis.y < 0.0);
        assert_eq!(ubo.proj.y_axis.y, -unflipped.y_axis.y);
        assert_eq!(ubo.proj.x_axis, unflipped.x_axis);
    }

    #[test]
    fn test_origin_lands_inside_clip_volume() {
        let ubo = UniformBufferObject::at(0.5, ASPECT);
        let clip = ubo.mvp() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn test_view_looks_at_origin() {
        let ubo = UniformBufferObject::at(0.0, ASPECT);
        let eye_space = ubo.view.transform_point3(Vec3::ZERO);
        // Right-handed view space looks down -Z.
        assert!(eye_space.x.abs() < 1e-5);
        assert!(eye_space.y.abs() < 1e-5);
        assert!((eye_space.z + EYE.length()).abs() < 1e-5);
    }
}
