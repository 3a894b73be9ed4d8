//! Math utilities and types
//!
//! Fundamental math types for the rendering core, aliased from nalgebra,
//! plus the view and projection constructors the per-frame uniform update
//! needs.

pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Create a right-handed look-at view matrix
pub fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    Mat4::look_at_rh(
        &nalgebra::Point3::from(eye),
        &nalgebra::Point3::from(target),
        &up,
    )
}

/// Create a perspective projection matrix for Vulkan clip space
///
/// Starts from the standard right-handed perspective projection and negates
/// the `[1][1]` term so that clip-space Y points down, as Vulkan expects.
///
/// # Arguments
/// * `fov_y` - Vertical field of view in radians
/// * `aspect` - Viewport aspect ratio (width / height)
/// * `near` - Near clipping plane distance (must be > 0)
/// * `far` - Far clipping plane distance (must be > near)
pub fn perspective_vk(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let mut projection = nalgebra::Perspective3::new(aspect, fov_y, near, far).into_inner();
    projection[(1, 1)] *= -1.0; // Flip Y for Vulkan's downward clip-space Y
    projection
}
