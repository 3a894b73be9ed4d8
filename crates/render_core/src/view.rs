//! Per-frame view data and the camera injection seam
//!
//! The renderer writes one [`FrameTransforms`] block per frame into the
//! active slot's mapped uniform buffer. Where the view matrix comes from is
//! a capability: scene or camera layers implement [`ViewProvider`]; until
//! one is wired in, [`FixedViewpoint`] supplies the engine's default
//! vantage point.

use crate::math::{look_at, Mat4, Vec3};

/// Per-frame transform data laid out for the vertex shader's binding 0
///
/// Matrices are stored column-major, as both nalgebra and SPIR-V expect.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransforms {
    /// World-to-camera transform
    pub view: [[f32; 4]; 4],
    /// Camera-to-clip transform (Vulkan Y-flip applied)
    pub projection: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for FrameTransforms {}
unsafe impl bytemuck::Zeroable for FrameTransforms {}

impl FrameTransforms {
    /// Pack the two matrices for upload
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view: view.into(),
            projection: projection.into(),
        }
    }
}

impl Default for FrameTransforms {
    fn default() -> Self {
        Self::new(Mat4::identity(), Mat4::identity())
    }
}

/// Capability interface supplying the per-frame view matrix
pub trait ViewProvider {
    /// The world-to-camera matrix for the frame being recorded
    fn view_matrix(&self) -> Mat4;
}

/// Default viewpoint used until an external camera is injected
///
/// Sits above and behind the origin looking down at it, matching the
/// engine's historical default vantage point.
#[derive(Debug, Clone, Copy)]
pub struct FixedViewpoint {
    /// Camera position in world space
    pub eye: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
    /// Up direction
    pub up: Vec3,
}

impl Default for FixedViewpoint {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 5.0, 10.0),
            target: Vec3::zeros(),
            up: Vec3::y(),
        }
    }
}

impl ViewProvider for FixedViewpoint {
    fn view_matrix(&self) -> Mat4 {
        look_at(self.eye, self.target, self.up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frame_transforms_size() {
        // Two column-major 4x4 float matrices, no padding
        assert_eq!(std::mem::size_of::<FrameTransforms>(), 128);
    }

    #[test]
    fn test_frame_transforms_round_trips_matrices() {
        let view = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let transforms = FrameTransforms::new(view, Mat4::identity());
        let restored = Mat4::from(transforms.view);
        assert_relative_eq!(restored, view, epsilon = 1e-6);
    }

    #[test]
    fn test_default_viewpoint_looks_at_origin() {
        let viewpoint = FixedViewpoint::default();
        let view = viewpoint.view_matrix();
        // The origin lands on the negative Z axis in front of the camera,
        // at the eye's distance from the target.
        let origin = view.transform_point(&nalgebra::Point3::origin());
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-5);
        assert!(origin.z < 0.0);
        assert_relative_eq!(origin.coords.norm(), viewpoint.eye.norm(), epsilon = 1e-4);
    }
}
