//! Swapchain render targets
//!
//! One framebuffer per presentable image, all referencing the shared render
//! pass. The set is created and destroyed as a unit: the framebuffer count
//! always equals the surface's image count at creation time, and teardown
//! drains the whole set so a partially-destroyed state cannot exist.

use ash::vk;

use crate::device::DeviceContext;
use crate::error::{InitStage, RenderError, RenderResult};
use crate::surface::PresentationSurface;

/// The framebuffer-per-image target set
pub struct SwapchainTargets {
    framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainTargets {
    /// Create one framebuffer per presentable image view
    pub fn create<D: DeviceContext, S: PresentationSurface + ?Sized>(
        device: &D,
        surface: &S,
        render_pass: vk::RenderPass,
    ) -> RenderResult<Self> {
        let extent = surface.extent();
        let mut framebuffers = Vec::with_capacity(surface.image_count());

        for index in 0..surface.image_count() {
            match device.create_framebuffer(render_pass, surface.image_view(index), extent) {
                Ok(framebuffer) => framebuffers.push(framebuffer),
                Err(error) => {
                    for framebuffer in framebuffers.drain(..).rev() {
                        device.destroy_framebuffer(framebuffer);
                    }
                    return Err(RenderError::at_stage(InitStage::Framebuffers)(error));
                }
            }
        }

        log::debug!("Created {} swapchain framebuffers", framebuffers.len());
        Ok(Self { framebuffers })
    }

    /// Number of framebuffers
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    /// Whether the set is empty (true only after `destroy`)
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    /// The framebuffer for the presentable image at `index`
    pub fn framebuffer(&self, index: usize) -> vk::Framebuffer {
        self.framebuffers[index]
    }

    /// Destroy every framebuffer in the set
    ///
    /// The set is drained as it is destroyed, so calling this again — or
    /// letting a later full teardown run over it — finds nothing left.
    pub fn destroy<D: DeviceContext>(&mut self, device: &D) {
        for framebuffer in self.framebuffers.drain(..).rev() {
            device.destroy_framebuffer(framebuffer);
        }
    }
}
