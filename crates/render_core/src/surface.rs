//! Presentation surface contract and its Vulkan implementation
//!
//! The swapchain itself — creation, format negotiation, resize — belongs to
//! the presentation layer outside this crate. The rendering core consumes
//! it through [`PresentationSurface`]: the current extent and format, the
//! indexed presentable images, image acquisition, and presentation. A stale
//! surface is an expected outcome here, never an error; fatal conditions
//! surface as [`RenderError::Api`].

use ash::vk;

use crate::error::{RenderError, RenderResult};

/// Result of requesting the next presentable image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is available and matches the surface
    Ready(u32),
    /// An image is available but the surface no longer matches the window
    /// exactly; rendering into it still works
    Suboptimal(u32),
    /// The surface is out of date; nothing was acquired and the
    /// swapchain-dependent resources must be rebuilt
    Stale,
}

/// Result of queuing an image for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The image was queued for presentation
    Presented,
    /// The image was queued (or dropped) but the surface needs rebuilding
    Stale,
}

/// The presentation contract consumed by the rendering core
pub trait PresentationSurface {
    /// Current surface extent in pixels
    fn extent(&self) -> vk::Extent2D;

    /// Format of the presentable images
    fn format(&self) -> vk::Format;

    /// The swapchain handle
    fn swapchain(&self) -> vk::SwapchainKHR;

    /// Number of presentable images
    fn image_count(&self) -> usize;

    /// The image at `index`
    fn image(&self, index: usize) -> vk::Image;

    /// The image view at `index`
    fn image_view(&self, index: usize) -> vk::ImageView;

    /// Request the next presentable image
    ///
    /// `signal` is handed to the presentation engine and is signaled when
    /// the image is actually available for rendering.
    fn acquire_image(
        &mut self,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> RenderResult<AcquireOutcome>;

    /// Queue the image at `image_index` for presentation once `wait` signals
    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> RenderResult<PresentOutcome>;
}

/// [`PresentationSurface`] implementation over an externally created swapchain
///
/// Holds the handles the presentation layer produced; swapchain destruction
/// and recreation stay with that layer, which rebuilds this wrapper (via
/// [`VulkanSurface::from_parts`]) whenever the window changes.
pub struct VulkanSurface {
    loader: ash::extensions::khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    present_queue: vk::Queue,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl VulkanSurface {
    /// Wrap the handles produced by swapchain creation
    pub fn from_parts(
        loader: ash::extensions::khr::Swapchain,
        swapchain: vk::SwapchainKHR,
        present_queue: vk::Queue,
        images: Vec<vk::Image>,
        image_views: Vec<vk::ImageView>,
        format: vk::Format,
        extent: vk::Extent2D,
    ) -> Self {
        debug_assert_eq!(images.len(), image_views.len());
        log::debug!(
            "Presentation surface wrapped: {} images, {}x{}, {:?}",
            images.len(),
            extent.width,
            extent.height,
            format
        );
        Self {
            loader,
            swapchain,
            present_queue,
            images,
            image_views,
            format,
            extent,
        }
    }
}

impl PresentationSurface for VulkanSurface {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn format(&self) -> vk::Format {
        self.format
    }

    fn swapchain(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }

    fn acquire_image(
        &mut self,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> RenderResult<AcquireOutcome> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, timeout, signal, vk::Fence::null())
        };
        match result {
            Ok((index, false)) => Ok(AcquireOutcome::Ready(index)),
            Ok((index, true)) => {
                log::debug!("Swapchain suboptimal during acquire");
                Ok(AcquireOutcome::Suboptimal(index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date during acquire");
                Ok(AcquireOutcome::Stale)
            }
            Err(result) => Err(RenderError::Api(result)),
        }
    }

    fn present(&mut self, image_index: u32, wait: vk::Semaphore) -> RenderResult<PresentOutcome> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(self.present_queue, &present_info) };
        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => {
                log::debug!("Swapchain suboptimal during present");
                Ok(PresentOutcome::Stale)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date during present");
                Ok(PresentOutcome::Stale)
            }
            Err(result) => Err(RenderError::Api(result)),
        }
    }
}
