//! # Render Core
//!
//! The frame-rendering core of a real-time graphics engine: the
//! swapchain-synchronized render pipeline and the per-frame resource
//! lifecycle, built on Vulkan.
//!
//! ## What lives here
//!
//! - **[`FrameRenderer`]**: the pipeline state machine driving
//!   `initialize -> { begin_frame -> [draw recording] -> end_frame }* ->
//!   (recreate on demand) -> cleanup`, with stale-surface recovery
//! - **Frame slots**: per-in-flight-frame command buffers, synchronization
//!   primitives, persistently mapped uniform blocks, and descriptor sets
//! - **Pipeline configuration**: the immutable render pass, vertex layout,
//!   and fixed-function description
//!
//! Device bootstrap, swapchain creation, windowing, and scene management
//! live outside this crate and are consumed through the [`DeviceContext`]
//! and [`PresentationSurface`] contracts.
//!
//! ## Example
//!
//! ```rust,no_run
//! use render_core::{FrameRenderer, RendererConfig};
//! # fn run(
//! #     device: impl render_core::DeviceContext,
//! #     mut surface: impl render_core::PresentationSurface,
//! # ) -> Result<(), render_core::RenderError> {
//! let mut renderer = FrameRenderer::new(RendererConfig::default())?;
//! renderer.initialize(&device, &surface)?;
//!
//! loop {
//!     renderer.recreate_if_needed(&device, &mut surface)?;
//!     if !renderer.begin_frame(&device, &mut surface)? {
//!         continue; // surface went stale; recreated next iteration
//!     }
//!
//!     // Scene layers record draws here:
//!     let _command_buffer = renderer.current_command_buffer()?;
//!
//!     renderer.end_frame(&device, &mut surface)?;
//!     # break;
//! }
//!
//! renderer.cleanup(&device)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod math;
pub mod pipeline;
pub mod renderer;
pub mod surface;
pub mod targets;
pub mod view;

pub use config::{ContextConfig, DebugReporter, DebugSeverity, ProjectionConfig, RendererConfig};
pub use device::{DeviceContext, FrameSubmission, MappedBuffer, VulkanDeviceContext};
pub use error::{InitStage, RenderError, RenderResult};
pub use frame::{FrameSlot, FrameSlotSet, TRANSFORMS_BINDING};
pub use pipeline::{
    PipelineDescribe, PipelineDescription, RasterState, StandardPipeline, VertexLayout,
};
pub use renderer::{FrameRenderer, PipelinePhase};
pub use surface::{AcquireOutcome, PresentOutcome, PresentationSurface, VulkanSurface};
pub use targets::SwapchainTargets;
pub use view::{FixedViewpoint, FrameTransforms, ViewProvider};
