//! Error types for the frame rendering core
//!
//! Failures fall into three groups: raw Vulkan API errors, construction
//! failures tagged with the build stage that produced them, and usage errors
//! where a state-machine precondition was violated before any GPU call was
//! made. Stale-surface conditions are not errors; they are reported through
//! [`AcquireOutcome`](crate::surface::AcquireOutcome) and
//! [`PresentOutcome`](crate::surface::PresentOutcome).

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Build stages of `initialize`, used to tag construction failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    /// Descriptor set layout creation
    DescriptorSetLayout,
    /// Render pass creation
    RenderPass,
    /// Pipeline description (shader blob loading and fixed-function setup)
    PipelineDescription,
    /// Shader module creation
    ShaderModule,
    /// Pipeline layout creation
    PipelineLayout,
    /// Graphics pipeline creation
    GraphicsPipeline,
    /// Swapchain target framebuffer creation
    Framebuffers,
    /// Per-slot command pool creation
    CommandPools,
    /// Per-slot command buffer allocation
    CommandBuffers,
    /// Per-slot uniform buffer creation
    UniformBuffers,
    /// Descriptor pool creation
    DescriptorPool,
    /// Descriptor set allocation and binding
    DescriptorSets,
    /// Semaphore and fence creation
    SyncObjects,
}

impl InitStage {
    /// Human-readable name of the build stage
    pub fn name(self) -> &'static str {
        match self {
            Self::DescriptorSetLayout => "descriptor set layout",
            Self::RenderPass => "render pass",
            Self::PipelineDescription => "pipeline description",
            Self::ShaderModule => "shader module",
            Self::PipelineLayout => "pipeline layout",
            Self::GraphicsPipeline => "graphics pipeline",
            Self::Framebuffers => "swapchain framebuffers",
            Self::CommandPools => "command pools",
            Self::CommandBuffers => "command buffers",
            Self::UniformBuffers => "uniform buffers",
            Self::DescriptorPool => "descriptor pool",
            Self::DescriptorSets => "descriptor sets",
            Self::SyncObjects => "synchronization objects",
        }
    }
}

impl std::fmt::Display for InitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Rendering error taxonomy
#[derive(Debug, Error)]
pub enum RenderError {
    /// A Vulkan API call returned a failure code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A build stage of `initialize`/`recreate` failed
    #[error("failed to create {stage}: {source}")]
    Construction {
        /// The build stage that failed
        stage: InitStage,
        /// The underlying failure
        #[source]
        source: Box<RenderError>,
    },

    /// A shader bytecode blob could not be read from disk
    #[error("failed to read shader blob {path:?}: {source}")]
    ShaderBlob {
        /// Path of the blob that could not be read
        path: PathBuf,
        /// The I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Shader bytecode was not a whole number of SPIR-V words
    #[error("shader blob {path:?} is not u32-aligned SPIR-V ({len} bytes)")]
    SpirvAlignment {
        /// Path of the malformed blob
        path: PathBuf,
        /// Byte length of the blob
        len: usize,
    },

    /// No device memory type satisfies the requested filter and properties
    #[error("no suitable memory type for filter {type_filter:#010x}")]
    NoSuitableMemoryType {
        /// The memory-type bitmask that could not be satisfied
        type_filter: u32,
    },

    /// An operation was driven from a state in which it is not legal
    #[error("{operation} is not valid while the pipeline is {state}")]
    InvalidState {
        /// The operation that was attempted
        operation: &'static str,
        /// The state the machine was in
        state: &'static str,
    },

    /// The command recorder was requested outside `begin_frame`/`end_frame`
    #[error("no frame is being recorded; the command recorder is only available between begin_frame and end_frame")]
    NotRecording,

    /// The renderer configuration is unusable
    #[error("invalid configuration: {0}")]
    Configuration(&'static str),
}

impl RenderError {
    /// Wrap a failure with the `initialize` stage that produced it
    pub fn at_stage(stage: InitStage) -> impl FnOnce(RenderError) -> RenderError {
        move |source| RenderError::Construction {
            stage,
            source: Box::new(source),
        }
    }
}

impl From<vk::Result> for RenderError {
    fn from(result: vk::Result) -> Self {
        RenderError::Api(result)
    }
}
