//! The render pipeline state machine
//!
//! [`FrameRenderer`] drives the frame lifecycle:
//! `initialize -> { begin_frame -> [draw recording] -> end_frame }* ->
//! (recreate on demand) -> cleanup`. State is an explicit tagged type —
//! resources exist only while the machine is `Ready` or `Recreating`, so no
//! operation can reach frame resources from the uninitialized state; every
//! transition function checks the states from which it is legal and reports
//! anything else as a usage error without touching the GPU.
//!
//! The CPU may run at most N-1 frames ahead of the GPU: the only blocking
//! point in the steady state is the fence wait at the top of `begin_frame`.
//! Stale-surface reports from acquisition or presentation are never errors;
//! they park the machine in `Recreating` until `recreate_if_needed` rebuilds
//! the swapchain-dependent resources.

use ash::vk;

use crate::config::RendererConfig;
use crate::device::{DeviceContext, FrameSubmission};
use crate::error::{InitStage, RenderError, RenderResult};
use crate::frame::{FrameSlotSet, TRANSFORMS_BINDING};
use crate::math::perspective_vk;
use crate::pipeline::{
    build_pipeline, PipelineDescribe, RenderPassDescription, StandardPipeline,
};
use crate::surface::{AcquireOutcome, PresentOutcome, PresentationSurface};
use crate::targets::SwapchainTargets;
use crate::view::{FixedViewpoint, FrameTransforms, ViewProvider};

/// Observable state of the pipeline state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Nothing is created; only `initialize` is legal
    Uninitialized,
    /// Frames may be begun and ended
    Ready,
    /// A stale surface was reported; `recreate_if_needed` must run
    Recreating,
}

impl PipelinePhase {
    /// Lower-case name for error messages
    pub fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Recreating => "recreating",
        }
    }
}

/// Everything the renderer owns while initialized
struct RenderResources {
    descriptor_set_layout: vk::DescriptorSetLayout,
    render_pass: vk::RenderPass,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    targets: SwapchainTargets,
    slots: FrameSlotSet,
    slot_index: usize,
    /// Image index acquired for the frame currently being recorded
    recording: Option<u32>,
}

impl RenderResources {
    /// Release everything in reverse-dependency order: per-frame resources,
    /// then framebuffers, then the pipeline objects, render pass, and
    /// descriptor layout. Consumes the resources so a second teardown of
    /// the same handles cannot happen.
    fn destroy<D: DeviceContext>(mut self, device: &D) {
        self.slots.destroy(device);
        self.targets.destroy(device);
        device.destroy_pipeline(self.pipeline);
        device.destroy_pipeline_layout(self.pipeline_layout);
        device.destroy_render_pass(self.render_pass);
        device.destroy_descriptor_set_layout(self.descriptor_set_layout);
    }
}

/// Top-level resources accumulated during `initialize`, released wholesale
/// in reverse creation order if a later stage fails
#[derive(Default)]
struct PartialResources {
    descriptor_set_layout: Option<vk::DescriptorSetLayout>,
    render_pass: Option<vk::RenderPass>,
    pipeline: Option<crate::pipeline::PipelineHandles>,
    targets: Option<SwapchainTargets>,
    slots: Option<FrameSlotSet>,
}

impl PartialResources {
    fn release<D: DeviceContext>(&mut self, device: &D) {
        if let Some(mut slots) = self.slots.take() {
            slots.destroy(device);
        }
        if let Some(mut targets) = self.targets.take() {
            targets.destroy(device);
        }
        if let Some(handles) = self.pipeline.take() {
            device.destroy_pipeline(handles.pipeline);
            device.destroy_pipeline_layout(handles.layout);
        }
        if let Some(render_pass) = self.render_pass.take() {
            device.destroy_render_pass(render_pass);
        }
        if let Some(layout) = self.descriptor_set_layout.take() {
            device.destroy_descriptor_set_layout(layout);
        }
    }

    /// Convert into the sealed resource set. Every field is populated once
    /// the build sequence has completed; if anything is missing the partial
    /// set is handed back so the caller can release it.
    fn seal(mut self) -> Result<RenderResources, Self> {
        let descriptor_set_layout = self.descriptor_set_layout.take();
        let render_pass = self.render_pass.take();
        let pipeline = self.pipeline.take();
        let targets = self.targets.take();
        let slots = self.slots.take();

        match (descriptor_set_layout, render_pass, pipeline, targets, slots) {
            (Some(descriptor_set_layout), Some(render_pass), Some(handles), Some(targets), Some(slots)) => {
                Ok(RenderResources {
                    descriptor_set_layout,
                    render_pass,
                    pipeline_layout: handles.layout,
                    pipeline: handles.pipeline,
                    targets,
                    slots,
                    slot_index: 0,
                    recording: None,
                })
            }
            (descriptor_set_layout, render_pass, pipeline, targets, slots) => Err(Self {
                descriptor_set_layout,
                render_pass,
                pipeline,
                targets,
                slots,
            }),
        }
    }
}

/// The tagged state of the machine
enum PipelineState {
    Uninitialized,
    Ready(RenderResources),
    Recreating(RenderResources),
}

impl PipelineState {
    fn phase(&self) -> PipelinePhase {
        match self {
            Self::Uninitialized => PipelinePhase::Uninitialized,
            Self::Ready(_) => PipelinePhase::Ready,
            Self::Recreating(_) => PipelinePhase::Recreating,
        }
    }

    /// `Ready -> Recreating`; any other state is left untouched
    fn flag_recreating(&mut self) {
        let state = std::mem::replace(self, Self::Uninitialized);
        *self = match state {
            Self::Ready(resources) => Self::Recreating(resources),
            other => other,
        };
    }
}

/// What `begin_frame`'s recording step observed
enum BeginOutcome {
    Begun,
    SurfaceStale,
}

/// The render pipeline state machine
pub struct FrameRenderer {
    config: RendererConfig,
    pipeline_source: Box<dyn PipelineDescribe>,
    view_provider: Box<dyn ViewProvider>,
    state: PipelineState,
    last_error: Option<String>,
}

impl FrameRenderer {
    /// Create the renderer with the default pipeline strategy, reading the
    /// shader blobs from the paths in `config`
    pub fn new(config: RendererConfig) -> RenderResult<Self> {
        let pipeline_source = Box::new(StandardPipeline::new(
            config.vertex_shader_path.clone(),
            config.fragment_shader_path.clone(),
        ));
        Self::with_pipeline(config, pipeline_source)
    }

    /// Create the renderer with an injected pipeline description strategy
    pub fn with_pipeline(
        config: RendererConfig,
        pipeline_source: Box<dyn PipelineDescribe>,
    ) -> RenderResult<Self> {
        if config.frames_in_flight == 0 {
            return Err(RenderError::Configuration(
                "frames_in_flight must be at least 1",
            ));
        }
        Ok(Self {
            config,
            pipeline_source,
            view_provider: Box::new(FixedViewpoint::default()),
            state: PipelineState::Uninitialized,
            last_error: None,
        })
    }

    /// Inject the camera supplying per-frame view matrices
    pub fn set_view_provider(&mut self, provider: Box<dyn ViewProvider>) {
        self.view_provider = provider;
    }

    /// The machine's current phase
    pub fn phase(&self) -> PipelinePhase {
        self.state.phase()
    }

    /// Number of frame slots the renderer cycles through
    pub fn frames_in_flight(&self) -> usize {
        self.config.frames_in_flight
    }

    /// Index of the active frame slot, when initialized
    pub fn current_slot(&self) -> Option<usize> {
        match &self.state {
            PipelineState::Ready(resources) | PipelineState::Recreating(resources) => {
                Some(resources.slot_index)
            }
            PipelineState::Uninitialized => None,
        }
    }

    /// Number of swapchain target framebuffers, when initialized
    pub fn target_count(&self) -> Option<usize> {
        match &self.state {
            PipelineState::Ready(resources) | PipelineState::Recreating(resources) => {
                Some(resources.targets.len())
            }
            PipelineState::Uninitialized => None,
        }
    }

    /// Whether a frame is currently being recorded
    pub fn is_recording(&self) -> bool {
        matches!(&self.state, PipelineState::Ready(resources) if resources.recording.is_some())
    }

    /// Message of the most recent failure, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Build every owned resource and transition to `Ready`
    ///
    /// Legal only from `Uninitialized`. The build sequence is ordered:
    /// descriptor set layout, render pass, pipeline description and
    /// pipeline, swapchain targets, then the per-frame slot set. The first
    /// failing stage aborts the call with a stage-tagged error after
    /// releasing everything the call created.
    pub fn initialize<D: DeviceContext, S: PresentationSurface + ?Sized>(
        &mut self,
        device: &D,
        surface: &S,
    ) -> RenderResult<()> {
        match &self.state {
            PipelineState::Uninitialized => {}
            state => {
                let error = RenderError::InvalidState {
                    operation: "initialize",
                    state: state.phase().name(),
                };
                self.last_error = Some(error.to_string());
                return Err(error);
            }
        }

        let mut partial = PartialResources::default();
        let result = Self::build_resources(
            &self.config,
            self.pipeline_source.as_ref(),
            device,
            surface,
            &mut partial,
        );
        if let Err(error) = result {
            partial.release(device);
            log::error!("Pipeline initialization failed: {error}");
            self.last_error = Some(error.to_string());
            return Err(error);
        }

        match partial.seal() {
            Ok(resources) => {
                log::info!(
                    "Render pipeline ready: {} frames in flight, {} swapchain targets",
                    resources.slots.len(),
                    resources.targets.len()
                );
                self.state = PipelineState::Ready(resources);
                Ok(())
            }
            // Unreachable in practice: every build stage populates its field
            // before the next one runs.
            Err(mut partial) => {
                partial.release(device);
                let error = RenderError::Configuration("initialization produced no resources");
                self.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn build_resources<D: DeviceContext, S: PresentationSurface + ?Sized>(
        config: &RendererConfig,
        pipeline_source: &dyn PipelineDescribe,
        device: &D,
        surface: &S,
        partial: &mut PartialResources,
    ) -> RenderResult<()> {
        let set_layout = device
            .create_descriptor_set_layout(TRANSFORMS_BINDING, vk::ShaderStageFlags::VERTEX)
            .map_err(RenderError::at_stage(InitStage::DescriptorSetLayout))?;
        partial.descriptor_set_layout = Some(set_layout);

        let render_pass = device
            .create_render_pass(&RenderPassDescription::forward(surface.format()))
            .map_err(RenderError::at_stage(InitStage::RenderPass))?;
        partial.render_pass = Some(render_pass);

        let description = pipeline_source
            .describe()
            .map_err(RenderError::at_stage(InitStage::PipelineDescription))?;
        let handles =
            build_pipeline(device, &description, set_layout, render_pass, surface.extent())?;
        partial.pipeline = Some(handles);

        let targets = SwapchainTargets::create(device, surface, render_pass)?;
        partial.targets = Some(targets);

        let slots = FrameSlotSet::create(device, set_layout, config.frames_in_flight)?;
        partial.slots = Some(slots);

        Ok(())
    }

    /// Begin recording the next frame
    ///
    /// Legal only from `Ready`. Blocks until the active slot's previous
    /// submission is consumed, then acquires the next presentable image.
    /// Returns `Ok(true)` with the render pass open, pipeline bound,
    /// uniforms written, and descriptor set bound; `Ok(false)` if the
    /// surface was stale (the machine is then `Recreating` and the caller
    /// must not record draws or call `end_frame` for this iteration).
    pub fn begin_frame<D: DeviceContext, S: PresentationSurface + ?Sized>(
        &mut self,
        device: &D,
        surface: &mut S,
    ) -> RenderResult<bool> {
        let resources = match &mut self.state {
            PipelineState::Ready(resources) => resources,
            state => {
                let error = RenderError::InvalidState {
                    operation: "begin_frame",
                    state: state.phase().name(),
                };
                self.last_error = Some(error.to_string());
                return Err(error);
            }
        };

        let result = Self::open_frame(
            &self.config,
            self.view_provider.as_ref(),
            resources,
            device,
            surface,
        );
        match result {
            Ok(BeginOutcome::Begun) => Ok(true),
            Ok(BeginOutcome::SurfaceStale) => {
                log::info!("Surface reported stale during acquire; scheduling recreation");
                self.state.flag_recreating();
                Ok(false)
            }
            Err(error) => {
                self.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn open_frame<D: DeviceContext, S: PresentationSurface + ?Sized>(
        config: &RendererConfig,
        view_provider: &dyn ViewProvider,
        resources: &mut RenderResources,
        device: &D,
        surface: &mut S,
    ) -> RenderResult<BeginOutcome> {
        let slot = resources.slots.slot(resources.slot_index);

        // The one blocking point of the steady state: the CPU may run at
        // most N-1 frames ahead of the GPU.
        device.wait_for_fence(slot.submission_fence())?;

        let image_index = match surface.acquire_image(u64::MAX, slot.image_acquired())? {
            AcquireOutcome::Ready(index) | AcquireOutcome::Suboptimal(index) => index,
            // Fence and recorder stay untouched so the slot can be reused
            // unchanged after recreation.
            AcquireOutcome::Stale => return Ok(BeginOutcome::SurfaceStale),
        };

        device.reset_fence(slot.submission_fence())?;
        device.reset_command_buffer(slot.command_buffer())?;
        device.begin_command_buffer(slot.command_buffer())?;

        let extent = surface.extent();
        device.cmd_begin_render_pass(
            slot.command_buffer(),
            resources.render_pass,
            resources.targets.framebuffer(image_index as usize),
            extent,
            config.clear_color,
        );
        device.cmd_bind_pipeline(slot.command_buffer(), resources.pipeline);

        let aspect = extent.width as f32 / extent.height as f32;
        let projection = perspective_vk(
            config.projection.fov_y_degrees.to_radians(),
            aspect,
            config.projection.near,
            config.projection.far,
        );
        let transforms = FrameTransforms::new(view_provider.view_matrix(), projection);
        slot.uniform().write(&transforms);

        device.cmd_bind_descriptor_set(
            slot.command_buffer(),
            resources.pipeline_layout,
            slot.descriptor_set(),
        );

        resources.recording = Some(image_index);
        Ok(BeginOutcome::Begun)
    }

    /// The active frame's command recorder
    ///
    /// Valid only between a successful `begin_frame` and the matching
    /// `end_frame`; external draw recording happens against this handle.
    pub fn current_command_buffer(&self) -> RenderResult<vk::CommandBuffer> {
        match &self.state {
            PipelineState::Ready(resources) if resources.recording.is_some() => {
                Ok(resources.slots.slot(resources.slot_index).command_buffer())
            }
            PipelineState::Ready(_) => Err(RenderError::NotRecording),
            state => Err(RenderError::InvalidState {
                operation: "current_command_buffer",
                state: state.phase().name(),
            }),
        }
    }

    /// Close, submit, and present the frame begun by `begin_frame`
    ///
    /// Legal only from `Ready` with a frame being recorded. The submission
    /// waits on the image-acquired semaphore at color-attachment-output and
    /// signals the render-finished semaphore plus the slot's fence;
    /// presentation waits on render-finished. A stale surface at present
    /// parks the machine in `Recreating` — the frame's work still completed
    /// normally. The active slot advances on every call that reaches the
    /// submission path, whatever the outcome.
    pub fn end_frame<D: DeviceContext, S: PresentationSurface + ?Sized>(
        &mut self,
        device: &D,
        surface: &mut S,
    ) -> RenderResult<()> {
        let resources = match &mut self.state {
            PipelineState::Ready(resources) => resources,
            state => {
                let error = RenderError::InvalidState {
                    operation: "end_frame",
                    state: state.phase().name(),
                };
                self.last_error = Some(error.to_string());
                return Err(error);
            }
        };

        let Some(image_index) = resources.recording.take() else {
            let error = RenderError::NotRecording;
            self.last_error = Some(error.to_string());
            return Err(error);
        };

        let result = Self::submit_and_present(resources, image_index, device, surface);
        resources.slot_index = (resources.slot_index + 1) % resources.slots.len();

        match result {
            Ok(PresentOutcome::Presented) => Ok(()),
            Ok(PresentOutcome::Stale) => {
                log::info!("Surface reported stale during present; scheduling recreation");
                self.state.flag_recreating();
                Ok(())
            }
            Err(error) => {
                self.last_error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn submit_and_present<D: DeviceContext, S: PresentationSurface + ?Sized>(
        resources: &RenderResources,
        image_index: u32,
        device: &D,
        surface: &mut S,
    ) -> RenderResult<PresentOutcome> {
        let slot = resources.slots.slot(resources.slot_index);

        device.cmd_end_render_pass(slot.command_buffer());
        device.end_command_buffer(slot.command_buffer())?;

        device.submit_frame(&FrameSubmission {
            command_buffer: slot.command_buffer(),
            wait_image_acquired: slot.image_acquired(),
            signal_render_finished: slot.render_finished(),
            fence: slot.submission_fence(),
        })?;

        surface.present(image_index, slot.render_finished())
    }

    /// Rebuild the pipeline if a stale surface was reported
    ///
    /// No-op unless the machine is `Recreating`. Waits for the device to go
    /// idle, destroys the swapchain target set explicitly up front, then
    /// performs a full teardown and rebuild against the surface's current
    /// extent, format, and images. On failure the machine is
    /// `Uninitialized` and frame submission must not resume.
    pub fn recreate_if_needed<D: DeviceContext, S: PresentationSurface + ?Sized>(
        &mut self,
        device: &D,
        surface: &mut S,
    ) -> RenderResult<()> {
        if self.state.phase() != PipelinePhase::Recreating {
            return Ok(());
        }

        log::info!("Recreating swapchain-dependent resources");
        if let Err(error) = device.wait_idle() {
            self.last_error = Some(error.to_string());
            return Err(error);
        }

        // Drop the target set first: it is drained as it is destroyed, so
        // the full teardown below cannot touch these framebuffers again.
        if let PipelineState::Recreating(resources) = &mut self.state {
            resources.targets.destroy(device);
        }

        self.cleanup(device)?;
        match self.initialize(device, surface) {
            Ok(()) => {
                log::info!("Recreation complete");
                Ok(())
            }
            Err(error) => {
                log::error!("Recreation failed: {error}");
                Err(error)
            }
        }
    }

    /// Release every owned resource and return to `Uninitialized`
    ///
    /// Legal from any state and idempotent. Waits for the device to go idle
    /// before destroying anything; if that wait fails, nothing is destroyed
    /// and the error is returned, since tearing down GPU objects that may
    /// still be referenced by in-flight work is never safe.
    pub fn cleanup<D: DeviceContext>(&mut self, device: &D) -> RenderResult<()> {
        if let Err(error) = device.wait_idle() {
            self.last_error = Some(error.to_string());
            return Err(error);
        }

        match std::mem::replace(&mut self.state, PipelineState::Uninitialized) {
            PipelineState::Ready(resources) | PipelineState::Recreating(resources) => {
                resources.destroy(device);
                log::debug!("Render pipeline resources released");
            }
            PipelineState::Uninitialized => {}
        }
        Ok(())
    }
}
