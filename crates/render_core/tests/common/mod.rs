//! Scripted in-memory device and surface for exercising the frame
//! lifecycle without a GPU.
//!
//! The mock device hands out unique handles, tracks every live object so
//! tests can assert exact inventories and leak-freedom, backs uniform
//! buffers with real memory so uniform writes can be read back, and can be
//! told to fail at a chosen creation point. The mock surface serves images
//! round-robin unless a script injects stale or suboptimal outcomes.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

use ash::vk::{self, Handle};
use render_core::pipeline::{PipelineBuildRequest, RenderPassDescription};
use render_core::{
    AcquireOutcome, DeviceContext, FrameSubmission, MappedBuffer, PresentOutcome,
    PresentationSurface, RenderError, RenderResult,
};

/// Route test logs through the usual facade when `RUST_LOG` is set
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Kinds of GPU objects the mock tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Semaphore,
    Fence,
    CommandPool,
    CommandBuffer,
    UniformBuffer,
    DescriptorSetLayout,
    DescriptorPool,
    DescriptorSet,
    RenderPass,
    Framebuffer,
    ShaderModule,
    PipelineLayout,
    Pipeline,
}

/// Creation calls the mock can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Semaphore,
    Fence,
    CommandPool,
    UniformBuffer,
    DescriptorPool,
    RenderPass,
    ShaderModule,
    GraphicsPipeline,
}

/// In-memory [`DeviceContext`] double
pub struct MockDevice {
    next_handle: Cell<u64>,
    live: RefCell<HashMap<u64, Kind>>,
    uniform_memory: RefCell<HashMap<u64, Box<[u8]>>>,
    uniform_order: RefCell<Vec<u64>>,
    pool_buffers: RefCell<HashMap<u64, Vec<u64>>>,
    pool_sets: RefCell<HashMap<u64, Vec<u64>>>,
    pub fail_point: Cell<Option<FailPoint>>,
    pub fence_waits: Cell<usize>,
    pub fence_resets: Cell<usize>,
    pub idle_waits: Cell<usize>,
    pub recorder_begins: Cell<usize>,
    pub render_pass_begins: Cell<usize>,
    pub descriptor_writes: RefCell<Vec<(u64, u64)>>,
    pub submissions: RefCell<Vec<FrameSubmission>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            next_handle: Cell::new(1),
            live: RefCell::new(HashMap::new()),
            uniform_memory: RefCell::new(HashMap::new()),
            uniform_order: RefCell::new(Vec::new()),
            pool_buffers: RefCell::new(HashMap::new()),
            pool_sets: RefCell::new(HashMap::new()),
            fail_point: Cell::new(None),
            fence_waits: Cell::new(0),
            fence_resets: Cell::new(0),
            idle_waits: Cell::new(0),
            recorder_begins: Cell::new(0),
            render_pass_begins: Cell::new(0),
            descriptor_writes: RefCell::new(Vec::new()),
            submissions: RefCell::new(Vec::new()),
        }
    }

    fn fresh(&self, kind: Kind) -> u64 {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        self.live.borrow_mut().insert(raw, kind);
        raw
    }

    fn release(&self, raw: u64, kind: Kind) {
        match self.live.borrow_mut().remove(&raw) {
            Some(found) if found == kind => {}
            Some(found) => panic!("handle {raw} destroyed as {kind:?} but created as {found:?}"),
            None => panic!("double free or unknown handle {raw} ({kind:?})"),
        }
    }

    fn check_fail(&self, point: FailPoint) -> RenderResult<()> {
        if self.fail_point.get() == Some(point) {
            Err(RenderError::Api(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY))
        } else {
            Ok(())
        }
    }

    /// Number of live objects of one kind
    pub fn live_count(&self, kind: Kind) -> usize {
        self.live.borrow().values().filter(|&&k| k == kind).count()
    }

    /// Snapshot of every live handle
    pub fn live_handles(&self) -> Vec<u64> {
        let mut handles: Vec<u64> = self.live.borrow().keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Panic if anything is still alive
    pub fn assert_no_live_objects(&self) {
        let live = self.live.borrow();
        assert!(
            live.is_empty(),
            "leaked objects: {:?}",
            live.values().collect::<Vec<_>>()
        );
    }

    /// Uniform buffers in creation order (the frame-slot order)
    pub fn uniform_buffers(&self) -> Vec<vk::Buffer> {
        self.uniform_order
            .borrow()
            .iter()
            .map(|&raw| vk::Buffer::from_raw(raw))
            .collect()
    }

    /// Copy out the backing memory of a uniform buffer
    pub fn read_uniform(&self, buffer: vk::Buffer) -> Vec<u8> {
        self.uniform_memory
            .borrow()
            .get(&buffer.as_raw())
            .expect("unknown uniform buffer")
            .to_vec()
    }
}

impl DeviceContext for MockDevice {
    fn memory_type_index(
        &self,
        _type_filter: u32,
        _properties: vk::MemoryPropertyFlags,
    ) -> RenderResult<u32> {
        Ok(0)
    }

    fn wait_idle(&self) -> RenderResult<()> {
        self.idle_waits.set(self.idle_waits.get() + 1);
        Ok(())
    }

    fn create_semaphore(&self) -> RenderResult<vk::Semaphore> {
        self.check_fail(FailPoint::Semaphore)?;
        Ok(vk::Semaphore::from_raw(self.fresh(Kind::Semaphore)))
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.release(semaphore.as_raw(), Kind::Semaphore);
    }

    fn create_fence(&self, _signaled: bool) -> RenderResult<vk::Fence> {
        self.check_fail(FailPoint::Fence)?;
        Ok(vk::Fence::from_raw(self.fresh(Kind::Fence)))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.release(fence.as_raw(), Kind::Fence);
    }

    fn wait_for_fence(&self, _fence: vk::Fence) -> RenderResult<()> {
        self.fence_waits.set(self.fence_waits.get() + 1);
        Ok(())
    }

    fn reset_fence(&self, _fence: vk::Fence) -> RenderResult<()> {
        self.fence_resets.set(self.fence_resets.get() + 1);
        Ok(())
    }

    fn create_command_pool(&self) -> RenderResult<vk::CommandPool> {
        self.check_fail(FailPoint::CommandPool)?;
        let raw = self.fresh(Kind::CommandPool);
        self.pool_buffers.borrow_mut().insert(raw, Vec::new());
        Ok(vk::CommandPool::from_raw(raw))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let raw = pool.as_raw();
        self.release(raw, Kind::CommandPool);
        if let Some(buffers) = self.pool_buffers.borrow_mut().remove(&raw) {
            for buffer in buffers {
                self.release(buffer, Kind::CommandBuffer);
            }
        }
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool) -> RenderResult<vk::CommandBuffer> {
        let raw = self.fresh(Kind::CommandBuffer);
        self.pool_buffers
            .borrow_mut()
            .get_mut(&pool.as_raw())
            .expect("allocation from unknown command pool")
            .push(raw);
        Ok(vk::CommandBuffer::from_raw(raw))
    }

    fn reset_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        Ok(())
    }

    fn begin_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        self.recorder_begins.set(self.recorder_begins.get() + 1);
        Ok(())
    }

    fn end_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        _command_buffer: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        _framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        _clear_color: [f32; 4],
    ) {
        self.render_pass_begins.set(self.render_pass_begins.get() + 1);
    }

    fn cmd_end_render_pass(&self, _command_buffer: vk::CommandBuffer) {}

    fn cmd_bind_pipeline(&self, _command_buffer: vk::CommandBuffer, _pipeline: vk::Pipeline) {}

    fn cmd_bind_descriptor_set(
        &self,
        _command_buffer: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        _descriptor_set: vk::DescriptorSet,
    ) {
    }

    fn submit_frame(&self, submission: &FrameSubmission) -> RenderResult<()> {
        self.submissions.borrow_mut().push(*submission);
        Ok(())
    }

    fn create_uniform_buffer(&self, size: vk::DeviceSize) -> RenderResult<MappedBuffer> {
        self.check_fail(FailPoint::UniformBuffer)?;
        let raw = self.fresh(Kind::UniformBuffer);
        let mut storage = vec![0u8; size as usize].into_boxed_slice();
        let mapped = storage.as_mut_ptr();
        self.uniform_memory.borrow_mut().insert(raw, storage);
        self.uniform_order.borrow_mut().push(raw);
        Ok(MappedBuffer::from_parts(
            vk::Buffer::from_raw(raw),
            vk::DeviceMemory::from_raw(raw),
            mapped,
            size as usize,
        ))
    }

    fn destroy_uniform_buffer(&self, buffer: &MappedBuffer) {
        let raw = buffer.buffer().as_raw();
        self.release(raw, Kind::UniformBuffer);
        self.uniform_memory.borrow_mut().remove(&raw);
        self.uniform_order.borrow_mut().retain(|&kept| kept != raw);
    }

    fn create_descriptor_set_layout(
        &self,
        _binding: u32,
        _stages: vk::ShaderStageFlags,
    ) -> RenderResult<vk::DescriptorSetLayout> {
        Ok(vk::DescriptorSetLayout::from_raw(
            self.fresh(Kind::DescriptorSetLayout),
        ))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.release(layout.as_raw(), Kind::DescriptorSetLayout);
    }

    fn create_descriptor_pool(&self, _max_sets: u32) -> RenderResult<vk::DescriptorPool> {
        self.check_fail(FailPoint::DescriptorPool)?;
        let raw = self.fresh(Kind::DescriptorPool);
        self.pool_sets.borrow_mut().insert(raw, Vec::new());
        Ok(vk::DescriptorPool::from_raw(raw))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let raw = pool.as_raw();
        self.release(raw, Kind::DescriptorPool);
        if let Some(sets) = self.pool_sets.borrow_mut().remove(&raw) {
            for set in sets {
                self.release(set, Kind::DescriptorSet);
            }
        }
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        _layout: vk::DescriptorSetLayout,
        count: usize,
    ) -> RenderResult<Vec<vk::DescriptorSet>> {
        let mut sets = Vec::with_capacity(count);
        for _ in 0..count {
            let raw = self.fresh(Kind::DescriptorSet);
            self.pool_sets
                .borrow_mut()
                .get_mut(&pool.as_raw())
                .expect("allocation from unknown descriptor pool")
                .push(raw);
            sets.push(vk::DescriptorSet::from_raw(raw));
        }
        Ok(sets)
    }

    fn bind_uniform_descriptor(
        &self,
        descriptor_set: vk::DescriptorSet,
        _binding: u32,
        buffer: vk::Buffer,
        _range: vk::DeviceSize,
    ) {
        self.descriptor_writes
            .borrow_mut()
            .push((descriptor_set.as_raw(), buffer.as_raw()));
    }

    fn create_render_pass(
        &self,
        _description: &RenderPassDescription,
    ) -> RenderResult<vk::RenderPass> {
        self.check_fail(FailPoint::RenderPass)?;
        Ok(vk::RenderPass::from_raw(self.fresh(Kind::RenderPass)))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.release(render_pass.as_raw(), Kind::RenderPass);
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _attachment: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer> {
        Ok(vk::Framebuffer::from_raw(self.fresh(Kind::Framebuffer)))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.release(framebuffer.as_raw(), Kind::Framebuffer);
    }

    fn create_shader_module(&self, _code: &[u32]) -> RenderResult<vk::ShaderModule> {
        self.check_fail(FailPoint::ShaderModule)?;
        Ok(vk::ShaderModule::from_raw(self.fresh(Kind::ShaderModule)))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.release(module.as_raw(), Kind::ShaderModule);
    }

    fn create_pipeline_layout(
        &self,
        _set_layout: vk::DescriptorSetLayout,
        _push_constant_size: u32,
    ) -> RenderResult<vk::PipelineLayout> {
        Ok(vk::PipelineLayout::from_raw(self.fresh(Kind::PipelineLayout)))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.release(layout.as_raw(), Kind::PipelineLayout);
    }

    fn create_graphics_pipeline(
        &self,
        _request: &PipelineBuildRequest<'_>,
    ) -> RenderResult<vk::Pipeline> {
        self.check_fail(FailPoint::GraphicsPipeline)?;
        Ok(vk::Pipeline::from_raw(self.fresh(Kind::Pipeline)))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.release(pipeline.as_raw(), Kind::Pipeline);
    }
}

/// In-memory [`PresentationSurface`] double
///
/// Serves image indices round-robin; `script_acquire`/`script_present`
/// queue outcomes that override the default for the next calls. `resize`
/// stands in for the external presentation layer rebuilding the swapchain.
pub struct MockSurface {
    extent: vk::Extent2D,
    format: vk::Format,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    next_image: Cell<u32>,
    acquire_script: RefCell<VecDeque<AcquireOutcome>>,
    present_script: RefCell<VecDeque<PresentOutcome>>,
    pub acquires: Cell<usize>,
    pub presented: RefCell<Vec<u32>>,
}

impl MockSurface {
    pub fn new(image_count: usize, extent: vk::Extent2D) -> Self {
        let images = (0..image_count)
            .map(|index| vk::Image::from_raw(0x1000 + index as u64))
            .collect();
        let image_views = (0..image_count)
            .map(|index| vk::ImageView::from_raw(0x2000 + index as u64))
            .collect();
        Self {
            extent,
            format: vk::Format::B8G8R8A8_SRGB,
            images,
            image_views,
            next_image: Cell::new(0),
            acquire_script: RefCell::new(VecDeque::new()),
            present_script: RefCell::new(VecDeque::new()),
            acquires: Cell::new(0),
            presented: RefCell::new(Vec::new()),
        }
    }

    /// Queue an acquire outcome overriding the round-robin default
    pub fn script_acquire(&self, outcome: AcquireOutcome) {
        self.acquire_script.borrow_mut().push_back(outcome);
    }

    /// Queue a present outcome overriding the success default
    pub fn script_present(&self, outcome: PresentOutcome) {
        self.present_script.borrow_mut().push_back(outcome);
    }

    /// Simulate the presentation layer rebuilding the swapchain
    pub fn resize(&mut self, extent: vk::Extent2D, image_count: usize) {
        self.extent = extent;
        self.images = (0..image_count)
            .map(|index| vk::Image::from_raw(0x3000 + index as u64))
            .collect();
        self.image_views = (0..image_count)
            .map(|index| vk::ImageView::from_raw(0x4000 + index as u64))
            .collect();
        self.next_image.set(0);
    }
}

impl PresentationSurface for MockSurface {
    fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn format(&self) -> vk::Format {
        self.format
    }

    fn swapchain(&self) -> vk::SwapchainKHR {
        vk::SwapchainKHR::from_raw(0x5000)
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
        _timeout: u64,
        _signal: vk::Semaphore,
    ) -> RenderResult<AcquireOutcome> {
        self.acquires.set(self.acquires.get() + 1);
        if let Some(outcome) = self.acquire_script.borrow_mut().pop_front() {
            return Ok(outcome);
        }
        let index = self.next_image.get();
        self.next_image.set((index + 1) % self.images.len() as u32);
        Ok(AcquireOutcome::Ready(index))
    }

    fn present(&mut self, image_index: u32, _wait: vk::Semaphore) -> RenderResult<PresentOutcome> {
        self.presented.borrow_mut().push(image_index);
        if let Some(outcome) = self.present_script.borrow_mut().pop_front() {
            return Ok(outcome);
        }
        Ok(PresentOutcome::Presented)
    }
}
