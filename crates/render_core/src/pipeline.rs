//! Pipeline configuration builder
//!
//! One-time construction of the immutable pipeline description: render
//! target layout, vertex input layout, fixed-function state, shader stages,
//! and the pipeline layout with its push-constant range. Descriptions are
//! built once, consumed by the device context, and rebuilt wholesale on
//! recreation; they are never mutated in place.

use ash::vk;
use std::path::{Path, PathBuf};

use crate::device::DeviceContext;
use crate::error::{InitStage, RenderError, RenderResult};

/// Size in bytes of the per-draw push-constant block (one 4x4 model matrix)
pub const PUSH_CONSTANT_SIZE: u32 = 64;

/// One attribute of the vertex input layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Shader input location
    pub location: u32,
    /// Component format
    pub format: vk::Format,
    /// Byte offset from the start of the vertex
    pub offset: u32,
}

/// Tightly packed vertex input layout for a single binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    stride: u32,
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// The mesh vertex layout consumed by the basic shaders
    ///
    /// position:3f, normal:3f, uv:2f, lod-blend:1f; nine floats per vertex,
    /// tightly packed with cumulative offsets.
    pub fn mesh() -> Self {
        let float = std::mem::size_of::<f32>() as u32;
        Self {
            stride: 9 * float,
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    format: vk::Format::R32G32B32_SFLOAT, // position
                    offset: 0,
                },
                VertexAttribute {
                    location: 1,
                    format: vk::Format::R32G32B32_SFLOAT, // normal
                    offset: 3 * float,
                },
                VertexAttribute {
                    location: 2,
                    format: vk::Format::R32G32_SFLOAT, // uv
                    offset: 6 * float,
                },
                VertexAttribute {
                    location: 3,
                    format: vk::Format::R32_SFLOAT, // lod blend factor
                    offset: 8 * float,
                },
            ],
        }
    }

    /// Bytes between consecutive vertices
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// The attributes in location order
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Vulkan binding description for binding 0
    pub fn binding_description(&self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(self.stride)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    /// Vulkan attribute descriptions for binding 0
    pub fn attribute_descriptions(&self) -> Vec<vk::VertexInputAttributeDescription> {
        self.attributes
            .iter()
            .map(|attribute| {
                vk::VertexInputAttributeDescription::builder()
                    .binding(0)
                    .location(attribute.location)
                    .format(attribute.format)
                    .offset(attribute.offset)
                    .build()
            })
            .collect()
    }
}

/// Description of the single-subpass forward render pass
///
/// One color attachment, cleared on load and stored, transitioning
/// undefined -> color-attachment-optimal -> present-source, with explicit
/// subpass dependencies bracketing the external pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassDescription {
    color_format: vk::Format,
}

impl RenderPassDescription {
    /// Describe a forward pass rendering into images of the given format
    pub fn forward(color_format: vk::Format) -> Self {
        Self { color_format }
    }

    /// Format of the color attachment
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }
}

/// Fixed rasterization state for the graphics pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterState {
    /// Face culling mode
    pub cull_mode: vk::CullModeFlags,
    /// Winding order considered front-facing
    pub front_face: vk::FrontFace,
    /// Polygon fill mode
    pub polygon_mode: vk::PolygonMode,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            polygon_mode: vk::PolygonMode::FILL,
        }
    }
}

/// Immutable description of the programmable and fixed-function pipeline
///
/// Holds the compiled shader words and the fixed state; the shader modules
/// themselves are created during [`build_pipeline`] and destroyed as soon as
/// the pipeline object exists.
#[derive(Debug, Clone)]
pub struct PipelineDescription {
    vertex_spirv: Vec<u32>,
    fragment_spirv: Vec<u32>,
    vertex_layout: VertexLayout,
    raster: RasterState,
    push_constant_size: u32,
}

impl PipelineDescription {
    /// Assemble a description from already-loaded shader words
    pub fn new(vertex_spirv: Vec<u32>, fragment_spirv: Vec<u32>) -> Self {
        Self {
            vertex_spirv,
            fragment_spirv,
            vertex_layout: VertexLayout::mesh(),
            raster: RasterState::default(),
            push_constant_size: PUSH_CONSTANT_SIZE,
        }
    }

    /// Compiled vertex shader words
    pub fn vertex_spirv(&self) -> &[u32] {
        &self.vertex_spirv
    }

    /// Compiled fragment shader words
    pub fn fragment_spirv(&self) -> &[u32] {
        &self.fragment_spirv
    }

    /// The vertex input layout
    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    /// The fixed rasterization state
    pub fn raster(&self) -> RasterState {
        self.raster
    }

    /// Size of the push-constant range in bytes
    pub fn push_constant_size(&self) -> u32 {
        self.push_constant_size
    }
}

/// Capability interface producing the pipeline description
///
/// The renderer consumes descriptions through this seam so alternate
/// pipelines (debug visualisation, replacement shader sets) can be injected
/// without touching the state machine.
pub trait PipelineDescribe {
    /// Produce the immutable pipeline description
    fn describe(&self) -> RenderResult<PipelineDescription>;
}

/// Default strategy: the fixed mesh pipeline with shaders read from disk
#[derive(Debug, Clone)]
pub struct StandardPipeline {
    vertex_path: PathBuf,
    fragment_path: PathBuf,
}

impl StandardPipeline {
    /// Build the strategy from the two shader blob paths
    pub fn new(vertex_path: PathBuf, fragment_path: PathBuf) -> Self {
        Self {
            vertex_path,
            fragment_path,
        }
    }
}

impl PipelineDescribe for StandardPipeline {
    fn describe(&self) -> RenderResult<PipelineDescription> {
        let vertex_spirv = load_spirv(&self.vertex_path)?;
        let fragment_spirv = load_spirv(&self.fragment_path)?;
        Ok(PipelineDescription::new(vertex_spirv, fragment_spirv))
    }
}

/// Read a compiled SPIR-V blob from disk
///
/// The blob is opaque except for the u32 word alignment every SPIR-V stream
/// must have; anything else is the shader toolchain's business.
pub fn load_spirv(path: &Path) -> RenderResult<Vec<u32>> {
    let bytes = std::fs::read(path).map_err(|source| RenderError::ShaderBlob {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() % 4 != 0 {
        return Err(RenderError::SpirvAlignment {
            path: path.to_path_buf(),
            len: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|word| u32::from_ne_bytes([word[0], word[1], word[2], word[3]]))
        .collect())
}

/// Everything the device needs to assemble one graphics pipeline object
pub struct PipelineBuildRequest<'a> {
    /// Vertex stage module
    pub vertex_module: vk::ShaderModule,
    /// Fragment stage module
    pub fragment_module: vk::ShaderModule,
    /// Pipeline layout the pipeline is created against
    pub layout: vk::PipelineLayout,
    /// Render pass the pipeline renders in (subpass 0)
    pub render_pass: vk::RenderPass,
    /// Viewport and scissor extent
    pub extent: vk::Extent2D,
    /// Vertex input layout
    pub vertex_layout: &'a VertexLayout,
    /// Fixed rasterization state
    pub raster: RasterState,
}

/// Layout and pipeline handles produced by [`build_pipeline`]
#[derive(Debug, Clone, Copy)]
pub struct PipelineHandles {
    /// The pipeline layout (descriptor layout + push constants)
    pub layout: vk::PipelineLayout,
    /// The graphics pipeline object
    pub pipeline: vk::Pipeline,
}

/// Build the graphics pipeline object from its description
///
/// Shader modules exist only for the duration of this call: they are
/// destroyed as soon as the pipeline is created, and any sub-step failure
/// releases the modules already created before the error propagates.
pub fn build_pipeline<D: DeviceContext>(
    device: &D,
    description: &PipelineDescription,
    set_layout: vk::DescriptorSetLayout,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
) -> RenderResult<PipelineHandles> {
    let vertex_module = device
        .create_shader_module(description.vertex_spirv())
        .map_err(RenderError::at_stage(InitStage::ShaderModule))?;

    let fragment_module = match device.create_shader_module(description.fragment_spirv()) {
        Ok(module) => module,
        Err(source) => {
            device.destroy_shader_module(vertex_module);
            return Err(RenderError::at_stage(InitStage::ShaderModule)(source));
        }
    };

    let layout =
        match device.create_pipeline_layout(set_layout, description.push_constant_size()) {
            Ok(layout) => layout,
            Err(source) => {
                device.destroy_shader_module(fragment_module);
                device.destroy_shader_module(vertex_module);
                return Err(RenderError::at_stage(InitStage::PipelineLayout)(source));
            }
        };

    let request = PipelineBuildRequest {
        vertex_module,
        fragment_module,
        layout,
        render_pass,
        extent,
        vertex_layout: description.vertex_layout(),
        raster: description.raster(),
    };
    let pipeline = device.create_graphics_pipeline(&request);

    // The modules are not needed once the pipeline object exists (or failed)
    device.destroy_shader_module(fragment_module);
    device.destroy_shader_module(vertex_module);

    match pipeline {
        Ok(pipeline) => Ok(PipelineHandles { layout, pipeline }),
        Err(source) => {
            device.destroy_pipeline_layout(layout);
            Err(RenderError::at_stage(InitStage::GraphicsPipeline)(source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_layout_stride_and_offsets() {
        let layout = VertexLayout::mesh();
        assert_eq!(layout.stride(), 36);

        let offsets: Vec<u32> = layout.attributes().iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 32]);
    }

    #[test]
    fn test_mesh_layout_formats() {
        let layout = VertexLayout::mesh();
        let formats: Vec<vk::Format> = layout.attributes().iter().map(|a| a.format).collect();
        assert_eq!(
            formats,
            vec![
                vk::Format::R32G32B32_SFLOAT,
                vk::Format::R32G32B32_SFLOAT,
                vk::Format::R32G32_SFLOAT,
                vk::Format::R32_SFLOAT,
            ]
        );
    }

    #[test]
    fn test_binding_description_is_per_vertex() {
        let binding = VertexLayout::mesh().binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 36);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_push_constant_fits_model_matrix() {
        assert_eq!(
            PUSH_CONSTANT_SIZE as usize,
            std::mem::size_of::<[[f32; 4]; 4]>()
        );
    }

    #[test]
    fn test_default_raster_state() {
        let raster = RasterState::default();
        assert_eq!(raster.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(raster.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(raster.polygon_mode, vk::PolygonMode::FILL);
    }

    #[test]
    fn test_load_spirv_rejects_unaligned_blob() {
        let dir = std::env::temp_dir();
        let path = dir.join("render_core_test_unaligned.spv");
        std::fs::write(&path, [0u8; 7]).unwrap();
        let result = load_spirv(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            result,
            Err(RenderError::SpirvAlignment { len: 7, .. })
        ));
    }

    #[test]
    fn test_load_spirv_missing_file() {
        let result = load_spirv(Path::new("shaders/does_not_exist.spv"));
        assert!(matches!(result, Err(RenderError::ShaderBlob { .. })));
    }

    #[test]
    fn test_load_spirv_reads_words() {
        let dir = std::env::temp_dir();
        let path = dir.join("render_core_test_words.spv");
        let words = [0x0723_0203_u32, 0x0001_0000];
        let mut bytes = Vec::new();
        for word in words {
            bytes.extend_from_slice(&word.to_ne_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();
        let loaded = load_spirv(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, words);
    }
}
