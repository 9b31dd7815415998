use crate::gfx;

use gfx::BlendBinding;
use gfx::Context;
use gfx::DepthStencilBinding;
use gfx::Format;
use gfx::IndexBufferBinding;
use gfx::ScissorRect;
use gfx::ShaderStage;
use gfx::Topology;
use gfx::VertexStream;
use gfx::Viewport;

use super::stage_table::count_bound;
use super::stage_table::update_slot;

/// Single valued pipeline state which is not replicated per slot index: shaders, input assembler,
/// output merger, rasterizer and the viewport / scissor arrays.
pub struct FixedFunctionState<D: gfx::Device> {
    shaders: [Option<D::Shader>; gfx::NUM_SHADER_STAGES],
    input_layout: Option<D::InputLayout>,
    blend: BlendBinding<D::BlendState>,
    depth_stencil: DepthStencilBinding<D::DepthStencilState>,
    rasterizer_state: Option<D::RasterizerState>,
    vertex_streams: Box<[VertexStream<D::Buffer>]>,
    stream_strides: [u32; gfx::MAX_VERTEX_STREAMS],
    index_buffer: IndexBufferBinding<D::Buffer>,
    topology: Topology,
    num_viewports: usize,
    viewports: [Viewport; gfx::MAX_VIEWPORTS],
    num_scissor_rects: usize,
    scissor_rects: [ScissorRect; gfx::MAX_VIEWPORTS],
}

impl<D> FixedFunctionState<D> where D: gfx::Device {
    pub fn new() -> Self {
        FixedFunctionState {
            shaders: std::array::from_fn(|_| None),
            input_layout: None,
            blend: BlendBinding::default(),
            depth_stencil: DepthStencilBinding::default(),
            rasterizer_state: None,
            vertex_streams: (0..gfx::MAX_VERTEX_STREAMS).map(|_| VertexStream::default()).collect(),
            stream_strides: [0; gfx::MAX_VERTEX_STREAMS],
            index_buffer: IndexBufferBinding::default(),
            topology: Topology::Undefined,
            num_viewports: 0,
            viewports: [Viewport::default(); gfx::MAX_VIEWPORTS],
            num_scissor_rects: 0,
            scissor_rects: [ScissorRect::default(); gfx::MAX_VIEWPORTS],
        }
    }

    pub fn shader(&self, stage: ShaderStage) -> Option<&D::Shader> {
        self.shaders[stage.index()].as_ref()
    }

    pub fn input_layout(&self) -> Option<&D::InputLayout> {
        self.input_layout.as_ref()
    }

    pub fn blend(&self) -> &BlendBinding<D::BlendState> {
        &self.blend
    }

    pub fn depth_stencil(&self) -> &DepthStencilBinding<D::DepthStencilState> {
        &self.depth_stencil
    }

    pub fn rasterizer_state(&self) -> Option<&D::RasterizerState> {
        self.rasterizer_state.as_ref()
    }

    pub fn vertex_stream(&self, index: usize) -> &VertexStream<D::Buffer> {
        debug_assert!(index < gfx::MAX_VERTEX_STREAMS, "vertex stream {} out of range", index);
        &self.vertex_streams[index]
    }

    pub fn vertex_streams(&self) -> &[VertexStream<D::Buffer>] {
        &self.vertex_streams
    }

    pub fn stream_stride(&self, index: usize) -> u32 {
        self.stream_strides[index]
    }

    pub fn index_buffer(&self) -> &IndexBufferBinding<D::Buffer> {
        &self.index_buffer
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn viewports(&self) -> &[Viewport] {
        &self.viewports[..self.num_viewports]
    }

    pub fn scissor_rects(&self) -> &[ScissorRect] {
        &self.scissor_rects[..self.num_scissor_rects]
    }

    pub(crate) fn set_shader(
        &mut self,
        context: &mut D::Context,
        stage: ShaderStage,
        shader: Option<&D::Shader>,
        skip_cache: bool,
    ) -> bool {
        update_slot(&mut self.shaders[stage.index()], shader, skip_cache, |shader| {
            context.set_shader(stage, shader)
        })
    }

    pub(crate) fn set_input_layout(
        &mut self,
        context: &mut D::Context,
        layout: Option<&D::InputLayout>,
        skip_cache: bool,
    ) -> bool {
        update_slot(&mut self.input_layout, layout, skip_cache, |layout| {
            context.set_input_layout(layout)
        })
    }

    pub(crate) fn set_rasterizer_state(
        &mut self,
        context: &mut D::Context,
        state: Option<&D::RasterizerState>,
        skip_cache: bool,
    ) -> bool {
        update_slot(&mut self.rasterizer_state, state, skip_cache, |state| {
            context.set_rasterizer_state(state)
        })
    }

    /// The state, factor and mask are compared as a unit and always forwarded together.
    pub(crate) fn set_blend_state(
        &mut self,
        context: &mut D::Context,
        state: Option<&D::BlendState>,
        blend_factor: &[f32; 4],
        sample_mask: u32,
        skip_cache: bool,
    ) -> bool {
        if !skip_cache && self.blend.matches(state, blend_factor, sample_mask) {
            return false;
        }
        let retained = state.cloned();
        context.set_blend_state(state, blend_factor, sample_mask);
        let released = std::mem::replace(
            &mut self.blend,
            BlendBinding {
                state: retained,
                blend_factor: *blend_factor,
                sample_mask,
            },
        );
        drop(released);
        true
    }

    /// Changes factor and mask in place, the bound state object is forwarded as is and never retained again.
    pub(crate) fn set_blend_factor(
        &mut self,
        context: &mut D::Context,
        blend_factor: &[f32; 4],
        sample_mask: u32,
        skip_cache: bool,
    ) -> bool {
        let unchanged = gfx::blend_factor_eq(&self.blend.blend_factor, blend_factor) && self.blend.sample_mask == sample_mask;
        if !skip_cache && unchanged {
            return false;
        }
        context.set_blend_state(self.blend.state.as_ref(), blend_factor, sample_mask);
        self.blend.blend_factor = *blend_factor;
        self.blend.sample_mask = sample_mask;
        true
    }

    pub(crate) fn set_stencil_ref(&mut self, context: &mut D::Context, stencil_ref: u8, skip_cache: bool) -> bool {
        if !skip_cache && self.depth_stencil.stencil_ref == stencil_ref {
            return false;
        }
        context.set_depth_stencil_state(self.depth_stencil.state.as_ref(), stencil_ref);
        self.depth_stencil.stencil_ref = stencil_ref;
        true
    }

    pub(crate) fn set_depth_stencil_state(
        &mut self,
        context: &mut D::Context,
        state: Option<&D::DepthStencilState>,
        stencil_ref: u8,
        skip_cache: bool,
    ) -> bool {
        if !skip_cache && self.depth_stencil.matches(state, stencil_ref) {
            return false;
        }
        let retained = state.cloned();
        context.set_depth_stencil_state(state, stencil_ref);
        let released = std::mem::replace(
            &mut self.depth_stencil,
            DepthStencilBinding {
                state: retained,
                stencil_ref,
            },
        );
        drop(released);
        true
    }

    pub(crate) fn set_stream_source(
        &mut self,
        context: &mut D::Context,
        index: usize,
        buffer: Option<&D::Buffer>,
        stride: u32,
        offset: u32,
        skip_cache: bool,
    ) -> bool {
        assert!(index < gfx::MAX_VERTEX_STREAMS, "vertex stream {} out of range", index);
        let stream = &mut self.vertex_streams[index];
        if !skip_cache && stream.matches(buffer, stride, offset) {
            return false;
        }
        let retained = buffer.cloned();
        context.set_vertex_buffer(index as u32, buffer, stride, offset);
        let released = std::mem::replace(
            stream,
            VertexStream {
                buffer: retained,
                stride,
                offset,
            },
        );
        drop(released);
        true
    }

    /// Strides come from the bound shader state, they are consumed by later stream binds
    /// which do not pass an explicit stride. No driver call is made.
    pub(crate) fn set_stream_strides(&mut self, strides: &[u32]) {
        assert!(strides.len() <= gfx::MAX_VERTEX_STREAMS, "{} stream strides exceeds the limit of {}", strides.len(), gfx::MAX_VERTEX_STREAMS);
        self.stream_strides[..strides.len()].copy_from_slice(strides);
        self.stream_strides[strides.len()..].fill(0);
    }

    pub(crate) fn set_index_buffer(
        &mut self,
        context: &mut D::Context,
        buffer: Option<&D::Buffer>,
        format: Format,
        offset: u32,
        skip_cache: bool,
    ) -> bool {
        if !skip_cache && self.index_buffer.matches(buffer, format, offset) {
            return false;
        }
        let retained = buffer.cloned();
        context.set_index_buffer(buffer, format, offset);
        let released = std::mem::replace(
            &mut self.index_buffer,
            IndexBufferBinding {
                buffer: retained,
                format,
                offset,
            },
        );
        drop(released);
        true
    }

    pub(crate) fn set_primitive_topology(&mut self, context: &mut D::Context, topology: Topology, skip_cache: bool) -> bool {
        if !skip_cache && self.topology == topology {
            return false;
        }
        context.set_primitive_topology(topology);
        self.topology = topology;
        true
    }

    /// Changed if the count differs or any of the first `viewports.len()` entries differ bitwise.
    /// The whole array is forwarded in one call.
    pub(crate) fn set_viewports(&mut self, context: &mut D::Context, viewports: &[Viewport], skip_cache: bool) -> bool {
        assert!(viewports.len() <= gfx::MAX_VIEWPORTS, "{} viewports exceeds the limit of {}", viewports.len(), gfx::MAX_VIEWPORTS);
        let unchanged = self.num_viewports == viewports.len()
            && self.viewports().iter().zip(viewports).all(|(cached, new)| cached.bitwise_eq(new));
        if !skip_cache && unchanged {
            return false;
        }
        self.viewports[..viewports.len()].copy_from_slice(viewports);
        self.viewports[viewports.len()..].fill(Viewport::default());
        self.num_viewports = viewports.len();
        context.set_viewports(viewports);
        true
    }

    pub(crate) fn set_scissor_rects(&mut self, context: &mut D::Context, rects: &[ScissorRect], skip_cache: bool) -> bool {
        assert!(rects.len() <= gfx::MAX_VIEWPORTS, "{} scissor rects exceeds the limit of {}", rects.len(), gfx::MAX_VIEWPORTS);
        if !skip_cache && self.scissor_rects() == rects {
            return false;
        }
        self.scissor_rects[..rects.len()].copy_from_slice(rects);
        self.scissor_rects[rects.len()..].fill(ScissorRect::default());
        self.num_scissor_rects = rects.len();
        context.set_scissor_rects(rects);
        true
    }

    /// Number of handles currently retained.
    pub fn num_bound(&self) -> usize {
        count_bound(&self.shaders)
            + self.input_layout.is_some() as usize
            + self.blend.state.is_some() as usize
            + self.depth_stencil.state.is_some() as usize
            + self.rasterizer_state.is_some() as usize
            + self.vertex_streams.iter().filter(|stream| stream.buffer.is_some()).count()
            + self.index_buffer.buffer.is_some() as usize
    }
}

impl<D> Default for FixedFunctionState<D> where D: gfx::Device {
    fn default() -> Self {
        Self::new()
    }
}
