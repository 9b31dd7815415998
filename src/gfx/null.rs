use super::BlendBinding;
use super::DepthStencilBinding;
use super::Format;
use super::IndexBufferBinding;
use super::ScissorRect;
use super::ShaderStage;
use super::SlotCategory;
use super::Topology;
use super::VertexStream;
use super::Viewport;
use super::MAX_CONSTANT_BUFFERS;
use super::MAX_SAMPLERS;
use super::MAX_SHADER_RESOURCE_VIEWS;
use super::MAX_VERTEX_STREAMS;
use super::NUM_SHADER_STAGES;

use std::rc::Rc;

/// Null backend, every handle type is a reference counted `Object`.
#[derive(Clone)]
pub struct Device;

/// A named object standing in for a gpu resource.
#[derive(Debug)]
pub struct Object {
    pub name: String,
}

/// Handle to an `Object`, `Rc::strong_count` reports how many owners currently retain it.
pub type Handle = Rc<Object>;

/// Creates a new uniquely identifiable handle.
pub fn create_handle(name: &str) -> Handle {
    Rc::new(Object {
        name: name.to_string(),
    })
}

/// A single call which reached the null context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub category: SlotCategory,
    /// Stage for per stage categories
    pub stage: Option<ShaderStage>,
    /// First slot the call bound
    pub slot: u32,
    /// Number of consecutive slots or array entries the call bound
    pub count: u32,
}

/// Live slots of a single stage.
#[derive(Clone)]
struct StageSlots {
    shader_resource_views: Vec<Option<Handle>>,
    samplers: Vec<Option<Handle>>,
    constant_buffers: Vec<Option<Handle>>,
    shader: Option<Handle>,
}

impl StageSlots {
    fn new() -> Self {
        StageSlots {
            shader_resource_views: vec![None; MAX_SHADER_RESOURCE_VIEWS],
            samplers: vec![None; MAX_SAMPLERS],
            constant_buffers: vec![None; MAX_CONSTANT_BUFFERS],
            shader: None,
        }
    }
}

/// Null context which behaves like a driver: it holds its own references to bound objects,
/// can be read back, and logs every call so callers can observe which calls were issued.
pub struct Context {
    stages: Vec<StageSlots>,
    input_layout: Option<Handle>,
    blend: BlendBinding<Handle>,
    depth_stencil: DepthStencilBinding<Handle>,
    rasterizer_state: Option<Handle>,
    vertex_streams: Vec<VertexStream<Handle>>,
    index_buffer: IndexBufferBinding<Handle>,
    topology: Topology,
    viewports: Vec<Viewport>,
    scissor_rects: Vec<ScissorRect>,
    calls: Vec<Call>,
    num_clears: usize,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            stages: vec![StageSlots::new(); NUM_SHADER_STAGES],
            input_layout: None,
            blend: BlendBinding::default(),
            depth_stencil: DepthStencilBinding::default(),
            rasterizer_state: None,
            vertex_streams: vec![VertexStream::default(); MAX_VERTEX_STREAMS],
            index_buffer: IndexBufferBinding::default(),
            topology: Topology::Undefined,
            viewports: Vec::new(),
            scissor_rects: Vec::new(),
            calls: Vec::new(),
            num_clears: 0,
        }
    }

    /// Every binding call issued since creation or the last `clear_calls`, in issue order.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Number of binding calls issued since creation or the last `clear_calls`.
    pub fn num_calls(&self) -> usize {
        self.calls.len()
    }

    /// Number of binding calls of `category`.
    pub fn num_calls_of(&self, category: SlotCategory) -> usize {
        self.calls.iter().filter(|call| call.category == category).count()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of times `clear_state` has been called.
    pub fn num_clears(&self) -> usize {
        self.num_clears
    }

    fn log(&mut self, category: SlotCategory, stage: Option<ShaderStage>, slot: u32, count: u32) {
        self.calls.push(Call {
            category,
            stage,
            slot,
            count,
        });
    }

    fn stage(&self, stage: ShaderStage) -> &StageSlots {
        &self.stages[stage.index()]
    }

    fn stage_mut(&mut self, stage: ShaderStage) -> &mut StageSlots {
        &mut self.stages[stage.index()]
    }
}

impl super::Context<Device> for Context {
    fn set_shader_resource_view(&mut self, stage: ShaderStage, slot: u32, view: Option<&Handle>) {
        self.stage_mut(stage).shader_resource_views[slot as usize] = view.cloned();
        self.log(SlotCategory::ShaderResourceView, Some(stage), slot, 1);
    }

    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: Option<&Handle>) {
        self.stage_mut(stage).samplers[slot as usize] = sampler.cloned();
        self.log(SlotCategory::Sampler, Some(stage), slot, 1);
    }

    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: Option<&Handle>) {
        self.stage_mut(stage).constant_buffers[slot as usize] = buffer.cloned();
        self.log(SlotCategory::ConstantBuffer, Some(stage), slot, 1);
    }

    fn set_shader(&mut self, stage: ShaderStage, shader: Option<&Handle>) {
        self.stage_mut(stage).shader = shader.cloned();
        self.log(SlotCategory::Shader, Some(stage), 0, 1);
    }

    fn set_input_layout(&mut self, layout: Option<&Handle>) {
        self.input_layout = layout.cloned();
        self.log(SlotCategory::InputLayout, None, 0, 1);
    }

    fn set_blend_state(&mut self, state: Option<&Handle>, blend_factor: &[f32; 4], sample_mask: u32) {
        self.blend = BlendBinding {
            state: state.cloned(),
            blend_factor: *blend_factor,
            sample_mask,
        };
        self.log(SlotCategory::BlendState, None, 0, 1);
    }

    fn set_depth_stencil_state(&mut self, state: Option<&Handle>, stencil_ref: u8) {
        self.depth_stencil = DepthStencilBinding {
            state: state.cloned(),
            stencil_ref,
        };
        self.log(SlotCategory::DepthStencilState, None, 0, 1);
    }

    fn set_rasterizer_state(&mut self, state: Option<&Handle>) {
        self.rasterizer_state = state.cloned();
        self.log(SlotCategory::RasterizerState, None, 0, 1);
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: Option<&Handle>, stride: u32, offset: u32) {
        self.vertex_streams[slot as usize] = VertexStream {
            buffer: buffer.cloned(),
            stride,
            offset,
        };
        self.log(SlotCategory::VertexStream, None, slot, 1);
    }

    fn set_index_buffer(&mut self, buffer: Option<&Handle>, format: Format, offset: u32) {
        self.index_buffer = IndexBufferBinding {
            buffer: buffer.cloned(),
            format,
            offset,
        };
        self.log(SlotCategory::IndexBuffer, None, 0, 1);
    }

    fn set_primitive_topology(&mut self, topology: Topology) {
        self.topology = topology;
        self.log(SlotCategory::PrimitiveTopology, None, 0, 1);
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.viewports = viewports.to_vec();
        self.log(SlotCategory::Viewports, None, 0, viewports.len() as u32);
    }

    fn set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        self.scissor_rects = rects.to_vec();
        self.log(SlotCategory::ScissorRects, None, 0, rects.len() as u32);
    }

    fn clear_state(&mut self) {
        let calls = std::mem::take(&mut self.calls);
        let num_clears = self.num_clears + 1;
        *self = Context::new();
        self.calls = calls;
        self.num_clears = num_clears;
    }

    fn get_shader_resource_view(&self, stage: ShaderStage, slot: u32) -> Option<Handle> {
        self.stage(stage).shader_resource_views[slot as usize].clone()
    }

    fn get_sampler(&self, stage: ShaderStage, slot: u32) -> Option<Handle> {
        self.stage(stage).samplers[slot as usize].clone()
    }

    fn get_constant_buffer(&self, stage: ShaderStage, slot: u32) -> Option<Handle> {
        self.stage(stage).constant_buffers[slot as usize].clone()
    }

    fn get_shader(&self, stage: ShaderStage) -> Option<Handle> {
        self.stage(stage).shader.clone()
    }

    fn get_input_layout(&self) -> Option<Handle> {
        self.input_layout.clone()
    }

    fn get_blend_state(&self) -> BlendBinding<Handle> {
        self.blend.clone()
    }

    fn get_depth_stencil_state(&self) -> DepthStencilBinding<Handle> {
        self.depth_stencil.clone()
    }

    fn get_rasterizer_state(&self) -> Option<Handle> {
        self.rasterizer_state.clone()
    }

    fn get_vertex_buffer(&self, slot: u32) -> VertexStream<Handle> {
        self.vertex_streams[slot as usize].clone()
    }

    fn get_index_buffer(&self) -> IndexBufferBinding<Handle> {
        self.index_buffer.clone()
    }

    fn get_primitive_topology(&self) -> Topology {
        self.topology
    }

    fn get_viewports(&self) -> Vec<Viewport> {
        self.viewports.clone()
    }

    fn get_scissor_rects(&self) -> Vec<ScissorRect> {
        self.scissor_rects.clone()
    }
}

impl super::Device for Device {
    type ShaderResourceView = Handle;
    type Sampler = Handle;
    type Buffer = Handle;
    type Shader = Handle;
    type InputLayout = Handle;
    type BlendState = Handle;
    type DepthStencilState = Handle;
    type RasterizerState = Handle;
    type Context = Context;
}
