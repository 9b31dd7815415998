/// Reference implementation which records driver calls and keeps its own live bindings for read back.
pub mod null;

/// Implements the context interface over an immediate `ID3D11DeviceContext`.
#[cfg(target_os = "windows")]
pub mod d3d11;

use std::rc::Rc;
use std::sync::Arc;

/// Number of shader stages which own an independent set of slots.
pub const NUM_SHADER_STAGES: usize = 6;
/// Shader resource view slots per stage.
pub const MAX_SHADER_RESOURCE_VIEWS: usize = 128;
/// Sampler slots per stage.
pub const MAX_SAMPLERS: usize = 16;
/// Constant buffer slots per stage.
pub const MAX_CONSTANT_BUFFERS: usize = 14;
/// Input assembler vertex buffer slots.
pub const MAX_VERTEX_STREAMS: usize = 32;
/// Viewports and scissor rects which can be bound at once.
pub const MAX_VIEWPORTS: usize = 16;

/// Blend factor a context holds after a clear.
pub const DEFAULT_BLEND_FACTOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
/// Sample mask a context holds after a clear.
pub const DEFAULT_SAMPLE_MASK: u32 = 0xffffffff;

/// A pipeline stage with its own resource, sampler and constant buffer slots.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl ShaderStage {
    /// All stages in stage table order.
    pub const ALL: [ShaderStage; NUM_SHADER_STAGES] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Pixel,
        ShaderStage::Compute,
    ];

    /// Index of the stage into per stage tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The single bit flag for this stage.
    pub fn flag(self) -> StageFlags {
        StageFlags::from_bits_truncate(1 << self as u8)
    }
}

bitflags! {
    /// Mask of shader stages, used to target operations at multiple stage tables.
    pub struct StageFlags: u8 {
        const VERTEX = 1 << 0;
        const HULL = 1 << 1;
        const DOMAIN = 1 << 2;
        const GEOMETRY = 1 << 3;
        const PIXEL = 1 << 4;
        const COMPUTE = 1 << 5;
        const GRAPHICS = Self::VERTEX.bits | Self::HULL.bits | Self::DOMAIN.bits | Self::GEOMETRY.bits | Self::PIXEL.bits;
    }
}

impl StageFlags {
    /// Iterate the stages contained in the mask, in stage table order.
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL.into_iter().filter(move |stage| self.contains(stage.flag()))
    }
}

/// Every category of bindable pipeline state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotCategory {
    ShaderResourceView,
    Sampler,
    ConstantBuffer,
    Shader,
    InputLayout,
    VertexStream,
    IndexBuffer,
    PrimitiveTopology,
    BlendState,
    DepthStencilState,
    RasterizerState,
    Viewports,
    ScissorRects,
}

impl std::fmt::Display for SlotCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SlotCategory::ShaderResourceView => "shader resource view",
            SlotCategory::Sampler => "sampler",
            SlotCategory::ConstantBuffer => "constant buffer",
            SlotCategory::Shader => "shader",
            SlotCategory::InputLayout => "input layout",
            SlotCategory::VertexStream => "vertex stream",
            SlotCategory::IndexBuffer => "index buffer",
            SlotCategory::PrimitiveTopology => "primitive topology",
            SlotCategory::BlendState => "blend state",
            SlotCategory::DepthStencilState => "depth stencil state",
            SlotCategory::RasterizerState => "rasterizer state",
            SlotCategory::Viewports => "viewports",
            SlotCategory::ScissorRects => "scissor rects",
        };
        write!(f, "{}", name)
    }
}

/// Structure to specify viewport coordinates on a `Context`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Viewport {
    /// Top left x coordinate
    pub x: f32,
    /// Top left y coordinate
    pub y: f32,
    /// Width of the viewport rectangle
    pub width: f32,
    /// Height of the viewport rectangle (Y is down)
    pub height: f32,
    /// Minimum depth of the viewport. Ranges between 0 and 1
    pub min_depth: f32,
    /// Maximum depth of the viewport. Ranges between 0 and 1
    pub max_depth: f32,
}

impl Viewport {
    /// Viewport covering `width` x `height` from the origin with a 0-1 depth range.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Viewport {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Compares the raw bits of each member, so `-0.0` and `0.0` differ and a `NaN` equals itself.
    pub fn bitwise_eq(&self, other: &Viewport) -> bool {
        self.to_bits() == other.to_bits()
    }

    fn to_bits(&self) -> [u32; 6] {
        [
            self.x.to_bits(),
            self.y.to_bits(),
            self.width.to_bits(),
            self.height.to_bits(),
            self.min_depth.to_bits(),
            self.max_depth.to_bits(),
        ]
    }
}

/// Structure to specify scissor rect coordinates on a `Context`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ScissorRect {
    /// Left x coordinate
    pub left: i32,
    /// Top y coordinate
    pub top: i32,
    /// Right x coordinate
    pub right: i32,
    /// Bottom y coordinate
    pub bottom: i32,
}

/// Formats an index buffer can be bound with.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Format {
    #[default]
    Unknown,
    R16u,
    R32u,
}

/// Primitive topology for the input assembler.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Topology {
    #[default]
    Undefined,
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    LineListAdj,
    LineStripAdj,
    TriangleListAdj,
    TriangleStripAdj,
    /// Patch list with the number of control points, 1 to 32
    PatchList(u32),
}

/// Compares blend factors bit for bit.
pub fn blend_factor_eq(a: &[f32; 4], b: &[f32; 4]) -> bool {
    a.iter().zip(b.iter()).all(|(a, b)| a.to_bits() == b.to_bits())
}

/// A reference counted handle to a gpu object. Cloning a handle retains the object and dropping releases it.
pub trait Resource: 'static + Clone {
    /// Returns true if `self` and `other` reference the same underlying object.
    fn is_same(&self, other: &Self) -> bool;
}

impl<T: 'static + ?Sized> Resource for Rc<T> {
    fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: 'static + ?Sized> Resource for Arc<T> {
    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

/// Compares two optional handles by object identity, `None` only matches `None`.
pub fn same_resource<R: Resource>(a: Option<&R>, b: Option<&R>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.is_same(b),
        (None, None) => true,
        _ => false,
    }
}

/// Binding of a buffer to a vertex stream.
#[derive(Clone, Debug)]
pub struct VertexStream<B> {
    pub buffer: Option<B>,
    pub stride: u32,
    pub offset: u32,
}

impl<B> Default for VertexStream<B> {
    fn default() -> Self {
        VertexStream {
            buffer: None,
            stride: 0,
            offset: 0,
        }
    }
}

impl<B: Resource> VertexStream<B> {
    /// True if `buffer`, `stride` and `offset` all match this binding.
    pub fn matches(&self, buffer: Option<&B>, stride: u32, offset: u32) -> bool {
        same_resource(self.buffer.as_ref(), buffer) && self.stride == stride && self.offset == offset
    }
}

/// Binding of the index buffer, the format is part of the binding.
#[derive(Clone, Debug)]
pub struct IndexBufferBinding<B> {
    pub buffer: Option<B>,
    pub format: Format,
    pub offset: u32,
}

impl<B> Default for IndexBufferBinding<B> {
    fn default() -> Self {
        IndexBufferBinding {
            buffer: None,
            format: Format::Unknown,
            offset: 0,
        }
    }
}

impl<B: Resource> IndexBufferBinding<B> {
    /// True if `buffer`, `format` and `offset` all match this binding.
    pub fn matches(&self, buffer: Option<&B>, format: Format, offset: u32) -> bool {
        same_resource(self.buffer.as_ref(), buffer) && self.format == format && self.offset == offset
    }
}

/// Output merger blend state, factor and sample mask, which the driver binds together.
#[derive(Clone, Debug)]
pub struct BlendBinding<S> {
    pub state: Option<S>,
    pub blend_factor: [f32; 4],
    pub sample_mask: u32,
}

impl<S> Default for BlendBinding<S> {
    fn default() -> Self {
        BlendBinding {
            state: None,
            blend_factor: DEFAULT_BLEND_FACTOR,
            sample_mask: DEFAULT_SAMPLE_MASK,
        }
    }
}

impl<S: Resource> BlendBinding<S> {
    /// True if all three members match; the blend factor is compared bitwise.
    pub fn matches(&self, state: Option<&S>, blend_factor: &[f32; 4], sample_mask: u32) -> bool {
        same_resource(self.state.as_ref(), state)
            && blend_factor_eq(&self.blend_factor, blend_factor)
            && self.sample_mask == sample_mask
    }
}

/// Output merger depth stencil state and stencil reference.
#[derive(Clone, Debug)]
pub struct DepthStencilBinding<S> {
    pub state: Option<S>,
    pub stencil_ref: u8,
}

impl<S> Default for DepthStencilBinding<S> {
    fn default() -> Self {
        DepthStencilBinding {
            state: None,
            stencil_ref: 0,
        }
    }
}

impl<S: Resource> DepthStencilBinding<S> {
    /// True if both the state object and stencil reference match.
    pub fn matches(&self, state: Option<&S>, stencil_ref: u8) -> bool {
        same_resource(self.state.as_ref(), state) && self.stencil_ref == stencil_ref
    }
}

/// A graphics backend, defines the handle types which can be bound on its `Context`.
/// The backend owns creation and destruction of these objects, a `Context` only binds them.
pub trait Device: 'static + Sized {
    type ShaderResourceView: Resource;
    type Sampler: Resource;
    type Buffer: Resource;
    type Shader: Resource;
    type InputLayout: Resource;
    type BlendState: Resource;
    type DepthStencilState: Resource;
    type RasterizerState: Resource;
    type Context: Context<Self>;
}

/// An immediate command context. Each `set_` function issues exactly one binding call to the driver,
/// each `get_` function reads back the live driver binding and returns retained handles.
pub trait Context<D: Device>: 'static {
    /// Bind a single shader resource view `slot` on `stage`
    fn set_shader_resource_view(&mut self, stage: ShaderStage, slot: u32, view: Option<&D::ShaderResourceView>);
    /// Bind a single sampler `slot` on `stage`
    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: Option<&D::Sampler>);
    /// Bind the whole range of `buffer` to constant buffer `slot` on `stage`
    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: Option<&D::Buffer>);
    /// Bind the shader object for `stage`
    fn set_shader(&mut self, stage: ShaderStage, shader: Option<&D::Shader>);
    fn set_input_layout(&mut self, layout: Option<&D::InputLayout>);
    /// Bind blend state, factor and sample mask in a single call
    fn set_blend_state(&mut self, state: Option<&D::BlendState>, blend_factor: &[f32; 4], sample_mask: u32);
    fn set_depth_stencil_state(&mut self, state: Option<&D::DepthStencilState>, stencil_ref: u8);
    fn set_rasterizer_state(&mut self, state: Option<&D::RasterizerState>);
    fn set_vertex_buffer(&mut self, slot: u32, buffer: Option<&D::Buffer>, stride: u32, offset: u32);
    fn set_index_buffer(&mut self, buffer: Option<&D::Buffer>, format: Format, offset: u32);
    fn set_primitive_topology(&mut self, topology: Topology);
    /// Bind the full viewport array, viewports beyond `viewports.len()` are disabled
    fn set_viewports(&mut self, viewports: &[Viewport]);
    /// Bind the full scissor rect array, rects beyond `rects.len()` are disabled
    fn set_scissor_rects(&mut self, rects: &[ScissorRect]);
    /// Unbind everything and restore every piece of state to its default
    fn clear_state(&mut self);

    fn get_shader_resource_view(&self, stage: ShaderStage, slot: u32) -> Option<D::ShaderResourceView>;
    fn get_sampler(&self, stage: ShaderStage, slot: u32) -> Option<D::Sampler>;
    fn get_constant_buffer(&self, stage: ShaderStage, slot: u32) -> Option<D::Buffer>;
    fn get_shader(&self, stage: ShaderStage) -> Option<D::Shader>;
    fn get_input_layout(&self) -> Option<D::InputLayout>;
    fn get_blend_state(&self) -> BlendBinding<D::BlendState>;
    fn get_depth_stencil_state(&self) -> DepthStencilBinding<D::DepthStencilState>;
    fn get_rasterizer_state(&self) -> Option<D::RasterizerState>;
    fn get_vertex_buffer(&self, slot: u32) -> VertexStream<D::Buffer>;
    fn get_index_buffer(&self) -> IndexBufferBinding<D::Buffer>;
    fn get_primitive_topology(&self) -> Topology;
    fn get_viewports(&self) -> Vec<Viewport>;
    fn get_scissor_rects(&self) -> Vec<ScissorRect>;
}

impl From<Viewport> for ScissorRect {
    fn from(viewport: Viewport) -> ScissorRect {
        ScissorRect {
            left: viewport.x as i32,
            top: viewport.y as i32,
            right: (viewport.x + viewport.width) as i32,
            bottom: (viewport.y + viewport.height) as i32,
        }
    }
}
