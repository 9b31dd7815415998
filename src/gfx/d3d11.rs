use super::BlendBinding;
use super::DepthStencilBinding;
use super::Format;
use super::IndexBufferBinding;
use super::ScissorRect;
use super::ShaderStage;
use super::Topology;
use super::VertexStream;
use super::Viewport;
use super::MAX_VIEWPORTS;

use windows::{
    Win32::Foundation::*,
    Win32::Graphics::Direct3D::*,
    Win32::Graphics::Direct3D11::*,
    Win32::Graphics::Dxgi::Common::*,
    Win32::Graphics::Dxgi::IDXGIAdapter,
};

/// Direct3D 11 backend, handle types are the COM interfaces themselves so clone is `AddRef` and drop is `Release`.
pub struct Device {
    device: ID3D11Device,
    feature_level: D3D_FEATURE_LEVEL,
}

/// A shader object for any one of the pipeline stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shader {
    Vertex(ID3D11VertexShader),
    Hull(ID3D11HullShader),
    Domain(ID3D11DomainShader),
    Geometry(ID3D11GeometryShader),
    Pixel(ID3D11PixelShader),
    Compute(ID3D11ComputeShader),
}

impl Shader {
    /// The stage this shader can be bound to
    pub fn stage(&self) -> ShaderStage {
        match self {
            Shader::Vertex(_) => ShaderStage::Vertex,
            Shader::Hull(_) => ShaderStage::Hull,
            Shader::Domain(_) => ShaderStage::Domain,
            Shader::Geometry(_) => ShaderStage::Geometry,
            Shader::Pixel(_) => ShaderStage::Pixel,
            Shader::Compute(_) => ShaderStage::Compute,
        }
    }
}

/// Immediate context wrapper implementing `gfx::Context`.
pub struct Context {
    context: ID3D11DeviceContext,
}

macro_rules! impl_resource {
    ($($ty:ty),*) => {
        $(
            impl super::Resource for $ty {
                fn is_same(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    }
}

impl_resource!(
    ID3D11ShaderResourceView,
    ID3D11SamplerState,
    ID3D11Buffer,
    ID3D11InputLayout,
    ID3D11BlendState,
    ID3D11DepthStencilState,
    ID3D11RasterizerState,
    Shader
);

/// Expands to the call of the stage prefixed function matching `$stage`
macro_rules! per_stage {
    ($stage:expr, $context:expr, [$vs:ident, $hs:ident, $ds:ident, $gs:ident, $ps:ident, $cs:ident]($($arg:expr),*)) => {
        match $stage {
            ShaderStage::Vertex => $context.$vs($($arg),*),
            ShaderStage::Hull => $context.$hs($($arg),*),
            ShaderStage::Domain => $context.$ds($($arg),*),
            ShaderStage::Geometry => $context.$gs($($arg),*),
            ShaderStage::Pixel => $context.$ps($($arg),*),
            ShaderStage::Compute => $context.$cs($($arg),*),
        }
    }
}

/// Extracts the stage interface from an optional `Shader`, binding a shader to another stage is a contract violation
macro_rules! stage_shader {
    ($shader:expr, $variant:path) => {
        $shader.map(|shader| match shader {
            $variant(inner) => inner,
            other => panic!("statecache_rs::gfx::d3d11:: {:?} shader bound to the wrong stage", other.stage()),
        })
    }
}

fn to_dxgi_format(format: Format) -> DXGI_FORMAT {
    match format {
        Format::Unknown => DXGI_FORMAT_UNKNOWN,
        Format::R16u => DXGI_FORMAT_R16_UINT,
        Format::R32u => DXGI_FORMAT_R32_UINT,
    }
}

fn from_dxgi_format(format: DXGI_FORMAT) -> Format {
    match format {
        DXGI_FORMAT_R16_UINT => Format::R16u,
        DXGI_FORMAT_R32_UINT => Format::R32u,
        _ => Format::Unknown,
    }
}

fn to_d3d11_topology(topology: Topology) -> D3D_PRIMITIVE_TOPOLOGY {
    match topology {
        Topology::Undefined => D3D_PRIMITIVE_TOPOLOGY_UNDEFINED,
        Topology::PointList => D3D_PRIMITIVE_TOPOLOGY_POINTLIST,
        Topology::LineList => D3D_PRIMITIVE_TOPOLOGY_LINELIST,
        Topology::LineStrip => D3D_PRIMITIVE_TOPOLOGY_LINESTRIP,
        Topology::TriangleList => D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST,
        Topology::TriangleStrip => D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP,
        Topology::LineListAdj => D3D_PRIMITIVE_TOPOLOGY_LINELIST_ADJ,
        Topology::LineStripAdj => D3D_PRIMITIVE_TOPOLOGY_LINESTRIP_ADJ,
        Topology::TriangleListAdj => D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST_ADJ,
        Topology::TriangleStripAdj => D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP_ADJ,
        Topology::PatchList(control_points) => {
            assert!((1..=32).contains(&control_points), "patch list with {} control points", control_points);
            D3D_PRIMITIVE_TOPOLOGY(D3D_PRIMITIVE_TOPOLOGY_1_CONTROL_POINT_PATCHLIST.0 + control_points as i32 - 1)
        }
    }
}

fn from_d3d11_topology(topology: D3D_PRIMITIVE_TOPOLOGY) -> Topology {
    let first_patch = D3D_PRIMITIVE_TOPOLOGY_1_CONTROL_POINT_PATCHLIST.0;
    let last_patch = D3D_PRIMITIVE_TOPOLOGY_32_CONTROL_POINT_PATCHLIST.0;
    match topology {
        D3D_PRIMITIVE_TOPOLOGY_POINTLIST => Topology::PointList,
        D3D_PRIMITIVE_TOPOLOGY_LINELIST => Topology::LineList,
        D3D_PRIMITIVE_TOPOLOGY_LINESTRIP => Topology::LineStrip,
        D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST => Topology::TriangleList,
        D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP => Topology::TriangleStrip,
        D3D_PRIMITIVE_TOPOLOGY_LINELIST_ADJ => Topology::LineListAdj,
        D3D_PRIMITIVE_TOPOLOGY_LINESTRIP_ADJ => Topology::LineStripAdj,
        D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST_ADJ => Topology::TriangleListAdj,
        D3D_PRIMITIVE_TOPOLOGY_TRIANGLESTRIP_ADJ => Topology::TriangleStripAdj,
        D3D_PRIMITIVE_TOPOLOGY(n) if n >= first_patch && n <= last_patch => Topology::PatchList((n - first_patch + 1) as u32),
        _ => Topology::Undefined,
    }
}

fn to_d3d11_viewport(viewport: &Viewport) -> D3D11_VIEWPORT {
    D3D11_VIEWPORT {
        TopLeftX: viewport.x,
        TopLeftY: viewport.y,
        Width: viewport.width,
        Height: viewport.height,
        MinDepth: viewport.min_depth,
        MaxDepth: viewport.max_depth,
    }
}

fn to_d3d11_rect(rect: &ScissorRect) -> RECT {
    RECT {
        left: rect.left,
        top: rect.top,
        right: rect.right,
        bottom: rect.bottom,
    }
}

impl Device {
    /// Creates a hardware device and returns it alongside its immediate context
    pub fn create(debug: bool) -> Result<(Device, Context), crate::Error> {
        let flags = if debug {
            D3D11_CREATE_DEVICE_DEBUG
        }
        else {
            D3D11_CREATE_DEVICE_FLAG(0)
        };
        let feature_levels = [D3D_FEATURE_LEVEL_11_1, D3D_FEATURE_LEVEL_11_0];
        let mut device = None;
        let mut context = None;
        let mut feature_level = D3D_FEATURE_LEVEL_11_0;
        unsafe {
            D3D11CreateDevice(
                None::<&IDXGIAdapter>,
                D3D_DRIVER_TYPE_HARDWARE,
                HMODULE::default(),
                flags,
                Some(&feature_levels),
                D3D11_SDK_VERSION,
                Some(&mut device as *mut _),
                Some(&mut feature_level as *mut _),
                Some(&mut context as *mut _),
            )?;
        }
        match (device, context) {
            (Some(device), Some(context)) => Ok((
                Device {
                    device,
                    feature_level,
                },
                Context::new(context),
            )),
            _ => Err(crate::Error {
                msg: "statecache_rs::gfx::d3d11:: D3D11CreateDevice returned no device".to_string(),
            }),
        }
    }

    pub fn device(&self) -> &ID3D11Device {
        &self.device
    }

    pub fn feature_level(&self) -> D3D_FEATURE_LEVEL {
        self.feature_level
    }
}

impl Context {
    pub fn new(context: ID3D11DeviceContext) -> Self {
        Context { context }
    }

    pub fn device_context(&self) -> &ID3D11DeviceContext {
        &self.context
    }
}

impl super::Context<Device> for Context {
    fn set_shader_resource_view(&mut self, stage: ShaderStage, slot: u32, view: Option<&ID3D11ShaderResourceView>) {
        let views = [view.cloned()];
        unsafe {
            per_stage!(stage, self.context, [
                VSSetShaderResources, HSSetShaderResources, DSSetShaderResources,
                GSSetShaderResources, PSSetShaderResources, CSSetShaderResources
            ](slot, Some(&views)));
        }
    }

    fn set_sampler(&mut self, stage: ShaderStage, slot: u32, sampler: Option<&ID3D11SamplerState>) {
        let samplers = [sampler.cloned()];
        unsafe {
            per_stage!(stage, self.context, [
                VSSetSamplers, HSSetSamplers, DSSetSamplers,
                GSSetSamplers, PSSetSamplers, CSSetSamplers
            ](slot, Some(&samplers)));
        }
    }

    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: Option<&ID3D11Buffer>) {
        let buffers = [buffer.cloned()];
        unsafe {
            per_stage!(stage, self.context, [
                VSSetConstantBuffers, HSSetConstantBuffers, DSSetConstantBuffers,
                GSSetConstantBuffers, PSSetConstantBuffers, CSSetConstantBuffers
            ](slot, Some(&buffers)));
        }
    }

    fn set_shader(&mut self, stage: ShaderStage, shader: Option<&Shader>) {
        unsafe {
            match stage {
                ShaderStage::Vertex => self.context.VSSetShader(stage_shader!(shader, Shader::Vertex), None),
                ShaderStage::Hull => self.context.HSSetShader(stage_shader!(shader, Shader::Hull), None),
                ShaderStage::Domain => self.context.DSSetShader(stage_shader!(shader, Shader::Domain), None),
                ShaderStage::Geometry => self.context.GSSetShader(stage_shader!(shader, Shader::Geometry), None),
                ShaderStage::Pixel => self.context.PSSetShader(stage_shader!(shader, Shader::Pixel), None),
                ShaderStage::Compute => self.context.CSSetShader(stage_shader!(shader, Shader::Compute), None),
            }
        }
    }

    fn set_input_layout(&mut self, layout: Option<&ID3D11InputLayout>) {
        unsafe {
            self.context.IASetInputLayout(layout);
        }
    }

    fn set_blend_state(&mut self, state: Option<&ID3D11BlendState>, blend_factor: &[f32; 4], sample_mask: u32) {
        unsafe {
            self.context.OMSetBlendState(state, Some(blend_factor), sample_mask);
        }
    }

    fn set_depth_stencil_state(&mut self, state: Option<&ID3D11DepthStencilState>, stencil_ref: u8) {
        unsafe {
            self.context.OMSetDepthStencilState(state, stencil_ref as u32);
        }
    }

    fn set_rasterizer_state(&mut self, state: Option<&ID3D11RasterizerState>) {
        unsafe {
            self.context.RSSetState(state);
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: Option<&ID3D11Buffer>, stride: u32, offset: u32) {
        let buffers = [buffer.cloned()];
        unsafe {
            self.context.IASetVertexBuffers(slot, 1, Some(buffers.as_ptr()), Some(&stride as *const _), Some(&offset as *const _));
        }
    }

    fn set_index_buffer(&mut self, buffer: Option<&ID3D11Buffer>, format: Format, offset: u32) {
        unsafe {
            self.context.IASetIndexBuffer(buffer, to_dxgi_format(format), offset);
        }
    }

    fn set_primitive_topology(&mut self, topology: Topology) {
        unsafe {
            self.context.IASetPrimitiveTopology(to_d3d11_topology(topology));
        }
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        let viewports: Vec<D3D11_VIEWPORT> = viewports.iter().map(to_d3d11_viewport).collect();
        unsafe {
            self.context.RSSetViewports(Some(&viewports));
        }
    }

    fn set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        let rects: Vec<RECT> = rects.iter().map(to_d3d11_rect).collect();
        unsafe {
            self.context.RSSetScissorRects(Some(&rects));
        }
    }

    fn clear_state(&mut self) {
        unsafe {
            self.context.ClearState();
        }
    }

    fn get_shader_resource_view(&self, stage: ShaderStage, slot: u32) -> Option<ID3D11ShaderResourceView> {
        let mut views = [None];
        unsafe {
            per_stage!(stage, self.context, [
                VSGetShaderResources, HSGetShaderResources, DSGetShaderResources,
                GSGetShaderResources, PSGetShaderResources, CSGetShaderResources
            ](slot, Some(&mut views)));
        }
        let [view] = views;
        view
    }

    fn get_sampler(&self, stage: ShaderStage, slot: u32) -> Option<ID3D11SamplerState> {
        let mut samplers = [None];
        unsafe {
            per_stage!(stage, self.context, [
                VSGetSamplers, HSGetSamplers, DSGetSamplers,
                GSGetSamplers, PSGetSamplers, CSGetSamplers
            ](slot, Some(&mut samplers)));
        }
        let [sampler] = samplers;
        sampler
    }

    fn get_constant_buffer(&self, stage: ShaderStage, slot: u32) -> Option<ID3D11Buffer> {
        let mut buffers = [None];
        unsafe {
            per_stage!(stage, self.context, [
                VSGetConstantBuffers, HSGetConstantBuffers, DSGetConstantBuffers,
                GSGetConstantBuffers, PSGetConstantBuffers, CSGetConstantBuffers
            ](slot, Some(&mut buffers)));
        }
        let [buffer] = buffers;
        buffer
    }

    fn get_shader(&self, stage: ShaderStage) -> Option<Shader> {
        unsafe {
            match stage {
                ShaderStage::Vertex => {
                    let mut shader = None;
                    self.context.VSGetShader(&mut shader, None, None);
                    shader.map(Shader::Vertex)
                }
                ShaderStage::Hull => {
                    let mut shader = None;
                    self.context.HSGetShader(&mut shader, None, None);
                    shader.map(Shader::Hull)
                }
                ShaderStage::Domain => {
                    let mut shader = None;
                    self.context.DSGetShader(&mut shader, None, None);
                    shader.map(Shader::Domain)
                }
                ShaderStage::Geometry => {
                    let mut shader = None;
                    self.context.GSGetShader(&mut shader, None, None);
                    shader.map(Shader::Geometry)
                }
                ShaderStage::Pixel => {
                    let mut shader = None;
                    self.context.PSGetShader(&mut shader, None, None);
                    shader.map(Shader::Pixel)
                }
                ShaderStage::Compute => {
                    let mut shader = None;
                    self.context.CSGetShader(&mut shader, None, None);
                    shader.map(Shader::Compute)
                }
            }
        }
    }

    fn get_input_layout(&self) -> Option<ID3D11InputLayout> {
        let mut layout = None;
        unsafe {
            self.context.IAGetInputLayout(&mut layout);
        }
        layout
    }

    fn get_blend_state(&self) -> BlendBinding<ID3D11BlendState> {
        let mut state = None;
        let mut blend_factor = [0.0; 4];
        let mut sample_mask = 0;
        unsafe {
            self.context.OMGetBlendState(Some(&mut state as *mut _), Some(&mut blend_factor as *mut _), Some(&mut sample_mask as *mut _));
        }
        BlendBinding {
            state,
            blend_factor,
            sample_mask,
        }
    }

    fn get_depth_stencil_state(&self) -> DepthStencilBinding<ID3D11DepthStencilState> {
        let mut state = None;
        let mut stencil_ref = 0;
        unsafe {
            self.context.OMGetDepthStencilState(Some(&mut state as *mut _), Some(&mut stencil_ref as *mut _));
        }
        DepthStencilBinding {
            state,
            stencil_ref: stencil_ref as u8,
        }
    }

    fn get_rasterizer_state(&self) -> Option<ID3D11RasterizerState> {
        let mut state = None;
        unsafe {
            self.context.RSGetState(&mut state);
        }
        state
    }

    fn get_vertex_buffer(&self, slot: u32) -> VertexStream<ID3D11Buffer> {
        let mut buffers = [None];
        let mut stride = 0;
        let mut offset = 0;
        unsafe {
            self.context.IAGetVertexBuffers(slot, 1, Some(buffers.as_mut_ptr()), Some(&mut stride as *mut _), Some(&mut offset as *mut _));
        }
        let [buffer] = buffers;
        VertexStream {
            buffer,
            stride,
            offset,
        }
    }

    fn get_index_buffer(&self) -> IndexBufferBinding<ID3D11Buffer> {
        let mut buffer = None;
        let mut format = DXGI_FORMAT_UNKNOWN;
        let mut offset = 0;
        unsafe {
            self.context.IAGetIndexBuffer(Some(&mut buffer as *mut _), Some(&mut format as *mut _), Some(&mut offset as *mut _));
        }
        IndexBufferBinding {
            buffer,
            format: from_dxgi_format(format),
            offset,
        }
    }

    fn get_primitive_topology(&self) -> Topology {
        let mut topology = D3D_PRIMITIVE_TOPOLOGY_UNDEFINED;
        unsafe {
            self.context.IAGetPrimitiveTopology(&mut topology);
        }
        from_d3d11_topology(topology)
    }

    fn get_viewports(&self) -> Vec<Viewport> {
        let mut num_viewports = MAX_VIEWPORTS as u32;
        let mut viewports = [D3D11_VIEWPORT::default(); MAX_VIEWPORTS];
        unsafe {
            self.context.RSGetViewports(&mut num_viewports, Some(viewports.as_mut_ptr()));
        }
        viewports[..num_viewports as usize]
            .iter()
            .map(|vp| Viewport {
                x: vp.TopLeftX,
                y: vp.TopLeftY,
                width: vp.Width,
                height: vp.Height,
                min_depth: vp.MinDepth,
                max_depth: vp.MaxDepth,
            })
            .collect()
    }

    fn get_scissor_rects(&self) -> Vec<ScissorRect> {
        let mut num_rects = MAX_VIEWPORTS as u32;
        let mut rects = [RECT::default(); MAX_VIEWPORTS];
        unsafe {
            self.context.RSGetScissorRects(&mut num_rects, Some(rects.as_mut_ptr()));
        }
        rects[..num_rects as usize]
            .iter()
            .map(|rect| ScissorRect {
                left: rect.left,
                top: rect.top,
                right: rect.right,
                bottom: rect.bottom,
            })
            .collect()
    }
}

impl super::Device for Device {
    type ShaderResourceView = ID3D11ShaderResourceView;
    type Sampler = ID3D11SamplerState;
    type Buffer = ID3D11Buffer;
    type Shader = Shader;
    type InputLayout = ID3D11InputLayout;
    type BlendState = ID3D11BlendState;
    type DepthStencilState = ID3D11DepthStencilState;
    type RasterizerState = ID3D11RasterizerState;
    type Context = Context;
}
