use crate::gfx;

use gfx::BlendBinding;
use gfx::Context;
use gfx::DepthStencilBinding;
use gfx::Format;
use gfx::IndexBufferBinding;
use gfx::ScissorRect;
use gfx::ShaderStage;
use gfx::SlotCategory;
use gfx::StageFlags;
use gfx::Topology;
use gfx::VertexStream;
use gfx::Viewport;

use super::CacheStats;
use super::StateCache;
use super::StateCacheConfig;

/// A slot where the cached binding differs from the live binding read back from the context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StateMismatch {
    pub category: SlotCategory,
    pub stage: Option<ShaderStage>,
    pub slot: usize,
}

impl std::fmt::Display for StateMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{} {:?} [{}]", self.category, stage, self.slot),
            None => write!(f, "{} [{}]", self.category, self.slot),
        }
    }
}

/// Pushes a mismatch for each slot index where `cached` and `live` reference different objects
fn diff_slots<R: gfx::Resource>(
    mismatches: &mut Vec<StateMismatch>,
    category: SlotCategory,
    stage: Option<ShaderStage>,
    cached: &[Option<R>],
    live: impl Fn(u32) -> Option<R>,
) {
    for (slot, cached) in cached.iter().enumerate() {
        let live = live(slot as u32);
        if !gfx::same_resource(cached.as_ref(), live.as_ref()) {
            mismatches.push(StateMismatch {
                category,
                stage,
                slot,
            });
        }
    }
}

impl<D> StateCache<D> where D: gfx::Device {
    /// Reads back every slot of the bound context and returns each one which differs from the cache.
    /// Handles returned by the read back are released before returning. Empty if no context is bound
    pub fn find_state_mismatches(&self) -> Vec<StateMismatch> {
        let mut mismatches = Vec::new();
        let context = match &self.context {
            Some(context) => context,
            None => return mismatches,
        };

        for stage in ShaderStage::ALL {
            let table = &self.stages[stage.index()];
            diff_slots(&mut mismatches, SlotCategory::ShaderResourceView, Some(stage), table.shader_resource_views(), |slot| {
                context.get_shader_resource_view(stage, slot)
            });
            diff_slots(&mut mismatches, SlotCategory::Sampler, Some(stage), table.samplers(), |slot| {
                context.get_sampler(stage, slot)
            });
            diff_slots(&mut mismatches, SlotCategory::ConstantBuffer, Some(stage), table.constant_buffers(), |slot| {
                context.get_constant_buffer(stage, slot)
            });
            if !gfx::same_resource(self.fixed.shader(stage), context.get_shader(stage).as_ref()) {
                mismatches.push(StateMismatch {
                    category: SlotCategory::Shader,
                    stage: Some(stage),
                    slot: 0,
                });
            }
        }

        let mut check = |category: SlotCategory, slot: usize, matches: bool| {
            if !matches {
                mismatches.push(StateMismatch {
                    category,
                    stage: None,
                    slot,
                });
            }
        };

        check(
            SlotCategory::InputLayout,
            0,
            gfx::same_resource(self.fixed.input_layout(), context.get_input_layout().as_ref()),
        );
        check(
            SlotCategory::RasterizerState,
            0,
            gfx::same_resource(self.fixed.rasterizer_state(), context.get_rasterizer_state().as_ref()),
        );

        let blend = context.get_blend_state();
        let cached = self.fixed.blend();
        check(
            SlotCategory::BlendState,
            0,
            blend.matches(cached.state.as_ref(), &cached.blend_factor, cached.sample_mask),
        );

        let depth_stencil = context.get_depth_stencil_state();
        let cached = self.fixed.depth_stencil();
        check(
            SlotCategory::DepthStencilState,
            0,
            depth_stencil.matches(cached.state.as_ref(), cached.stencil_ref),
        );

        for (index, cached) in self.fixed.vertex_streams().iter().enumerate() {
            let live = context.get_vertex_buffer(index as u32);
            check(
                SlotCategory::VertexStream,
                index,
                live.matches(cached.buffer.as_ref(), cached.stride, cached.offset),
            );
        }

        let index_buffer = context.get_index_buffer();
        let cached = self.fixed.index_buffer();
        check(
            SlotCategory::IndexBuffer,
            0,
            index_buffer.matches(cached.buffer.as_ref(), cached.format, cached.offset),
        );

        check(
            SlotCategory::PrimitiveTopology,
            0,
            context.get_primitive_topology() == self.fixed.topology(),
        );

        let viewports = context.get_viewports();
        let cached = self.fixed.viewports();
        check(
            SlotCategory::Viewports,
            0,
            viewports.len() == cached.len() && viewports.iter().zip(cached).all(|(live, cached)| live.bitwise_eq(cached)),
        );

        check(
            SlotCategory::ScissorRects,
            0,
            context.get_scissor_rects() == self.fixed.scissor_rects(),
        );

        mismatches
    }

    /// Asserts the cache matches the live context state, logging each mismatching slot before panicking
    pub fn verify_state(&self) {
        let mismatches = self.find_state_mismatches();
        if mismatches.is_empty() {
            return;
        }
        for mismatch in &mismatches {
            log::error!("statecache_rs::state_cache:: state mismatch: {}", mismatch);
        }
        panic!(
            "statecache_rs::state_cache:: cached state differs from the context in {} slots, first: {}",
            mismatches.len(),
            mismatches[0]
        );
    }
}

macro_rules! verified_set {
    ($($(#[$attr:meta])* fn $name:ident(&mut self $(, $arg:ident: $ty:ty)*);)*) => {
        $(
            $(#[$attr])*
            pub fn $name(&mut self $(, $arg: $ty)*) {
                self.check();
                self.cache.$name($($arg),*);
                self.check();
            }
        )*
    }
}

macro_rules! verified_get {
    ($(fn $name:ident(&self $(, $arg:ident: $ty:ty)*) -> $ret:ty;)*) => {
        $(
            pub fn $name(&self $(, $arg: $ty)*) -> $ret {
                self.check();
                self.cache.$name($($arg),*)
            }
        )*
    }
}

/// Wraps a `StateCache` and checks the entire cached pipeline against a read back of the context
/// before and after every call. This is O(all slots) per call so it is meant as a test and debug oracle.
pub struct VerifiedStateCache<D: gfx::Device> {
    cache: StateCache<D>,
    enabled: bool,
}

impl<D> VerifiedStateCache<D> where D: gfx::Device {
    /// Verification is enabled by `config.verify_state`
    pub fn new(config: StateCacheConfig) -> Self {
        let enabled = config.verify_state;
        VerifiedStateCache {
            cache: StateCache::new(config),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            log::info!("statecache_rs::state_cache:: verify_state: {}", enabled);
        }
        self.enabled = enabled;
    }

    /// The wrapped cache, calls made on it directly are not verified
    pub fn cache(&self) -> &StateCache<D> {
        &self.cache
    }

    pub fn into_inner(self) -> StateCache<D> {
        self.cache
    }

    fn check(&self) {
        if self.enabled {
            self.cache.verify_state();
        }
    }

    /// Binding through the context bypasses the cache, the next verified call will detect it
    pub fn context_mut(&mut self) -> Option<&mut D::Context> {
        self.cache.context_mut()
    }

    pub fn context(&self) -> Option<&D::Context> {
        self.cache.context()
    }

    pub fn set_skip_cache(&mut self, skip_cache: bool) {
        self.cache.set_skip_cache(skip_cache);
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn init(&mut self, context: D::Context) {
        self.cache.init(context);
        self.check();
    }

    pub fn unbind_shader_resource_view(&mut self, view: &D::ShaderResourceView, stages: StageFlags) -> usize {
        self.check();
        let unbound = self.cache.unbind_shader_resource_view(view, stages);
        self.check();
        unbound
    }

    verified_set! {
        fn clear_state(&mut self);
        fn set_shader_resource_view(&mut self, stage: ShaderStage, index: usize, view: Option<&D::ShaderResourceView>);
        fn set_sampler(&mut self, stage: ShaderStage, index: usize, sampler: Option<&D::Sampler>);
        fn set_constant_buffer(&mut self, stage: ShaderStage, index: usize, buffer: Option<&D::Buffer>);
        fn clear_shader_resource_views(&mut self, stage: ShaderStage);
        fn clear_constant_buffers(&mut self, stage: ShaderStage);
        fn set_shader(&mut self, stage: ShaderStage, shader: Option<&D::Shader>);
        fn set_input_layout(&mut self, layout: Option<&D::InputLayout>);
        fn set_blend_state(&mut self, state: Option<&D::BlendState>, blend_factor: [f32; 4], sample_mask: u32);
        fn set_blend_factor(&mut self, blend_factor: [f32; 4], sample_mask: u32);
        fn set_depth_stencil_state(&mut self, state: Option<&D::DepthStencilState>, stencil_ref: u8);
        fn set_stencil_ref(&mut self, stencil_ref: u8);
        fn set_rasterizer_state(&mut self, state: Option<&D::RasterizerState>);
        fn set_stream_source(&mut self, buffer: Option<&D::Buffer>, stream_index: usize, stride: u32, offset: u32);
        fn set_stream_source_with_bound_stride(&mut self, buffer: Option<&D::Buffer>, stream_index: usize, offset: u32);
        fn set_stream_strides(&mut self, strides: &[u32]);
        fn set_index_buffer(&mut self, buffer: Option<&D::Buffer>, format: Format, offset: u32);
        fn set_primitive_topology(&mut self, topology: Topology);
        fn set_viewports(&mut self, viewports: &[Viewport]);
        fn set_viewport(&mut self, viewport: Viewport);
        fn set_scissor_rects(&mut self, rects: &[ScissorRect]);
    }

    verified_get! {
        fn get_shader_resource_view(&self, stage: ShaderStage, index: usize) -> Option<&D::ShaderResourceView>;
        fn get_sampler(&self, stage: ShaderStage, index: usize) -> Option<&D::Sampler>;
        fn get_constant_buffer(&self, stage: ShaderStage, index: usize) -> Option<&D::Buffer>;
        fn get_shader(&self, stage: ShaderStage) -> Option<&D::Shader>;
        fn get_input_layout(&self) -> Option<&D::InputLayout>;
        fn get_blend_state(&self) -> &BlendBinding<D::BlendState>;
        fn get_depth_stencil_state(&self) -> &DepthStencilBinding<D::DepthStencilState>;
        fn get_rasterizer_state(&self) -> Option<&D::RasterizerState>;
        fn get_stream_source(&self, stream_index: usize) -> &VertexStream<D::Buffer>;
        fn get_index_buffer(&self) -> &IndexBufferBinding<D::Buffer>;
        fn get_primitive_topology(&self) -> Topology;
        fn get_viewports(&self) -> &[Viewport];
        fn get_viewport(&self) -> Option<&Viewport>;
        fn get_scissor_rects(&self) -> &[ScissorRect];
    }
}
