/// Per stage resource view, sampler and constant buffer slots.
pub mod stage_table;

/// Single valued pipeline state.
pub mod fixed_function;

/// Driver read back and the verifying decorator.
pub mod verify;

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

use fixed_function::FixedFunctionState;
use stage_table::StageTable;

use serde::{Deserialize, Serialize};

use std::path::Path;

/// Serialisable state cache settings.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct StateCacheConfig {
    /// Forward every set to the driver, even if the cached value is unchanged
    pub skip_cache: bool,
    /// Enables the read back checks of a `VerifiedStateCache`. A plain `StateCache` never reads it
    pub verify_state: bool,
}

impl Default for StateCacheConfig {
    fn default() -> Self {
        StateCacheConfig {
            skip_cache: false,
            verify_state: cfg!(debug_assertions),
        }
    }
}

impl StateCacheConfig {
    /// Load config from a json file, missing fields take their default values
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, super::Error> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Load config from a json file, or use defaults if the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, super::Error> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        }
        else {
            log::warn!("statecache_rs::state_cache:: config not found: {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Write the config as pretty printed json
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), super::Error> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

/// Counts of set calls which were forwarded to the driver and calls which were elided.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub forwarded: u64,
    pub elided: u64,
}

impl CacheStats {
    fn record(&mut self, forwarded: bool, category: SlotCategory, stage: Option<ShaderStage>, slot: usize) {
        if forwarded {
            self.forwarded += 1;
            log::trace!("statecache_rs::state_cache:: forward {} {:?} [{}]", category, stage, slot);
        }
        else {
            self.elided += 1;
        }
    }
}

/// Shadow copy of everything bound on a `gfx::Context`. All pipeline state changes should flow
/// through here so redundant driver calls can be elided. Handles are retained while bound.
pub struct StateCache<D: gfx::Device> {
    context: Option<D::Context>,
    config: StateCacheConfig,
    stages: [StageTable<D>; gfx::NUM_SHADER_STAGES],
    fixed: FixedFunctionState<D>,
    stats: CacheStats,
}

/// Returns the bound context, using the cache before `init` is a contract violation
fn bound<D: gfx::Device>(context: &mut Option<D::Context>) -> &mut D::Context {
    match context {
        Some(context) => context,
        None => panic!("statecache_rs::state_cache:: state set before a context was bound with init"),
    }
}

impl<D> StateCache<D> where D: gfx::Device {
    /// Create a cache which is not yet bound to a context
    pub fn new(config: StateCacheConfig) -> Self {
        StateCache {
            context: None,
            config,
            stages: std::array::from_fn(|_| StageTable::new()),
            fixed: FixedFunctionState::new(),
            stats: CacheStats::default(),
        }
    }

    /// Bind to a live context, clearing both the context and the cache
    pub fn init(&mut self, context: D::Context) {
        log::info!(
            "statecache_rs::state_cache:: init (skip_cache: {}, verify_state: {})",
            self.config.skip_cache, self.config.verify_state
        );
        self.context = Some(context);
        self.clear_state();
    }

    /// Clears the context and resets every slot to its default, releasing each retained handle once
    pub fn clear_state(&mut self) {
        if let Some(context) = self.context.as_mut() {
            context.clear_state();
        }
        let released = self.num_bound();
        self.stages = std::array::from_fn(|_| StageTable::new());
        self.fixed = FixedFunctionState::new();
        log::debug!("statecache_rs::state_cache:: clear_state released {} handles", released);
    }

    pub fn context(&self) -> Option<&D::Context> {
        self.context.as_ref()
    }

    /// Direct access to the context. Binding state through it bypasses the cache and leaves it stale
    pub fn context_mut(&mut self) -> Option<&mut D::Context> {
        self.context.as_mut()
    }

    pub fn config(&self) -> &StateCacheConfig {
        &self.config
    }

    pub fn skip_cache(&self) -> bool {
        self.config.skip_cache
    }

    /// Toggle forwarding of every set to the driver regardless of the cached value
    pub fn set_skip_cache(&mut self, skip_cache: bool) {
        if self.config.skip_cache != skip_cache {
            log::info!("statecache_rs::state_cache:: skip_cache: {}", skip_cache);
        }
        self.config.skip_cache = skip_cache;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    /// Number of handles the cache currently retains across every slot
    pub fn num_bound(&self) -> usize {
        self.stages.iter().map(|stage| stage.num_bound()).sum::<usize>() + self.fixed.num_bound()
    }

    /// Per stage slot tables
    pub fn stage_table(&self, stage: ShaderStage) -> &StageTable<D> {
        &self.stages[stage.index()]
    }

    pub fn fixed_function(&self) -> &FixedFunctionState<D> {
        &self.fixed
    }

    // stage tables

    pub fn set_shader_resource_view(&mut self, stage: ShaderStage, index: usize, view: Option<&D::ShaderResourceView>) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.stages[stage.index()].set_shader_resource_view(context, stage, index, view, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::ShaderResourceView, Some(stage), index);
    }

    pub fn get_shader_resource_view(&self, stage: ShaderStage, index: usize) -> Option<&D::ShaderResourceView> {
        self.stages[stage.index()].shader_resource_view(index)
    }

    pub fn set_sampler(&mut self, stage: ShaderStage, index: usize, sampler: Option<&D::Sampler>) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.stages[stage.index()].set_sampler(context, stage, index, sampler, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::Sampler, Some(stage), index);
    }

    pub fn get_sampler(&self, stage: ShaderStage, index: usize) -> Option<&D::Sampler> {
        self.stages[stage.index()].sampler(index)
    }

    /// Binds the whole of `buffer`, partial ranges are not tracked
    pub fn set_constant_buffer(&mut self, stage: ShaderStage, index: usize, buffer: Option<&D::Buffer>) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.stages[stage.index()].set_constant_buffer(context, stage, index, buffer, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::ConstantBuffer, Some(stage), index);
    }

    pub fn get_constant_buffer(&self, stage: ShaderStage, index: usize) -> Option<&D::Buffer> {
        self.stages[stage.index()].constant_buffer(index)
    }

    /// Unbind every shader resource view slot of `stage`
    pub fn clear_shader_resource_views(&mut self, stage: ShaderStage) {
        for index in 0..gfx::MAX_SHADER_RESOURCE_VIEWS {
            self.set_shader_resource_view(stage, index, None);
        }
    }

    /// Unbind every constant buffer slot of `stage`
    pub fn clear_constant_buffers(&mut self, stage: ShaderStage) {
        for index in 0..gfx::MAX_CONSTANT_BUFFERS {
            self.set_constant_buffer(stage, index, None);
        }
    }

    /// Unbind `view` from every slot it occupies on `stages`, for example before the underlying
    /// resource is bound for writing. Returns the number of slots which were unbound
    pub fn unbind_shader_resource_view(&mut self, view: &D::ShaderResourceView, stages: StageFlags) -> usize {
        let mut unbound = 0;
        for stage in stages.stages() {
            for index in self.stages[stage.index()].slots_referencing(view) {
                self.set_shader_resource_view(stage, index, None);
                unbound += 1;
            }
        }
        unbound
    }

    // fixed function

    /// The shader is retained while bound, like every other handle
    pub fn set_shader(&mut self, stage: ShaderStage, shader: Option<&D::Shader>) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_shader(context, stage, shader, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::Shader, Some(stage), 0);
    }

    pub fn get_shader(&self, stage: ShaderStage) -> Option<&D::Shader> {
        self.fixed.shader(stage)
    }

    pub fn set_input_layout(&mut self, layout: Option<&D::InputLayout>) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_input_layout(context, layout, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::InputLayout, None, 0);
    }

    pub fn get_input_layout(&self) -> Option<&D::InputLayout> {
        self.fixed.input_layout()
    }

    /// Blend state, factor and sample mask are compared as a unit, a change to any one of them forwards all three
    pub fn set_blend_state(&mut self, state: Option<&D::BlendState>, blend_factor: [f32; 4], sample_mask: u32) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_blend_state(context, state, &blend_factor, sample_mask, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::BlendState, None, 0);
    }

    /// Change blend factor and sample mask, keeping the bound blend state
    pub fn set_blend_factor(&mut self, blend_factor: [f32; 4], sample_mask: u32) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_blend_factor(context, &blend_factor, sample_mask, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::BlendState, None, 0);
    }

    pub fn get_blend_state(&self) -> &BlendBinding<D::BlendState> {
        self.fixed.blend()
    }

    pub fn set_depth_stencil_state(&mut self, state: Option<&D::DepthStencilState>, stencil_ref: u8) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_depth_stencil_state(context, state, stencil_ref, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::DepthStencilState, None, 0);
    }

    /// Change the stencil reference, keeping the bound depth stencil state
    pub fn set_stencil_ref(&mut self, stencil_ref: u8) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_stencil_ref(context, stencil_ref, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::DepthStencilState, None, 0);
    }

    pub fn get_depth_stencil_state(&self) -> &DepthStencilBinding<D::DepthStencilState> {
        self.fixed.depth_stencil()
    }

    pub fn set_rasterizer_state(&mut self, state: Option<&D::RasterizerState>) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_rasterizer_state(context, state, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::RasterizerState, None, 0);
    }

    pub fn get_rasterizer_state(&self) -> Option<&D::RasterizerState> {
        self.fixed.rasterizer_state()
    }

    pub fn set_stream_source(&mut self, buffer: Option<&D::Buffer>, stream_index: usize, stride: u32, offset: u32) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_stream_source(context, stream_index, buffer, stride, offset, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::VertexStream, None, stream_index);
    }

    /// Bind a vertex stream with the stride previously supplied by `set_stream_strides`
    pub fn set_stream_source_with_bound_stride(&mut self, buffer: Option<&D::Buffer>, stream_index: usize, offset: u32) {
        let stride = self.fixed.stream_stride(stream_index);
        self.set_stream_source(buffer, stream_index, stride, offset);
    }

    /// Record the per stream strides of the bound shader state, streams past `strides.len()` get a stride of 0
    pub fn set_stream_strides(&mut self, strides: &[u32]) {
        self.fixed.set_stream_strides(strides);
    }

    pub fn get_stream_source(&self, stream_index: usize) -> &VertexStream<D::Buffer> {
        self.fixed.vertex_stream(stream_index)
    }

    /// The format is part of the binding, changing only the format forwards a call
    pub fn set_index_buffer(&mut self, buffer: Option<&D::Buffer>, format: Format, offset: u32) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_index_buffer(context, buffer, format, offset, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::IndexBuffer, None, 0);
    }

    pub fn get_index_buffer(&self) -> &IndexBufferBinding<D::Buffer> {
        self.fixed.index_buffer()
    }

    pub fn set_primitive_topology(&mut self, topology: Topology) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_primitive_topology(context, topology, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::PrimitiveTopology, None, 0);
    }

    pub fn get_primitive_topology(&self) -> Topology {
        self.fixed.topology()
    }

    /// Set the viewport array, forwarded as a single call when the count or any entry changes
    pub fn set_viewports(&mut self, viewports: &[Viewport]) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_viewports(context, viewports, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::Viewports, None, viewports.len());
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.set_viewports(std::slice::from_ref(&viewport));
    }

    pub fn get_viewports(&self) -> &[Viewport] {
        self.fixed.viewports()
    }

    /// First bound viewport
    pub fn get_viewport(&self) -> Option<&Viewport> {
        self.fixed.viewports().first()
    }

    pub fn set_scissor_rects(&mut self, rects: &[ScissorRect]) {
        let context = bound::<D>(&mut self.context);
        let forwarded = self.fixed.set_scissor_rects(context, rects, self.config.skip_cache);
        self.stats.record(forwarded, SlotCategory::ScissorRects, None, rects.len());
    }

    pub fn get_scissor_rects(&self) -> &[ScissorRect] {
        self.fixed.scissor_rects()
    }
}
