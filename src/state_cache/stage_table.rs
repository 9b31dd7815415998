use crate::gfx;

use gfx::Context;
use gfx::Resource;
use gfx::ShaderStage;

/// Compare-and-set for a single handle slot. When the slot already references `new` and
/// `skip_cache` is off nothing happens. Otherwise `new` is retained, `bind` issues the driver
/// call, and the previously held handle is released. Returns true if `bind` was called.
pub(crate) fn update_slot<R: Resource>(
    slot: &mut Option<R>,
    new: Option<&R>,
    skip_cache: bool,
    bind: impl FnOnce(Option<&R>),
) -> bool {
    if !skip_cache && gfx::same_resource(slot.as_ref(), new) {
        return false;
    }
    let retained = new.cloned();
    bind(new);
    let released = std::mem::replace(slot, retained);
    drop(released);
    true
}

/// Counts occupied slots.
pub(crate) fn count_bound<R>(slots: &[Option<R>]) -> usize {
    slots.iter().filter(|slot| slot.is_some()).count()
}

/// The per stage slot arrays, one `StageTable` exists for each `gfx::ShaderStage`.
/// Arrays are sized to the hardware limits on creation and never resized.
pub struct StageTable<D: gfx::Device> {
    shader_resource_views: Box<[Option<D::ShaderResourceView>]>,
    samplers: Box<[Option<D::Sampler>]>,
    constant_buffers: Box<[Option<D::Buffer>]>,
}

impl<D> StageTable<D> where D: gfx::Device {
    pub fn new() -> Self {
        StageTable {
            shader_resource_views: vec![None; gfx::MAX_SHADER_RESOURCE_VIEWS].into_boxed_slice(),
            samplers: vec![None; gfx::MAX_SAMPLERS].into_boxed_slice(),
            constant_buffers: vec![None; gfx::MAX_CONSTANT_BUFFERS].into_boxed_slice(),
        }
    }

    pub fn shader_resource_view(&self, index: usize) -> Option<&D::ShaderResourceView> {
        debug_assert!(index < gfx::MAX_SHADER_RESOURCE_VIEWS, "shader resource view slot {} out of range", index);
        self.shader_resource_views[index].as_ref()
    }

    pub fn sampler(&self, index: usize) -> Option<&D::Sampler> {
        debug_assert!(index < gfx::MAX_SAMPLERS, "sampler slot {} out of range", index);
        self.samplers[index].as_ref()
    }

    pub fn constant_buffer(&self, index: usize) -> Option<&D::Buffer> {
        debug_assert!(index < gfx::MAX_CONSTANT_BUFFERS, "constant buffer slot {} out of range", index);
        self.constant_buffers[index].as_ref()
    }

    pub fn shader_resource_views(&self) -> &[Option<D::ShaderResourceView>] {
        &self.shader_resource_views
    }

    pub fn samplers(&self) -> &[Option<D::Sampler>] {
        &self.samplers
    }

    pub fn constant_buffers(&self) -> &[Option<D::Buffer>] {
        &self.constant_buffers
    }

    pub(crate) fn set_shader_resource_view(
        &mut self,
        context: &mut D::Context,
        stage: ShaderStage,
        index: usize,
        view: Option<&D::ShaderResourceView>,
        skip_cache: bool,
    ) -> bool {
        assert!(index < gfx::MAX_SHADER_RESOURCE_VIEWS, "shader resource view slot {} out of range", index);
        update_slot(&mut self.shader_resource_views[index], view, skip_cache, |view| {
            context.set_shader_resource_view(stage, index as u32, view)
        })
    }

    pub(crate) fn set_sampler(
        &mut self,
        context: &mut D::Context,
        stage: ShaderStage,
        index: usize,
        sampler: Option<&D::Sampler>,
        skip_cache: bool,
    ) -> bool {
        assert!(index < gfx::MAX_SAMPLERS, "sampler slot {} out of range", index);
        update_slot(&mut self.samplers[index], sampler, skip_cache, |sampler| {
            context.set_sampler(stage, index as u32, sampler)
        })
    }

    pub(crate) fn set_constant_buffer(
        &mut self,
        context: &mut D::Context,
        stage: ShaderStage,
        index: usize,
        buffer: Option<&D::Buffer>,
        skip_cache: bool,
    ) -> bool {
        assert!(index < gfx::MAX_CONSTANT_BUFFERS, "constant buffer slot {} out of range", index);
        update_slot(&mut self.constant_buffers[index], buffer, skip_cache, |buffer| {
            context.set_constant_buffer(stage, index as u32, buffer)
        })
    }

    /// Slot indices currently referencing `view`.
    pub(crate) fn slots_referencing(&self, view: &D::ShaderResourceView) -> Vec<usize> {
        self.shader_resource_views
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.as_ref().map_or(false, |bound| bound.is_same(view)))
            .map(|(index, _)| index)
            .collect()
    }

    /// Number of handles this table currently retains.
    pub fn num_bound(&self) -> usize {
        count_bound(&self.shader_resource_views) + count_bound(&self.samplers) + count_bound(&self.constant_buffers)
    }
}

impl<D> Default for StageTable<D> where D: gfx::Device {
    fn default() -> Self {
        Self::new()
    }
}
