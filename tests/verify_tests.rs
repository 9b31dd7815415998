use statecache_rs::prelude::*;
use statecache_rs::gfx::Context;
use statecache_rs::gfx::SlotCategory;

use std::rc::Rc;

type Verified = VerifiedStateCache<gfx_null::Device>;

fn create_verified(skip_cache: bool) -> Verified {
    let mut cache = VerifiedStateCache::new(StateCacheConfig {
        skip_cache,
        verify_state: true,
    });
    cache.init(gfx_null::Context::new());
    cache
}

/// Binds a bit of everything, repeating some binds so both the elided and forwarded paths run
fn bind_frame(cache: &mut Verified, handles: &[gfx_null::Handle]) {
    for (i, stage) in ShaderStage::ALL.into_iter().enumerate() {
        let handle = &handles[i % handles.len()];
        cache.set_shader(stage, Some(handle));
        cache.set_shader_resource_view(stage, i, Some(handle));
        cache.set_shader_resource_view(stage, i, Some(handle));
        cache.set_sampler(stage, 0, Some(&handles[0]));
        cache.set_constant_buffer(stage, i, Some(handle));
    }
    cache.set_input_layout(Some(&handles[1]));
    cache.set_blend_state(Some(&handles[0]), [0.25; 4], 0xff);
    cache.set_blend_factor([0.5; 4], 0xff);
    cache.set_depth_stencil_state(Some(&handles[1]), 2);
    cache.set_stencil_ref(3);
    cache.set_rasterizer_state(Some(&handles[2]));
    cache.set_stream_strides(&[12, 24]);
    cache.set_stream_source_with_bound_stride(Some(&handles[0]), 0, 0);
    cache.set_stream_source(Some(&handles[1]), 1, 24, 96);
    cache.set_index_buffer(Some(&handles[2]), Format::R16u, 0);
    cache.set_primitive_topology(Topology::TriangleStrip);
    cache.set_viewports(&[
        Viewport::new(0.0, 0.0, 1280.0, 720.0),
        Viewport::new(0.0, 0.0, 640.0, 360.0),
    ]);
    cache.set_scissor_rects(&[
        ScissorRect::from(Viewport::new(0.0, 0.0, 1280.0, 720.0)),
    ]);
    cache.unbind_shader_resource_view(&handles[0], StageFlags::PIXEL | StageFlags::COMPUTE);
    cache.clear_constant_buffers(ShaderStage::Hull);
}

#[test]
fn verified_frame_with_cache() {
    let handles: Vec<_> = (0..3).map(|i| gfx_null::create_handle(&format!("handle{}", i))).collect();
    let mut cache = create_verified(false);
    bind_frame(&mut cache, &handles);
    bind_frame(&mut cache, &handles);
    assert!(cache.cache().find_state_mismatches().is_empty());
    assert!(cache.stats().elided > 0);

    cache.clear_state();
    for handle in &handles {
        assert_eq!(Rc::strong_count(handle), 1);
    }
}

#[test]
fn skip_cache_matches_cached_state() {
    let handles: Vec<_> = (0..3).map(|i| gfx_null::create_handle(&format!("handle{}", i))).collect();
    let mut cached = create_verified(false);
    let mut uncached = create_verified(true);
    bind_frame(&mut cached, &handles);
    bind_frame(&mut uncached, &handles);

    assert_eq!(uncached.stats().elided, 0);
    assert!(cached.context().unwrap().num_calls() < uncached.context().unwrap().num_calls());

    for stage in ShaderStage::ALL {
        for slot in 0..gfx::MAX_SHADER_RESOURCE_VIEWS {
            let a = cached.get_shader_resource_view(stage, slot);
            let b = uncached.get_shader_resource_view(stage, slot);
            assert!(gfx::same_resource(a, b));
        }
    }
    assert_eq!(cached.get_viewports(), uncached.get_viewports());
    assert_eq!(cached.get_stream_source(0).stride, 12);
    assert_eq!(uncached.get_stream_source(0).stride, 12);
}

#[test]
fn bypass_is_detected() {
    let view = gfx_null::create_handle("view");
    let mut cache = create_verified(false);
    cache.set_shader_resource_view(ShaderStage::Pixel, 3, Some(&view));
    cache.context_mut().unwrap().set_shader_resource_view(ShaderStage::Pixel, 3, None);
    cache.context_mut().unwrap().set_primitive_topology(Topology::LineList);

    let mismatches = cache.cache().find_state_mismatches();
    assert_eq!(mismatches.len(), 2);
    assert_eq!(
        mismatches[0],
        StateMismatch {
            category: SlotCategory::ShaderResourceView,
            stage: Some(ShaderStage::Pixel),
            slot: 3,
        }
    );
    assert_eq!(mismatches[1].category, SlotCategory::PrimitiveTopology);
    assert_eq!(mismatches[0].to_string(), "shader resource view Pixel [3]");
}

#[test]
#[should_panic(expected = "cached state differs")]
fn bypass_panics_on_next_call() {
    let mut cache = create_verified(false);
    cache.context_mut().unwrap().set_viewports(&[Viewport::new(0.0, 0.0, 16.0, 16.0)]);
    cache.set_primitive_topology(Topology::PointList);
}

#[test]
#[should_panic(expected = "cached state differs")]
fn bypass_panics_on_get() {
    let rasterizer = gfx_null::create_handle("rasterizer");
    let mut cache = create_verified(false);
    cache.context_mut().unwrap().set_rasterizer_state(Some(&rasterizer));
    let _ = cache.get_rasterizer_state();
}

#[test]
fn disabled_verification_ignores_bypass() {
    let mut cache = create_verified(false);
    cache.set_enabled(false);
    cache.context_mut().unwrap().set_primitive_topology(Topology::LineList);
    cache.set_primitive_topology(Topology::PointList);
    assert!(!cache.is_enabled());
    assert!(cache.cache().find_state_mismatches().is_empty());
}

#[test]
fn mismatches_empty_before_init() {
    let cache: StateCache<gfx_null::Device> = StateCache::new(StateCacheConfig::default());
    assert!(cache.find_state_mismatches().is_empty());
    cache.verify_state();
}

#[test]
fn plain_cache_does_not_verify() {
    let mut cache: StateCache<gfx_null::Device> = StateCache::new(StateCacheConfig {
        skip_cache: false,
        verify_state: true,
    });
    cache.init(gfx_null::Context::new());
    cache.context_mut().unwrap().set_primitive_topology(Topology::LineList);
    cache.set_primitive_topology(Topology::Undefined);
    assert_eq!(cache.find_state_mismatches().len(), 1);
}
