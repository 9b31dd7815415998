use statecache_rs::prelude::*;
use statecache_rs::gfx::SlotCategory;

use std::rc::Rc;

type Cache = StateCache<gfx_null::Device>;

fn create_cache(skip_cache: bool) -> Cache {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut cache = StateCache::new(StateCacheConfig {
        skip_cache,
        verify_state: false,
    });
    cache.init(gfx_null::Context::new());
    cache
}

fn driver(cache: &Cache) -> &gfx_null::Context {
    cache.context().unwrap()
}

#[test]
fn init_clears_context() {
    let cache = create_cache(false);
    assert_eq!(driver(&cache).num_clears(), 1);
    assert_eq!(driver(&cache).num_calls(), 0);
    assert_eq!(cache.num_bound(), 0);
    assert_eq!(cache.get_primitive_topology(), Topology::Undefined);
    assert_eq!(cache.get_blend_state().blend_factor, gfx::DEFAULT_BLEND_FACTOR);
    assert_eq!(cache.get_blend_state().sample_mask, gfx::DEFAULT_SAMPLE_MASK);
    assert!(cache.get_viewports().is_empty());
}

#[test]
#[should_panic(expected = "before a context was bound")]
fn set_before_init() {
    let mut cache: Cache = StateCache::new(StateCacheConfig::default());
    let view = gfx_null::create_handle("view");
    cache.set_shader_resource_view(ShaderStage::Pixel, 0, Some(&view));
}

#[test]
fn rebind_pixel_slot() {
    let mut cache = create_cache(false);
    let a = gfx_null::create_handle("a");
    let b = gfx_null::create_handle("b");

    // held by the test, the cache and the driver
    cache.set_shader_resource_view(ShaderStage::Pixel, 3, Some(&a));
    cache.set_shader_resource_view(ShaderStage::Pixel, 3, Some(&a));
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::ShaderResourceView), 1);
    assert_eq!(Rc::strong_count(&a), 3);

    cache.set_shader_resource_view(ShaderStage::Pixel, 3, Some(&b));
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::ShaderResourceView), 2);
    assert_eq!(Rc::strong_count(&a), 1);
    assert_eq!(Rc::strong_count(&b), 3);
    assert!(Rc::ptr_eq(cache.get_shader_resource_view(ShaderStage::Pixel, 3).unwrap(), &b));

    cache.clear_state();
    assert_eq!(Rc::strong_count(&b), 1);
    assert!(cache.get_shader_resource_view(ShaderStage::Pixel, 3).is_none());
    assert_eq!(driver(&cache).num_clears(), 2);
}

#[test]
fn stages_are_independent() {
    let mut cache = create_cache(false);
    let view = gfx_null::create_handle("view");
    cache.set_shader_resource_view(ShaderStage::Vertex, 0, Some(&view));
    cache.set_shader_resource_view(ShaderStage::Pixel, 0, Some(&view));
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::ShaderResourceView), 2);
    assert!(cache.get_shader_resource_view(ShaderStage::Compute, 0).is_none());

    let calls = driver(&cache).calls();
    assert_eq!(calls[0].stage, Some(ShaderStage::Vertex));
    assert_eq!(calls[1].stage, Some(ShaderStage::Pixel));
}

#[test]
fn identical_sets_are_elided() {
    let mut cache = create_cache(false);
    let sampler = gfx_null::create_handle("sampler");
    let cbuffer = gfx_null::create_handle("cbuffer");
    let layout = gfx_null::create_handle("layout");
    let raster = gfx_null::create_handle("raster");
    let vb = gfx_null::create_handle("vb");

    for _ in 0..2 {
        cache.set_sampler(ShaderStage::Pixel, 15, Some(&sampler));
        cache.set_constant_buffer(ShaderStage::Vertex, 13, Some(&cbuffer));
        cache.set_input_layout(Some(&layout));
        cache.set_rasterizer_state(Some(&raster));
        cache.set_stream_source(Some(&vb), 31, 16, 0);
        cache.set_primitive_topology(Topology::TriangleList);
        cache.set_scissor_rects(&[ScissorRect {
            left: 0,
            top: 0,
            right: 64,
            bottom: 64,
        }]);
    }

    assert_eq!(driver(&cache).num_calls(), 7);
    assert_eq!(cache.stats().forwarded, 7);
    assert_eq!(cache.stats().elided, 7);
}

#[test]
fn skip_cache_forwards_everything() {
    let mut cache = create_cache(true);
    let a = gfx_null::create_handle("a");
    cache.set_shader_resource_view(ShaderStage::Pixel, 3, Some(&a));
    cache.set_shader_resource_view(ShaderStage::Pixel, 3, Some(&a));
    cache.set_primitive_topology(Topology::TriangleList);
    cache.set_primitive_topology(Topology::TriangleList);
    assert_eq!(driver(&cache).num_calls(), 4);

    // rebinding the same handle still balances
    assert_eq!(Rc::strong_count(&a), 3);

    cache.set_skip_cache(false);
    cache.set_primitive_topology(Topology::TriangleList);
    assert_eq!(driver(&cache).num_calls(), 4);
}

#[test]
fn unbind_with_none() {
    let mut cache = create_cache(false);
    let cbuffer = gfx_null::create_handle("cbuffer");
    cache.set_constant_buffer(ShaderStage::Compute, 0, Some(&cbuffer));
    cache.set_constant_buffer(ShaderStage::Compute, 0, None);
    cache.set_constant_buffer(ShaderStage::Compute, 0, None);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::ConstantBuffer), 2);
    assert_eq!(Rc::strong_count(&cbuffer), 1);
    assert!(cache.get_constant_buffer(ShaderStage::Compute, 0).is_none());
}

#[test]
fn shaders_are_retained() {
    let mut cache = create_cache(false);
    let vs = gfx_null::create_handle("vs");
    cache.set_shader(ShaderStage::Vertex, Some(&vs));
    cache.set_shader(ShaderStage::Vertex, Some(&vs));
    assert_eq!(Rc::strong_count(&vs), 3);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::Shader), 1);
    assert!(cache.get_shader(ShaderStage::Pixel).is_none());

    cache.set_shader(ShaderStage::Vertex, None);
    assert_eq!(Rc::strong_count(&vs), 1);
}

#[test]
fn blend_state_is_atomic() {
    let mut cache = create_cache(false);
    let blend = gfx_null::create_handle("blend");

    // matches the cleared defaults
    cache.set_blend_state(None, gfx::DEFAULT_BLEND_FACTOR, gfx::DEFAULT_SAMPLE_MASK);
    assert_eq!(driver(&cache).num_calls(), 0);

    cache.set_blend_state(Some(&blend), [1.0; 4], 0xffffffff);
    cache.set_blend_state(Some(&blend), [1.0; 4], 0x0000ffff);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::BlendState), 2);
    assert_eq!(cache.get_blend_state().sample_mask, 0x0000ffff);

    cache.set_blend_factor([0.5, 0.5, 0.5, 1.0], 0x0000ffff);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::BlendState), 3);
    let bound = cache.get_blend_state();
    assert!(Rc::ptr_eq(bound.state.as_ref().unwrap(), &blend));
    assert_eq!(bound.blend_factor, [0.5, 0.5, 0.5, 1.0]);
    assert_eq!(Rc::strong_count(&blend), 3);

    // -0.0 and 0.0 differ bitwise
    cache.set_blend_factor([0.0; 4], 0);
    cache.set_blend_factor([-0.0, 0.0, 0.0, 0.0], 0);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::BlendState), 5);
}

#[test]
fn stencil_ref_keeps_state() {
    let mut cache = create_cache(false);
    let depth_stencil = gfx_null::create_handle("depth_stencil");
    cache.set_depth_stencil_state(Some(&depth_stencil), 0);
    cache.set_stencil_ref(0);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::DepthStencilState), 1);

    cache.set_stencil_ref(0x80);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::DepthStencilState), 2);
    let bound = cache.get_depth_stencil_state();
    assert!(Rc::ptr_eq(bound.state.as_ref().unwrap(), &depth_stencil));
    assert_eq!(bound.stencil_ref, 0x80);
    assert_eq!(Rc::strong_count(&depth_stencil), 3);
}

#[test]
fn viewport_array() {
    let mut cache = create_cache(false);
    let viewports = [
        Viewport::new(0.0, 0.0, 800.0, 600.0),
        Viewport::new(0.0, 0.0, 400.0, 300.0),
    ];
    cache.set_viewports(&viewports);
    cache.set_viewports(&viewports);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::Viewports), 1);

    let mut changed = viewports;
    changed[1].width = 500.0;
    cache.set_viewports(&changed);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::Viewports), 2);
    let last = driver(&cache).calls().last().copied().unwrap();
    assert_eq!(last.count, 2);
    assert_eq!(cache.get_viewports(), &changed);

    // fewer viewports is a change even when the prefix matches
    cache.set_viewports(&changed[..1]);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::Viewports), 3);
    assert_eq!(cache.get_viewports().len(), 1);

    cache.set_viewport(changed[0]);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::Viewports), 3);
    assert_eq!(cache.get_viewport(), Some(&changed[0]));
}

#[test]
#[should_panic(expected = "exceeds the limit")]
fn too_many_viewports() {
    let mut cache = create_cache(false);
    let viewports = vec![Viewport::new(0.0, 0.0, 1.0, 1.0); gfx::MAX_VIEWPORTS + 1];
    cache.set_viewports(&viewports);
}

#[test]
#[should_panic(expected = "out of range")]
fn slot_out_of_range() {
    let mut cache = create_cache(false);
    let view = gfx_null::create_handle("view");
    cache.set_shader_resource_view(ShaderStage::Pixel, gfx::MAX_SHADER_RESOURCE_VIEWS, Some(&view));
}

#[test]
fn index_format_is_part_of_binding() {
    let mut cache = create_cache(false);
    let ib = gfx_null::create_handle("ib");
    cache.set_index_buffer(Some(&ib), Format::R16u, 0);
    cache.set_index_buffer(Some(&ib), Format::R16u, 0);
    cache.set_index_buffer(Some(&ib), Format::R32u, 0);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::IndexBuffer), 2);
    assert_eq!(cache.get_index_buffer().format, Format::R32u);
    assert_eq!(Rc::strong_count(&ib), 3);
}

#[test]
fn vertex_streams() {
    let mut cache = create_cache(false);
    let vb = gfx_null::create_handle("vb");
    cache.set_stream_source(Some(&vb), 0, 12, 0);
    cache.set_stream_source(Some(&vb), 0, 12, 48);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::VertexStream), 2);
    assert_eq!(cache.get_stream_source(0).offset, 48);

    cache.set_stream_strides(&[12, 32]);
    cache.set_stream_source_with_bound_stride(Some(&vb), 1, 0);
    assert_eq!(cache.get_stream_source(1).stride, 32);
    assert_eq!(Rc::strong_count(&vb), 5);

    // strides past the supplied list are reset
    cache.set_stream_strides(&[16]);
    cache.set_stream_source_with_bound_stride(Some(&vb), 1, 0);
    assert_eq!(cache.get_stream_source(1).stride, 0);
    assert_eq!(driver(&cache).num_calls_of(SlotCategory::VertexStream), 4);
}

#[test]
fn clear_category_for_stage() {
    let mut cache = create_cache(false);
    let a = gfx_null::create_handle("a");
    let b = gfx_null::create_handle("b");
    cache.set_shader_resource_view(ShaderStage::Pixel, 0, Some(&a));
    cache.set_shader_resource_view(ShaderStage::Pixel, gfx::MAX_SHADER_RESOURCE_VIEWS - 1, Some(&b));
    cache.set_constant_buffer(ShaderStage::Pixel, 2, Some(&b));
    driver_mut(&mut cache).clear_calls();

    cache.clear_shader_resource_views(ShaderStage::Pixel);
    assert_eq!(driver(&cache).num_calls(), 2);
    assert_eq!(Rc::strong_count(&a), 1);
    assert_eq!(Rc::strong_count(&b), 3);

    cache.clear_constant_buffers(ShaderStage::Pixel);
    assert_eq!(driver(&cache).num_calls(), 3);
    assert_eq!(Rc::strong_count(&b), 1);
    assert_eq!(cache.num_bound(), 0);
}

fn driver_mut(cache: &mut Cache) -> &mut gfx_null::Context {
    cache.context_mut().unwrap()
}

#[test]
fn unbind_view_from_stages() {
    let mut cache = create_cache(false);
    let view = gfx_null::create_handle("target");
    cache.set_shader_resource_view(ShaderStage::Vertex, 0, Some(&view));
    cache.set_shader_resource_view(ShaderStage::Pixel, 5, Some(&view));
    cache.set_shader_resource_view(ShaderStage::Pixel, 6, Some(&view));
    cache.set_shader_resource_view(ShaderStage::Compute, 2, Some(&view));

    let unbound = cache.unbind_shader_resource_view(&view, StageFlags::GRAPHICS);
    assert_eq!(unbound, 3);
    assert!(cache.get_shader_resource_view(ShaderStage::Pixel, 5).is_none());
    assert!(cache.get_shader_resource_view(ShaderStage::Compute, 2).is_some());
    assert_eq!(Rc::strong_count(&view), 3);

    let unbound = cache.unbind_shader_resource_view(&view, StageFlags::COMPUTE);
    assert_eq!(unbound, 1);
    assert_eq!(Rc::strong_count(&view), 1);
}

#[test]
fn clear_state_releases_everything() {
    let mut cache = create_cache(false);
    let handle = gfx_null::create_handle("everything");
    for stage in ShaderStage::ALL {
        cache.set_shader_resource_view(stage, 1, Some(&handle));
        cache.set_sampler(stage, 1, Some(&handle));
        cache.set_constant_buffer(stage, 1, Some(&handle));
        cache.set_shader(stage, Some(&handle));
    }
    cache.set_input_layout(Some(&handle));
    cache.set_blend_state(Some(&handle), [0.0; 4], 1);
    cache.set_depth_stencil_state(Some(&handle), 1);
    cache.set_rasterizer_state(Some(&handle));
    cache.set_stream_source(Some(&handle), 3, 4, 8);
    cache.set_index_buffer(Some(&handle), Format::R32u, 4);
    cache.set_primitive_topology(Topology::PatchList(3));
    cache.set_viewport(Viewport::new(0.0, 0.0, 64.0, 64.0));

    let bound = 6 * 4 + 6;
    assert_eq!(cache.num_bound(), bound);
    assert_eq!(Rc::strong_count(&handle), 1 + bound * 2);

    cache.clear_state();
    assert_eq!(Rc::strong_count(&handle), 1);
    assert_eq!(cache.num_bound(), 0);
    assert_eq!(cache.get_primitive_topology(), Topology::Undefined);
    assert_eq!(cache.get_index_buffer().format, Format::Unknown);
    assert_eq!(cache.get_blend_state().blend_factor, gfx::DEFAULT_BLEND_FACTOR);
    assert_eq!(cache.get_depth_stencil_state().stencil_ref, 0);
    assert!(cache.get_viewports().is_empty());
    assert!(cache.get_stream_source(3).buffer.is_none());

    // after a clear the defaults are elided and new binds are forwarded
    driver_mut(&mut cache).clear_calls();
    cache.set_primitive_topology(Topology::Undefined);
    cache.set_shader(ShaderStage::Pixel, None);
    assert_eq!(driver(&cache).num_calls(), 0);
    cache.set_shader(ShaderStage::Pixel, Some(&handle));
    assert_eq!(driver(&cache).num_calls(), 1);
}

#[test]
fn stats() {
    let mut cache = create_cache(false);
    cache.set_primitive_topology(Topology::LineList);
    cache.set_primitive_topology(Topology::LineList);
    cache.set_primitive_topology(Topology::LineList);
    assert_eq!(
        cache.stats(),
        CacheStats {
            forwarded: 1,
            elided: 2
        }
    );
    cache.reset_stats();
    assert_eq!(cache.stats(), CacheStats::default());
}
