mod common;

use canvas_core::{
    CanvasFrameDescriptor, ContentOrigin, Filter, LayerConfig, LayerTransform,
    ShaderConstantRect, Technique,
};
use canvas_layer::{ImportOutcome, RenderOutcome};
use common::{soft_layer, solid, FakeCanvas, RecordingCallbacks};
use gpu_interop::soft::{SoftDevice, SoftFaults, DRAW_LOG_CAPACITY};
use gpu_interop::{CompositorDevice, LayerEffect};

fn cpu_layer(
    device: &SoftDevice,
    descriptor: CanvasFrameDescriptor<gpu_interop::soft::SoftTexture>,
) -> common::SoftLayer {
    let mut layer = soft_layer(device, LayerConfig::default());
    layer.initialize(descriptor).unwrap();
    layer.mark_dirty();
    layer
}

fn canvas_descriptor(width: u32, height: u32) -> CanvasFrameDescriptor<gpu_interop::soft::SoftTexture> {
    CanvasFrameDescriptor::new(width, height)
        .with_drawing_surface(FakeCanvas::new(solid(width, height, [0, 0, 0, 255])))
}

#[test]
fn bottom_left_content_is_flipped_for_the_draw_only() {
    let device = SoftDevice::new();
    let mut layer = cpu_layer(&device, canvas_descriptor(4, 4).origin(ContentOrigin::BottomLeft));

    assert_eq!(layer.render_layer(&mut ()), RenderOutcome::Drawn);
    let draw = device.last_draw().unwrap();
    assert_eq!(draw.texture_coords, ShaderConstantRect::new(0.0, 1.0, 1.0, -1.0));
    assert_eq!(layer.effect().texture_coords(), ShaderConstantRect::IDENTITY_UV);
}

#[test]
fn top_left_content_uses_identity_coordinates() {
    let device = SoftDevice::new();
    let mut layer = cpu_layer(&device, canvas_descriptor(4, 4));

    layer.render_layer(&mut ());
    assert_eq!(
        device.last_draw().unwrap().texture_coords,
        ShaderConstantRect::IDENTITY_UV
    );
}

#[test]
fn draw_covers_layer_bounds_with_one_strip() {
    let device = SoftDevice::new();
    let mut layer = cpu_layer(&device, canvas_descriptor(6, 3));

    layer.render_layer(&mut ());
    let draw = device.last_draw().unwrap();
    assert_eq!(draw.layer_quad, layer.bounds());
    assert_eq!(draw.layer_quad, ShaderConstantRect::new(0.0, 0.0, 6.0, 3.0));
    assert_eq!((draw.vertex_count, draw.start_vertex), (4, 0));
    assert_eq!(
        draw.view_id,
        Some(layer.texture_cache().current().unwrap().view.id())
    );
}

#[test]
fn technique_follows_content_and_filter() {
    let cases = [
        (true, true, Filter::Linear, Technique::PremulRgbaLinear),
        (true, true, Filter::Nearest, Technique::PremulRgbaPoint),
        (true, false, Filter::Linear, Technique::PremulRgbLinear),
        (true, false, Filter::Nearest, Technique::PremulRgbPoint),
        (false, true, Filter::Linear, Technique::NonPremulRgbaLinear),
        (false, true, Filter::Nearest, Technique::NonPremulRgbaPoint),
        // Non-premultiplied content always samples alpha.
        (false, false, Filter::Linear, Technique::NonPremulRgbaLinear),
        (false, false, Filter::Nearest, Technique::NonPremulRgbaPoint),
    ];

    for (premultiplied, has_alpha, filter, expected) in cases {
        let device = SoftDevice::new();
        let mut layer = cpu_layer(
            &device,
            canvas_descriptor(2, 2)
                .premultiplied(premultiplied)
                .has_alpha(has_alpha),
        );
        layer.set_filter(filter);
        assert_eq!(layer.render_layer(&mut ()), RenderOutcome::Drawn);
        assert_eq!(
            device.last_draw().unwrap().technique,
            expected,
            "premultiplied={premultiplied} has_alpha={has_alpha} filter={filter:?}"
        );
    }
}

#[test]
fn filter_from_config_applies_until_changed() {
    let device = SoftDevice::new();
    let config = LayerConfig {
        filter: Filter::Nearest,
        ..LayerConfig::default()
    };
    let mut layer = soft_layer(&device, config);
    layer.initialize(canvas_descriptor(2, 2)).unwrap();
    layer.mark_dirty();

    layer.render_layer(&mut ());
    assert_eq!(device.last_draw().unwrap().technique.filter(), Filter::Nearest);

    layer.set_filter(Filter::Linear);
    layer.render_layer(&mut ());
    assert_eq!(device.last_draw().unwrap().technique.filter(), Filter::Linear);
}

#[test]
fn host_transform_reaches_the_effect() {
    let device = SoftDevice::new();
    let mut layer = cpu_layer(&device, canvas_descriptor(2, 2));
    let mut transform = LayerTransform::IDENTITY;
    transform.matrix[3] = [10.0, 20.0, 0.0, 1.0];
    transform.opacity = 0.25;
    layer.set_transform(transform);

    layer.render_layer(&mut ());
    assert_eq!(device.last_draw().unwrap().transform, transform);
}

#[test]
fn callbacks_fire_once_each_per_render_step() {
    let device = SoftDevice::new();
    let mut layer = cpu_layer(&device, canvas_descriptor(2, 2));

    let mut callbacks = RecordingCallbacks::default();
    layer.render_layer(&mut callbacks);
    assert_eq!(callbacks.events, ["will_render", "did_render"]);

    // A clean frame still brackets the (empty) update.
    let mut callbacks = RecordingCallbacks::default();
    layer.render_layer(&mut callbacks);
    assert_eq!(callbacks.events, ["will_render", "did_render"]);
}

#[test]
fn callbacks_fire_even_without_a_texture() {
    let device = SoftDevice::new();
    let mut layer = soft_layer(&device, LayerConfig::default());

    let mut callbacks = RecordingCallbacks::default();
    assert_eq!(
        layer.render_layer(&mut callbacks),
        RenderOutcome::NothingToDraw
    );
    assert_eq!(callbacks.events, ["will_render", "did_render"]);
    assert!(device.draws().is_empty());
}

#[test]
fn effect_failure_skips_the_draw() {
    let device = SoftDevice::new();
    let mut layer = cpu_layer(&device, canvas_descriptor(2, 2).origin(ContentOrigin::BottomLeft));
    device.set_faults(SoftFaults {
        apply: true,
        ..SoftFaults::default()
    });

    assert_eq!(layer.render_layer(&mut ()), RenderOutcome::Skipped);
    assert!(device.draws().is_empty());
    assert_eq!(layer.effect().texture_coords(), ShaderConstantRect::IDENTITY_UV);
    // The import itself succeeded.
    assert_eq!(layer.import_stats().uploads, 1);
}

#[test]
fn static_texture_renders_every_frame_without_imports() {
    let device = SoftDevice::new();
    let texture = device.create_dynamic_texture(3, 3).unwrap();
    let mut layer = soft_layer(&device, LayerConfig::default());
    layer
        .initialize(CanvasFrameDescriptor::new(3, 3).with_texture(texture.clone()))
        .unwrap();
    let created = device.counters();

    for _ in 0..3 {
        layer.mark_dirty();
        assert_eq!(layer.update_surface(), ImportOutcome::Static);
        assert_eq!(layer.render_layer(&mut ()), RenderOutcome::Drawn);
        assert_eq!(device.last_draw().unwrap().texture_id, Some(texture.id()));
    }

    let after = device.counters();
    assert_eq!(after.maps, 0);
    assert_eq!(after.shared_opens, 0);
    assert_eq!(after.views_created, created.views_created);
    assert_eq!(after.views_created, 1);
    assert_eq!(layer.import_stats().attempts, 0);
    assert_eq!(device.draws().len(), 3);
}

#[test]
fn long_running_layer_keeps_a_bounded_draw_log() {
    let device = SoftDevice::new();
    let canvas = FakeCanvas::new(solid(2, 2, [5, 5, 5, 255]));
    let mut layer = soft_layer(&device, LayerConfig::default());
    layer
        .initialize(CanvasFrameDescriptor::new(2, 2).with_drawing_surface(canvas))
        .unwrap();

    let frames = DRAW_LOG_CAPACITY * 8;
    for _ in 0..frames {
        layer.mark_dirty();
        assert_eq!(layer.render_layer(&mut ()), RenderOutcome::Drawn);
    }

    assert_eq!(device.counters().draws, frames as u64);
    assert_eq!(device.draws().len(), DRAW_LOG_CAPACITY);
    assert_eq!(layer.import_stats().uploads, frames as u64);
}
