use glam::{Vec2, Vec3};
use imgui::{Condition, MouseButton, WindowFlags};
use imgui_wgpu::RendererConfig;
use wgpu::{CommandEncoder, TextureView};

use crate::{
    camera::Camera,
    config::LabelConfig,
    overlay::{ElementId, LabelKind, OverlaySurface},
    scene_graph::Scene,
};

/// Labels smaller than this are not worth drawing.
const MIN_FONT_SCALE: f32 = 0.05;

pub struct ImguiRendererState {
    renderer: imgui_wgpu::Renderer,
}

impl ImguiRendererState {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture_format: wgpu::TextureFormat,
        context: &mut imgui::Context,
    ) -> Self {
        let renderer_config = RendererConfig {
            texture_format,
            ..Default::default()
        };

        Self {
            renderer: imgui_wgpu::Renderer::new(context, device, queue, renderer_config),
        }
    }

    /// Draws the current imgui frame on top of whatever `view` already holds.
    pub fn render(
        &mut self,
        view: &TextureView,
        context: &mut imgui::Context,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut CommandEncoder,
    ) -> anyhow::Result<()> {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Overlay render pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let draw_data = context.render();

        // Workaround for memory safety related crash in imgui-rs
        // https://github.com/imgui-rs/imgui-rs/issues/325
        if draw_data.draw_lists_count() == 0 {
            return Ok(());
        }

        self.renderer
            .render(draw_data, queue, device, &mut render_pass)
            .map_err(|err| anyhow::anyhow!("Rendering overlay failed: {:?}", err))
    }
}

/// Font scale for a label whose text sits `pixels_per_unit` screen pixels per world unit away.
pub fn label_font_scale(
    kind: LabelKind,
    scale: f32,
    pixels_per_unit: f32,
    world_units_per_pixel: f32,
) -> f32 {
    match kind {
        LabelKind::Sprite => scale * world_units_per_pixel * pixels_per_unit,
        LabelKind::Screen => scale,
    }
}

/// Screen anchor and font scale for a label at `position`, or `None` when it is
/// behind the camera, off screen or too small to read.
pub fn place_label(
    camera: &Camera,
    position: Vec3,
    kind: LabelKind,
    scale: f32,
    viewport: Vec2,
    world_units_per_pixel: f32,
) -> Option<(Vec2, f32)> {
    let screen = camera.project(position, viewport)?;
    if screen.x < 0.0 || screen.y < 0.0 || screen.x > viewport.x || screen.y > viewport.y {
        return None;
    }

    let pixels_per_unit = camera.pixels_per_unit(camera.depth_of(position), viewport.y);
    let font_scale = label_font_scale(kind, scale, pixels_per_unit, world_units_per_pixel);

    (font_scale >= MIN_FONT_SCALE).then_some((screen, font_scale))
}

/// Draws every label in the scene as a small borderless window anchored above its
/// position. Returns the elements clicked this frame.
pub fn draw_labels(
    ui: &imgui::Ui,
    scene: &Scene,
    camera: &Camera,
    overlay: &OverlaySurface,
    config: &LabelConfig,
) -> Vec<ElementId> {
    // imgui positions are in logical pixels
    let size = overlay.size();
    let scale = Vec2::from(ui.io().display_framebuffer_scale).max(Vec2::splat(f32::EPSILON));
    let viewport = Vec2::new(size.width as f32, size.height as f32) / scale;
    let mut clicked = Vec::new();

    for (_, object) in scene.objects.iter() {
        let Some(label) = object.label() else {
            continue;
        };
        let Some(overlay_element) = overlay.get(label.element) else {
            continue;
        };

        let position = object.transform.world_translation();
        let scale = object.transform.scale().x;
        let Some((anchor, font_scale)) = place_label(
            camera,
            position,
            label.kind,
            scale,
            viewport,
            config.world_units_per_pixel,
        ) else {
            continue;
        };

        let text = overlay_element.element.text_content();
        let window_name = format!("##label-{}", label.element.index());

        let was_clicked = ui
            .window(window_name)
            .position(anchor.to_array(), Condition::Always)
            .position_pivot([0.5, 1.0])
            .bg_alpha(0.6)
            .flags(
                WindowFlags::NO_DECORATION
                    | WindowFlags::ALWAYS_AUTO_RESIZE
                    | WindowFlags::NO_MOVE
                    | WindowFlags::NO_SAVED_SETTINGS
                    | WindowFlags::NO_FOCUS_ON_APPEARING
                    | WindowFlags::NO_NAV,
            )
            .build(|| {
                ui.set_window_font_scale(font_scale);
                ui.text(&text);
                ui.is_window_hovered() && ui.is_mouse_clicked(MouseButton::Left)
            })
            .unwrap_or(false);

        if was_clicked {
            clicked.push(label.element);
        }
    }

    clicked
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::config::CameraConfig;

    fn camera() -> Camera {
        Camera::from_config(&CameraConfig::default(), 16.0 / 9.0)
    }

    const VIEWPORT: Vec2 = Vec2::new(1600.0, 900.0);

    #[test]
    fn screen_labels_keep_their_size() {
        assert_eq!(label_font_scale(LabelKind::Screen, 1.5, 3.0, 0.1), 1.5);
        assert_eq!(label_font_scale(LabelKind::Screen, 1.5, 30.0, 0.1), 1.5);
    }

    #[test]
    fn sprite_labels_shrink_with_distance() {
        let camera = camera();
        let (_, near) =
            place_label(&camera, Vec3::new(20.0, 15.0, 20.0), LabelKind::Sprite, 1.0, VIEWPORT, 0.1)
                .unwrap();
        let (_, far) =
            place_label(&camera, Vec3::new(-20.0, -15.0, -20.0), LabelKind::Sprite, 1.0, VIEWPORT, 0.1)
                .unwrap();

        assert!(near > far);
        // Three times the distance, a third of the size
        assert_relative_eq!(near, far * 3.0, epsilon = 1e-3);
    }

    #[test]
    fn target_projects_to_viewport_centre() {
        let (anchor, _) =
            place_label(&camera(), Vec3::ZERO, LabelKind::Screen, 1.0, VIEWPORT, 0.1).unwrap();
        assert!(anchor.abs_diff_eq(VIEWPORT * 0.5, 1e-2));
    }

    #[test]
    fn labels_behind_the_camera_are_hidden() {
        let behind = Vec3::new(80.0, 60.0, 80.0);
        assert!(place_label(&camera(), behind, LabelKind::Screen, 1.0, VIEWPORT, 0.1).is_none());
    }

    #[test]
    fn tiny_sprites_are_hidden() {
        assert!(place_label(&camera(), Vec3::ZERO, LabelKind::Sprite, 1e-4, VIEWPORT, 0.1).is_none());
    }
}
