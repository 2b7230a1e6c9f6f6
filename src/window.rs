use std::{sync::Arc, time::Instant};

use anyhow::Context;
use glam::Vec2;
use imgui::{FontConfig, FontGlyphRanges, FontSource};
use imgui_winit_support::WinitPlatform;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::{
    asset_loader::ModelLoader,
    config::{LabelConfig, ViewerConfig},
    controls::DragMode,
    engine,
    frame_loop::{FrameLoop, FrameOutcome, FrameTarget, StopSignal},
    rendering::{overlay_renderer::draw_labels, renderer::Renderer},
    viewer::ViewerState,
    viewport::ResizeEvents,
};

/// Pixel-precise wheels report this many pixels per notch.
const PIXELS_PER_WHEEL_STEP: f32 = 50.0;

struct ImguiState {
    context: imgui::Context,
    platform: WinitPlatform,
    last_frame: Instant,
}

struct Viewer {
    renderer: Renderer,
    state: ViewerState,
    imgui: ImguiState,
}

struct App {
    config: ViewerConfig,
    viewer: Option<Viewer>,
    resize_events: ResizeEvents,
    loader: ModelLoader,
    frame_loop: FrameLoop,
    mouse_pos: Vec2,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: ViewerConfig, loader: ModelLoader) -> Self {
        Self {
            config,
            viewer: None,
            resize_events: ResizeEvents::new(),
            loader,
            frame_loop: FrameLoop::new(StopSignal::new()),
            mouse_pos: Vec2::ZERO,
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<Viewer> {
        let window_attributes = Window::default_attributes().with_title("parkview");
        let window = event_loop
            .create_window(window_attributes)
            .context("Failed to create window")?;

        let mut imgui = setup_imgui(&window, &self.config.labels);
        let renderer = pollster::block_on(Renderer::new(
            Arc::new(window),
            &mut self.resize_events,
            &mut imgui.context,
        ))?;

        let mut state = ViewerState::new(
            self.config.clone(),
            renderer.size,
            &mut self.resize_events,
        );
        state.start_loading(&self.loader);

        Ok(Viewer {
            renderer,
            state,
            imgui,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{:#}", err);
        self.frame_loop.stop_signal().stop();
        self.error = Some(err);
        event_loop.exit();
    }
}

fn setup_imgui(window: &Window, labels: &LabelConfig) -> ImguiState {
    let mut context = imgui::Context::create();
    let mut platform = WinitPlatform::new(&mut context);
    platform.attach_window(
        context.io_mut(),
        window,
        imgui_winit_support::HiDpiMode::Default,
    );

    let font_data = labels.font_path.as_ref().and_then(|path| {
        std::fs::read(path)
            .inspect_err(|err| log::warn!("Failed to read font {}: {}", path.display(), err))
            .ok()
    });

    match &font_data {
        Some(data) => {
            context.fonts().add_font(&[FontSource::TtfData {
                data,
                size_pixels: labels.font_size,
                config: Some(FontConfig {
                    oversample_h: 1,
                    pixel_snap_h: true,
                    glyph_ranges: FontGlyphRanges::chinese_simplified_common(),
                    ..Default::default()
                }),
            }]);
        }
        None => {
            context.fonts().add_font(&[FontSource::DefaultFontData {
                config: Some(FontConfig {
                    oversample_h: 1,
                    pixel_snap_h: true,
                    size_pixels: labels.font_size,
                    ..Default::default()
                }),
            }]);
        }
    }

    // Disable INI support because it's broken in the published version of imgui
    context.set_ini_filename(None);

    ImguiState {
        context,
        platform,
        last_frame: Instant::now(),
    }
}

impl FrameTarget for Viewer {
    type Error = anyhow::Error;

    fn update_controls(&mut self) {
        engine::update(&mut self.state);
    }

    fn render_scene(&mut self) -> anyhow::Result<()> {
        match self.renderer.render_scene(&mut self.state) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.renderer.resize(self.renderer.size);
                Ok(())
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(anyhow::anyhow!("Out of GPU memory")),
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timeout");
                Ok(())
            }
            Err(other) => {
                log::error!("Unexpected error: {:?}", other);
                Ok(())
            }
        }
    }

    fn render_overlay(&mut self) -> anyhow::Result<()> {
        if !self.renderer.has_frame_in_progress() {
            return Ok(());
        }

        let imgui = &mut self.imgui;
        let now = Instant::now();
        imgui
            .context
            .io_mut()
            .update_delta_time(now - imgui.last_frame);
        imgui.last_frame = now;

        imgui
            .platform
            .prepare_frame(imgui.context.io_mut(), &self.renderer.window)
            .map_err(|err| anyhow::anyhow!("Failed to prepare imgui frame: {}", err))?;

        let ui = imgui.context.new_frame();
        let clicked = draw_labels(
            ui,
            &self.state.scene,
            &self.state.camera,
            &self.state.overlay,
            &self.state.config.labels,
        );
        imgui.platform.prepare_render(ui, &self.renderer.window);

        for element in clicked {
            self.state.overlay.dispatch_click(element);
        }

        self.renderer.render_overlay(&mut imgui.context)
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }

        match self.start(event_loop) {
            Ok(viewer) => {
                viewer.renderer.window.request_redraw();
                self.viewer = Some(viewer);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };

        let mouse_captured = viewer.imgui.context.io().want_capture_mouse;

        match &event {
            WindowEvent::CloseRequested => {
                viewer.state.dispose_resize_subscription();
                self.frame_loop.stop_signal().stop();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.resize_events.emit(*new_size);
            }
            WindowEvent::RedrawRequested => match self.frame_loop.step(viewer) {
                Ok(FrameOutcome::Continue) => viewer.renderer.window.request_redraw(),
                Ok(FrameOutcome::Stopped) => event_loop.exit(),
                Err(err) => {
                    self.fail(event_loop, err);
                    return;
                }
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_pos = Vec2::new(position.x as f32, position.y as f32);
                let height = viewer.renderer.size.height as f32;
                viewer
                    .state
                    .controls
                    .pointer_move(self.mouse_pos, height, &viewer.state.camera);
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed if !mouse_captured => {
                    let mode = match button {
                        MouseButton::Left => Some(DragMode::Rotate),
                        MouseButton::Right | MouseButton::Middle => Some(DragMode::Pan),
                        _ => None,
                    };
                    if let Some(mode) = mode {
                        viewer.state.controls.pointer_down(mode, self.mouse_pos);
                    }
                }
                ElementState::Released => viewer.state.controls.pointer_up(),
                _ => (),
            },
            WindowEvent::MouseWheel { delta, .. } if !mouse_captured => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => {
                        position.y as f32 / PIXELS_PER_WHEEL_STEP
                    }
                };
                viewer.state.controls.wheel(steps);
            }
            _ => (),
        }

        let window = viewer.renderer.window.as_ref();
        viewer.imgui.platform.handle_event::<()>(
            viewer.imgui.context.io_mut(),
            window,
            &Event::WindowEvent { window_id, event },
        );
    }
}

pub async fn run(config: ViewerConfig) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let loader = ModelLoader::new().context("Failed to start model loader")?;
    let mut app = App::new(config, loader);
    event_loop.run_app(&mut app)?;

    if let Some(err) = app.error.take() {
        return Err(err);
    }

    log::info!("Rendered {} frames", app.frame_loop.frames());

    Ok(())
}
