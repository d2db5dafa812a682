//! Platform layer: windowing, input and the viewer's frame loop.
//!
//! [`ViewerApp`] composes the window, the renderer, the resource cache and a
//! fly camera; winit drives it through `ApplicationHandler`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use asset::mesh::Mesh;
use asset::model::Model;
use asset::terrain;
use asset::{ModelId, ResourceManager};
use corelib::camera::FlyCamera;
use corelib::controls::MoveKeys;
use renderer::{GpuState, RenderSettings};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{CursorGrabMode, Fullscreen, Window, WindowId},
};

mod fps;
mod input;

pub use fps::FpsCounter;
pub use input::{Action, action_for};

const TITLE: &str = "Meshview";
const TERRAIN_KEY: &str = "<terrain>";

/// Everything the viewer needs to start.
#[derive(Clone, Debug)]
pub struct ViewerSettings {
    pub model_path: PathBuf,
    pub render: RenderSettings,
    pub width: u32,
    pub height: u32,
    pub show_fps: bool,
    /// Cells per side of the terrain grid; 0 disables it.
    pub terrain_size: u32,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("resources/models/cube.obj"),
            render: RenderSettings::default(),
            width: 1280,
            height: 720,
            show_fps: false,
            terrain_size: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppState {
    /// Window and GPU not created yet.
    Ready,
    Running,
    Exiting,
}

pub struct ViewerApp {
    settings: ViewerSettings,
    state: AppState,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    resources: ResourceManager,
    models: Vec<ModelId>,
    camera: FlyCamera,
    keys: MoveKeys,
    cursor_grabbed: bool,
    last_frame: Instant,
    fps: FpsCounter,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    pub fn new(settings: ViewerSettings) -> Self {
        let now = Instant::now();
        Self {
            settings,
            state: AppState::Ready,
            window: None,
            gpu: None,
            resources: ResourceManager::default(),
            models: Vec::new(),
            camera: FlyCamera::default(),
            keys: MoveKeys::default(),
            cursor_grabbed: false,
            last_frame: now,
            fps: FpsCounter::new(now),
            error: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    /// The error that stopped the loop, if any.
    pub fn into_result(self) -> Result<()> {
        self.error.map_or(Ok(()), Err)
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        if self.state != AppState::Exiting {
            log::info!("Exiting.");
        }
        self.state = AppState::Exiting;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        self.exit(event_loop);
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(TITLE)
            .with_inner_size(PhysicalSize::new(self.settings.width, self.settings.height));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("Failed to create window")?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let mut gpu = pollster::block_on(GpuState::new(window.clone(), &self.settings.render))?;
        self.load_scene(&mut gpu)?;

        self.window = Some(window);
        self.gpu = Some(gpu);
        self.grab_cursor(true);
        self.last_frame = Instant::now();
        self.state = AppState::Running;
        Ok(())
    }

    fn load_scene(&mut self, gpu: &mut GpuState) -> Result<()> {
        let path = &self.settings.model_path;
        let model = self
            .resources
            .load_model(path, gpu.device_mut())
            .with_context(|| format!("Failed to load model {}", path.display()))?;
        self.models.push(model);

        if self.settings.terrain_size > 0 {
            let data = terrain::generate(self.settings.terrain_size, terrain::DEFAULT_SPACING);
            let mut model = Model::from_meshes(TERRAIN_KEY, vec![Mesh::from_data(data)]);
            model.setup(gpu.device_mut())?;
            self.models.push(self.resources.insert_model(TERRAIN_KEY, model));
        }

        log::info!(
            "Scene ready: {} models, {} textures",
            self.resources.model_count(),
            self.resources.texture_count()
        );
        Ok(())
    }

    fn grab_cursor(&mut self, grab: bool) {
        let Some(window) = &self.window else {
            return;
        };
        let result = if grab {
            window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
        } else {
            window.set_cursor_grab(CursorGrabMode::None)
        };
        match result {
            Ok(()) => {
                window.set_cursor_visible(!grab);
                self.cursor_grabbed = grab;
            }
            Err(err) => log::warn!("Cursor grab unavailable: {err}"),
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(action) = action_for(code) else {
            return;
        };
        let pressed = event.state == ElementState::Pressed;

        match action {
            Action::Move(key) => self.keys.set(key, pressed),
            _ if !pressed || event.repeat => {}
            Action::ToggleFullscreen => {
                if let Some(window) = &self.window {
                    let next = match window.fullscreen() {
                        Some(_) => None,
                        None => Some(Fullscreen::Borderless(None)),
                    };
                    log::info!("Fullscreen: {}", next.is_some());
                    window.set_fullscreen(next);
                }
            }
            Action::ToggleWireframe => {
                if let Some(gpu) = &mut self.gpu {
                    let on = gpu.toggle_wireframe();
                    log::info!("Wireframe: {on}");
                }
            }
            Action::Exit => self.exit(event_loop),
        }
    }

    fn frame(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.camera.advance(&self.keys, dt);

        let Self {
            gpu: Some(gpu),
            resources,
            models,
            camera,
            ..
        } = self
        else {
            return;
        };
        let view = camera.camera(gpu.aspect());
        let result = gpu.render(&view, |program| {
            for id in models.iter() {
                resources.draw_model(*id, program);
            }
        });

        match result {
            Ok(_) => {}
            Err(err) if GpuState::is_surface_lost(&err) => {
                log::warn!("Surface {err:?}, reconfiguring");
                gpu.recreate_surface();
            }
            Err(wgpu::SurfaceError::Timeout) => log::warn!("Surface timeout, frame skipped"),
            Err(err) => {
                self.fail(event_loop, anyhow!("Render failed: {err:?}"));
                return;
            }
        }

        if self.settings.show_fps {
            if let (Some(fps), Some(window)) = (self.fps.tick(now), &self.window) {
                window.set_title(&format!("{TITLE} - {fps:.0} FPS"));
            }
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state != AppState::Ready {
            return;
        }
        if let Err(err) = self.start(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                self.exit(event_loop);
            }
            WindowEvent::Resized(size) => {
                log::debug!("Resized: {}x{}", size.width, size.height);
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::Focused(focused) => {
                if !focused {
                    self.keys.clear();
                }
                self.grab_cursor(focused);
            }
            WindowEvent::RedrawRequested if self.state == AppState::Running => {
                self.frame(event_loop);
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if self.state == AppState::Running && self.cursor_grabbed {
                self.camera.look(dx as f32, dy as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.state == AppState::Running {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!(
            "Shutting down with {} models and {} textures loaded",
            self.resources.model_count(),
            self.resources.texture_count()
        );
    }
}

/// Open the window and run the viewer until it is closed.
pub fn run_viewer(settings: ViewerSettings) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp::new(settings);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;
    app.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_app_waits_for_resume() {
        let app = ViewerApp::new(ViewerSettings::default());
        assert_eq!(app.state(), AppState::Ready);
        assert!(app.into_result().is_ok());
    }

    #[test]
    fn default_settings() {
        let settings = ViewerSettings::default();
        assert_eq!((settings.width, settings.height), (1280, 720));
        assert_eq!(settings.terrain_size, 0);
        assert!(settings.render.vertex_shader.is_none());
    }
}
