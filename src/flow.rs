//! The application loop.
//!
//! Every tick runs exactly one update pass (advance the compositor, write
//! the current frame slot) followed by one render pass (submit the draw
//! list, record the slot's fence, present). Level swap requests arrive
//! through key bindings and are applied between frames, before the next
//! update pass. Content errors keep the current level running; anything
//! else in the frame path is unrecoverable.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::camera::{Camera, CameraController, Projection};
use crate::context::Context;
use crate::data_structures::scene::{SceneConstants, SunLight};
use crate::error::RenderError;
use crate::levels::{LevelManager, SceneProvider};
use crate::render::LevelRenderer;

/// Unrecoverable frame-path failures tear the process down; a half-rendered
/// frame state is not worth limping on with.
fn fatal(e: RenderError) -> ! {
    log::error!("unrecoverable renderer failure: {e}");
    panic!("unrecoverable renderer failure: {e}");
}

struct AppState<K, P> {
    ctx: Context,
    renderer: LevelRenderer,
    manager: LevelManager<K, P>,
    camera: Camera,
    controller: CameraController,
    projection: Projection,
    sun: SunLight,
    /// Next frame slot to write; wraps modulo the context's frame count.
    slot_cursor: usize,
}

impl<K, P> AppState<K, P>
where
    K: Copy + Eq + Hash + Debug,
    P: SceneProvider<K>,
{
    async fn new(window: Arc<Window>, provider: P, initial: K) -> Result<Self, RenderError> {
        let ctx = Context::new(window).await?;
        let mut manager = LevelManager::new(&ctx.device, ctx.frame_count, provider);
        let renderer = LevelRenderer::new(&ctx, manager.table().layout(), manager.mesh_layout());
        manager.load_initial(&ctx.device, initial)?;

        let projection = Projection::new(
            ctx.config.width,
            ctx.config.height,
            cgmath::Deg(65.0),
            0.1,
            100.0,
        );

        Ok(Self {
            ctx,
            renderer,
            manager,
            camera: Camera::default(),
            controller: CameraController::new(6.0),
            projection,
            sun: SunLight::default(),
            slot_cursor: 0,
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        if width > 0 && height > 0 {
            self.projection.resize(width, height);
        }
    }

    fn render(&mut self, dt: Duration) -> Result<(), wgpu::SurfaceStatus> {
        self.ctx.window.request_redraw();

        let slot = self.slot_cursor;

        // Update pass: move the camera, animate, recompose and upload this
        // slot's content.
        self.controller.update(&mut self.camera, dt);
        let written = {
            let level = match self.manager.active_mut() {
                Ok(level) => level,
                Err(e) => fatal(e),
            };
            level.compositor.advance(dt);
            let transforms = level.compositor.to_raw();
            level.ring.write(
                &self.ctx.device,
                &self.ctx.queue,
                slot,
                &transforms,
                &level.source.materials,
            )
        };
        if let Err(e) = written {
            fatal(e);
        }

        let output = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            wgpu::CurrentSurfaceTexture::Timeout => return Err(wgpu::SurfaceStatus::Timeout),
            wgpu::CurrentSurfaceTexture::Occluded => return Err(wgpu::SurfaceStatus::Occluded),
            wgpu::CurrentSurfaceTexture::Outdated => return Err(wgpu::SurfaceStatus::Outdated),
            wgpu::CurrentSurfaceTexture::Lost => return Err(wgpu::SurfaceStatus::Lost),
            wgpu::CurrentSurfaceTexture::Validation => {
                return Err(wgpu::SurfaceStatus::Validation);
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let scene = SceneConstants::new(
            self.projection.matrix() * self.camera.view(),
            self.camera.eye,
            &self.sun,
        );
        let submission = {
            let level = match self.manager.active() {
                Ok(level) => level,
                Err(e) => fatal(e),
            };
            match self.renderer.submit(
                &self.ctx,
                &view,
                self.manager.table(),
                level,
                slot,
                &scene,
            ) {
                Ok(submission) => submission,
                Err(e) => fatal(e),
            }
        };
        let marked = match self.manager.active_mut() {
            Ok(level) => level.ring.mark_submitted(slot, submission),
            Err(e) => fatal(e),
        };
        if let Err(e) = marked {
            fatal(e);
        }

        output.present();
        self.slot_cursor = (self.slot_cursor + 1) % self.ctx.frame_count as usize;
        Ok(())
    }
}

struct App<K, P> {
    async_runtime: tokio::runtime::Runtime,
    state: Option<AppState<K, P>>,
    /// Provider and initial key, consumed when the window first resumes.
    boot: Option<(P, K)>,
    bindings: Vec<(KeyCode, K)>,
    pending_swap: Option<K>,
    last_time: Option<instant::Instant>,
}

impl<K, P> ApplicationHandler for App<K, P>
where
    K: Copy + Eq + Hash + Debug,
    P: SceneProvider<K>,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let Some((provider, initial)) = self.boot.take() else {
            return;
        };

        let attributes = Window::default_attributes().with_title("strata-ngin");
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("window creation failed: {e}");
                event_loop.exit();
                return;
            }
        };

        match self
            .async_runtime
            .block_on(AppState::new(window, provider, initial))
        {
            Ok(state) => self.state = Some(state),
            Err(e) => {
                log::error!("renderer initialization failed: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        state.controller.handle_window_events(&event);
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some((_, key)) = self.bindings.iter().find(|(bound, _)| *bound == code) {
                    self.pending_swap = Some(*key);
                }
            }
            WindowEvent::RedrawRequested => {
                let now = instant::Instant::now();
                let dt = now - self.last_time.replace(now).unwrap_or(now);

                if let Some(key) = self.pending_swap.take() {
                    match state.manager.swap_to(&state.ctx.device, key) {
                        Ok(_) => {}
                        Err(e) if e.is_recoverable() => {
                            log::error!("keeping current level, swap to {:?} failed: {e}", key);
                        }
                        Err(e) => fatal(e),
                    }
                }

                match state.render(dt) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceStatus::Lost | wgpu::SurfaceStatus::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(wgpu::SurfaceStatus::Timeout) => {
                        log::warn!("surface frame timed out, skipping");
                    }
                    Err(e) => log::error!("unable to render frame: {e:?}"),
                }
            }
            _ => {}
        }
    }
}

/// Runs the renderer until the window closes. `bindings` maps keys to level
/// keys; pressing a bound key swaps to that level before the next frame.
pub fn run<K, P>(provider: P, initial: K, bindings: Vec<(KeyCode, K)>) -> anyhow::Result<()>
where
    K: Copy + Eq + Hash + Debug,
    P: SceneProvider<K>,
{
    let _ = env_logger::try_init();

    let event_loop = EventLoop::new()?;
    let mut app = App {
        async_runtime: tokio::runtime::Runtime::new()?,
        state: None,
        boot: Some((provider, initial)),
        bindings,
        pending_swap: None,
        last_time: None,
    };
    event_loop.run_app(&mut app)?;
    Ok(())
}
