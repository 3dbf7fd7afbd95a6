use std::time::Duration;

use cgmath::*;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// wgpu clip space is x/y in -1..1 but z in 0..1, while cgmath produces
/// OpenGL-style -1..1 z. This matrix remaps the depth range.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// A fixed look-at camera. The eye position also feeds the specular term in
/// the shader through the per-frame scene constants.
pub struct Camera {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: (0.25, 6.5, -0.25).into(),
            target: (0.0, 0.0, 0.0).into(),
            up: Vector3::unit_y(),
        }
    }
}

impl Camera {
    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.target, self.up)
    }
}

/// Keyboard camera movement. Events feed held-key amounts, `update` applies
/// them once per frame; eye and target translate together so the viewing
/// direction stays put.
pub struct CameraController {
    speed: f32,
    amount_left: f32,
    amount_right: f32,
    amount_forward: f32,
    amount_backward: f32,
    amount_up: f32,
    amount_down: f32,
}

impl CameraController {
    pub fn new(speed: f32) -> Self {
        Self {
            speed,
            amount_left: 0.0,
            amount_right: 0.0,
            amount_forward: 0.0,
            amount_backward: 0.0,
            amount_up: 0.0,
            amount_down: 0.0,
        }
    }

    pub fn handle_window_events(&mut self, event: &WindowEvent) {
        if let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state,
                    ..
                },
            ..
        } = event
        {
            self.process_keyboard(*code, *state);
        }
    }

    pub fn process_keyboard(&mut self, key: KeyCode, state: ElementState) -> bool {
        let amount = if state == ElementState::Pressed {
            1.0
        } else {
            0.0
        };
        match key {
            KeyCode::KeyW | KeyCode::ArrowUp => {
                self.amount_forward = amount;
                true
            }
            KeyCode::KeyS | KeyCode::ArrowDown => {
                self.amount_backward = amount;
                true
            }
            KeyCode::KeyA | KeyCode::ArrowLeft => {
                self.amount_left = amount;
                true
            }
            KeyCode::KeyD | KeyCode::ArrowRight => {
                self.amount_right = amount;
                true
            }
            KeyCode::KeyE => {
                self.amount_up = amount;
                true
            }
            KeyCode::KeyQ => {
                self.amount_down = amount;
                true
            }
            _ => false,
        }
    }

    pub fn update(&self, camera: &mut Camera, dt: Duration) {
        let dt = dt.as_secs_f32();

        // Movement stays in the ground plane; vertical motion is its own axis.
        let forward = camera.target - camera.eye;
        let flat = Vector3::new(forward.x, 0.0, forward.z);
        let mut translation = Vector3::unit_y() * (self.amount_up - self.amount_down);
        if flat.magnitude2() > f32::EPSILON {
            let forward_dir = flat.normalize();
            let right = forward_dir.cross(camera.up).normalize();
            translation += forward_dir * (self.amount_forward - self.amount_backward)
                + right * (self.amount_right - self.amount_left);
        }
        let translation = translation * self.speed * dt;
        camera.eye += translation;
        camera.target += translation;
    }
}

pub struct Projection {
    pub aspect: f32,
    pub fovy: Deg<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32, fovy: Deg<f32>, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height as f32,
            fovy,
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height as f32;
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_only_changes_aspect() {
        let mut proj = Projection::new(800, 600, Deg(65.0), 0.1, 100.0);
        proj.resize(400, 400);
        assert_eq!(proj.aspect, 1.0);
        assert_eq!(proj.fovy, Deg(65.0));
    }

    #[test]
    fn held_forward_key_moves_the_camera_in_the_ground_plane() {
        let mut camera = Camera::default();
        let mut controller = CameraController::new(2.0);
        controller.process_keyboard(KeyCode::KeyW, ElementState::Pressed);

        let before = camera.eye;
        controller.update(&mut camera, Duration::from_secs(1));

        let moved = camera.eye - before;
        assert!(moved.magnitude() > 0.0);
        assert_eq!(moved.y, 0.0);
        // The movement points from the eye towards the target.
        let toward = Vector3::new(
            camera.target.x - before.x,
            0.0,
            camera.target.z - before.z,
        );
        assert!(moved.normalize().dot(toward.normalize()) > 0.99);
    }

    #[test]
    fn eye_and_target_translate_together() {
        let mut camera = Camera::default();
        let offset_before = camera.target - camera.eye;
        let mut controller = CameraController::new(3.0);
        controller.process_keyboard(KeyCode::KeyD, ElementState::Pressed);
        controller.process_keyboard(KeyCode::KeyE, ElementState::Pressed);

        controller.update(&mut camera, Duration::from_millis(500));

        let offset_after = camera.target - camera.eye;
        assert!((offset_after - offset_before).magnitude() < 1e-5);
    }

    #[test]
    fn releasing_a_key_stops_the_movement() {
        let mut camera = Camera::default();
        let mut controller = CameraController::new(2.0);
        controller.process_keyboard(KeyCode::KeyW, ElementState::Pressed);
        controller.process_keyboard(KeyCode::KeyW, ElementState::Released);

        let before = camera.eye;
        controller.update(&mut camera, Duration::from_secs(1));
        assert_eq!(camera.eye, before);
    }

    #[test]
    fn unbound_keys_are_ignored() {
        let mut controller = CameraController::new(2.0);
        assert!(!controller.process_keyboard(KeyCode::KeyZ, ElementState::Pressed));
        let mut camera = Camera::default();
        let before = camera.eye;
        controller.update(&mut camera, Duration::from_secs(1));
        assert_eq!(camera.eye, before);
    }

    #[test]
    fn default_camera_looks_at_origin() {
        let cam = Camera::default();
        let view = cam.view();
        // The eye maps to the view-space origin up to float error.
        let eye = view * cam.eye.to_homogeneous();
        assert!(eye.x.abs() < 1e-5 && eye.y.abs() < 1e-5);
    }
}
