use std::f32::consts::{PI, TAU};

use glam::{Vec2, Vec3};

use crate::camera::Camera;
use crate::config::ControlsConfig;

const MIN_POLAR: f32 = 1e-4;
const ZOOM_STEP: f32 = 0.95;
const EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Rotate,
    Pan,
}

/// Orbits the camera around its target. Input accumulates between frames and is
/// applied in [`OrbitControls::update`], decaying gradually when damping is on.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    config: ControlsConfig,
    delta_theta: f32,
    delta_phi: f32,
    pan_offset: Vec3,
    zoom_scale: f32,
    drag: Option<(DragMode, Vec2)>,
}

impl OrbitControls {
    pub fn new(config: ControlsConfig) -> Self {
        Self {
            config,
            delta_theta: 0.0,
            delta_phi: 0.0,
            pan_offset: Vec3::ZERO,
            zoom_scale: 1.0,
            drag: None,
        }
    }

    pub fn pointer_down(&mut self, mode: DragMode, position: Vec2) {
        self.drag = Some((mode, position));
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Feeds a cursor move; `viewport_height` scales drags so a full-height drag is one turn.
    pub fn pointer_move(&mut self, position: Vec2, viewport_height: f32, camera: &Camera) {
        let Some((mode, last)) = self.drag else {
            return;
        };
        self.drag = Some((mode, position));

        if viewport_height <= 0.0 {
            return;
        }

        let delta = position - last;
        match mode {
            DragMode::Rotate => {
                self.rotate_left(TAU * delta.x / viewport_height * self.config.rotate_speed);
                self.rotate_up(TAU * delta.y / viewport_height * self.config.rotate_speed);
            }
            DragMode::Pan => self.pan(delta, viewport_height, camera),
        }
    }

    /// Positive `steps` zoom in.
    pub fn wheel(&mut self, steps: f32) {
        self.zoom_scale *= ZOOM_STEP.powf(steps * self.config.zoom_speed);
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    fn pan(&mut self, delta: Vec2, viewport_height: f32, camera: &Camera) {
        let offset = camera.eye - camera.target;
        // Half the visible height at the target distance maps to half the viewport
        let target_distance = offset.length() * (camera.fov_y * 0.5).tan();
        let scale = 2.0 * target_distance / viewport_height * self.config.pan_speed;

        let view = camera.view_matrix();
        let right = view.row(0).truncate();
        let up = view.row(1).truncate();

        self.pan_offset += -right * delta.x * scale + up * delta.y * scale;
    }

    fn has_pending_motion(&self) -> bool {
        self.delta_theta.abs() > EPSILON
            || self.delta_phi.abs() > EPSILON
            || self.pan_offset.length_squared() > EPSILON * EPSILON
            || (self.zoom_scale - 1.0).abs() > EPSILON
    }

    /// Applies pending input to the camera. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        if !self.has_pending_motion() {
            return false;
        }

        let offset = camera.eye - camera.target;
        let radius = offset.length();
        if radius <= f32::EPSILON {
            return false;
        }

        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        let factor = if self.config.enable_damping {
            self.config.damping_factor
        } else {
            1.0
        };

        theta += self.delta_theta * factor;
        phi = (phi + self.delta_phi * factor).clamp(MIN_POLAR, PI - MIN_POLAR);

        // `clamp` panics on inverted or NaN bounds
        let radius = (radius * self.zoom_scale)
            .min(self.config.max_distance)
            .max(self.config.min_distance)
            .max(f32::EPSILON);

        camera.target += self.pan_offset * factor;
        camera.eye = camera.target
            + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );

        if self.config.enable_damping {
            self.delta_theta *= 1.0 - factor;
            self.delta_phi *= 1.0 - factor;
            self.pan_offset *= 1.0 - factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.zoom_scale = 1.0;

        true
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::config::CameraConfig;

    fn camera() -> Camera {
        Camera::from_config(&CameraConfig::default(), 1.0)
    }

    #[test]
    fn idle_controls_leave_camera_alone() {
        let mut camera = camera();
        let eye = camera.eye;
        let mut controls = OrbitControls::new(ControlsConfig::default());

        assert!(!controls.update(&mut camera));
        assert!(camera.eye.abs_diff_eq(eye, 1e-3));
    }

    #[test]
    fn damped_rotation_keeps_moving_after_input_stops() {
        let mut camera = camera();
        let distance = camera.eye.distance(camera.target);
        let mut controls = OrbitControls::new(ControlsConfig::default());

        controls.rotate_left(1.0);
        let mut moved_frames = 0;
        for _ in 0..60 {
            if controls.update(&mut camera) {
                moved_frames += 1;
            }
        }

        assert!(moved_frames > 30);
        assert_relative_eq!(camera.eye.distance(camera.target), distance, epsilon = 1e-2);
    }

    #[test]
    fn undamped_rotation_applies_at_once() {
        let mut camera = camera();
        let config = ControlsConfig {
            enable_damping: false,
            ..Default::default()
        };
        let mut controls = OrbitControls::new(config);

        controls.rotate_left(std::f32::consts::PI);
        assert!(controls.update(&mut camera));
        // Half a turn around the Y axis mirrors X and Z
        assert!(camera.eye.abs_diff_eq(Vec3::new(-40.0, 30.0, -40.0), 1e-2));
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn polar_angle_stays_off_the_poles() {
        let mut camera = camera();
        let config = ControlsConfig {
            enable_damping: false,
            ..Default::default()
        };
        let mut controls = OrbitControls::new(config);

        controls.rotate_up(-10.0);
        controls.update(&mut camera);

        let offset = (camera.eye - camera.target).normalize();
        assert!(offset.y < 1.0);
        assert!(!camera.view_matrix().is_nan());
    }

    #[test]
    fn zoom_respects_distance_limits() {
        let mut camera = camera();
        let config = ControlsConfig {
            enable_damping: false,
            min_distance: 20.0,
            max_distance: 100.0,
            ..Default::default()
        };
        let mut controls = OrbitControls::new(config);

        controls.wheel(200.0);
        controls.update(&mut camera);
        assert_relative_eq!(camera.eye.distance(camera.target), 20.0, epsilon = 1e-3);

        controls.wheel(-200.0);
        controls.update(&mut camera);
        assert_relative_eq!(camera.eye.distance(camera.target), 100.0, epsilon = 1e-3);
    }

    #[test]
    fn drag_requires_pointer_down() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(ControlsConfig::default());

        controls.pointer_move(Vec2::new(500.0, 0.0), 800.0, &camera);
        assert!(!controls.update(&mut camera));

        controls.pointer_down(DragMode::Pan, Vec2::ZERO);
        controls.pointer_move(Vec2::new(100.0, 0.0), 800.0, &camera);
        controls.pointer_up();
        let target = camera.target;
        assert!(controls.update(&mut camera));
        assert!(camera.target != target);
    }

    #[test]
    fn inverted_distance_bounds_do_not_panic() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(ControlsConfig {
            min_distance: 100.0,
            max_distance: 20.0,
            enable_damping: false,
            ..ControlsConfig::default()
        });

        controls.rotate_left(0.1);
        assert!(controls.update(&mut camera));
        assert!(camera.eye.is_finite());

        controls.config.min_distance = f32::NAN;
        controls.rotate_left(0.1);
        controls.update(&mut camera);
        assert!(camera.eye.is_finite());
    }
}
