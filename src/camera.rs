use glam::{Mat4, Vec2, Vec3};
use wgpu::util::DeviceExt;

use crate::config::CameraConfig;

#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            eye: config.eye,
            target: config.target,
            up: Vec3::Y,
            fov_y: config.fov_y_degrees.to_radians(),
            aspect,
            near: config.near,
            far: config.far,
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Distance from the camera plane along the view direction.
    pub fn depth_of(&self, point: Vec3) -> f32 {
        (point - self.eye).dot((self.target - self.eye).normalize_or_zero())
    }

    /// Screen pixels covered by one world unit at `depth`, for a viewport `height` pixels tall.
    pub fn pixels_per_unit(&self, depth: f32, height: f32) -> f32 {
        if depth <= 0.0 {
            return 0.0;
        }
        height * 0.5 / (self.fov_y * 0.5).tan() / depth
    }

    /// Maps a world point to screen pixels (origin top left), or `None` behind the camera.
    pub fn project(&self, point: Vec3, viewport: Vec2) -> Option<Vec2> {
        let clip = self.view_projection_matrix() * point.extend(1.0);
        if clip.w <= self.near * 0.5 {
            return None;
        }

        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * viewport.x,
            (1.0 - ndc.y) * 0.5 * viewport.y,
        ))
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct CameraUniform {
    view_proj: Mat4,
}

impl CameraUniform {
    pub fn update(&mut self, camera: &Camera) {
        self.view_proj = camera.view_projection_matrix();
    }

    pub fn create_buffer(&self, device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: bytemuck::cast_slice(&[*self]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn update_buffer(&self, queue: &wgpu::Queue, buffer: &wgpu::Buffer) {
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[*self]));
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn camera() -> Camera {
        Camera::from_config(&CameraConfig::default(), 16.0 / 9.0)
    }

    #[test]
    fn target_projects_to_viewport_center() {
        let camera = camera();
        let screen = camera.project(Vec3::ZERO, Vec2::new(1600.0, 900.0)).unwrap();

        assert_relative_eq!(screen.x, 800.0, epsilon = 1e-2);
        assert_relative_eq!(screen.y, 450.0, epsilon = 1e-2);
    }

    #[test]
    fn points_above_the_target_project_higher() {
        let camera = camera();
        let viewport = Vec2::new(1600.0, 900.0);
        let center = camera.project(Vec3::ZERO, viewport).unwrap();
        let above = camera.project(Vec3::Y * 5.0, viewport).unwrap();

        assert!(above.y < center.y);
    }

    #[test]
    fn points_behind_the_camera_are_hidden() {
        let camera = camera();
        let behind = camera.eye + (camera.eye - camera.target);
        assert_eq!(camera.project(behind, Vec2::new(100.0, 100.0)), None);
    }

    #[test]
    fn aspect_follows_viewport() {
        let mut camera = camera();
        camera.set_aspect(1024, 512);
        assert_relative_eq!(camera.aspect, 2.0);

        // Minimised windows report zero sizes
        camera.set_aspect(0, 0);
        assert_relative_eq!(camera.aspect, 2.0);
    }

    #[test]
    fn pixels_per_unit_shrinks_with_distance() {
        let camera = camera();
        let near = camera.pixels_per_unit(10.0, 900.0);
        let far = camera.pixels_per_unit(20.0, 900.0);
        assert_relative_eq!(near, far * 2.0, epsilon = 1e-4);
    }
}
