use glam::{Mat4, Quat, Vec3};
use std::cell::{Cell, Ref, RefCell};

/// Local TRS transform with lazily rebuilt local matrix and a cached world matrix.
///
/// The world matrix is written by [`Scene`](crate::scene_graph::Scene) during a
/// hierarchy refresh; interior mutability lets the refresh run over `&Scene`.
#[derive(Debug, Clone)]
pub struct Transform {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,

    local_matrix: RefCell<Mat4>,
    world_matrix: RefCell<Mat4>,
    normal_matrix: RefCell<Mat4>,
    local_dirty: Cell<bool>,
    world_dirty: Cell<bool>,
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self::from_trs(translation, Quat::IDENTITY, Vec3::ONE)
    }

    pub fn from_trs(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
            local_matrix: RefCell::new(Mat4::IDENTITY),
            world_matrix: RefCell::new(Mat4::IDENTITY),
            normal_matrix: RefCell::new(Mat4::IDENTITY),
            local_dirty: Cell::new(true),
            world_dirty: Cell::new(true),
        }
    }

    pub fn local_matrix(&self) -> Ref<Mat4> {
        if self.local_dirty.get() {
            let matrix =
                Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation);

            self.local_matrix.replace(matrix);
            self.local_dirty.set(false);
            self.world_dirty.set(true);
        }

        self.local_matrix.borrow()
    }

    pub fn world_matrix(&self) -> Ref<Mat4> {
        self.world_matrix.borrow()
    }

    /// Inverse transpose of the world matrix, used to transform normals.
    pub fn normal_matrix(&self) -> Ref<Mat4> {
        self.normal_matrix.borrow()
    }

    pub fn world_translation(&self) -> Vec3 {
        self.world_matrix.borrow().w_axis.truncate()
    }

    pub fn set_world_matrix(&self, world_matrix: Mat4) {
        self.world_matrix.replace(world_matrix);
        self.world_dirty.set(false);

        // Degenerate scales (a zero-scaled node) have no inverse
        let normal_matrix = if world_matrix.determinant().abs() > f32::EPSILON {
            world_matrix.inverse().transpose()
        } else {
            Mat4::IDENTITY
        };
        self.normal_matrix.replace(normal_matrix);
    }

    pub fn invalidate_local(&self) {
        self.local_dirty.set(true);
        self.world_dirty.set(true);
    }

    pub fn invalidate_world(&self) {
        self.world_dirty.set(true);
    }

    pub fn is_world_dirty(&self) -> bool {
        self.world_dirty.get()
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
        self.invalidate_local();
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.invalidate_local();
    }

    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.set_scale(Vec3::splat(scale));
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_translation(Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_matrix_is_rebuilt_after_mutation() {
        let mut transform = Transform::from_translation(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(transform.local_matrix().w_axis.truncate(), Vec3::X);

        transform.set_translation(Vec3::new(0.0, 3.0, 0.0));
        assert!(transform.is_world_dirty());
        assert_eq!(
            transform.local_matrix().w_axis.truncate(),
            Vec3::new(0.0, 3.0, 0.0)
        );
    }

    #[test]
    fn zero_scale_does_not_poison_normal_matrix() {
        let transform = Transform::default();
        transform.set_world_matrix(Mat4::from_scale(Vec3::ZERO));
        assert!(!transform.normal_matrix().is_nan());
        assert!(!transform.is_world_dirty());
    }
}
