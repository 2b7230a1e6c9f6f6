pub mod object3d;
pub mod scene;
pub mod scene_model;
pub mod transform;

pub use object3d::{Label, Light, Object3D, ObjectId, ObjectKind};
pub use scene::Scene;
pub use transform::Transform;
