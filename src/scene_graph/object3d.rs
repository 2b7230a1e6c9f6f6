use glam::Vec3;
use id_arena::Id;

use crate::overlay::{ElementId, LabelKind};
use crate::scene_graph::scene::Scene;
use crate::scene_graph::scene_model::SceneModelId;
use crate::scene_graph::transform::Transform;

pub type ObjectId = Id<Object3D>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient { color: Vec3, intensity: f32 },
    /// Shines from the object's world position towards the origin.
    Directional { color: Vec3, intensity: f32 },
}

/// An overlay element placed in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label {
    pub element: ElementId,
    pub kind: LabelKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectKind {
    Group,
    Mesh(SceneModelId),
    Light(Light),
    Label(Label),
}

pub struct Object3D {
    pub name: String,
    pub transform: Transform,
    pub kind: ObjectKind,
    pub parent_id: Option<ObjectId>,
    pub child_ids: Vec<ObjectId>,
}

impl Object3D {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn parent<'a>(&self, scene: &'a Scene) -> Option<&'a Object3D> {
        self.parent_id.and_then(|id| scene.get_object(id))
    }

    pub fn label(&self) -> Option<&Label> {
        match &self.kind {
            ObjectKind::Label(label) => Some(label),
            _ => None,
        }
    }
}

impl Default for Object3D {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: Transform::default(),
            kind: ObjectKind::Group,
            parent_id: None,
            child_ids: Vec::new(),
        }
    }
}
