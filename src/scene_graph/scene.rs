use glam::{Mat4, Vec3};
use id_arena::Arena;

use crate::asset_loader::{AssetNode, ModelAsset};
use crate::scene_graph::object3d::{Object3D, ObjectId, ObjectKind};
use crate::scene_graph::scene_model::{SceneModel, SceneModelId};
use crate::scene_graph::transform::Transform;

pub struct Scene {
    pub objects: Arena<Object3D>,
    pub models: Arena<SceneModel>,
    root: ObjectId,
}

impl Scene {
    pub fn new() -> Self {
        let mut objects = Arena::new();
        let root = objects.alloc(Object3D::new("Scene", ObjectKind::Group));

        Self {
            objects,
            models: Arena::new(),
            root,
        }
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    /// Inserts `object` under `parent`, or under the scene root when no parent is given.
    pub fn add_object(&mut self, object: Object3D, parent: Option<ObjectId>) -> ObjectId {
        let object_id = self.objects.alloc(object);
        self.set_object_parent(object_id, Some(parent.unwrap_or(self.root)));
        object_id
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id)
    }

    pub fn add_model(&mut self, model: SceneModel) -> SceneModelId {
        self.models.alloc(model)
    }

    /// Inserts a loaded model as a group named after the asset and returns the group.
    pub fn spawn_model(&mut self, asset: ModelAsset, parent: Option<ObjectId>) -> ObjectId {
        let ModelAsset { name, meshes, nodes } = asset;

        // Meshes with nothing to draw get no model; their nodes stay groups
        let model_ids: Vec<Option<SceneModelId>> = meshes
            .into_iter()
            .map(|model| {
                (!model.primitives.is_empty()).then(|| self.add_model(SceneModel::new(model)))
            })
            .collect();

        let group = self.add_object(Object3D::new(name, ObjectKind::Group), parent);

        for node in nodes {
            self.spawn_asset_node(node, group, &model_ids);
        }

        group
    }

    fn spawn_asset_node(
        &mut self,
        node: AssetNode,
        parent: ObjectId,
        model_ids: &[Option<SceneModelId>],
    ) -> ObjectId {
        let kind = match node.mesh.and_then(|index| model_ids.get(index).copied().flatten()) {
            Some(model_id) => ObjectKind::Mesh(model_id),
            None => ObjectKind::Group,
        };

        let object = Object3D::new(node.name, kind).with_transform(Transform::from_trs(
            node.translation,
            node.rotation,
            node.scale,
        ));

        let object_id = self.add_object(object, Some(parent));

        for child in node.children {
            self.spawn_asset_node(child, object_id, model_ids);
        }

        object_id
    }

    /// Depth-first pre-order walk of the subtree rooted at `start`.
    pub fn traverse<F>(&self, start: ObjectId, visitor: &mut F)
    where
        F: FnMut(ObjectId, &Object3D),
    {
        if let Some(object) = self.objects.get(start) {
            visitor(start, object);

            for &child_id in &object.child_ids {
                self.traverse(child_id, visitor);
            }
        }
    }

    /// Updates world transforms of dirty objects in hierarchical order
    fn update_transforms(&self) {
        let root_objects = self.objects.iter().filter_map(|(id, object)| {
            if object.parent_id.is_none() {
                Some(id)
            } else {
                None
            }
        });

        for root_id in root_objects {
            self.update_object_transform_recursive(root_id, Mat4::IDENTITY, false);
        }
    }

    fn update_object_transform_recursive(
        &self,
        object_id: ObjectId,
        parent_world_matrix: Mat4,
        parent_changed: bool,
    ) {
        if let Some(object) = self.objects.get(object_id) {
            // Reading the local matrix first rebuilds it and marks the world matrix dirty
            let local_matrix = *object.transform.local_matrix();

            let changed = parent_changed || object.transform.is_world_dirty();
            if changed {
                object
                    .transform
                    .set_world_matrix(parent_world_matrix * local_matrix);
            }

            let world_matrix = *object.transform.world_matrix();
            for &child_id in &object.child_ids {
                self.update_object_transform_recursive(child_id, world_matrix, changed);
            }
        }
    }

    /// Recomputes every world matrix, dirty or not.
    pub fn update_world_matrices(&self) {
        for (_, object) in self.objects.iter() {
            object.transform.invalidate_world();
        }

        self.update_transforms();
    }

    /// World-space translation of an object after a forced matrix refresh.
    pub fn world_position(&self, object_id: ObjectId) -> Option<Vec3> {
        self.update_world_matrices();

        self.objects
            .get(object_id)
            .map(|object| object.transform.world_translation())
    }

    /// Invalidates world transforms for an object and all its descendants
    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        if let Some(object) = self.objects.get(object_id) {
            object.transform.invalidate_world();

            for &child_id in &object.child_ids {
                self.invalidate_object_hierarchy(child_id);
            }
        }
    }

    /// Sets the parent of an object and updates child relationships
    pub fn set_object_parent(&mut self, child_id: ObjectId, new_parent_id: Option<ObjectId>) {
        if let Some(child) = self.objects.get(child_id) {
            if let Some(old_parent_id) = child.parent_id {
                if let Some(old_parent) = self.objects.get_mut(old_parent_id) {
                    old_parent.child_ids.retain(|&id| id != child_id);
                }
            }
        }

        if let Some(child) = self.objects.get_mut(child_id) {
            child.parent_id = new_parent_id;

            if let Some(new_parent_id) = new_parent_id {
                if let Some(new_parent) = self.objects.get_mut(new_parent_id) {
                    new_parent.child_ids.push(child_id);
                }
            }
        }

        self.invalidate_object_hierarchy(child_id);
    }

    pub fn late_update(&mut self) {
        self.update_transforms();
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;

    fn node(name: &str, translation: Vec3, children: Vec<AssetNode>) -> AssetNode {
        AssetNode {
            name: name.to_string(),
            translation,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            mesh: None,
            children,
        }
    }

    #[test]
    fn objects_without_parent_go_under_root() {
        let mut scene = Scene::new();
        let id = scene.add_object(Object3D::new("Lamp", ObjectKind::Group), None);

        let object = scene.get_object(id).unwrap();
        assert_eq!(object.parent_id, Some(scene.root()));
        assert_eq!(object.parent(&scene).unwrap().name, "Scene");
    }

    #[test]
    fn world_position_matches_manual_composition() {
        let mut scene = Scene::new();

        let parent_transform = Transform::from_trs(
            Vec3::new(10.0, 0.0, -4.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::splat(2.0),
        );
        let child_transform = Transform::from_trs(
            Vec3::new(1.0, 3.0, 0.0),
            Quat::from_rotation_x(0.3),
            Vec3::ONE,
        );

        let parent_matrix = *parent_transform.local_matrix();
        let child_matrix = *child_transform.local_matrix();

        let parent = scene.add_object(
            Object3D::new("parent", ObjectKind::Group).with_transform(parent_transform),
            None,
        );
        let child = scene.add_object(
            Object3D::new("child", ObjectKind::Group).with_transform(child_transform),
            Some(parent),
        );

        let expected = (parent_matrix * child_matrix).w_axis.truncate();
        let actual = scene.world_position(child).unwrap();

        assert!(actual.abs_diff_eq(expected, 1e-4), "{actual} != {expected}");
        // Scaled by 2 and rotated 90 degrees about Y: local +X lands on world -Z
        assert!(actual.abs_diff_eq(Vec3::new(10.0, 6.0, -6.0), 1e-4));
    }

    #[test]
    fn world_position_is_fresh_after_ancestor_moves() {
        let mut scene = Scene::new();
        let parent = scene.add_object(Object3D::new("parent", ObjectKind::Group), None);
        let child = scene.add_object(
            Object3D::new("child", ObjectKind::Group)
                .with_transform(Transform::from_translation(Vec3::Y)),
            Some(parent),
        );
        assert_eq!(scene.world_position(child), Some(Vec3::Y));

        // No late_update in between; the helper refreshes on its own
        scene.objects[parent]
            .transform
            .set_translation(Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(scene.world_position(child), Some(Vec3::new(5.0, 1.0, 0.0)));
    }

    #[test]
    fn traverse_visits_every_node_once_depth_first() {
        let mut scene = Scene::new();
        let asset = ModelAsset {
            name: "model".to_string(),
            meshes: Vec::new(),
            nodes: vec![
                node("a", Vec3::ZERO, vec![node("a1", Vec3::ZERO, vec![])]),
                node("b", Vec3::ZERO, vec![]),
            ],
        };
        let group = scene.spawn_model(asset, None);

        let mut visited = Vec::new();
        scene.traverse(group, &mut |_, object| visited.push(object.name.clone()));

        assert_eq!(visited, ["model", "a", "a1", "b"]);
    }

    #[test]
    fn spawned_nodes_keep_their_hierarchy() {
        let mut scene = Scene::new();
        let asset = ModelAsset {
            name: "model".to_string(),
            meshes: Vec::new(),
            nodes: vec![node(
                "building",
                Vec3::new(0.0, 0.0, 5.0),
                vec![node("roof", Vec3::new(0.0, 8.0, 0.0), vec![])],
            )],
        };
        scene.spawn_model(asset, None);

        let (roof, _) = scene
            .objects
            .iter()
            .find(|(_, object)| object.name == "roof")
            .unwrap();
        let building = scene.get_object(roof).unwrap().parent(&scene).unwrap();
        assert_eq!(building.name, "building");
        assert_eq!(
            scene.world_position(roof),
            Some(Vec3::new(0.0, 8.0, 5.0))
        );
    }

    #[test]
    fn meshes_without_primitives_leave_groups() {
        let mut scene = Scene::new();
        let mut fence = node("fence", Vec3::ZERO, vec![]);
        fence.mesh = Some(0);
        let asset = ModelAsset {
            name: "model".to_string(),
            meshes: vec![crate::model::Model {
                name: "Fence".to_string(),
                primitives: Vec::new(),
            }],
            nodes: vec![fence],
        };
        scene.spawn_model(asset, None);

        assert_eq!(scene.models.len(), 0);
        let (_, fence) = scene
            .objects
            .iter()
            .find(|(_, object)| object.name == "fence")
            .unwrap();
        assert_eq!(fence.kind, ObjectKind::Group);
    }
}
