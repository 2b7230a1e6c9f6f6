use glam::Vec3;
use winit::dpi::PhysicalSize;

use crate::{
    asset_loader::{ModelAsset, ModelLoader, PendingModel},
    camera::Camera,
    config::{LightingConfig, ViewerConfig},
    controls::OrbitControls,
    overlay::{create_anchor_labels, OverlaySurface},
    scene_graph::{Light, Object3D, ObjectId, ObjectKind, Scene, Transform},
    viewport::{ResizeEvents, ResizeSubscription},
};

/// Everything the viewer shows, independent of the GPU.
pub struct ViewerState {
    pub config: ViewerConfig,
    pub camera: Camera,
    pub controls: OrbitControls,
    pub scene: Scene,
    pub overlay: OverlaySurface,
    pub labels: Vec<ObjectId>,
    resize: Option<ResizeSubscription>,
    pending_model: Option<PendingModel>,
}

impl ViewerState {
    pub fn new(
        config: ViewerConfig,
        size: PhysicalSize<u32>,
        resize_events: &mut ResizeEvents,
    ) -> Self {
        let mut camera = Camera::from_config(&config.camera, 1.0);
        camera.set_aspect(size.width, size.height);

        let controls = OrbitControls::new(config.controls.clone());

        let mut scene = Scene::new();
        spawn_lights(&mut scene, &config.lighting);

        Self {
            camera,
            controls,
            scene,
            overlay: OverlaySurface::new(size),
            labels: Vec::new(),
            resize: Some(resize_events.subscribe()),
            pending_model: None,
            config,
        }
    }

    pub fn start_loading(&mut self, loader: &ModelLoader) {
        self.pending_model = Some(loader.load(self.config.model_path.clone()));
    }

    /// Picks up a finished model load. Failures are logged and leave the scene as it is.
    pub fn poll_model(&mut self) {
        let Some(pending) = self.pending_model.as_mut() else {
            return;
        };

        let Some(result) = pending.poll() else {
            return;
        };

        let path = pending.path().display().to_string();
        self.pending_model = None;

        match result {
            Ok(asset) => self.finish_model_load(asset),
            Err(err) => log::error!("Failed to load {}: {:#}", path, err),
        }
    }

    pub fn finish_model_load(&mut self, asset: ModelAsset) {
        log::info!(
            "Loaded model {} with {} meshes",
            asset.name,
            asset.meshes.len()
        );

        let model_root = self.scene.spawn_model(asset, None);
        let labels = create_anchor_labels(
            &mut self.scene,
            &mut self.overlay,
            model_root,
            &self.config.labels,
        );

        log::info!(
            "Created {} labels, overlay holds {} elements",
            labels.len(),
            self.overlay.len()
        );
        self.labels.extend(labels);
    }

    pub fn apply_resize(&mut self, size: PhysicalSize<u32>) {
        self.camera.set_aspect(size.width, size.height);
        self.overlay.set_size(size);
    }

    /// Stops following window resizes.
    pub fn dispose_resize_subscription(&mut self) {
        if let Some(subscription) = self.resize.take() {
            subscription.dispose();
        }
    }

    pub fn update(&mut self) {
        if let Some(size) = self.resize.as_ref().and_then(ResizeSubscription::latest) {
            self.apply_resize(size);
        }

        self.poll_model();
        self.controls.update(&mut self.camera);
    }
}

fn spawn_lights(scene: &mut Scene, config: &LightingConfig) {
    scene.add_object(
        Object3D::new(
            "AmbientLight",
            ObjectKind::Light(Light::Ambient {
                color: config.ambient_color,
                intensity: config.ambient_intensity,
            }),
        ),
        None,
    );

    scene.add_object(
        Object3D::new(
            "DirectionalLight",
            ObjectKind::Light(Light::Directional {
                color: config.directional_color,
                intensity: config.directional_intensity,
            }),
        )
        .with_transform(Transform::from_translation(config.directional_position)),
        None,
    );
}

/// Lighting collected from the scene for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLighting {
    pub ambient: Vec3,
    pub directional: Vec3,
    /// Unit vector pointing from the surface towards the light.
    pub direction: Vec3,
}

impl Default for SceneLighting {
    fn default() -> Self {
        Self {
            ambient: Vec3::ZERO,
            directional: Vec3::ZERO,
            direction: Vec3::Y,
        }
    }
}

impl SceneLighting {
    pub fn gather(scene: &Scene) -> Self {
        let mut lighting = SceneLighting::default();
        let mut has_directional = false;

        for (_, object) in scene.objects.iter() {
            match object.kind {
                ObjectKind::Light(Light::Ambient { color, intensity }) => {
                    lighting.ambient += color * intensity;
                }
                ObjectKind::Light(Light::Directional { color, intensity }) if !has_directional => {
                    has_directional = true;
                    lighting.directional = color * intensity;
                    lighting.direction = object
                        .transform
                        .world_translation()
                        .try_normalize()
                        .unwrap_or(Vec3::Y);
                }
                _ => {}
            }
        }

        lighting
    }
}

#[cfg(test)]
mod tests {
    use glam::Quat;

    use super::*;
    use crate::asset_loader::AssetNode;

    fn state() -> (ViewerState, ResizeEvents) {
        let mut events = ResizeEvents::new();
        let state = ViewerState::new(
            ViewerConfig::default(),
            PhysicalSize::new(1600, 900),
            &mut events,
        );
        (state, events)
    }

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
    fn resize_updates_camera_and_overlay() {
        let (mut state, mut events) = state();

        events.emit(PhysicalSize::new(1000, 500));
        state.update();

        assert_eq!(state.camera.aspect, 2.0);
        assert_eq!(state.overlay.size(), PhysicalSize::new(1000, 500));
    }

    #[test]
    fn disposed_subscription_stops_resizes() {
        let (mut state, mut events) = state();
        state.dispose_resize_subscription();

        assert_eq!(events.emit(PhysicalSize::new(1000, 500)), 0);
        state.update();
        assert_eq!(state.overlay.size(), PhysicalSize::new(1600, 900));
    }

    #[test]
    fn finished_load_adds_model_and_labels() {
        let (mut state, _events) = state();
        state.finish_model_load(ModelAsset {
            name: "park".to_string(),
            meshes: Vec::new(),
            nodes: vec![node(
                "C栋",
                Vec3::new(3.0, 0.0, 3.0),
                vec![node("C楼顶", Vec3::new(0.0, 9.0, 0.0), vec![])],
            )],
        });

        assert_eq!(state.labels.len(), 1);
        let label = state.scene.get_object(state.labels[0]).unwrap();
        assert_eq!(label.name, "C栋");
        assert_eq!(label.transform.translation(), Vec3::new(3.0, 11.0, 3.0));
    }

    #[test]
    fn lights_are_gathered_from_the_scene() {
        let (mut state, _events) = state();
        state.scene.late_update();

        let lighting = SceneLighting::gather(&state.scene);
        assert!(lighting.ambient.abs_diff_eq(Vec3::splat(0.8), 1e-6));
        assert!(lighting.directional.abs_diff_eq(Vec3::splat(1.2), 1e-6));
        assert!(lighting.direction.abs_diff_eq(Vec3::ONE.normalize(), 1e-6));
    }
}
