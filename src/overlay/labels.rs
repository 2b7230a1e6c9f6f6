use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::LabelConfig;
use crate::overlay::fragment::parse_fragment;
use crate::overlay::surface::OverlaySurface;
use crate::scene_graph::{Label, Object3D, ObjectId, ObjectKind, Scene, Transform};

/// How a label is sized on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelKind {
    /// Always faces the camera and shrinks with distance.
    #[default]
    Sprite,
    /// Always faces the camera at a constant pixel size.
    Screen,
}

#[derive(Debug, Clone)]
pub struct LabelSpec {
    /// HTML fragment; its first element becomes the label.
    pub element: String,
    pub position: Vec3,
    pub kind: LabelKind,
    pub name: String,
    pub scale: Option<f32>,
    pub parent: Option<ObjectId>,
}

/// Attaches each spec's element to the overlay and places it in the scene.
///
/// Specs whose markup is malformed or holds no element are skipped. Returns the
/// ids of the created label objects in spec order.
pub fn add_text(
    scene: &mut Scene,
    surface: &mut OverlaySurface,
    specs: impl IntoIterator<Item = LabelSpec>,
) -> Vec<ObjectId> {
    let mut created = Vec::new();

    for spec in specs {
        let element = match parse_fragment(&spec.element) {
            Ok(Some(element)) => element,
            Ok(None) => {
                log::warn!("Label {:?} has no element, skipping", spec.name);
                continue;
            }
            Err(err) => {
                log::warn!("Label {:?} has malformed markup: {}", spec.name, err);
                continue;
            }
        };

        log::debug!("Attaching <{}> label {:?}", element.tag, spec.name);
        let element_id = surface.append_child(element);

        let mut transform = Transform::from_translation(spec.position);
        transform.set_uniform_scale(spec.scale.unwrap_or(1.0));

        let label = Object3D::new(
            spec.name,
            ObjectKind::Label(Label {
                element: element_id,
                kind: spec.kind,
            }),
        )
        .with_transform(transform);

        created.push(scene.add_object(label, spec.parent));
    }

    created
}

pub fn label_markup(class: &str, name: &str) -> String {
    let name = escape(name);
    format!(
        r#"<div class="{} animated fadeIn" id="{}"><p class="text">{}</p></div>"#,
        escape(class),
        name,
        name
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Creates a label above every node under `root` whose name contains the marker.
///
/// Each label is named after the anchor's parent (the model group, named after
/// the file stem, for top-level anchors) and placed at the anchor's
/// current world position plus the configured offset. Positions are a snapshot;
/// labels do not follow their anchors afterwards.
pub fn create_anchor_labels(
    scene: &mut Scene,
    surface: &mut OverlaySurface,
    root: ObjectId,
    config: &LabelConfig,
) -> Vec<ObjectId> {
    let mut anchors = Vec::new();
    scene.traverse(root, &mut |id, object| {
        if object.name.contains(config.marker.as_str()) {
            anchors.push(id);
        }
    });

    let specs: Vec<LabelSpec> = anchors
        .into_iter()
        .filter_map(|anchor| {
            let name = scene
                .get_object(anchor)?
                .parent(scene)
                .map(|parent| parent.name.clone())
                .unwrap_or_default();
            let position = scene.world_position(anchor)? + config.offset;

            log::debug!("Anchor {:?} at {}", name, position);

            Some(LabelSpec {
                element: label_markup(&config.class, &name),
                position,
                kind: config.kind,
                name,
                scale: Some(config.scale),
                parent: None,
            })
        })
        .collect();

    let labels = add_text(scene, surface, specs);

    // One listener per element. Already bound elements are skipped rather
    // than getting another handler on every traversal.
    let unbound: Vec<_> = surface
        .query_selector_all(&config.class)
        .filter(|&id| surface.get(id).is_some_and(|e| e.listener_count() == 0))
        .collect();

    for element in unbound {
        surface.add_click_listener(
            element,
            Box::new(|element| {
                log::info!("Label clicked: {}", element.id().unwrap_or_default());
            }),
        );
    }

    labels
}
