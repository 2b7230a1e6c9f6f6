use std::path::{Path, PathBuf};

use anyhow::Context;
use glam::{Quat, Vec3};
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::model::{Model, DRACO_EXTENSION};

/// A node of a decoded model, detached from any scene.
#[derive(Debug, Clone)]
pub struct AssetNode {
    pub name: String,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Index into [`ModelAsset::meshes`].
    pub mesh: Option<usize>,
    pub children: Vec<AssetNode>,
}

/// CPU-side result of loading a model file.
pub struct ModelAsset {
    pub name: String,
    pub meshes: Vec<Model>,
    pub nodes: Vec<AssetNode>,
}

/// Decodes a glTF (JSON or binary container) held in memory.
///
/// External buffers are resolved relative to `base_dir`. Draco compressed
/// primitives have no geometry here, but the node hierarchy is kept.
pub fn decode_model(
    name: impl Into<String>,
    bytes: &[u8],
    base_dir: Option<&Path>,
) -> anyhow::Result<ModelAsset> {
    let name = name.into();
    let gltf::Gltf { document, blob } = parse_gltf(&name, bytes)?;

    let buffers = gltf::import_buffers(&document, base_dir, blob)
        .with_context(|| format!("Failed to load buffers of {}", name))?;

    let meshes = document
        .meshes()
        .map(|mesh| {
            let mesh_name = mesh
                .name()
                .map(String::from)
                .unwrap_or_else(|| format!("{} (Mesh {})", name, mesh.index()));
            Model::from_gltf(mesh_name, mesh, &buffers)
        })
        .collect();

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .with_context(|| format!("No scenes in {}", name))?;

    let nodes = scene.nodes().map(|node| convert_node(&node)).collect();

    Ok(ModelAsset {
        name,
        meshes,
        nodes,
    })
}

/// Parses and validates like [`gltf::Gltf::from_slice`], except that a
/// required Draco extension is dropped from the requirements first. The
/// compressed primitives are skipped later, in [`Model::from_gltf`].
fn parse_gltf(name: &str, bytes: &[u8]) -> anyhow::Result<gltf::Gltf> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice_without_validation(bytes)
        .with_context(|| format!("Failed to parse {}", name))?;

    let mut root = document.into_json();
    let required = root.extensions_required.len();
    root.extensions_required.retain(|ext| ext != DRACO_EXTENSION);
    if root.extensions_required.len() != required {
        log::warn!(
            "{} requires {}; compressed meshes will be missing",
            name,
            DRACO_EXTENSION
        );
    }

    let document = gltf::Document::from_json(root)
        .with_context(|| format!("Failed to parse {}", name))?;
    Ok(gltf::Gltf { document, blob })
}

fn convert_node(node: &gltf::Node) -> AssetNode {
    let (translation, rotation, scale) = node.transform().decomposed();

    AssetNode {
        name: node.name().unwrap_or("Unnamed").to_string(),
        translation: translation.into(),
        rotation: Quat::from_array(rotation),
        scale: scale.into(),
        mesh: node.mesh().map(|mesh| mesh.index()),
        children: node.children().map(|child| convert_node(&child)).collect(),
    }
}

async fn fetch_model(path: PathBuf) -> anyhow::Result<ModelAsset> {
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read model {}", path.display()))?;

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    let base_dir = path.parent().map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || decode_model(name, &bytes, base_dir.as_deref()))
        .await
        .context("Model decoder task failed")?
}

/// Loads models off the UI thread.
pub struct ModelLoader {
    runtime: tokio::runtime::Runtime,
}

impl ModelLoader {
    pub fn new() -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("model-loader")
            .enable_all()
            .build()
            .context("Failed to start model loader runtime")?;

        Ok(Self { runtime })
    }

    pub fn load(&self, path: impl Into<PathBuf>) -> PendingModel {
        let path = path.into();
        let (sender, receiver) = oneshot::channel();

        log::info!("Loading model {}", path.display());
        let task_path = path.clone();
        self.runtime.spawn(async move {
            // The receiver is gone if the viewer shut down mid-load
            let _ = sender.send(fetch_model(task_path).await);
        });

        PendingModel {
            path,
            receiver: Some(receiver),
        }
    }
}

/// A model load in flight.
pub struct PendingModel {
    path: PathBuf,
    receiver: Option<oneshot::Receiver<anyhow::Result<ModelAsset>>>,
}

impl PendingModel {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the load result once, `None` while loading and after the result was taken.
    pub fn poll(&mut self) -> Option<anyhow::Result<ModelAsset>> {
        let receiver = self.receiver.as_mut()?;

        match receiver.try_recv() {
            Ok(result) => {
                self.receiver = None;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.receiver = None;
                Some(Err(anyhow::anyhow!(
                    "Loader stopped before finishing {}",
                    self.path.display()
                )))
            }
        }
    }
}
