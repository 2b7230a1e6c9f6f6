use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use gltf::buffer;
use itertools::izip;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: [f32; 4],
}

pub struct ModelPrimitive {
    pub index: usize,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

pub struct Model {
    pub name: String,
    pub primitives: Vec<ModelPrimitive>,
}

pub type Buffers<'a> = &'a [buffer::Data];

pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

impl Model {
    /// Converts the triangle primitives of `mesh`. Primitives that cannot be drawn
    /// are skipped with a warning, so the result may have no primitives at all.
    pub fn from_gltf(name: impl Into<String>, mesh: gltf::Mesh, buffers: Buffers) -> Model {
        let mut model = Model {
            name: name.into(),
            primitives: Vec::new(),
        };

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping primitive {} of {}: unsupported mode {:?}",
                    primitive.index(),
                    model.name,
                    primitive.mode()
                );
                continue;
            }

            if primitive.extension_value(DRACO_EXTENSION).is_some() {
                log::warn!(
                    "Skipping primitive {} of {}: {} geometry cannot be decoded",
                    primitive.index(),
                    model.name,
                    DRACO_EXTENSION
                );
                continue;
            }

            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d[..]));

            let positions: Vec<Vec3> = match reader.read_positions() {
                Some(positions) => positions.map(Vec3::from).collect(),
                None => {
                    log::warn!(
                        "Skipping primitive {} of {}: no positions",
                        primitive.index(),
                        model.name
                    );
                    continue;
                }
            };

            let indices = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect::<Vec<u32>>(),
                None => (0..positions.len() as u32).collect(),
            };

            let normals = match reader.read_normals() {
                Some(normals) => normals.map(Vec3::from).collect(),
                None => generate_normals(&positions, &indices),
            };

            let color = primitive
                .material()
                .pbr_metallic_roughness()
                .base_color_factor();

            let vertices = izip!(positions, normals)
                .map(|(position, normal)| Vertex {
                    position,
                    normal,
                    color,
                })
                .collect::<Vec<Vertex>>();

            model.primitives.push(ModelPrimitive {
                index: primitive.index(),
                vertices,
                indices,
            });
        }

        if model.primitives.is_empty() {
            log::warn!("Mesh {} has nothing to draw", model.name);
        }

        model
    }
}

/// Smooth vertex normals from area-weighted face normals.
pub fn generate_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];

        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }

        let face_normal = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face_normal;
        normals[b] += face_normal;
        normals[c] += face_normal;
    }

    normals
        .into_iter()
        .map(|normal| normal.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_normals_face_the_winding_direction() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Z];
        // Counter-clockwise seen from below, so the normal points down
        let normals = generate_normals(&positions, &[0, 1, 2]);
        assert!(normals.iter().all(|n| n.abs_diff_eq(-Vec3::Y, 1e-6)));

        let normals = generate_normals(&positions, &[0, 2, 1]);
        assert!(normals.iter().all(|n| n.abs_diff_eq(Vec3::Y, 1e-6)));
    }

    #[test]
    fn unreferenced_vertices_get_a_fallback_normal() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Z, Vec3::ONE];
        let normals = generate_normals(&positions, &[0, 2, 1]);
        assert_eq!(normals[3], Vec3::Y);
    }
}
