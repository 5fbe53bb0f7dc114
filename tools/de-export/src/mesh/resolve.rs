//! Single mesh resolution
//!
//! The steps run in a fixed order; later steps read what earlier ones produced.

use de_common::convert_position;
use glam::Vec3;
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use super::corners::assign_buckets;
use super::types::*;
use super::MeshError;
use crate::armature::Armature;
use crate::scene::MeshData;

const DEFAULT_TEXTURE_SIZE: u32 = 1024;
const DEFAULT_UV_SET: &str = "default";

/// Auto smooth angles at or above this (degrees) disable auto smoothing.
const AUTO_SMOOTH_LIMIT: f32 = 179.9;

/// Resolve one mesh. LOD levels pass the resolved base mesh so their vertex position
/// sets line up with it.
pub fn resolve_mesh(
    data: &MeshData,
    armature: Option<&Armature>,
    scaling: f32,
    base: Option<&Mesh>,
) -> Result<Mesh, MeshError> {
    let name = &data.name;
    let textures = resolve_textures(data)?;
    let uv_layers = order_uv_layers(data)?;
    let vps = resolve_vps(data, base, scaling);
    let (mut vertices, weight_sets) = resolve_vertices(data, armature, scaling);
    let mut edges = resolve_edges(data, &mut vertices)?;
    let mut faces = resolve_faces(data, &textures, &mut vertices, &mut edges)?;

    if let Some(angle) = data.auto_smooth_angle.filter(|angle| *angle < AUTO_SMOOTH_LIMIT) {
        apply_auto_smooth(&mut edges, &faces, angle);
    }

    let normals = assign_buckets(&vertices, &edges, &faces, |edge| edge.hard, "normal");

    if !data.settings.no_seams && !edges.iter().any(|edge| edge.uv_seam) {
        return Err(MeshError::MissingUVSeams { mesh: name.clone() });
    }
    let tangents = assign_buckets(&vertices, &edges, &faces, |edge| edge.uv_seam, "tangent");

    for ((face, normals), tangents) in faces
        .iter_mut()
        .zip(normals.corners)
        .zip(tangents.corners)
    {
        face.normals = normals;
        face.tangents = tangents;
    }

    let uv_sets = intern_tex_coords(data, &uv_layers, &mut faces);
    assign_nav_types(data, &mut edges);

    let max_bone_weight_count = weight_sets.iter().map(WeightSet::len).max().unwrap_or(0);
    let mut mesh = Mesh {
        name: name.clone(),
        textures,
        uv_sets,
        vps,
        vertices,
        edges,
        faces,
        weight_sets,
        normal_count: normals.count,
        tangent_count: tangents.count,
        max_bone_weight_count,
        lod_error: data.settings.lod_error,
        nav_space_type: data.settings.nav_space_type,
        large_model: false,
    };
    mesh.large_model = mesh.needs_large_indices();
    Ok(mesh)
}

// ============================================================================
// Textures and UV layers
// ============================================================================

fn resolve_textures(data: &MeshData) -> Result<Vec<Texture>, MeshError> {
    if data.materials.is_empty() {
        return Err(MeshError::NoMaterials {
            mesh: data.name.clone(),
        });
    }

    let mut seen = HashSet::new();
    let mut textures = Vec::with_capacity(data.materials.len());
    for material in &data.materials {
        let name = if material.export_name.is_empty() {
            material.name.clone()
        } else {
            material.export_name.clone()
        };
        if !seen.insert(name.clone()) {
            return Err(MeshError::DuplicateExportName {
                mesh: data.name.clone(),
                name,
            });
        }

        let [width, height] = material.image_size.unwrap_or([0, 0]);
        textures.push(Texture {
            name,
            material: material.name.clone(),
            width: if width > 0 { width } else { DEFAULT_TEXTURE_SIZE },
            height: if height > 0 { height } else { DEFAULT_TEXTURE_SIZE },
            double_sided: material.double_sided,
            decal: material.decal,
            decal_offset: material.decal_offset,
            navigation_type: material.navigation_type,
        });
    }
    Ok(textures)
}

/// Host UV layer indices in export order: `default` first, the rest as declared.
fn order_uv_layers(data: &MeshData) -> Result<Vec<usize>, MeshError> {
    if data.uv_layers.is_empty() {
        return Err(MeshError::NoUVSets {
            mesh: data.name.clone(),
        });
    }

    let loop_count: usize = data.polygons.iter().map(|p| p.vertices.len()).sum();
    for layer in &data.uv_layers {
        if layer.uvs.len() != loop_count {
            return Err(MeshError::UvLayerSize {
                mesh: data.name.clone(),
                layer: layer.name.clone(),
                found: layer.uvs.len(),
                expected: loop_count,
            });
        }
    }

    let is_default = |i: &usize| data.uv_layers[*i].name == DEFAULT_UV_SET;
    let all = 0..data.uv_layers.len();
    Ok(all
        .clone()
        .filter(is_default)
        .chain(all.filter(|i| !is_default(i)))
        .collect())
}

// ============================================================================
// Vertex position sets
// ============================================================================

fn resolve_vps(data: &MeshData, base: Option<&Mesh>, scaling: f32) -> Vec<Vps> {
    // (name, own shape key index)
    let sets: Vec<(String, Option<usize>)> = match base {
        Some(base) => base
            .vps
            .iter()
            .map(|vps| {
                let own = data.shape_keys.iter().position(|key| key.name == vps.name);
                (vps.name.clone(), own)
            })
            .collect(),
        None => data
            .shape_keys
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, key)| key.relative_key != key.name)
            .map(|(index, key)| (key.name.clone(), Some(index)))
            .collect(),
    };

    sets.iter()
        .map(|(name, own)| {
            let Some(key) = own.map(|index| &data.shape_keys[index]) else {
                return Vps {
                    name: name.clone(),
                    base_set: None,
                    positions: Vec::new(),
                };
            };

            let base_set = sets
                .iter()
                .position(|(other, own)| own.is_some() && *other == key.relative_key);

            let relative = data
                .shape_key(&key.relative_key)
                .map(|relative| relative.positions.as_slice())
                .unwrap_or(&data.vertices);

            let positions = key
                .positions
                .iter()
                .zip(relative)
                .enumerate()
                .filter(|(_, (position, reference))| (**position - **reference).length() >= VPS_EPSILON)
                .map(|(vertex, (position, _))| (vertex as u32, convert_position(*position, scaling)))
                .collect();

            Vps {
                name: name.clone(),
                base_set,
                positions,
            }
        })
        .collect()
}

// ============================================================================
// Vertices, edges, faces
// ============================================================================

fn resolve_vertices(
    data: &MeshData,
    armature: Option<&Armature>,
    scaling: f32,
) -> (Vec<Vertex>, Vec<WeightSet>) {
    let max_weights = data.settings.max_weights;
    let bone_of_group: Vec<Option<u16>> = data
        .vertex_groups
        .iter()
        .map(|group| {
            armature
                .and_then(|armature| armature.bone_index(group))
                .map(|index| index as u16)
        })
        .collect();

    let mut weight_sets: Vec<WeightSet> = Vec::new();
    let mut interned: HashMap<WeightSet, usize> = HashMap::new();
    let mut vertices = Vec::with_capacity(data.vertices.len());

    for (index, &position) in data.vertices.iter().enumerate() {
        let raw: SmallVec<[Weight; 4]> = data
            .weights
            .get(index)
            .into_iter()
            .flatten()
            .filter(|entry| entry.weight > MIN_WEIGHT)
            .filter_map(|entry| {
                let bone = bone_of_group.get(entry.group as usize).copied().flatten()?;
                Some(Weight::new(bone, entry.weight))
            })
            .collect();

        let set = WeightSet::normalized(raw, max_weights);
        let weights = if set.is_empty() {
            None
        } else if let Some(&existing) = interned.get(&set) {
            Some(existing)
        } else {
            let next = weight_sets.len();
            interned.insert(set.clone(), next);
            weight_sets.push(set);
            Some(next)
        };

        vertices.push(Vertex {
            position: convert_position(position, scaling),
            host_position: position,
            weights,
            edges: Vec::new(),
            faces: Vec::new(),
        });
    }

    (vertices, weight_sets)
}

fn resolve_edges(data: &MeshData, vertices: &mut [Vertex]) -> Result<Vec<Edge>, MeshError> {
    let mut edges = Vec::with_capacity(data.edges.len());
    for (index, edge) in data.edges.iter().enumerate() {
        for &vertex in &edge.vertices {
            let Some(vertex_data) = vertices.get_mut(vertex as usize) else {
                return Err(MeshError::InvalidVertex {
                    mesh: data.name.clone(),
                    vertex,
                });
            };
            vertex_data.edges.push(index as u32);
        }
        edges.push(Edge {
            vertices: edge.vertices,
            faces: [None, None],
            hard: edge.sharp,
            uv_seam: edge.seam,
            nav_type: 0,
        });
    }
    Ok(edges)
}

fn resolve_faces(
    data: &MeshData,
    textures: &[Texture],
    vertices: &mut [Vertex],
    edges: &mut [Edge],
) -> Result<Vec<Face>, MeshError> {
    let mut lookup: HashMap<(u32, u32), u32> = HashMap::with_capacity(edges.len());
    for (index, edge) in edges.iter().enumerate() {
        lookup
            .entry((edge.vertices[0], edge.vertices[1]))
            .or_insert(index as u32);
    }

    let mut faces = Vec::with_capacity(data.polygons.len());
    for (face_index, polygon) in data.polygons.iter().enumerate() {
        let face_index = face_index as u32;
        let count = polygon.vertices.len();
        let kind = FaceKind::from_arity(count).ok_or_else(|| MeshError::DegenerateFace {
            mesh: data.name.clone(),
            face: face_index,
        })?;
        if usize::from(polygon.material) >= textures.len() {
            return Err(MeshError::InvalidMaterial {
                mesh: data.name.clone(),
                face: face_index,
                material: polygon.material,
            });
        }
        if let Some(&vertex) = polygon
            .vertices
            .iter()
            .find(|&&v| v as usize >= vertices.len())
        {
            return Err(MeshError::InvalidVertex {
                mesh: data.name.clone(),
                vertex,
            });
        }

        let mut face_edges = Vec::with_capacity(count);
        for c in 0..count {
            let a = polygon.vertices[c];
            let b = polygon.vertices[(c + 1) % count];
            vertices[a as usize].faces.push(face_index);

            let edge_index = lookup
                .get(&(a, b))
                .or_else(|| lookup.get(&(b, a)))
                .copied()
                .ok_or_else(|| MeshError::MissingEdge {
                    mesh: data.name.clone(),
                    face: face_index,
                    a,
                    b,
                })?;

            let edge = &mut edges[edge_index as usize];
            match edge.faces {
                [None, _] => edge.faces[0] = Some(face_index),
                [Some(_), None] => edge.faces[1] = Some(face_index),
                [Some(_), Some(_)] => {
                    return Err(MeshError::NonManifoldMesh {
                        mesh: data.name.clone(),
                        edge: edge_index,
                    });
                }
            }
            face_edges.push(edge_index);
        }

        let corners: Vec<Vec3> = polygon
            .vertices
            .iter()
            .map(|&v| vertices[v as usize].host_position)
            .collect();

        faces.push(Face {
            kind,
            material: polygon.material,
            vertices: polygon.vertices.clone(),
            normals: Vec::new(),
            tangents: Vec::new(),
            edges: face_edges,
            tex_coords: Vec::new(),
            normal: polygon_normal(&corners),
        });
    }
    Ok(faces)
}

/// Newell normal of a polygon, zero for degenerate geometry.
fn polygon_normal(corners: &[Vec3]) -> Vec3 {
    let mut normal = Vec3::ZERO;
    for (i, current) in corners.iter().enumerate() {
        let next = corners[(i + 1) % corners.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal.normalize_or_zero()
}

/// Mark edges hard where adjacent face normals diverge by more than `angle` degrees.
fn apply_auto_smooth(edges: &mut [Edge], faces: &[Face], angle: f32) {
    for edge in edges.iter_mut() {
        let [Some(a), Some(b)] = edge.faces else {
            continue;
        };
        let (na, nb) = (faces[a as usize].normal, faces[b as usize].normal);
        if na == Vec3::ZERO || nb == Vec3::ZERO {
            continue;
        }
        if na.dot(nb).clamp(-1.0, 1.0).acos().to_degrees() > angle {
            edge.hard = true;
        }
    }
}

// ============================================================================
// Texture coordinates and navigation types
// ============================================================================

fn intern_tex_coords(data: &MeshData, layers: &[usize], faces: &mut [Face]) -> Vec<UvSet> {
    let epsilon = if data.settings.uv_epsilon > 0.0 {
        data.settings.uv_epsilon
    } else {
        0.001
    };
    let inverse = 1.0 / epsilon;
    let quantize = |value: f32| (value * inverse + 0.5).floor() as i64;

    layers
        .iter()
        .map(|&layer_index| {
            let layer = &data.uv_layers[layer_index];
            let mut tex_coords = Vec::new();
            let mut interned: HashMap<(i64, i64), u32> = HashMap::new();
            let mut loop_index = 0;

            for face in faces.iter_mut() {
                let mut indices = Vec::with_capacity(face.corner_count());
                for _ in 0..face.corner_count() {
                    let uv = layer.uvs[loop_index];
                    loop_index += 1;
                    let index = *interned
                        .entry((quantize(uv.x), quantize(uv.y)))
                        .or_insert_with(|| {
                            tex_coords.push(uv);
                            (tex_coords.len() - 1) as u32
                        });
                    indices.push(index);
                }
                face.tex_coords.push(indices);
            }

            UvSet {
                name: layer.name.clone(),
                tex_coords,
            }
        })
        .collect()
}

/// An edge takes the navigation type of the first vertex group shared by both of its
/// vertices that has a mapping.
fn assign_nav_types(data: &MeshData, edges: &mut [Edge]) {
    let mappings = &data.settings.vertex_group_nav_types;
    if mappings.is_empty() {
        return;
    }

    let groups_of = |vertex: u32| -> Vec<u32> {
        data.weights
            .get(vertex as usize)
            .map(|weights| weights.iter().map(|w| w.group).collect())
            .unwrap_or_default()
    };

    for edge in edges.iter_mut() {
        let second = groups_of(edge.vertices[1]);
        edge.nav_type = groups_of(edge.vertices[0])
            .into_iter()
            .filter(|group| second.contains(group))
            .find_map(|group| {
                data.vertex_groups
                    .get(group as usize)
                    .and_then(|name| mappings.get(name))
                    .copied()
            })
            .unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{
        EdgeData, GroupWeight, MaterialData, PolygonData, ShapeKeyData, UvLayerData,
    };
    use glam::Vec2;

    fn quad(sharp_diagonal: bool) -> MeshData {
        let mut data = MeshData {
            name: "Quad".into(),
            vertices: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            polygons: vec![
                PolygonData { vertices: vec![0, 1, 2], material: 0 },
                PolygonData { vertices: vec![0, 2, 3], material: 0 },
            ],
            materials: vec![MaterialData {
                name: "mat0".into(),
                ..Default::default()
            }],
            uv_layers: vec![UvLayerData {
                name: "uv0".into(),
                uvs: vec![
                    Vec2::new(0.0, 0.0),
                    Vec2::new(1.0, 0.0),
                    Vec2::new(1.0, 1.0),
                    Vec2::new(0.0, 0.0),
                    Vec2::new(1.0, 1.0),
                    Vec2::new(0.0, 1.0),
                ],
            }],
            ..Default::default()
        };
        data.derive_edges();
        for edge in &mut data.edges {
            let diagonal = edge.vertices == [2, 0] || edge.vertices == [0, 2];
            edge.sharp = sharp_diagonal && diagonal;
        }
        data.settings.no_seams = true;
        data
    }

    #[test]
    fn test_uv_interning_shares_corners() {
        let mesh = resolve_mesh(&quad(false), None, 1.0, None).unwrap();
        assert_eq!(mesh.uv_sets[0].tex_coords.len(), 4);
        assert_eq!(mesh.faces[0].tex_coords[0], vec![0, 1, 2]);
        assert_eq!(mesh.faces[1].tex_coords[0], vec![0, 2, 3]);
    }

    #[test]
    fn test_sharp_diagonal_splits_normals() {
        let smooth = resolve_mesh(&quad(false), None, 1.0, None).unwrap();
        assert_eq!(smooth.normal_count, 4);
        let split = resolve_mesh(&quad(true), None, 1.0, None).unwrap();
        assert_eq!(split.normal_count, 6);
        assert_ne!(split.faces[0].normals[0], split.faces[1].normals[0]);
    }

    #[test]
    fn test_auto_smooth_marks_folded_edge() {
        let mut data = quad(false);
        data.vertices[3] = Vec3::new(0.0, 1.0, 1.0);
        data.auto_smooth_angle = Some(30.0);
        let mesh = resolve_mesh(&data, None, 1.0, None).unwrap();
        assert_eq!(mesh.edge_count_with(|e| e.hard), 1);

        data.auto_smooth_angle = Some(180.0);
        let mesh = resolve_mesh(&data, None, 1.0, None).unwrap();
        assert_eq!(mesh.edge_count_with(|e| e.hard), 0);
    }

    #[test]
    fn test_missing_seams_rejected() {
        let mut data = quad(false);
        data.settings.no_seams = false;
        assert_eq!(
            resolve_mesh(&data, None, 1.0, None).unwrap_err(),
            MeshError::MissingUVSeams { mesh: "Quad".into() }
        );
    }

    #[test]
    fn test_material_validation() {
        let mut data = quad(false);
        data.materials.push(MaterialData {
            name: "other".into(),
            export_name: "mat0".into(),
            ..Default::default()
        });
        assert!(matches!(
            resolve_mesh(&data, None, 1.0, None),
            Err(MeshError::DuplicateExportName { .. })
        ));

        data.materials.clear();
        assert!(matches!(
            resolve_mesh(&data, None, 1.0, None),
            Err(MeshError::NoMaterials { .. })
        ));
    }

    #[test]
    fn test_texture_defaults() {
        let mut data = quad(false);
        data.materials[0].image_size = Some([512, 0]);
        let mesh = resolve_mesh(&data, None, 1.0, None).unwrap();
        assert_eq!(mesh.textures[0].name, "mat0");
        assert_eq!((mesh.textures[0].width, mesh.textures[0].height), (512, 1024));
    }

    #[test]
    fn test_default_uv_layer_first() {
        let mut data = quad(false);
        let mut default = data.uv_layers[0].clone();
        default.name = "default".into();
        data.uv_layers.push(default);
        let mesh = resolve_mesh(&data, None, 1.0, None).unwrap();
        let names: Vec<_> = mesh.uv_sets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["default", "uv0"]);
    }

    #[test]
    fn test_degenerate_face() {
        let mut data = quad(false);
        data.polygons.push(PolygonData { vertices: vec![0, 1], material: 0 });
        data.uv_layers[0].uvs.extend([Vec2::ZERO, Vec2::ZERO]);
        assert_eq!(
            resolve_mesh(&data, None, 1.0, None).unwrap_err(),
            MeshError::DegenerateFace { mesh: "Quad".into(), face: 2 }
        );
    }

    #[test]
    fn test_shape_keys_store_moved_vertices() {
        let mut data = quad(false);
        let basis = data.vertices.clone();
        let mut raised = basis.clone();
        raised[2].z = 0.5;
        data.shape_keys = vec![
            ShapeKeyData {
                name: "Basis".into(),
                relative_key: "Basis".into(),
                positions: basis,
                value: 0.0,
            },
            ShapeKeyData {
                name: "raise".into(),
                relative_key: "Basis".into(),
                positions: raised,
                value: 0.0,
            },
        ];
        let mesh = resolve_mesh(&data, None, 1.0, None).unwrap();
        assert_eq!(mesh.vps.len(), 1);
        assert_eq!(mesh.vps[0].base_set, None);
        assert_eq!(mesh.vps[0].positions.len(), 1);
        let (vertex, position) = mesh.vps[0].positions[0];
        assert_eq!(vertex, 2);
        assert!(position.abs_diff_eq(Vec3::new(-1.0, 0.5, -1.0), 1e-6));
    }

    #[test]
    fn test_nav_type_from_shared_group() {
        let mut data = quad(false);
        data.vertex_groups = vec!["floor".into(), "stairs".into()];
        data.weights = vec![
            vec![GroupWeight { group: 0, weight: 1.0 }, GroupWeight { group: 1, weight: 1.0 }],
            vec![GroupWeight { group: 1, weight: 1.0 }],
            vec![],
            vec![GroupWeight { group: 0, weight: 1.0 }],
        ];
        data.settings.vertex_group_nav_types.insert("stairs".into(), 7);
        let mesh = resolve_mesh(&data, None, 1.0, None).unwrap();
        let nav = |a: u32, b: u32| {
            mesh.edges
                .iter()
                .find(|e| e.vertices == [a, b])
                .map(|e| e.nav_type)
                .unwrap()
        };
        assert_eq!(nav(0, 1), 7);
        assert_eq!(nav(3, 0), 0);
        assert_eq!(nav(1, 2), 0);
    }

    #[test]
    fn test_non_manifold_edge() {
        let mut data = quad(false);
        data.vertices.push(Vec3::new(0.5, 0.5, 1.0));
        data.polygons.push(PolygonData { vertices: vec![0, 2, 4], material: 0 });
        data.uv_layers[0].uvs.extend([Vec2::ZERO; 3]);
        data.edges.push(EdgeData { vertices: [2, 4], sharp: false, seam: false });
        data.edges.push(EdgeData { vertices: [4, 0], sharp: false, seam: false });
        assert!(matches!(
            resolve_mesh(&data, None, 1.0, None),
            Err(MeshError::NonManifoldMesh { .. })
        ));
    }
}
