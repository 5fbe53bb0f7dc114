//! Resolved mesh types
//!
//! Everything here is in engine space with the export scaling applied. Cross
//! references between vertices, edges and faces are indices into the owning
//! [`Mesh`]'s arrays.

use de_common::{NavSpaceType, LARGE_MODEL_THRESHOLD};
use glam::{Vec2, Vec3};
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

/// Weights are compared after quantizing to thousandths.
pub const WEIGHT_QUANTIZATION: f32 = 1000.0;

/// Raw host weights below this are dropped.
pub const MIN_WEIGHT: f32 = 0.001;

/// Shape key positions closer than this to their base are not stored.
pub const VPS_EPSILON: f32 = 0.001;

#[derive(Debug, Clone, Copy)]
pub struct Weight {
    pub bone: u16,
    pub weight: f32,
    pub qweight: u16,
}

impl Weight {
    pub fn new(bone: u16, weight: f32) -> Self {
        Self {
            bone,
            weight,
            qweight: quantize_weight(weight),
        }
    }
}

pub fn quantize_weight(weight: f32) -> u16 {
    (weight * WEIGHT_QUANTIZATION + 0.5).floor().clamp(0.0, u16::MAX as f32) as u16
}

/// Normalized bone weights of a vertex, heaviest first.
///
/// Equality and hashing use the quantized `(bone, qweight)` tuples.
#[derive(Debug, Clone, Default)]
pub struct WeightSet {
    pub weights: SmallVec<[Weight; 4]>,
}

impl WeightSet {
    /// Sort descending, keep the `max_weights` heaviest and renormalize. A set whose
    /// kept weights sum below [`MIN_WEIGHT`] becomes empty.
    pub fn normalized(mut weights: SmallVec<[Weight; 4]>, max_weights: usize) -> Self {
        weights.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        weights.truncate(max_weights);

        let sum: f32 = weights.iter().map(|w| w.weight).sum();
        if sum < MIN_WEIGHT {
            return Self::default();
        }

        let factor = 1.0 / sum;
        for weight in &mut weights {
            *weight = Weight::new(weight.bone, weight.weight * factor);
        }
        Self { weights }
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn sum(&self) -> f32 {
        self.weights.iter().map(|w| w.weight).sum()
    }

    fn key(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.weights.iter().map(|w| (w.bone, w.qweight))
    }
}

impl PartialEq for WeightSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.key().eq(other.key())
    }
}

impl Eq for WeightSet {}

impl Hash for WeightSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for entry in self.key() {
            entry.hash(state);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// Name written to the file.
    pub name: String,
    pub material: String,
    pub width: u32,
    pub height: u32,
    pub double_sided: bool,
    pub decal: bool,
    pub decal_offset: u8,
    pub navigation_type: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UvSet {
    pub name: String,
    /// Interned texture coordinates in host orientation.
    pub tex_coords: Vec<Vec2>,
}

/// Vertex position set (shape key).
#[derive(Debug, Clone, PartialEq)]
pub struct Vps {
    pub name: String,
    pub base_set: Option<usize>,
    /// `(vertex, engine position)` of every vertex that moved.
    pub positions: Vec<(u32, Vec3)>,
}

#[derive(Debug, Clone)]
pub struct Vertex {
    /// Engine position, scaled.
    pub position: Vec3,
    /// Host position, for face geometry.
    pub host_position: Vec3,
    /// Index into [`Mesh::weight_sets`].
    pub weights: Option<usize>,
    pub edges: Vec<u32>,
    pub faces: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub vertices: [u32; 2],
    pub faces: [Option<u32>; 2],
    pub hard: bool,
    pub uv_seam: bool,
    pub nav_type: u16,
}

impl Edge {
    /// The face across this edge from `face`.
    pub fn other_face(&self, face: u32) -> Option<u32> {
        match self.faces {
            [Some(a), b] if a == face => b,
            [a, Some(b)] if b == face => a,
            _ => None,
        }
    }

    pub fn has_vertex(&self, vertex: u32) -> bool {
        self.vertices.contains(&vertex)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceKind {
    Triangle,
    Quad,
    /// More than four corners; written as a fan.
    Ngon(usize),
}

impl FaceKind {
    pub fn from_arity(arity: usize) -> Option<Self> {
        match arity {
            3 => Some(Self::Triangle),
            4 => Some(Self::Quad),
            n if n > 4 => Some(Self::Ngon(n)),
            _ => None,
        }
    }

    /// Triangles and quads after fanning.
    pub fn fan_counts(self) -> (usize, usize) {
        match self {
            Self::Triangle => (1, 0),
            Self::Quad => (0, 1),
            Self::Ngon(k) => (k % 2, (k - 2) / 2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Face {
    pub kind: FaceKind,
    pub material: u16,
    pub vertices: Vec<u32>,
    pub normals: Vec<u32>,
    pub tangents: Vec<u32>,
    /// Edge from corner `c` to corner `c + 1`.
    pub edges: Vec<u32>,
    /// Texture coordinate indices per UV set, one per corner.
    pub tex_coords: Vec<Vec<u32>>,
    /// Host face normal.
    pub normal: Vec3,
}

impl Face {
    pub fn corner_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn find_corner(&self, vertex: u32) -> Option<usize> {
        self.vertices.iter().position(|&v| v == vertex)
    }
}

/// One resolved level of a model.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub textures: Vec<Texture>,
    pub uv_sets: Vec<UvSet>,
    pub vps: Vec<Vps>,
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    pub faces: Vec<Face>,
    pub weight_sets: Vec<WeightSet>,
    pub normal_count: usize,
    pub tangent_count: usize,
    pub max_bone_weight_count: usize,
    pub lod_error: Option<f32>,
    pub nav_space_type: NavSpaceType,
    pub large_model: bool,
}

impl Mesh {
    /// Triangles and quads written to the model after fanning ngons.
    pub fn fan_counts(&self) -> (usize, usize) {
        self.faces.iter().fold((0, 0), |(tris, quads), face| {
            let (t, q) = face.kind.fan_counts();
            (tris + t, quads + q)
        })
    }

    pub fn face_kind_counts(&self) -> (usize, usize, usize) {
        self.faces.iter().fold((0, 0, 0), |(t, q, n), face| match face.kind {
            FaceKind::Triangle => (t + 1, q, n),
            FaceKind::Quad => (t, q + 1, n),
            FaceKind::Ngon(_) => (t, q, n + 1),
        })
    }

    pub fn edge_count_with(&self, predicate: impl Fn(&Edge) -> bool) -> usize {
        self.edges.iter().filter(|edge| predicate(edge)).count()
    }

    /// True if any table exceeds 16-bit indexing.
    pub fn needs_large_indices(&self) -> bool {
        let (tris, quads) = self.fan_counts();
        [
            self.normal_count,
            self.tangent_count,
            self.weight_sets.len(),
            self.vertices.len(),
            tris + quads,
        ]
        .into_iter()
        .chain(self.uv_sets.iter().map(|set| set.tex_coords.len()))
        .any(|count| count > LARGE_MODEL_THRESHOLD)
    }

    pub fn log_info(&self, level: usize) {
        let (tris, quads, ngons) = self.face_kind_counts();
        tracing::info!(
            "Mesh '{}' LOD {}: {} textures, {} UV sets, {} VPS, {} vertices, {} faces ({} tris, {} quads, {} ngons), {} edges",
            self.name,
            level,
            self.textures.len(),
            self.uv_sets.len(),
            self.vps.len(),
            self.vertices.len(),
            self.faces.len(),
            tris,
            quads,
            ngons,
            self.edges.len()
        );
        tracing::info!(
            "  {} normals, {} tangents, {} weight sets, max {} bone weights{}",
            self.normal_count,
            self.tangent_count,
            self.weight_sets.len(),
            self.max_bone_weight_count,
            if self.large_model { ", large model" } else { "" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashSet;
    use smallvec::smallvec;

    #[test]
    fn test_weight_set_normalization() {
        let set = WeightSet::normalized(
            smallvec![
                Weight::new(0, 0.1),
                Weight::new(1, 0.5),
                Weight::new(2, 0.3),
                Weight::new(3, 0.2),
            ],
            3,
        );
        assert_eq!(set.len(), 3);
        assert_eq!(set.weights[0].bone, 1);
        assert_eq!(set.weights[2].bone, 3);
        assert!((set.sum() - 1.0).abs() < 1e-5);
        assert_eq!(set.weights[0].qweight, 500);
    }

    #[test]
    fn test_weight_set_below_minimum_is_empty() {
        let set = WeightSet::normalized(smallvec![Weight::new(0, 0.0004)], 4);
        assert!(set.is_empty());
    }

    #[test]
    fn test_weight_set_equality_is_quantized() {
        let a = WeightSet::normalized(smallvec![Weight::new(0, 0.6), Weight::new(1, 0.4)], 4);
        let b = WeightSet::normalized(
            smallvec![Weight::new(0, 0.60001), Weight::new(1, 0.39999)],
            4,
        );
        let c = WeightSet::normalized(smallvec![Weight::new(0, 0.4), Weight::new(1, 0.6)], 4);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut interned = HashSet::new();
        interned.insert(a);
        assert!(interned.contains(&b));
        assert!(!interned.contains(&c));
    }

    #[test]
    fn test_fan_counts() {
        assert_eq!(FaceKind::from_arity(2), None);
        assert_eq!(FaceKind::Ngon(5).fan_counts(), (1, 1));
        assert_eq!(FaceKind::Ngon(6).fan_counts(), (0, 2));
        assert_eq!(FaceKind::Ngon(7).fan_counts(), (1, 2));
    }

    #[test]
    fn test_edge_other_face() {
        let edge = Edge {
            vertices: [0, 1],
            faces: [Some(3), Some(7)],
            hard: false,
            uv_seam: false,
            nav_type: 0,
        };
        assert_eq!(edge.other_face(3), Some(7));
        assert_eq!(edge.other_face(7), Some(3));
        assert_eq!(edge.other_face(5), None);
        let border = Edge { faces: [Some(3), None], ..edge };
        assert_eq!(border.other_face(3), None);
    }
}
