//! Host scene abstraction
//!
//! The exporter never talks to the modeller directly. Everything it needs, the static
//! scene graph and the handful of evaluation knobs the animation sampler turns, goes
//! through [`SceneSource`]. Data is in host coordinates (right-handed, Z up) and host
//! units; conversion to engine space happens in the resolvers.

use de_common::math::from_rows;
use de_common::NavSpaceType;
use glam::{Mat4, Quat, Vec2, Vec3};
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

// ============================================================================
// Scene access
// ============================================================================

/// Read access to the host scene plus the mutable evaluation state used while
/// sampling animations.
pub trait SceneSource {
    /// Scene frame rate in frames per second.
    fn fps(&self) -> f32;

    /// Scene playback range, if the host declares one.
    fn playback_range(&self) -> Option<(i32, i32)>;

    fn mesh(&self, name: &str) -> Option<&MeshData>;

    fn armature(&self, name: &str) -> Option<&ArmatureData>;

    /// All actions in declaration order.
    fn actions(&self) -> &[ActionData];

    fn action(&self, name: &str) -> Option<&ActionData> {
        self.actions().iter().find(|action| action.name == name)
    }

    /// Named move sets in declaration order.
    fn move_sets(&self) -> &[MoveSetData];

    /// Move set selected in the host, if any.
    fn active_move_set(&self) -> Option<&str>;

    fn move_set(&self, name: &str) -> Option<&MoveSetData> {
        self.move_sets().iter().find(|set| set.name == name)
    }

    fn frame(&self) -> i32;

    fn set_frame(&mut self, frame: i32);

    fn active_action(&self, armature: &str) -> Option<String>;

    fn set_active_action(&mut self, armature: &str, action: Option<&str>);

    /// True if the armature is evaluated in rest position.
    fn rest_pose(&self, armature: &str) -> bool;

    fn set_rest_pose(&mut self, armature: &str, rest: bool);

    fn shape_key_action(&self, mesh: &str) -> Option<String>;

    fn set_shape_key_action(&mut self, mesh: &str, action: Option<&str>);

    /// Armature-space pose matrix of a bone at the current frame.
    fn pose_matrix(&self, armature: &str, bone: &str) -> Option<Mat4>;

    /// Value of a shape key at the current frame.
    fn shape_key_value(&self, mesh: &str, key: &str) -> f32;
}

// ============================================================================
// Matrices
// ============================================================================

/// 4×4 host matrix, serialized as four rows the way the host prints it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f32; 4]; 4]", into = "[[f32; 4]; 4]")]
pub struct HostMatrix(pub Mat4);

impl Default for HostMatrix {
    fn default() -> Self {
        Self(Mat4::IDENTITY)
    }
}

impl From<[[f32; 4]; 4]> for HostMatrix {
    fn from(rows: [[f32; 4]; 4]) -> Self {
        Self(from_rows(rows))
    }
}

impl From<HostMatrix> for [[f32; 4]; 4] {
    fn from(matrix: HostMatrix) -> Self {
        matrix.0.transpose().to_cols_array_2d()
    }
}

// ============================================================================
// Meshes
// ============================================================================

/// An evaluated host mesh (modifiers applied).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vec3>,
    pub edges: Vec<EdgeData>,
    pub polygons: Vec<PolygonData>,
    pub materials: Vec<MaterialData>,
    /// UV layers in declaration order; one UV per loop, loops in polygon order.
    pub uv_layers: Vec<UvLayerData>,
    /// Shape keys in declaration order. The first one is the basis.
    pub shape_keys: Vec<ShapeKeyData>,
    pub vertex_groups: Vec<String>,
    /// Per-vertex group weights, indexed like `vertices`.
    pub weights: Vec<Vec<GroupWeight>>,
    /// Auto smooth angle in degrees.
    pub auto_smooth_angle: Option<f32>,
    pub armature: Option<String>,
    pub lod_mesh: Option<String>,
    pub shape_key_action: Option<String>,
    pub settings: MeshSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeData {
    pub vertices: [u32; 2],
    #[serde(default)]
    pub sharp: bool,
    #[serde(default)]
    pub seam: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolygonData {
    pub vertices: Vec<u32>,
    #[serde(default)]
    pub material: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupWeight {
    pub group: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialData {
    pub name: String,
    pub export_name: String,
    pub double_sided: bool,
    pub decal: bool,
    pub decal_offset: u8,
    pub navigation_type: u16,
    /// Size of the first reachable image, if any.
    pub image_size: Option<[u32; 2]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UvLayerData {
    pub name: String,
    pub uvs: Vec<Vec2>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeKeyData {
    pub name: String,
    /// Name of the key this one is relative to. The basis is relative to itself.
    pub relative_key: String,
    pub positions: Vec<Vec3>,
    /// Static value used when no shape key action drives the key.
    pub value: f32,
}

/// Per-object export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    pub max_weights: usize,
    /// Texture coordinates closer than this are merged.
    pub uv_epsilon: f32,
    pub lod_error: Option<f32>,
    /// Allow tangent calculation on meshes without UV seams.
    pub no_seams: bool,
    pub nav_space_type: NavSpaceType,
    pub vertex_group_nav_types: HashMap<String, u16>,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            max_weights: 4,
            uv_epsilon: 0.001,
            lod_error: None,
            no_seams: false,
            nav_space_type: NavSpaceType::default(),
            vertex_group_nav_types: HashMap::new(),
        }
    }
}

impl MeshData {
    /// Derive the edge list from polygon boundaries.
    ///
    /// Hosts always provide edges; hand-written snapshots may leave them out.
    pub fn derive_edges(&mut self) {
        let mut seen: HashSet<(u32, u32)> = HashSet::new();
        for polygon in &self.polygons {
            let count = polygon.vertices.len();
            for c in 0..count {
                let a = polygon.vertices[c];
                let b = polygon.vertices[(c + 1) % count];
                let key = (a.min(b), a.max(b));
                if seen.insert(key) {
                    self.edges.push(EdgeData {
                        vertices: [a, b],
                        sharp: false,
                        seam: false,
                    });
                }
            }
        }
    }

    pub fn shape_key(&self, name: &str) -> Option<&ShapeKeyData> {
        self.shape_keys.iter().find(|key| key.name == name)
    }
}

// ============================================================================
// Armatures
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmatureData {
    pub name: String,
    /// Bones in declaration order.
    pub bones: Vec<BoneData>,
    pub rest_pose: bool,
    pub active_action: Option<String>,
    /// Regular expressions of bones left out of the export.
    pub bone_filters: Vec<String>,
    pub threshold_position: f32,
    /// Degrees.
    pub threshold_rotation: f32,
    pub threshold_scale: f32,
    pub short_format: bool,
    pub rig: RigData,
}

impl Default for ArmatureData {
    fn default() -> Self {
        Self {
            name: String::new(),
            bones: Vec::new(),
            rest_pose: false,
            active_action: None,
            bone_filters: Vec::new(),
            threshold_position: 0.001,
            threshold_rotation: 0.05,
            threshold_scale: 0.001,
            short_format: false,
            rig: RigData::default(),
        }
    }
}

impl ArmatureData {
    pub fn bone(&self, name: &str) -> Option<&BoneData> {
        self.bones.iter().find(|bone| bone.name == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<String>,
    /// Rest matrix in armature space.
    pub matrix_local: HostMatrix,
    pub physics: BonePhysics,
}

/// Physics properties of a bone. Values are already in engine space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BonePhysics {
    pub mass: f32,
    pub central_mass_point: Vec3,
    pub dynamic: bool,
    /// Degrees. A lower limit of 360 means unlimited.
    pub ik_lower: Vec3,
    pub ik_upper: Vec3,
    pub ik_resistance: Vec3,
    pub ik_locked: [bool; 3],
    pub constraints: Vec<ConstraintData>,
}

impl Default for BonePhysics {
    fn default() -> Self {
        Self {
            mass: 1.0,
            central_mass_point: Vec3::ZERO,
            dynamic: false,
            ik_lower: Vec3::splat(360.0),
            ik_upper: Vec3::ZERO,
            ik_resistance: Vec3::ZERO,
            ik_locked: [false; 3],
            constraints: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RigData {
    pub root_bone: Option<String>,
    pub model_collision: bool,
    pub central_mass_point: Vec3,
    pub shapes: Vec<ShapeData>,
}

/// Collision shape attached to the rig or to a bone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeData {
    #[serde(default)]
    pub bone: Option<String>,
    #[serde(flatten)]
    pub kind: ShapeKind,
    /// Shape matrix in armature space.
    #[serde(default)]
    pub matrix: HostMatrix,
    #[serde(default)]
    pub property: String,
}

/// Shape dimensions in host units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum ShapeKind {
    Sphere {
        radius: f32,
    },
    Box {
        size: Vec3,
    },
    Cylinder {
        height: f32,
        top_radius: f32,
        bottom_radius: f32,
    },
    Capsule {
        height: f32,
        top_radius: f32,
        bottom_radius: f32,
    },
    Cone {
        height: f32,
        radius: f32,
    },
    Hull {
        points: Vec<Vec3>,
    },
}

/// Bone constraint, in engine space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintData {
    pub bone: Option<String>,
    pub position: Vec3,
    /// Degrees.
    pub rotation: Vec3,
    pub offset: Vec3,
    pub rope: bool,
    pub breaking_threshold: f32,
    pub damping_linear: f32,
    pub damping_angular: f32,
    pub damping_spring: f32,
    pub linear: [DofData; 3],
    /// Limits in degrees.
    pub angular: [DofData; 3],
}

impl Default for ConstraintData {
    fn default() -> Self {
        Self {
            bone: None,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            offset: Vec3::ZERO,
            rope: false,
            breaking_threshold: 0.0,
            damping_linear: 1.0,
            damping_angular: 1.0,
            damping_spring: 1.0,
            linear: Default::default(),
            angular: Default::default(),
        }
    }
}

/// One degree of freedom of a constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DofData {
    pub limit_lower: f32,
    pub limit_upper: f32,
    pub static_friction: f32,
    pub kinematic_friction: f32,
    pub spring_stiffness: f32,
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionData {
    pub name: String,
    /// Move name in the animation file. Empty uses the action name.
    pub export_name: String,
    pub export: bool,
    pub automatic_range: bool,
    pub first_frame: i32,
    pub last_frame: i32,
    pub time_scaling: f32,
    /// One group per animated bone.
    pub groups: Vec<ActionGroupData>,
    /// Shape key channels, used by `<move>.shapeKey` actions.
    pub shape_keys: Vec<ShapeKeyChannelData>,
}

impl Default for ActionData {
    fn default() -> Self {
        Self {
            name: String::new(),
            export_name: String::new(),
            export: true,
            automatic_range: true,
            first_frame: 0,
            last_frame: 0,
            time_scaling: 1.0,
            groups: Vec::new(),
            shape_keys: Vec::new(),
        }
    }
}

impl ActionData {
    pub fn group(&self, name: &str) -> Option<&ActionGroupData> {
        self.groups.iter().find(|group| group.name == name)
    }

    pub fn move_name(&self) -> &str {
        if self.export_name.is_empty() {
            &self.name
        } else {
            &self.export_name
        }
    }
}

/// Named list of action filters. An export with this set selected writes the
/// actions whose whole name matches one of the filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveSetData {
    pub name: String,
    pub filters: Vec<String>,
}

/// Channels of one bone. Values are relative to the rest pose.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionGroupData {
    pub name: String,
    pub location: Vec<Keyframe<Vec3>>,
    pub rotation: Vec<Keyframe<Quat>>,
    pub scale: Vec<Keyframe<Vec3>>,
}

impl ActionGroupData {
    /// Frames of every keyframe in the group.
    pub fn keyframe_frames(&self) -> impl Iterator<Item = f32> + '_ {
        self.location
            .iter()
            .map(|k| k.frame)
            .chain(self.rotation.iter().map(|k| k.frame))
            .chain(self.scale.iter().map(|k| k.frame))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeKeyChannelData {
    pub name: String,
    pub keys: Vec<Keyframe<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub frame: f32,
    pub value: T,
}
