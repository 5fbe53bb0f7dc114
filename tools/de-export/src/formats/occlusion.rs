//! `.deoccmesh` v1 writer

use anyhow::{Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use de_common::{OcclusionMeshHeader, WriteFormatExt};
use std::io::Write;

use super::count_u16;
use crate::armature::Armature;
use crate::mesh::{Face, Mesh};

fn is_double_sided(mesh: &Mesh, face: &Face) -> bool {
    mesh.textures
        .get(face.material as usize)
        .is_some_and(|texture| texture.double_sided)
}

/// Write an occlusion mesh. Faces with a double-sided material follow the
/// single-sided ones.
pub fn write_occlusion_mesh<W: Write>(w: &mut W, armature: &Armature, mesh: &Mesh) -> Result<()> {
    w.write_all(&OcclusionMeshHeader::new().to_bytes())?;

    w.write_u16::<LittleEndian>(count_u16(armature.bones.len(), "bones")?)?;
    for bone in &armature.bones {
        w.write_string8(&bone.name)?;
        w.write_u16_checked(bone.parent.map_or(0, |parent| parent + 1))?;
    }

    w.write_u16::<LittleEndian>(count_u16(mesh.weight_sets.len(), "weight sets")?)?;
    for set in &mesh.weight_sets {
        let count = u8::try_from(set.len()).context("Weight set has more than 255 weights")?;
        w.write_u8(count)?;
        for weight in &set.weights {
            w.write_u16::<LittleEndian>(weight.bone)?;
            w.write_u16::<LittleEndian>(weight.qweight)?;
        }
    }

    w.write_u16::<LittleEndian>(count_u16(mesh.vertices.len(), "vertices")?)?;
    for vertex in &mesh.vertices {
        w.write_u16_checked(vertex.weights.map_or(0, |set| set + 1))?;
        w.write_vec3(vertex.position)?;
    }

    let (double, single): (Vec<&Face>, Vec<&Face>) =
        mesh.faces.iter().partition(|face| is_double_sided(mesh, face));
    let ordered: Vec<&Face> = single.iter().chain(double.iter()).copied().collect();
    let corner_count: usize = ordered.iter().map(|face| face.corner_count()).sum();

    w.write_u16::<LittleEndian>(count_u16(corner_count, "corners")?)?;
    w.write_u16::<LittleEndian>(count_u16(ordered.len(), "faces")?)?;
    w.write_u16::<LittleEndian>(count_u16(double.len(), "double sided faces")?)?;

    for face in &ordered {
        let count = u8::try_from(face.corner_count()).context("Face has more than 255 corners")?;
        w.write_u8(count)?;
    }
    for face in &ordered {
        for &vertex in face.vertices.iter().rev() {
            w.write_u16_checked(vertex as usize)?;
        }
    }

    Ok(())
}
