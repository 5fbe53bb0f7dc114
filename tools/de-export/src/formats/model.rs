//! `.demodel` v6 writer

use anyhow::{Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use de_common::{LodFlags, ModelHeader, TextureFlags, WriteFormatExt};
use std::io::Write;

use super::count_u16;
use crate::armature::Armature;
use crate::mesh::{Face, FaceKind, Mesh};

/// Corner indices of the triangles a face is written as.
pub fn fan_triangles(face: &Face) -> Vec<[usize; 3]> {
    match face.kind {
        FaceKind::Triangle => vec![[0, 1, 2]],
        FaceKind::Quad => Vec::new(),
        FaceKind::Ngon(k) if k % 2 == 1 => vec![[0, k - 2, k - 1]],
        FaceKind::Ngon(_) => Vec::new(),
    }
}

/// Corner indices of the quads a face is written as.
pub fn fan_quads(face: &Face) -> Vec<[usize; 4]> {
    match face.kind {
        FaceKind::Triangle => Vec::new(),
        FaceKind::Quad => vec![[0, 1, 2, 3]],
        FaceKind::Ngon(k) => (0..(k - 2) / 2)
            .map(|q| {
                let i = 2 + q * 2;
                [0, i - 1, i, i + 1]
            })
            .collect(),
    }
}

/// Write a model: the base mesh tables followed by every LOD level.
pub fn write_model<W: Write>(w: &mut W, armature: &Armature, levels: &[Mesh]) -> Result<()> {
    let base = levels.first().context("Model has no mesh")?;

    let header = ModelHeader::new(
        count_u16(armature.bones.len(), "bones")?,
        count_u16(base.textures.len(), "textures")?,
        count_u16(base.uv_sets.len(), "UV sets")?,
        count_u16(base.vps.len(), "vertex position sets")?,
        count_u16(levels.len(), "LOD levels")?,
    );
    w.write_all(&header.to_bytes())?;

    for bone in &armature.bones {
        w.write_string8(&bone.name)?;
        w.write_vec3(bone.position)?;
        w.write_vec3(bone.rotation)?;
        w.write_u16_checked(bone.parent.map_or(0, |parent| parent + 1))?;
    }

    for texture in &base.textures {
        let mut flags = TextureFlags::empty();
        flags.set(TextureFlags::DOUBLE_SIDED, texture.double_sided);
        flags.set(TextureFlags::DECAL, texture.decal);

        w.write_string8(&texture.name)?;
        w.write_u16_checked(texture.width as usize)
            .with_context(|| format!("Texture '{}' width", texture.name))?;
        w.write_u16_checked(texture.height as usize)
            .with_context(|| format!("Texture '{}' height", texture.name))?;
        w.write_u16::<LittleEndian>(flags.bits())?;
        if texture.decal {
            w.write_u8(texture.decal_offset)?;
        }
    }

    for uv_set in &base.uv_sets {
        w.write_string8(&uv_set.name)?;
    }

    for vps in &base.vps {
        w.write_string8(&vps.name)?;
        w.write_u16_checked(vps.base_set.map_or(0, |base| base + 1))?;
    }

    for (lod, mesh) in levels.iter().enumerate() {
        write_lod(w, mesh).with_context(|| format!("Mesh '{}' LOD {}", mesh.name, lod))?;
    }

    Ok(())
}

fn write_lod<W: Write>(w: &mut W, mesh: &Mesh) -> Result<()> {
    let large = mesh.large_model;
    let mut flags = LodFlags::empty();
    flags.set(LodFlags::HAS_LOD_ERROR, mesh.lod_error.is_some());
    flags.set(LodFlags::LARGE_MODEL, large);
    w.write_u8(flags.bits())?;
    if let Some(error) = mesh.lod_error {
        w.write_f32::<LittleEndian>(error)?;
    }

    let (tri_count, quad_count) = mesh.fan_counts();
    for count in [
        mesh.normal_count,
        mesh.tangent_count,
        mesh.weight_sets.len(),
        mesh.vertices.len(),
        tri_count,
        quad_count,
    ] {
        w.write_index(count, large)?;
    }

    for set in &mesh.weight_sets {
        let count = u8::try_from(set.len()).context("Weight set has more than 255 weights")?;
        w.write_u8(count)?;
        for weight in &set.weights {
            w.write_u16::<LittleEndian>(weight.bone)?;
            w.write_u16::<LittleEndian>(weight.qweight)?;
        }
    }

    for vertex in &mesh.vertices {
        w.write_index(vertex.weights.map_or(0, |set| set + 1), large)?;
        w.write_vec3(vertex.position)?;
    }

    for uv_set in &mesh.uv_sets {
        w.write_index(uv_set.tex_coords.len(), large)?;
        for &uv in &uv_set.tex_coords {
            w.write_texel(uv)?;
        }
    }

    for vps in &mesh.vps {
        w.write_index(vps.positions.len(), large)?;
        for &(vertex, position) in &vps.positions {
            w.write_index(vertex as usize, large)?;
            w.write_vec3(position)?;
        }
    }

    for face in &mesh.faces {
        for corners in fan_triangles(face) {
            write_face(w, face, &corners, large)?;
        }
    }
    for face in &mesh.faces {
        for corners in fan_quads(face) {
            write_face(w, face, &corners, large)?;
        }
    }

    Ok(())
}

/// Material then vertex, normal, tangent and texture coordinate indices, each in
/// reversed corner order.
fn write_face<W: Write>(w: &mut W, face: &Face, corners: &[usize], large: bool) -> Result<()> {
    w.write_u16::<LittleEndian>(face.material)?;
    for table in [&face.vertices, &face.normals, &face.tangents] {
        for &corner in corners.iter().rev() {
            w.write_index(table[corner] as usize, large)?;
        }
    }
    for tex_coords in &face.tex_coords {
        for &corner in corners.iter().rev() {
            w.write_index(tex_coords[corner] as usize, large)?;
        }
    }
    Ok(())
}
