//! `.denavspace` v1 writer
//!
//! Grid spaces store edges only; mesh spaces store faces and their corners.

use anyhow::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use de_common::{NavSpaceHeader, NavSpaceType, WriteFormatExt};
use std::io::Write;

use super::count_u16;
use crate::mesh::Mesh;

fn face_type(mesh: &Mesh, material: u16) -> u16 {
    mesh.textures
        .get(material as usize)
        .map_or(0, |texture| texture.navigation_type)
}

pub fn write_navigation_space<W: Write>(w: &mut W, mesh: &Mesh) -> Result<()> {
    let space_type = mesh.nav_space_type;
    let (edge_count, corner_count, face_count) = match space_type {
        NavSpaceType::Grid => (mesh.edges.len(), 0, 0),
        NavSpaceType::Mesh => {
            let corners = mesh.faces.iter().map(|face| face.corner_count()).sum();
            (0, corners, mesh.faces.len())
        }
    };

    let header = NavSpaceHeader::new(
        space_type,
        count_u16(mesh.vertices.len(), "vertices")?,
        count_u16(edge_count, "edges")?,
        count_u16(corner_count, "corners")?,
        count_u16(face_count, "faces")?,
    );
    w.write_all(&header.to_bytes())?;

    for vertex in &mesh.vertices {
        w.write_vec3(vertex.position)?;
    }

    match space_type {
        NavSpaceType::Grid => {
            for edge in &mesh.edges {
                w.write_u16_checked(edge.vertices[0] as usize)?;
                w.write_u16_checked(edge.vertices[1] as usize)?;
                w.write_u16::<LittleEndian>(edge.nav_type)?;
                w.write_u16::<LittleEndian>(edge.nav_type)?;
            }
        }
        NavSpaceType::Mesh => {
            for face in &mesh.faces {
                w.write_u16_checked(face.corner_count())?;
                w.write_u16::<LittleEndian>(face_type(mesh, face.material))?;
            }
            for face in &mesh.faces {
                for (corner, &vertex) in face.vertices.iter().enumerate().rev() {
                    let edge = &mesh.edges[face.edges[corner] as usize];
                    w.write_u16_checked(vertex as usize)?;
                    w.write_u16::<LittleEndian>(edge.nav_type)?;
                }
            }
        }
    }

    Ok(())
}
