//! `.derig` XML writer
//!
//! Elements holding their default value are left out, the same way the engine's rig
//! module saves rigs.

use anyhow::{Context, Result};
use de_common::math::{convert_matrix, float_to_string, matrix_to_euler};
use glam::{Mat4, Vec3};
use xmltree::{Element, EmitterConfig, XMLNode};

use crate::armature::{Armature, Bone};
use crate::scene::{ArmatureData, ConstraintData, DofData, ShapeData, ShapeKind};

const EPSILON: f32 = 1e-5;

fn is_zero(value: Vec3) -> bool {
    value.abs().max_element() <= EPSILON
}

// ============================================================================
// Element helpers
// ============================================================================

fn push(parent: &mut Element, child: Element) {
    parent.children.push(XMLNode::Element(child));
}

fn push_data(parent: &mut Element, tag: &str, value: &str) {
    let mut element = Element::new(tag);
    element.children.push(XMLNode::Text(value.to_string()));
    push(parent, element);
}

fn push_float(parent: &mut Element, tag: &str, value: f32) {
    push_data(parent, tag, &float_to_string(value));
}

fn push_vector(parent: &mut Element, tag: &str, value: Vec3) {
    let mut element = Element::new(tag);
    for (axis, component) in [("x", value.x), ("y", value.y), ("z", value.z)] {
        element
            .attributes
            .insert(axis.to_string(), float_to_string(component));
    }
    push(parent, element);
}

fn push_vector_if_set(parent: &mut Element, tag: &str, value: Vec3) {
    if !is_zero(value) {
        push_vector(parent, tag, value);
    }
}

// ============================================================================
// Rig
// ============================================================================

/// Render the rig of a resolved armature. Physics, shapes and constraints come from
/// the host armature.
pub fn write_rig(armature: &Armature, data: &ArmatureData) -> Result<String> {
    let rig = build_rig(armature, data);

    let mut bytes = Vec::new();
    let config = EmitterConfig::new()
        .perform_indent(true)
        .indent_string("\t")
        .pad_self_closing(false);
    rig.write_with_config(&mut bytes, config)
        .context("Failed to write rig XML")?;
    bytes.push(b'\n');
    String::from_utf8(bytes).context("Rig XML is not UTF-8")
}

fn build_rig(armature: &Armature, data: &ArmatureData) -> Element {
    let mut rig = Element::new("rig");

    if let Some(root) = data.rig.root_bone.as_deref().filter(|r| armature.bone(r).is_some()) {
        push_data(&mut rig, "rootBone", root);
    }
    if data.rig.model_collision {
        push_data(&mut rig, "modelCollision", "1");
    }
    push_vector_if_set(&mut rig, "centralMassPoint", data.rig.central_mass_point);

    for bone in &armature.bones {
        push(&mut rig, build_bone(armature, data, bone));
    }

    for shape in data.rig.shapes.iter().filter(|shape| shape.bone.is_none()) {
        push(&mut rig, build_shape(shape, &convert_matrix(&shape.matrix.0), armature.scaling));
    }

    rig
}

fn build_bone(armature: &Armature, data: &ArmatureData, bone: &Bone) -> Element {
    let mut element = Element::new("bone");
    element.attributes.insert("name".to_string(), bone.name.clone());

    if let Some(parent) = bone.parent {
        push_data(&mut element, "parent", &armature.bones[parent].name);
    }
    push_vector_if_set(&mut element, "position", bone.position);
    push_vector_if_set(&mut element, "rotation", bone.rotation);

    let Some(host) = data.bone(&bone.name) else {
        return element;
    };
    let physics = &host.physics;

    if (physics.mass - 1.0).abs() > EPSILON {
        push_float(&mut element, "mass", physics.mass);
    }
    push_vector_if_set(&mut element, "centralMassPoint", physics.central_mass_point);
    if physics.dynamic {
        push_data(&mut element, "dynamic", "1");
    }

    for (axis, tag) in ["ikX", "ikY", "ikZ"].into_iter().enumerate() {
        let lower = physics.ik_lower[axis];
        let upper = physics.ik_upper[axis];
        let resistance = physics.ik_resistance[axis];
        let locked = physics.ik_locked[axis];
        let limited = (lower - 360.0).abs() > EPSILON || upper.abs() > EPSILON;
        if !limited && resistance.abs() <= EPSILON && !locked {
            continue;
        }
        let mut ik = Element::new(tag);
        if limited {
            push_float(&mut ik, "lower", lower);
            push_float(&mut ik, "upper", upper);
        }
        if resistance.abs() > EPSILON {
            push_float(&mut ik, "resistance", resistance);
        }
        if locked {
            push_data(&mut ik, "locked", "1");
        }
        push(&mut element, ik);
    }

    // bone shapes are stored relative to the bone
    let to_bone = bone.rig_matrix.inverse();
    for shape in data
        .rig
        .shapes
        .iter()
        .filter(|shape| shape.bone.as_deref() == Some(bone.name.as_str()))
    {
        let matrix = to_bone * de_common::convert_matrix_bone(&shape.matrix.0);
        push(&mut element, build_shape(shape, &matrix, armature.scaling));
    }

    for constraint in &physics.constraints {
        push(&mut element, build_constraint(armature, constraint));
    }

    element
}

fn build_shape(shape: &ShapeData, matrix: &Mat4, s: f32) -> Element {
    let position = (de_common::scale_matrix(s) * *matrix).transform_point3(Vec3::ZERO);
    let rotation = matrix_to_euler(matrix);

    let (tag, top_radius, bottom_radius, half_height) = match &shape.kind {
        ShapeKind::Sphere { .. } => ("sphere", 0.0, 0.0, 0.0),
        ShapeKind::Box { .. } => ("box", 0.0, 0.0, 0.0),
        ShapeKind::Hull { .. } => ("hull", 0.0, 0.0, 0.0),
        ShapeKind::Cylinder { height, top_radius, bottom_radius } => {
            ("cylinder", *top_radius, *bottom_radius, height * 0.5)
        }
        ShapeKind::Capsule { height, top_radius, bottom_radius } => {
            ("capsule", *top_radius, *bottom_radius, height * 0.5)
        }
        ShapeKind::Cone { height, radius } => ("cylinder", 0.0, *radius, height * 0.5),
    };

    let mut element = Element::new(tag);
    if !shape.property.is_empty() {
        push_data(&mut element, "property", &shape.property);
    }
    push_vector_if_set(&mut element, "position", position);

    match &shape.kind {
        ShapeKind::Sphere { radius } => {
            push_float(&mut element, "radius", radius * s);
        }
        ShapeKind::Box { size } => {
            push_vector_if_set(&mut element, "rotation", rotation);
            // host size runs along host axes; engine Y is host Z
            push_vector(&mut element, "halfExtends", Vec3::new(size.x, size.z, size.y) * 0.5 * s);
        }
        ShapeKind::Hull { points } => {
            push_vector_if_set(&mut element, "rotation", rotation);
            for &point in points {
                push_vector(&mut element, "point", Vec3::new(point.x, point.z, point.y) * s);
            }
        }
        ShapeKind::Cylinder { .. } | ShapeKind::Capsule { .. } | ShapeKind::Cone { .. } => {
            push_vector_if_set(&mut element, "rotation", rotation);
            push_float(&mut element, "halfHeight", half_height * s);
            let mut radius = Element::new("radius");
            radius
                .attributes
                .insert("top".to_string(), float_to_string(top_radius * s));
            radius
                .attributes
                .insert("bottom".to_string(), float_to_string(bottom_radius * s));
            push(&mut element, radius);
        }
    }

    element
}

fn build_constraint(armature: &Armature, constraint: &ConstraintData) -> Element {
    let mut element = Element::new("constraint");

    if let Some(bone) = constraint.bone.as_deref().filter(|b| armature.bone(b).is_some()) {
        push_data(&mut element, "bone", bone);
    }
    push_vector_if_set(&mut element, "position", constraint.position);
    push_vector_if_set(&mut element, "rotation", constraint.rotation);
    push_vector_if_set(&mut element, "offset", constraint.offset);
    if constraint.rope {
        push_data(&mut element, "rope", "1");
    }
    if constraint.breaking_threshold.abs() > EPSILON {
        push_float(&mut element, "breakingThreshold", constraint.breaking_threshold);
    }

    let damping = [
        ("linear", constraint.damping_linear),
        ("angular", constraint.damping_angular),
        ("spring", constraint.damping_spring),
    ];
    if damping.iter().any(|(_, value)| (value - 1.0).abs() > EPSILON) {
        let mut group = Element::new("damping");
        for (tag, value) in damping {
            if (value - 1.0).abs() > EPSILON {
                push_float(&mut group, tag, value);
            }
        }
        push(&mut element, group);
    }

    let dofs = ["linearX", "linearY", "linearZ"]
        .into_iter()
        .zip(&constraint.linear)
        .chain(["angularX", "angularY", "angularZ"].into_iter().zip(&constraint.angular));
    for (tag, dof) in dofs {
        if let Some(dof) = build_dof(tag, dof) {
            push(&mut element, dof);
        }
    }

    element
}

fn build_dof(tag: &str, dof: &DofData) -> Option<Element> {
    let values = [
        ("limitLower", dof.limit_lower),
        ("limitUpper", dof.limit_upper),
        ("staticFriction", dof.static_friction),
        ("kinematicFriction", dof.kinematic_friction),
        ("springStiffness", dof.spring_stiffness),
    ];
    if values.iter().all(|(_, value)| value.abs() <= EPSILON) {
        return None;
    }

    let mut element = Element::new(tag);
    for (name, value) in values {
        if value.abs() > EPSILON {
            push_float(&mut element, name, value);
        }
    }
    Some(element)
}
