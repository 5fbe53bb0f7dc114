//! `.deanim` v2 writer and reader
//!
//! Every bone track is written with the few-keyframes bit set, so keyframes always
//! carry their frame index. The reader also accepts dense tracks, which hold
//! `playtime_frames + 1` keyframes without frame indices.

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use de_common::math::DEG_TO_RAD;
use de_common::formats::{ANIMATION_VERSION, QUANT_LINEAR, QUANT_ROTATION};
use de_common::{
    read_header, AnimationHeader, BoneTrackFlags, ReadFormatExt, VpsTrackFlags, WriteFormatExt,
};
use glam::Vec3;
use std::io::{Cursor, Write};
use std::ops::Range;

use super::count_u16;
use crate::animation::{Animation, AnimationError, BoneKeyframe, BoneTrack, Move, VpsKeyframe, VpsTrack};
use crate::armature::Thresholds;

// ============================================================================
// Writing
// ============================================================================

fn quantize(value: f32, factor: f32) -> i16 {
    (value * factor)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

fn write_vector<W: Write>(w: &mut W, value: Vec3, factor: f32, short: bool) -> Result<()> {
    if short {
        for component in value.to_array() {
            w.write_i16::<LittleEndian>(quantize(component, factor))?;
        }
    } else {
        w.write_vec3(value)?;
    }
    Ok(())
}

/// Write a complete animation file.
pub fn write_animation<W: Write>(w: &mut W, animation: &Animation) -> Result<()> {
    w.write_all(&AnimationHeader::new().to_bytes())?;
    write_name_table(w, &animation.bones, "bones")?;
    write_name_table(w, &animation.vps, "vertex position sets")?;

    w.write_u16::<LittleEndian>(count_u16(animation.moves.len(), "moves")?)?;
    for mv in &animation.moves {
        let bytes = encode_move(mv, animation.fps, &animation.thresholds, animation.short_format)?;
        w.write_all(&bytes)?;
    }
    Ok(())
}

fn write_name_table<W: Write>(w: &mut W, names: &[String], what: &str) -> Result<()> {
    w.write_u16::<LittleEndian>(count_u16(names.len(), what)?)?;
    for name in names {
        w.write_string8(name)?;
    }
    Ok(())
}

/// Encode one move, from its name to its last vertex position set track.
pub fn encode_move(mv: &Move, fps: f32, thresholds: &Thresholds, short: bool) -> Result<Vec<u8>> {
    let mut w = Vec::new();
    w.write_string8(&mv.name)?;
    w.write_f32::<LittleEndian>(mv.playtime_seconds(fps))?;
    w.write_u16::<LittleEndian>(mv.playtime_frames())?;

    for track in &mv.bones {
        write_bone_track(&mut w, track, thresholds, short)
            .with_context(|| format!("Move '{}'", mv.name))?;
    }
    for track in &mv.vps {
        write_vps_track(&mut w, track, thresholds, short)
            .with_context(|| format!("Move '{}'", mv.name))?;
    }
    Ok(w)
}

fn write_bone_track<W: Write>(
    w: &mut W,
    track: &BoneTrack,
    thresholds: &Thresholds,
    short: bool,
) -> Result<()> {
    let mut flags = track.variability(thresholds) | BoneTrackFlags::FEW_KEYFRAMES;
    flags.set(BoneTrackFlags::FLOAT_FORMAT, !short);
    if !track.used || !flags.has_samples() || track.keyframes.is_empty() {
        w.write_u8(BoneTrackFlags::IGNORED.bits())?;
        return Ok(());
    }

    w.write_u8(flags.bits())?;
    w.write_u16::<LittleEndian>(count_u16(track.keyframes.len(), "keyframes")?)?;
    for keyframe in &track.keyframes {
        w.write_u16::<LittleEndian>(keyframe.frame)?;
        if flags.contains(BoneTrackFlags::VAR_POSITION) {
            write_vector(w, keyframe.position, QUANT_LINEAR, short)?;
        }
        if flags.contains(BoneTrackFlags::VAR_ROTATION) {
            let rotation = if short {
                keyframe.rotation
            } else {
                keyframe.rotation * DEG_TO_RAD
            };
            write_vector(w, rotation, QUANT_ROTATION, short)?;
        }
        if flags.contains(BoneTrackFlags::VAR_SCALE) {
            write_vector(w, keyframe.scale, QUANT_LINEAR, short)?;
        }
    }
    Ok(())
}

fn write_vps_track<W: Write>(
    w: &mut W,
    track: &VpsTrack,
    thresholds: &Thresholds,
    short: bool,
) -> Result<()> {
    let mut flags = track.variability(thresholds) | VpsTrackFlags::FEW_KEYFRAMES;
    flags.set(VpsTrackFlags::FLOAT_FORMAT, !short);
    if !track.used || !flags.has_samples() || track.keyframes.is_empty() {
        w.write_u8(VpsTrackFlags::IGNORED.bits())?;
        return Ok(());
    }

    w.write_u8(flags.bits())?;
    w.write_u16::<LittleEndian>(count_u16(track.keyframes.len(), "keyframes")?)?;
    for keyframe in &track.keyframes {
        w.write_u16::<LittleEndian>(keyframe.frame)?;
        if short {
            w.write_i16::<LittleEndian>(quantize(keyframe.weight, QUANT_LINEAR))?;
        } else {
            w.write_f32::<LittleEndian>(keyframe.weight)?;
        }
    }
    Ok(())
}

// ============================================================================
// Reading
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BoneTrackRecord {
    pub flags: BoneTrackFlags,
    /// Decoded keyframes. Components that do not vary hold the identity pose;
    /// rotations are euler degrees.
    pub keyframes: Vec<BoneKeyframe>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VpsTrackRecord {
    pub flags: VpsTrackFlags,
    pub keyframes: Vec<VpsKeyframe>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveRecord {
    pub name: String,
    pub playtime_seconds: f32,
    pub playtime_frames: u16,
    pub bones: Vec<BoneTrackRecord>,
    pub vps: Vec<VpsTrackRecord>,
    /// Byte range of the move inside the file.
    pub span: Range<usize>,
}

/// A parsed `.deanim` file that keeps its raw bytes.
#[derive(Debug, Clone)]
pub struct AnimationFile {
    pub version: u8,
    pub bones: Vec<String>,
    pub vps: Vec<String>,
    pub moves: Vec<MoveRecord>,
    /// End of the header, bone table and vertex position set table.
    tables_end: usize,
    bytes: Vec<u8>,
}

fn truncated(what: &str) -> impl Fn(std::io::Error) -> AnimationError + '_ {
    move |error| AnimationError::InvalidFile(format!("{}: {}", what, error))
}

impl AnimationFile {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read animation: {}", path.display()))?;
        Self::parse(bytes).with_context(|| format!("Failed to parse animation: {}", path.display()))
    }

    pub fn parse(bytes: Vec<u8>) -> Result<Self, AnimationError> {
        let mut cursor = Cursor::new(bytes.as_slice());
        let (header, _) = read_header::<AnimationHeader, _>(&mut cursor)
            .map_err(|_| AnimationError::InvalidFile("not an animation file".into()))?;
        if header.version != ANIMATION_VERSION {
            return Err(AnimationError::UnsupportedVersion(header.version));
        }

        let bones = read_name_table(&mut cursor, "bone table")?;
        let vps = read_name_table(&mut cursor, "vertex position set table")?;
        let tables_end = cursor.position() as usize;

        let move_count = cursor
            .read_u16::<LittleEndian>()
            .map_err(truncated("move count"))?;
        let mut moves = Vec::with_capacity(move_count as usize);
        for _ in 0..move_count {
            moves.push(read_move(&mut cursor, bones.len(), vps.len())?);
        }

        if cursor.position() as usize != bytes.len() {
            return Err(AnimationError::InvalidFile(format!(
                "{} trailing bytes",
                bytes.len() - cursor.position() as usize
            )));
        }

        Ok(Self {
            version: header.version,
            bones,
            vps,
            moves,
            tables_end,
            bytes,
        })
    }

    /// Header plus bone and vertex position set tables, verbatim.
    pub fn tables(&self) -> &[u8] {
        &self.bytes[..self.tables_end]
    }

    /// Raw bytes of a move.
    pub fn move_bytes(&self, index: usize) -> &[u8] {
        &self.bytes[self.moves[index].span.clone()]
    }

    pub fn find_move(&self, name: &str) -> Option<usize> {
        self.moves.iter().position(|mv| mv.name == name)
    }

    /// Re-assemble the file from its tables and move spans.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.tables().to_vec();
        bytes.extend_from_slice(&(self.moves.len() as u16).to_le_bytes());
        for index in 0..self.moves.len() {
            bytes.extend_from_slice(self.move_bytes(index));
        }
        bytes
    }
}

fn read_name_table(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<Vec<String>, AnimationError> {
    let count = cursor.read_u16::<LittleEndian>().map_err(truncated(what))?;
    (0..count)
        .map(|_| cursor.read_string8().map_err(truncated(what)))
        .collect()
}

fn read_vector(cursor: &mut Cursor<&[u8]>, factor: f32, short: bool) -> std::io::Result<Vec3> {
    if short {
        let x = cursor.read_i16::<LittleEndian>()? as f32 / factor;
        let y = cursor.read_i16::<LittleEndian>()? as f32 / factor;
        let z = cursor.read_i16::<LittleEndian>()? as f32 / factor;
        Ok(Vec3::new(x, y, z))
    } else {
        cursor.read_vec3()
    }
}

fn read_move(
    cursor: &mut Cursor<&[u8]>,
    bone_count: usize,
    vps_count: usize,
) -> Result<MoveRecord, AnimationError> {
    let start = cursor.position() as usize;
    let name = cursor.read_string8().map_err(truncated("move name"))?;
    let context = format!("move '{}'", name);
    let playtime_seconds = cursor
        .read_f32::<LittleEndian>()
        .map_err(truncated(&context))?;
    let playtime_frames = cursor
        .read_u16::<LittleEndian>()
        .map_err(truncated(&context))?;

    let bones = (0..bone_count)
        .map(|_| read_bone_track(cursor, playtime_frames).map_err(truncated(&context)))
        .collect::<Result<Vec<_>, _>>()?;
    let vps = (0..vps_count)
        .map(|_| read_vps_track(cursor, playtime_frames).map_err(truncated(&context)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MoveRecord {
        name,
        playtime_seconds,
        playtime_frames,
        bones,
        vps,
        span: start..cursor.position() as usize,
    })
}

fn read_bone_track(cursor: &mut Cursor<&[u8]>, playtime: u16) -> std::io::Result<BoneTrackRecord> {
    let flags = BoneTrackFlags::from_bits_retain(cursor.read_u8()?);
    let mut keyframes = Vec::new();
    if flags.has_samples() {
        let few = flags.contains(BoneTrackFlags::FEW_KEYFRAMES);
        let short = !flags.contains(BoneTrackFlags::FLOAT_FORMAT);
        let count = if few {
            cursor.read_u16::<LittleEndian>()? as usize
        } else {
            playtime as usize + 1
        };
        for index in 0..count {
            let frame = if few {
                cursor.read_u16::<LittleEndian>()?
            } else {
                index as u16
            };
            let mut keyframe = BoneKeyframe {
                frame,
                position: Vec3::ZERO,
                rotation: Vec3::ZERO,
                scale: Vec3::ONE,
            };
            if flags.contains(BoneTrackFlags::VAR_POSITION) {
                keyframe.position = read_vector(cursor, QUANT_LINEAR, short)?;
            }
            if flags.contains(BoneTrackFlags::VAR_ROTATION) {
                let rotation = read_vector(cursor, QUANT_ROTATION, short)?;
                keyframe.rotation = if short { rotation } else { rotation / DEG_TO_RAD };
            }
            if flags.contains(BoneTrackFlags::VAR_SCALE) {
                keyframe.scale = read_vector(cursor, QUANT_LINEAR, short)?;
            }
            keyframes.push(keyframe);
        }
    }
    Ok(BoneTrackRecord { flags, keyframes })
}

fn read_vps_track(cursor: &mut Cursor<&[u8]>, playtime: u16) -> std::io::Result<VpsTrackRecord> {
    let flags = VpsTrackFlags::from_bits_retain(cursor.read_u8()?);
    let mut keyframes = Vec::new();
    if flags.has_samples() {
        let few = flags.contains(VpsTrackFlags::FEW_KEYFRAMES);
        let short = !flags.contains(VpsTrackFlags::FLOAT_FORMAT);
        let count = if few {
            cursor.read_u16::<LittleEndian>()? as usize
        } else {
            playtime as usize + 1
        };
        for index in 0..count {
            let frame = if few {
                cursor.read_u16::<LittleEndian>()?
            } else {
                index as u16
            };
            let weight = if short {
                cursor.read_i16::<LittleEndian>()? as f32 / QUANT_LINEAR
            } else {
                cursor.read_f32::<LittleEndian>()?
            };
            keyframes.push(VpsKeyframe { frame, weight });
        }
    }
    Ok(VpsTrackRecord { flags, keyframes })
}
