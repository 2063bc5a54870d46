//! PMOD encoder.
//!
//! Encoding runs in two passes. [`layout`] walks the scene once, classifies
//! objects, resolves parent names and computes every count; it fails before
//! anything is written when the scene cannot be represented. The resulting
//! [`PmodFile`] is then streamed to the sink front to back.

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io::{self, Write},
};

use binrw::{io::NoSeek, BinWrite, Endian, NullString};
use log::{debug, trace, warn};

use crate::{mesh::Mesh, node::SceneObject, scene::Scene, skin::Armature};

pub mod format;

use format::{
    BoneRecord, MeshCounts, MeshRecord, NodeRecord, PmodFile, PmodFlags, PmodHeader,
    SkeletonRecord, SkeletonSection, TransformRecord, ROOT_PARENT,
};
pub use format::QuaternionOrder;

/// What to do when a scene holds more than one armature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArmaturePolicy {
    #[default]
    Reject,
    /// Use the first armature in scene order and ignore the others.
    FirstFound,
}

#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    pub quaternion_order: QuaternionOrder,
    pub armature_policy: ArmaturePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsupportedScene {
    MultipleArmatures(usize),
    TooManyBones(usize),
    TooManyNodes(usize),
    TooManyElements {
        mesh: String,
        count: usize,
    },
    DanglingParent {
        object: String,
        parent: usize,
    },
    DanglingBoneParent {
        bone: String,
        parent: usize,
    },
    NormalCountMismatch {
        mesh: String,
        vertices: usize,
        normals: usize,
    },
}

impl Display for UnsupportedScene {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedScene::MultipleArmatures(count) => {
                write!(f, "Scene has {} armatures, only one is supported", count)
            }
            UnsupportedScene::TooManyBones(count) => {
                write!(f, "Armature has {} bones, at most 255 are supported", count)
            }
            UnsupportedScene::TooManyNodes(count) => {
                write!(f, "Scene has {} nodes, at most 255 are supported", count)
            }
            UnsupportedScene::TooManyElements { mesh, count } => {
                write!(f, "Mesh {:?} has too many elements: {}", mesh, count)
            }
            UnsupportedScene::DanglingParent { object, parent } => {
                write!(f, "Object {:?} refers to missing parent #{}", object, parent)
            }
            UnsupportedScene::DanglingBoneParent { bone, parent } => {
                write!(f, "Bone {:?} refers to missing parent #{}", bone, parent)
            }
            UnsupportedScene::NormalCountMismatch {
                mesh,
                vertices,
                normals,
            } => write!(
                f,
                "Mesh {:?} has {} vertices but {} normals",
                mesh, vertices, normals
            ),
        }
    }
}

#[derive(Debug)]
pub enum EncodeError {
    IoFailure(io::Error),
    InvalidString(String),
    UnsupportedScene(UnsupportedScene),
    Format(binrw::Error),
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::IoFailure(error) => write!(f, "Failed to write PMOD data: {}", error),
            EncodeError::InvalidString(value) => {
                write!(f, "Name {:?} contains a null character", value)
            }
            EncodeError::UnsupportedScene(reason) => Display::fmt(reason, f),
            EncodeError::Format(error) => Display::fmt(error, f),
        }
    }
}

impl Error for EncodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EncodeError::IoFailure(error) => Some(error),
            EncodeError::Format(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for EncodeError {
    fn from(value: io::Error) -> Self {
        EncodeError::IoFailure(value)
    }
}

impl From<binrw::Error> for EncodeError {
    fn from(value: binrw::Error) -> Self {
        match value {
            binrw::Error::Io(error) => EncodeError::IoFailure(error),
            binrw::Error::Backtrace(backtrace) => EncodeError::from(*backtrace.error),
            other => EncodeError::Format(other),
        }
    }
}

impl From<UnsupportedScene> for EncodeError {
    fn from(value: UnsupportedScene) -> Self {
        EncodeError::UnsupportedScene(value)
    }
}

fn text(value: &str) -> Result<NullString, EncodeError> {
    if value.contains('\0') {
        return Err(EncodeError::InvalidString(value.to_string()));
    }
    Ok(NullString::from(value))
}

fn count_u32(mesh: &Mesh, count: usize) -> Result<u32, UnsupportedScene> {
    u32::try_from(count).map_err(|_| UnsupportedScene::TooManyElements {
        mesh: mesh.name.clone(),
        count,
    })
}

/// Pick the armature object whose data becomes the skeleton section.
fn select_armature<'a>(
    scene: &'a Scene,
    policy: ArmaturePolicy,
) -> Result<Option<(&'a SceneObject, &'a Armature)>, EncodeError> {
    let mut armatures = scene
        .objects
        .iter()
        .filter_map(|object| object.as_armature().map(|armature| (object, armature)));
    let Some(first) = armatures.next() else {
        return Ok(None);
    };
    let skipped: Vec<&str> = armatures.map(|(object, _)| object.name.as_str()).collect();
    if !skipped.is_empty() {
        match policy {
            ArmaturePolicy::Reject => {
                return Err(UnsupportedScene::MultipleArmatures(skipped.len() + 1).into());
            }
            ArmaturePolicy::FirstFound => {
                warn!(
                    "Exporting armature {:?}, ignoring other armatures {:?}",
                    first.0.name, skipped
                );
            }
        }
    }
    Ok(Some(first))
}

fn skeleton_record(name: &str, armature: &Armature) -> Result<SkeletonRecord, EncodeError> {
    let bones = armature
        .bones
        .iter()
        .map(|bone| -> Result<BoneRecord, EncodeError> {
            let parent = match bone.parent {
                None => ROOT_PARENT,
                Some(index) => armature
                    .bones
                    .get(index)
                    .map(|parent| parent.name.as_str())
                    .ok_or_else(|| UnsupportedScene::DanglingBoneParent {
                        bone: bone.name.clone(),
                        parent: index,
                    })?,
            };
            Ok(BoneRecord {
                name: text(&bone.name)?,
                parent: text(parent)?,
                inverse_bind_matrix: bone.inverse_bind_matrix,
            })
        })
        .collect::<Result<_, _>>()?;
    Ok(SkeletonRecord {
        name: text(name)?,
        bones,
    })
}

fn mesh_record(mesh: &Mesh) -> Result<MeshRecord<'_>, EncodeError> {
    if mesh.normals.len() != mesh.vertices.len() {
        return Err(UnsupportedScene::NormalCountMismatch {
            mesh: mesh.name.clone(),
            vertices: mesh.vertices.len(),
            normals: mesh.normals.len(),
        }
        .into());
    }
    let counts = MeshCounts {
        num_indices: count_u32(mesh, mesh.num_indices())?,
        num_vertices: count_u32(mesh, mesh.num_vertices())?,
        num_uvs: count_u32(mesh, mesh.num_uvs())?,
        reserved: [0, 0],
    };
    trace!("Mesh {:?}: {:?}", mesh.name, counts);
    Ok(MeshRecord {
        name: text(&mesh.name)?,
        counts,
        mesh,
    })
}

fn parent_name<'a>(scene: &'a Scene, object: &SceneObject) -> Result<&'a str, EncodeError> {
    let Some(index) = object.parent else {
        return Ok(ROOT_PARENT);
    };
    match scene.get(index) {
        None => Err(UnsupportedScene::DanglingParent {
            object: object.name.clone(),
            parent: index,
        }
        .into()),
        Some(parent) if parent.is_armature() => Ok(ROOT_PARENT),
        Some(parent) => Ok(&parent.name),
    }
}

fn node_record<'a>(
    scene: &'a Scene,
    object: &'a SceneObject,
    options: &EncodeOptions,
) -> Result<NodeRecord<'a>, EncodeError> {
    let parent = parent_name(scene, object)?;
    trace!("Node {:?} (parent {:?}, {:?})", object.name, parent, object.kind());
    Ok(NodeRecord {
        name: text(&object.name)?,
        parent: text(parent)?,
        transform: TransformRecord::new(&object.transform, options.quaternion_order),
        mesh: object.as_mesh().map(mesh_record).transpose()?,
    })
}

/// Lay out the whole file without writing anything.
pub fn layout<'a>(
    scene: &'a Scene,
    options: &EncodeOptions,
) -> Result<PmodFile<'a>, EncodeError> {
    let armature = select_armature(scene, options.armature_policy)?;
    let num_nodes = scene.nodes().count();
    let flags = PmodFlags::new()
        .with_has_nodes(num_nodes > 0)
        .with_has_armature(armature.is_some());
    debug!("PMOD flags: {:?}", flags);

    let node_count =
        u8::try_from(num_nodes).map_err(|_| UnsupportedScene::TooManyNodes(num_nodes))?;
    let skeleton = match armature {
        Some((object, armature)) => {
            let num_bones = armature.bones.len();
            let bone_count =
                u8::try_from(num_bones).map_err(|_| UnsupportedScene::TooManyBones(num_bones))?;
            debug!(
                "Skeleton {:?} (armature {:?}): {} bones, {} nodes",
                object.name, armature.name, bone_count, node_count
            );
            SkeletonSection {
                bone_count,
                node_count,
                skeleton: Some(skeleton_record(&object.name, armature)?),
            }
        }
        None => {
            debug!("No skeleton, {} nodes", node_count);
            SkeletonSection {
                bone_count: 0,
                node_count,
                skeleton: None,
            }
        }
    };

    let nodes = scene
        .nodes()
        .map(|object| node_record(scene, object, options))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PmodFile {
        header: PmodHeader::new(flags),
        skeleton,
        nodes,
    })
}

/// Encode a scene with the default [`EncodeOptions`].
pub fn encode<W: Write>(scene: &Scene, sink: W) -> Result<(), EncodeError> {
    encode_with_options(scene, sink, &EncodeOptions::default())
}

/// Encode a scene into `sink`.
///
/// The sink only ever receives forward writes. On error the sink may hold a
/// partial file; discarding it is up to the caller.
pub fn encode_with_options<W: Write>(
    scene: &Scene,
    sink: W,
    options: &EncodeOptions,
) -> Result<(), EncodeError> {
    let file = layout(scene, options)?;
    let mut writer = NoSeek::new(sink);
    file.write_options(&mut writer, Endian::Big, ())?;
    writer.flush()?;
    Ok(())
}
