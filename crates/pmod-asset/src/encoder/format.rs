//! Record types of the PMOD layout.
//!
//! Every multi-byte field is big-endian. Strings are null-terminated with no
//! length prefix. The stream is strictly forward: each count precedes the
//! payload it describes.

use std::io::{Seek, Write};

use binrw::{BinResult, BinWrite, Endian, NullString};
use glam::{Mat4, Quat};
use modular_bitfield::prelude::*;

use crate::{mesh::Mesh, node::DecomposedTransform};

pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;

/// Mesh count written for every node. Non-mesh nodes carry it too, even
/// though no mesh record follows them.
pub const MESH_COUNT: u32 = 1;

/// Parent name written for top level nodes, root bones and nodes parented
/// to the armature object.
pub const ROOT_PARENT: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuaternionOrder {
    /// w, x, y, z
    #[default]
    WFirst,
    /// x, y, z, w
    WLast,
}

impl QuaternionOrder {
    pub fn arrange(self, rotation: Quat) -> [f32; 4] {
        match self {
            QuaternionOrder::WFirst => [rotation.w, rotation.x, rotation.y, rotation.z],
            QuaternionOrder::WLast => rotation.to_array(),
        }
    }
}

#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmodFlags {
    pub has_nodes: bool,
    pub has_armature: bool,
    #[skip]
    __: B6,
}

#[derive(Debug, Clone, BinWrite)]
#[bw(big, magic = b"PMOD")]
pub struct PmodHeader {
    pub major_version: u8,
    pub minor_version: u8,
    #[bw(map = |flags: &PmodFlags| flags.into_bytes())]
    pub flags: PmodFlags,
}

impl PmodHeader {
    pub fn new(flags: PmodFlags) -> Self {
        Self {
            major_version: VERSION_MAJOR,
            minor_version: VERSION_MINOR,
            flags,
        }
    }
}

#[derive(Debug, Clone, BinWrite)]
#[bw(big)]
pub struct BoneRecord {
    pub name: NullString,
    pub parent: NullString,
    /// Written row-major.
    #[bw(map = |matrix: &Mat4| matrix.transpose().to_cols_array())]
    pub inverse_bind_matrix: Mat4,
}

#[derive(Debug, Clone, BinWrite)]
#[bw(big)]
pub struct SkeletonRecord {
    pub name: NullString,
    pub bones: Vec<BoneRecord>,
}

/// Bone and node counts, followed by the skeleton when an armature exists.
#[derive(Debug, Clone, BinWrite)]
#[bw(big)]
pub struct SkeletonSection {
    pub bone_count: u8,
    pub node_count: u8,
    pub skeleton: Option<SkeletonRecord>,
}

#[derive(Debug, Clone, Copy, BinWrite)]
#[bw(big)]
pub struct TransformRecord {
    pub location: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl TransformRecord {
    pub fn new(transform: &DecomposedTransform, order: QuaternionOrder) -> Self {
        Self {
            location: transform.translation.to_array(),
            rotation: order.arrange(transform.rotation),
            scale: transform.scale.to_array(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinWrite)]
#[bw(big)]
pub struct MeshCounts {
    pub num_indices: u32,
    pub num_vertices: u32,
    pub num_uvs: u32,
    /// Joint and weight counts, always zero.
    pub reserved: [u32; 2],
}

/// Mesh sub-record. Arrays are streamed straight from the borrowed mesh.
#[derive(Debug, Clone)]
pub struct MeshRecord<'a> {
    pub name: NullString,
    pub counts: MeshCounts,
    pub mesh: &'a Mesh,
}

impl BinWrite for MeshRecord<'_> {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.name.write_options(writer, endian, ())?;
        self.counts.write_options(writer, endian, ())?;
        for index in self.mesh.indices() {
            index.write_options(writer, endian, ())?;
        }
        for uv in &self.mesh.uvs {
            uv.write_options(writer, endian, ())?;
        }
        for position in &self.mesh.vertices {
            position.write_options(writer, endian, ())?;
        }
        for normal in &self.mesh.normals {
            normal.write_options(writer, endian, ())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NodeRecord<'a> {
    pub name: NullString,
    pub parent: NullString,
    pub transform: TransformRecord,
    pub mesh: Option<MeshRecord<'a>>,
}

impl BinWrite for NodeRecord<'_> {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.name.write_options(writer, endian, ())?;
        self.parent.write_options(writer, endian, ())?;
        self.transform.write_options(writer, endian, ())?;
        MESH_COUNT.write_options(writer, endian, ())?;
        if let Some(mesh) = &self.mesh {
            mesh.write_options(writer, endian, ())?;
        }
        Ok(())
    }
}

/// Fully laid out file, borrowing mesh arrays from the scene.
#[derive(Debug, Clone)]
pub struct PmodFile<'a> {
    pub header: PmodHeader,
    pub skeleton: SkeletonSection,
    pub nodes: Vec<NodeRecord<'a>>,
}

impl BinWrite for PmodFile<'_> {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<()> {
        self.header.write_options(writer, endian, ())?;
        self.skeleton.write_options(writer, endian, ())?;
        for node in &self.nodes {
            node.write_options(writer, endian, ())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::{BinWrite, NullString};
    use glam::{Mat4, Quat, Vec3};

    use super::{BoneRecord, PmodFlags, PmodHeader, QuaternionOrder, TransformRecord};
    use crate::node::DecomposedTransform;

    #[test]
    fn test_header_bytes() {
        let flags = PmodFlags::new().with_has_nodes(true).with_has_armature(true);
        let mut cursor = Cursor::new(Vec::new());
        PmodHeader::new(flags).write(&mut cursor).unwrap();
        assert_eq!(cursor.into_inner(), b"PMOD\x01\x00\x03");

        let flags = PmodFlags::new().with_has_armature(true);
        assert_eq!(flags.into_bytes(), [0b10]);
    }

    #[test]
    fn test_bone_matrix_row_major() {
        let bone = BoneRecord {
            name: NullString::from("b"),
            parent: NullString::from("root"),
            inverse_bind_matrix: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
        };
        let mut cursor = Cursor::new(Vec::new());
        bone.write(&mut cursor).unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(&bytes[..7], b"b\0root\0");
        let floats: Vec<f32> = bytes[7..]
            .chunks_exact(4)
            .map(|chunk| f32::from_be_bytes(chunk.try_into().unwrap()))
            .collect();
        // The translation sits in the last column, i.e. at the end of each row.
        assert_eq!(floats[3], 1.0);
        assert_eq!(floats[7], 2.0);
        assert_eq!(floats[11], 3.0);
        assert_eq!(floats[15], 1.0);
    }

    #[test]
    fn test_quaternion_order() {
        let rotation = Quat::from_xyzw(0.1, 0.2, 0.3, 0.9);
        assert_eq!(QuaternionOrder::WFirst.arrange(rotation), [0.9, 0.1, 0.2, 0.3]);
        assert_eq!(QuaternionOrder::WLast.arrange(rotation), [0.1, 0.2, 0.3, 0.9]);

        let transform = DecomposedTransform::default();
        let record = TransformRecord::new(&transform, QuaternionOrder::WFirst);
        assert_eq!(record.rotation, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(record.scale, [1.0; 3]);
    }
}
