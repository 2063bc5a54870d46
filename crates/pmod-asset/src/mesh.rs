pub type Position = Vec<[f32; 3]>;
pub type Normal = Vec<[f32; 3]>;
pub type TexCoord = Vec<[f32; 2]>;
pub type Triangles = Vec<[u32; 3]>;

/// Final (evaluated and triangulated) mesh data of a mesh object.
///
/// `normals` is index-aligned with `vertices`. `uvs` holds one entry per
/// triangle corner of the active UV channel, in corner order, and is empty
/// when there is no active channel.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    pub name: String,
    pub vertices: Position,
    pub normals: Normal,
    pub triangles: Triangles,
    #[cfg_attr(feature = "serde", serde(default))]
    pub uvs: TexCoord,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn num_indices(&self) -> usize {
        self.triangles.len() * 3
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_uvs(&self) -> usize {
        self.uvs.len()
    }

    /// Flattened triangle list, three indices per triangle in winding order.
    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.triangles.iter().flatten().copied()
    }

    /// Append the geometry of another triangle list, offsetting its indices
    /// past the vertices already present.
    pub fn append(&mut self, mut other: Mesh) {
        let base = index_offset(self.vertices.len());
        let had_uvs = !self.uvs.is_empty();
        let corners = self.num_indices();
        if !had_uvs && !other.uvs.is_empty() {
            self.uvs.resize(corners, [0.0, 0.0]);
        } else if had_uvs && other.uvs.is_empty() {
            other.uvs.resize(other.num_indices(), [0.0, 0.0]);
        }
        self.vertices.append(&mut other.vertices);
        self.normals.append(&mut other.normals);
        self.triangles.extend(
            other
                .triangles
                .iter()
                .map(|triangle| triangle.map(|index| index.saturating_add(base))),
        );
        self.uvs.append(&mut other.uvs);
    }
}

/// Saturates past `u32::MAX`; the encoder rejects such a vertex count as
/// too many elements.
fn index_offset(vertices: usize) -> u32 {
    u32::try_from(vertices).unwrap_or(u32::MAX)
}

/// Expand per-vertex coordinates to per-corner coordinates.
pub fn corner_uvs(triangles: &[[u32; 3]], per_vertex: &[[f32; 2]]) -> TexCoord {
    triangles
        .iter()
        .flatten()
        .map(|index| {
            per_vertex
                .get(*index as usize)
                .copied()
                .unwrap_or([0.0, 0.0])
        })
        .collect()
}
