/// GLTF loader with `gltf` crate.
#[cfg(feature = "gltf")]
pub mod gltf;

/// OBJ loader with `tobj` crate.
#[cfg(feature = "obj")]
pub mod obj;

#[derive(Debug, Clone)]
pub struct LoadParams {
    /// Flip the V coordinate so UVs use a bottom-left origin.
    pub flip_v: bool,
    /// Scene to load from a GLTF document. The default scene is used when
    /// unset, or the first one if the document has no default.
    pub scene: Option<usize>,
}

impl Default for LoadParams {
    fn default() -> Self {
        Self {
            flip_v: true,
            scene: None,
        }
    }
}

#[cfg(feature = "obj")]
#[inline]
fn chunk_vec2(data: &[f32]) -> Vec<[f32; 2]> {
    data.chunks_exact(2).map(|item| [item[0], item[1]]).collect()
}

#[cfg(any(feature = "gltf", feature = "obj"))]
#[inline]
fn chunk_vec3<T: Copy>(data: &[T]) -> Vec<[T; 3]> {
    data.chunks_exact(3)
        .map(|item| [item[0], item[1], item[2]])
        .collect()
}

#[cfg(feature = "gltf")]
#[inline]
fn flip_uv([u, v]: [f32; 2]) -> [f32; 2] {
    [u, 1.0 - v]
}
