//! Export scene graphs to the PMOD binary model format.
//!
//! A [`Scene`](scene::Scene) is a flat, ordered list of objects (meshes, empties
//! and at most one armature) with index based parent links. The
//! [`encoder`] turns it into a PMOD byte stream; the loaders build scenes
//! from GLTF and OBJ files so they can be converted.
//!
pub mod encoder;
/// Scene providers for various formats
pub mod loader;
pub mod mesh;
pub mod node;
pub mod scene;
pub mod skin;

pub use encoder::{encode, encode_with_options, EncodeError, EncodeOptions};
