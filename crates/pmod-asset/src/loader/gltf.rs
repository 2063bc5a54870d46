use std::{
    collections::HashMap,
    error::Error,
    fmt::{self, Display, Formatter},
    path::Path,
};

use glam::{Mat4, Quat, Vec3};
use gltf::{buffer, mesh::Mode, scene::Transform, Document, Node, Skin};
use log::{debug, warn};

use crate::{
    mesh::{corner_uvs, Mesh},
    node::{DecomposedTransform, NodeTransform, ObjectData, SceneObject},
    scene::Scene,
    skin::{Armature, Bone},
};

use super::{chunk_vec3, flip_uv, LoadParams};

#[derive(Debug)]
pub enum GltfLoadError {
    Gltf(gltf::Error),
    NoScene,
    UnsupportedPrimitiveMode(Mode),
    MissingPositions(String),
}

impl Display for GltfLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GltfLoadError::Gltf(error) => Display::fmt(error, f),
            GltfLoadError::NoScene => write!(f, "No scene to load"),
            GltfLoadError::UnsupportedPrimitiveMode(mode) => {
                write!(f, "Unsupported primitive mode: {:?}", mode)
            }
            GltfLoadError::MissingPositions(mesh) => {
                write!(f, "Mesh {} has a primitive without positions", mesh)
            }
        }
    }
}

impl Error for GltfLoadError {}

impl From<gltf::Error> for GltfLoadError {
    fn from(value: gltf::Error) -> Self {
        GltfLoadError::Gltf(value)
    }
}

fn node_name(node: &Node) -> String {
    node.name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node.{}", node.index()))
}

struct GltfSceneLoader<'a> {
    buffers: &'a [buffer::Data],
    params: &'a LoadParams,
    /// Node index to bone index of the exported skin.
    joints: HashMap<usize, usize>,
    armature: Option<usize>,
    scene: Scene,
}

impl<'a> GltfSceneLoader<'a> {
    fn new(buffers: &'a [buffer::Data], params: &'a LoadParams) -> Self {
        Self {
            buffers,
            params,
            joints: HashMap::new(),
            armature: None,
            scene: Scene::new(),
        }
    }

    fn load_armature(&mut self, document: &Document, skin: &Skin) {
        let mut parents = HashMap::new();
        for node in document.nodes() {
            for child in node.children() {
                parents.insert(child.index(), node.index());
            }
        }

        for (bone, joint) in skin.joints().enumerate() {
            self.joints.insert(joint.index(), bone);
        }

        let buffers = self.buffers;
        let inverse_bind_matrices: Vec<Mat4> = skin
            .reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()))
            .read_inverse_bind_matrices()
            .map(|matrices| {
                matrices
                    .map(|matrix| Mat4::from_cols_array_2d(&matrix))
                    .collect()
            })
            .unwrap_or_default();

        let mut armature = Armature::new(skin.name().unwrap_or("Armature"));
        for (index, joint) in skin.joints().enumerate() {
            let mut parent = None;
            let mut current = joint.index();
            while let Some(ancestor) = parents.get(&current) {
                if let Some(bone) = self.joints.get(ancestor) {
                    parent = Some(*bone);
                    break;
                }
                current = *ancestor;
            }
            let inverse_bind_matrix = inverse_bind_matrices
                .get(index)
                .copied()
                .unwrap_or(Mat4::IDENTITY);
            armature.push_bone(Bone::new(node_name(&joint), parent, inverse_bind_matrix));
        }

        debug!(
            "Armature {:?} with {} bones",
            armature.name,
            armature.bones.len()
        );
        let object = SceneObject::armature(armature.name.clone(), armature);
        self.armature = Some(self.scene.push(object));
    }

    fn load_mesh(&self, mesh: gltf::Mesh) -> Result<Mesh, GltfLoadError> {
        let name = mesh
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("mesh.{}", mesh.index()));
        let buffers = self.buffers;

        let mut result = Mesh::new(name.clone());
        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                return Err(GltfLoadError::UnsupportedPrimitiveMode(primitive.mode()));
            }
            let reader =
                primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

            let vertices: Vec<[f32; 3]> = reader
                .read_positions()
                .ok_or_else(|| GltfLoadError::MissingPositions(name.clone()))?
                .collect();
            let normals = match reader.read_normals() {
                Some(normals) => normals.collect(),
                None => {
                    debug!("Mesh {:?} has a primitive without normals", name);
                    vec![[0.0, 0.0, 0.0]; vertices.len()]
                }
            };
            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };
            let triangles = chunk_vec3(&indices);
            let uvs = reader
                .read_tex_coords(0)
                .map(|tex_coords| {
                    let per_vertex: Vec<[f32; 2]> = tex_coords
                        .into_f32()
                        .map(|uv| if self.params.flip_v { flip_uv(uv) } else { uv })
                        .collect();
                    corner_uvs(&triangles, &per_vertex)
                })
                .unwrap_or_default();

            result.append(Mesh {
                name: name.clone(),
                vertices,
                normals,
                triangles,
                uvs,
            });
        }
        Ok(result)
    }

    fn load_node(&mut self, node: Node, parent: Option<usize>) -> Result<(), GltfLoadError> {
        if self.joints.contains_key(&node.index()) {
            if let Some(mesh) = node.mesh() {
                warn!(
                    "Ignoring mesh {:?} on joint node {:?}",
                    mesh.name().unwrap_or_default(),
                    node_name(&node)
                );
            }
            for child in node.children() {
                self.load_node(child, self.armature)?;
            }
            return Ok(());
        }

        let transform = match node.transform() {
            Transform::Matrix { matrix } => NodeTransform::Matrix(Mat4::from_cols_array_2d(&matrix)),
            Transform::Decomposed {
                translation,
                rotation,
                scale,
            } => NodeTransform::Decomposed(DecomposedTransform {
                translation: Vec3::from_array(translation),
                rotation: Quat::from_array(rotation),
                scale: Vec3::from_array(scale),
            }),
        };
        let data = match node.mesh() {
            Some(mesh) => ObjectData::Mesh(self.load_mesh(mesh)?),
            None => ObjectData::Other,
        };
        let mut object = SceneObject::new(node_name(&node), data).with_transform(transform);
        object.parent = parent;
        let index = self.scene.push(object);

        for child in node.children() {
            self.load_node(child, Some(index))?;
        }
        Ok(())
    }
}

fn find_skins<'a>(node: Node<'a>, skins: &mut Vec<Skin<'a>>) {
    if let Some(skin) = node.skin() {
        if skins.iter().all(|known| known.index() != skin.index()) {
            skins.push(skin);
        }
    }
    for child in node.children() {
        find_skins(child, skins);
    }
}

/// Build a scene from an imported GLTF document.
///
/// Only the first skin referenced by the scene is exported as the armature.
/// Its joints become bones and are not exported as nodes.
pub fn load_document(
    document: &Document,
    buffers: &[buffer::Data],
    params: &LoadParams,
) -> Result<Scene, GltfLoadError> {
    let gltf_scene = match params.scene {
        Some(index) => document.scenes().nth(index),
        None => document
            .default_scene()
            .or_else(|| document.scenes().next()),
    }
    .ok_or(GltfLoadError::NoScene)?;

    let mut skins = Vec::new();
    for node in gltf_scene.nodes() {
        find_skins(node, &mut skins);
    }

    let mut loader = GltfSceneLoader::new(buffers, params);
    if let Some((skin, ignored)) = skins.split_first() {
        if !ignored.is_empty() {
            warn!(
                "Only one skin is exported, ignoring {} other skins",
                ignored.len()
            );
        }
        loader.load_armature(document, skin);
    }
    for node in gltf_scene.nodes() {
        loader.load_node(node, None)?;
    }

    let mut scene = loader.scene;
    scene.name = gltf_scene.name().map(str::to_string);
    Ok(scene)
}

pub fn load_gltf(path: impl AsRef<Path>, params: &LoadParams) -> Result<Scene, GltfLoadError> {
    let (document, buffers, _images) = gltf::import(path)?;
    load_document(&document, &buffers, params)
}

pub fn load_gltf_from_slice(buffer: &[u8], params: &LoadParams) -> Result<Scene, GltfLoadError> {
    let (document, buffers, _images) = gltf::import_slice(buffer)?;
    load_document(&document, &buffers, params)
}

#[cfg(test)]
mod test {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use glam::Mat4;
    use serde_json::json;

    use super::load_gltf_from_slice;
    use crate::{encode, loader::LoadParams, node::ObjectKind};

    fn buffer() -> Vec<u8> {
        let mut data = Vec::new();
        let floats: [f32; 24] = [
            // positions
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
            // normals
            0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, //
            // tex coords
            0.0, 0.0, 1.0, 0.0, 0.0, 1.0,
        ];
        for value in floats {
            data.extend_from_slice(&value.to_le_bytes());
        }
        for index in [0u32, 1, 2] {
            data.extend_from_slice(&index.to_le_bytes());
        }
        data
    }

    fn document() -> Vec<u8> {
        let data = buffer();
        let gltf = json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "name": "Main", "nodes": [0] }],
            "nodes": [
                { "name": "Rig", "children": [1, 3] },
                { "name": "Hip", "translation": [0.0, 1.0, 0.0], "children": [2] },
                { "name": "Spine", "children": [4] },
                { "name": "Body", "mesh": 0, "skin": 0, "rotation": [0.0, 0.0, 0.0, 1.0] },
                { "name": "Prop" }
            ],
            "skins": [{ "name": "Skeleton", "joints": [1, 2] }],
            "meshes": [{
                "name": "BodyMesh",
                "primitives": [{
                    "attributes": { "POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2 },
                    "indices": 3
                }]
            }],
            "accessors": [
                {
                    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
                },
                { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" },
                { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC2" },
                { "bufferView": 3, "componentType": 5125, "count": 3, "type": "SCALAR" }
            ],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 72, "byteLength": 24 },
                { "buffer": 0, "byteOffset": 96, "byteLength": 12 }
            ],
            "buffers": [{
                "byteLength": data.len(),
                "uri": format!("data:application/octet-stream;base64,{}", STANDARD.encode(&data))
            }]
        });
        serde_json::to_vec(&gltf).unwrap()
    }

    #[test]
    fn test_load_skinned_scene() {
        let scene = load_gltf_from_slice(&document(), &LoadParams::default()).unwrap();
        assert_eq!(scene.name.as_deref(), Some("Main"));

        let names: Vec<_> = scene.objects.iter().map(|object| object.name.as_str()).collect();
        assert_eq!(names, vec!["Skeleton", "Rig", "Prop", "Body"]);
        assert_eq!(scene.objects[0].kind(), ObjectKind::Armature);
        assert_eq!(scene.objects[1].parent, None);
        assert_eq!(scene.objects[2].parent, Some(0));
        assert_eq!(scene.objects[3].parent, Some(1));

        let armature = scene.objects[0].as_armature().unwrap();
        assert_eq!(armature.bones.len(), 2);
        assert_eq!(armature.bones[0].name, "Hip");
        assert_eq!(armature.bones[0].parent, None);
        assert_eq!(armature.bones[1].name, "Spine");
        assert_eq!(armature.bones[1].parent, Some(0));
        assert_eq!(armature.bones[1].inverse_bind_matrix, Mat4::IDENTITY);

        let mesh = scene.objects[3].as_mesh().unwrap();
        assert_eq!(mesh.name, "BodyMesh");
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
        assert_eq!(mesh.normals, vec![[0.0, 0.0, 1.0]; 3]);
        assert_eq!(mesh.uvs, vec![[0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]);
    }

    #[test]
    fn test_export_loaded_scene() {
        let scene = load_gltf_from_slice(&document(), &LoadParams::default()).unwrap();
        let mut bytes = Vec::new();
        encode(&scene, &mut bytes).unwrap();
        assert_eq!(&bytes[..9], b"PMOD\x01\x00\x03\x02\x03");
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("Skeleton\0Hip\0root\0"));
        assert!(text.contains("Prop\0root\0"));
        assert!(text.contains("Body\0Rig\0"));
    }

    #[test]
    fn test_mesh_on_joint_is_skipped() {
        let mut gltf: serde_json::Value = serde_json::from_slice(&document()).unwrap();
        gltf["nodes"][2]["mesh"] = json!(0);
        let bytes = serde_json::to_vec(&gltf).unwrap();

        let scene = load_gltf_from_slice(&bytes, &LoadParams::default()).unwrap();
        let names: Vec<_> = scene.objects.iter().map(|object| object.name.as_str()).collect();
        assert_eq!(names, vec!["Skeleton", "Rig", "Prop", "Body"]);
        assert_eq!(scene.objects.iter().filter(|object| object.as_mesh().is_some()).count(), 1);
    }

    #[test]
    fn test_keep_v() {
        let params = LoadParams {
            flip_v: false,
            ..Default::default()
        };
        let scene = load_gltf_from_slice(&document(), &params).unwrap();
        let mesh = scene.objects[3].as_mesh().unwrap();
        assert_eq!(mesh.uvs, vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
    }
}
