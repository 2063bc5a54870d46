use glam::{Mat4, Quat, Vec3};

use super::{mesh::Mesh, skin::Armature};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecomposedTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for DecomposedTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Transform as handed over by a scene provider, either already decomposed
/// or as a plain local matrix.
#[derive(Debug, Clone, Copy)]
pub enum NodeTransform {
    Matrix(Mat4),
    Decomposed(DecomposedTransform),
}

impl From<DecomposedTransform> for Mat4 {
    fn from(value: DecomposedTransform) -> Self {
        Mat4::from_scale_rotation_translation(value.scale, value.rotation, value.translation)
    }
}

impl From<NodeTransform> for Mat4 {
    fn from(value: NodeTransform) -> Self {
        match value {
            NodeTransform::Matrix(matrix) => matrix,
            NodeTransform::Decomposed(decomposed) => decomposed.into(),
        }
    }
}

impl From<NodeTransform> for DecomposedTransform {
    fn from(value: NodeTransform) -> Self {
        match value {
            NodeTransform::Matrix(matrix) => {
                let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
                DecomposedTransform {
                    translation,
                    rotation,
                    scale,
                }
            }
            NodeTransform::Decomposed(decomposed) => decomposed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Armature,
    Mesh,
    Other,
}

/// Payload carried by a scene object. The variant decides the object kind,
/// so a mesh is present exactly when the object is a mesh object.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObjectData {
    Armature(Armature),
    Mesh(Mesh),
    #[default]
    Other,
}

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SceneObject {
    pub name: String,
    /// Index of the parent object in [`Scene::objects`](crate::scene::Scene::objects).
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<usize>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub transform: DecomposedTransform,
    #[cfg_attr(feature = "serde", serde(default))]
    pub data: ObjectData,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, data: ObjectData) -> Self {
        Self {
            name: name.into(),
            parent: None,
            transform: DecomposedTransform::default(),
            data,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, ObjectData::Other)
    }

    pub fn mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        Self::new(name, ObjectData::Mesh(mesh))
    }

    pub fn armature(name: impl Into<String>, armature: Armature) -> Self {
        Self::new(name, ObjectData::Armature(armature))
    }

    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_transform(mut self, transform: impl Into<DecomposedTransform>) -> Self {
        self.transform = transform.into();
        self
    }

    pub fn kind(&self) -> ObjectKind {
        match self.data {
            ObjectData::Armature(_) => ObjectKind::Armature,
            ObjectData::Mesh(_) => ObjectKind::Mesh,
            ObjectData::Other => ObjectKind::Other,
        }
    }

    pub fn is_armature(&self) -> bool {
        self.kind() == ObjectKind::Armature
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match &self.data {
            ObjectData::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_armature(&self) -> Option<&Armature> {
        match &self.data {
            ObjectData::Armature(armature) => Some(armature),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use glam::{Mat4, Quat, Vec3};

    use super::{DecomposedTransform, NodeTransform, ObjectKind, SceneObject};
    use crate::{mesh::Mesh, skin::Armature};

    #[test]
    fn test_matrix_decompose() {
        let transform = DecomposedTransform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        let matrix: Mat4 = transform.into();
        let decomposed = DecomposedTransform::from(NodeTransform::Matrix(matrix));
        assert!(decomposed.translation.abs_diff_eq(transform.translation, 1e-5));
        assert!(decomposed.rotation.dot(transform.rotation).abs() > 1.0 - 1e-5);
        assert!(decomposed.scale.abs_diff_eq(transform.scale, 1e-5));
    }

    #[test]
    fn test_kind_follows_data() {
        assert_eq!(SceneObject::empty("Empty").kind(), ObjectKind::Other);
        assert_eq!(
            SceneObject::mesh("Cube", Mesh::new("Cube")).kind(),
            ObjectKind::Mesh
        );
        let armature = SceneObject::armature("Armature", Armature::new("Armature"));
        assert!(armature.is_armature());
        assert!(armature.as_mesh().is_none());
    }
}
