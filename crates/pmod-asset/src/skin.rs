use glam::Mat4;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone in the owning [`Armature::bones`].
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<usize>,
    pub inverse_bind_matrix: Mat4,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, inverse_bind_matrix: Mat4) -> Self {
        Self {
            name: name.into(),
            parent,
            inverse_bind_matrix,
        }
    }

    /// Build a bone from its bind pose in armature space.
    pub fn from_bind_matrix(name: impl Into<String>, parent: Option<usize>, bind: Mat4) -> Self {
        Self::new(name, parent, bind.inverse())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Armature {
    pub name: String,
    pub bones: Vec<Bone>,
}

impl Armature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bones: Vec::new(),
        }
    }

    pub fn push_bone(&mut self, bone: Bone) -> usize {
        self.bones.push(bone);
        self.bones.len() - 1
    }

    pub fn parent_of(&self, bone: &Bone) -> Option<&Bone> {
        bone.parent.and_then(|index| self.bones.get(index))
    }
}

#[cfg(test)]
mod test {
    use glam::{Mat4, Vec3};

    use super::{Armature, Bone};

    #[test]
    fn test_inverse_bind() {
        let bind = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let bone = Bone::from_bind_matrix("Hip", None, bind);
        assert_eq!(
            bone.inverse_bind_matrix,
            Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0))
        );
    }

    #[test]
    fn test_parent_lookup() {
        let mut armature = Armature::new("Armature");
        let root = armature.push_bone(Bone::new("root_bone", None, Mat4::IDENTITY));
        let child = armature.push_bone(Bone::new("child_bone", Some(root), Mat4::IDENTITY));
        let child = &armature.bones[child];
        assert_eq!(armature.parent_of(child).map(|bone| bone.name.as_str()), Some("root_bone"));
        assert!(armature.parent_of(&armature.bones[root]).is_none());
    }
}
