use super::node::SceneObject;

/// A resolved scene ready for export.
///
/// `objects` is an ordered list and its order is the on-disk node order:
/// encoders never sort it by name or hierarchy depth.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scene {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: Option<String>,
    pub objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object and return its index, usable as a parent link.
    pub fn push(&mut self, object: SceneObject) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&SceneObject> {
        self.objects.get(index)
    }

    pub fn parent_of(&self, object: &SceneObject) -> Option<&SceneObject> {
        object.parent.and_then(|index| self.objects.get(index))
    }

    pub fn armatures(&self) -> impl Iterator<Item = (usize, &SceneObject)> {
        self.objects
            .iter()
            .enumerate()
            .filter(|(_, object)| object.is_armature())
    }

    /// Objects written to the node section, in scene order.
    pub fn nodes(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|object| !object.is_armature())
    }
}
