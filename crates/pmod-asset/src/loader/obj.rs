use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io::BufRead,
    path::Path,
};

use log::debug;
use tobj::{LoadError, LoadOptions, Model};

use crate::{
    mesh::{corner_uvs, Mesh},
    node::SceneObject,
    scene::Scene,
};

use super::{chunk_vec2, chunk_vec3};

#[derive(Debug)]
pub enum ObjLoadError {
    Obj(LoadError),
}

impl Display for ObjLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ObjLoadError::Obj(err) => Display::fmt(&err, f),
        }
    }
}

impl Error for ObjLoadError {}

impl From<LoadError> for ObjLoadError {
    fn from(value: LoadError) -> Self {
        ObjLoadError::Obj(value)
    }
}

fn load_options() -> LoadOptions {
    LoadOptions {
        single_index: true,
        triangulate: true,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    }
}

fn load_model(model: Model) -> SceneObject {
    let mesh = model.mesh;

    let vertices = chunk_vec3(&mesh.positions);
    let normals = if !mesh.normals.is_empty() {
        chunk_vec3(&mesh.normals)
    } else {
        debug!("Model {:?} has no normals", model.name);
        vec![[0.0, 0.0, 0.0]; vertices.len()]
    };
    let triangles = chunk_vec3(&mesh.indices);
    let uvs = if !mesh.texcoords.is_empty() {
        corner_uvs(&triangles, &chunk_vec2(&mesh.texcoords))
    } else {
        vec![]
    };

    SceneObject::mesh(
        model.name.clone(),
        Mesh {
            name: model.name,
            vertices,
            normals,
            triangles,
            uvs,
        },
    )
}

fn load_models(models: Vec<Model>) -> Scene {
    let mut scene = Scene::new();
    for model in models {
        scene.push(load_model(model));
    }
    scene
}

/// Load an OBJ file. Every model becomes one root mesh object; materials
/// are not read.
pub fn load_obj(path: impl AsRef<Path>) -> Result<Scene, ObjLoadError> {
    let (models, _materials) = tobj::load_obj(path.as_ref(), &load_options())?;
    Ok(load_models(models))
}

pub fn load_obj_from_buffer<R: BufRead>(reader: &mut R) -> Result<Scene, ObjLoadError> {
    let (models, _materials) =
        tobj::load_obj_buf(reader, &load_options(), |_| Err(LoadError::OpenFileFailed))?;
    Ok(load_models(models))
}
