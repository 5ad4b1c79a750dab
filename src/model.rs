//! External model loading.
//!
//! Models are glTF 2.0 files (`.gltf` or `.glb`). Every triangle primitive
//! reachable from the default scene is flattened into one [`Geometry`] with
//! node transforms applied.
//!
//! [`load_async`] runs the import on a worker thread and hands back a
//! [`PendingModel`]. The frame loop checks it with [`PendingModel::try_take`]
//! without blocking; anything else can simply `.await` it.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use glam::Mat4;

use crate::error::ModelError;
use crate::geometry::Geometry;

/// A loaded model, flattened to a single triangle mesh.
#[derive(Debug, Clone)]
pub struct Model {
    pub geometry: Geometry,
    /// Number of source meshes that contributed triangles.
    pub mesh_count: usize,
}

/// Import a glTF file synchronously.
pub fn load(path: impl AsRef<Path>) -> Result<Model, ModelError> {
    let path = path.as_ref();
    let (document, buffers, _images) = gltf::import(path).map_err(|source| ModelError::Import {
        path: path.to_path_buf(),
        source,
    })?;

    let mut model = Model {
        geometry: Geometry::default(),
        mesh_count: 0,
    };

    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            for node in scene.nodes() {
                append_node(path, &node, Mat4::IDENTITY, &buffers, &mut model)?;
            }
        }
        None => {
            for mesh in document.meshes() {
                append_mesh(path, &mesh, Mat4::IDENTITY, &buffers, &mut model)?;
            }
        }
    }

    if model.geometry.is_empty() {
        return Err(ModelError::NoMeshes(path.to_path_buf()));
    }

    log::debug!(
        "loaded '{}': {} meshes, {} vertices, {} triangles",
        path.display(),
        model.mesh_count,
        model.geometry.vertex_count(),
        model.geometry.indices.len() / 3
    );
    Ok(model)
}

fn append_node(
    path: &Path,
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    model: &mut Model,
) -> Result<(), ModelError> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        append_mesh(path, &mesh, world, buffers, model)?;
    }
    for child in node.children() {
        append_node(path, &child, world, buffers, model)?;
    }
    Ok(())
}

fn append_mesh(
    path: &Path,
    mesh: &gltf::Mesh,
    matrix: Mat4,
    buffers: &[gltf::buffer::Data],
    model: &mut Model,
) -> Result<(), ModelError> {
    let mut contributed = false;

    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            continue;
        }
        let reader = primitive.reader(|buffer| Some(buffers[buffer.index()].0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let indices: Vec<u32> = reader
            .read_indices()
            .map(|indices| indices.into_u32().collect())
            .unwrap_or_else(|| (0..positions.len() as u32).collect());
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(ModelError::InvalidIndices {
                path: path.to_path_buf(),
                index,
                vertex_count: positions.len(),
            });
        }

        let mut part = Geometry {
            positions,
            normals: reader.read_normals().map(|n| n.collect()).unwrap_or_default(),
            indices,
        };
        if part.normals.len() != part.positions.len() {
            part.compute_normals();
        }

        model.geometry.append(&part, matrix);
        contributed = true;
    }

    if contributed {
        model.mesh_count += 1;
    }
    Ok(())
}

/// A model load in flight.
pub struct PendingModel {
    rx: oneshot::Receiver<Result<Model, ModelError>>,
}

impl PendingModel {
    /// The result if the load has finished, `None` while it is still running.
    pub fn try_take(&mut self) -> Option<Result<Model, ModelError>> {
        match self.rx.try_recv() {
            Ok(result) => result,
            Err(oneshot::Canceled) => Some(Err(ModelError::Canceled)),
        }
    }
}

impl Future for PendingModel {
    type Output = Result<Model, ModelError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ModelError::Canceled)))
    }
}

/// Run `loader` on a worker thread.
pub fn load_with<F>(loader: F) -> PendingModel
where
    F: FnOnce() -> Result<Model, ModelError> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name("model-loader".into())
        .spawn(move || {
            // The receiver may be gone if the scene shut down first.
            let _ = tx.send(loader());
        });
    if let Err(e) = spawned {
        log::error!("failed to spawn model loader thread: {}", e);
    }
    PendingModel { rx }
}

/// Import `path` on a worker thread.
pub fn load_async(path: impl Into<PathBuf>) -> PendingModel {
    let path = path.into();
    log::info!("loading model '{}'", path.display());
    load_with(move || load(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::fs;

    // One triangle at (0,0,0), (1,0,0), (0,1,0), placed by a node 10 units along X.
    const TRIANGLE_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [{ "nodes": [0] }],
  "nodes": [{ "mesh": 0, "translation": [10.0, 0.0, 0.0] }],
  "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1 }] }],
  "buffers": [{
    "byteLength": 44,
    "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAA="
  }],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
    { "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
    { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }
  ]
}"#;

    const EMPTY_GLTF: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [{ "nodes": [0] }],
  "nodes": [{ "name": "empty" }]
}"#;

    fn write_temp(name: &str, contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_applies_node_transform() {
        let (_dir, path) = write_temp("triangle.gltf", TRIANGLE_GLTF);
        let model = load(&path).unwrap();

        assert_eq!(model.mesh_count, 1);
        assert_eq!(model.geometry.vertex_count(), 3);
        assert_eq!(model.geometry.indices, vec![0, 1, 2]);
        assert_eq!(model.geometry.positions[1], [11.0, 0.0, 0.0]);
        // No normals in the file: derived from the face.
        assert_eq!(Vec3::from(model.geometry.normals[0]), Vec3::Z);
    }

    #[test]
    fn test_load_without_meshes() {
        let (_dir, path) = write_temp("empty.gltf", EMPTY_GLTF);
        assert!(matches!(load(&path), Err(ModelError::NoMeshes(_))));
    }

    #[test]
    fn test_out_of_range_index_is_rejected() {
        // Third index 2 -> 9.
        let bad = TRIANGLE_GLTF.replace("ABAAIAAAA=", "ABAAkAAAA=");
        assert_ne!(bad, TRIANGLE_GLTF);
        let (_dir, path) = write_temp("bad_indices.gltf", &bad);

        let err = pollster::block_on(load_async(path)).unwrap_err();
        match err {
            ModelError::InvalidIndices { index, vertex_count, .. } => {
                assert_eq!(index, 9);
                assert_eq!(vertex_count, 3);
            }
            other => panic!("expected InvalidIndices, got {}", other),
        }
    }

    #[test]
    fn test_missing_file_is_import_error() {
        let err = load("/no/such/sword.glb").unwrap_err();
        assert!(matches!(err, ModelError::Import { .. }));
        assert!(err.to_string().contains("/no/such/sword.glb"));
    }

    #[test]
    fn test_load_async_resolves_as_future() {
        let (_dir, path) = write_temp("triangle.gltf", TRIANGLE_GLTF);
        let model = pollster::block_on(load_async(path)).unwrap();
        assert_eq!(model.mesh_count, 1);
    }

    #[test]
    fn test_try_take_reports_failure() {
        let mut pending = load_async("/no/such/sword.glb");
        let result = loop {
            if let Some(result) = pending.try_take() {
                break result;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        };
        assert!(matches!(result, Err(ModelError::Import { .. })));
    }

    #[test]
    fn test_dropped_loader_is_canceled() {
        let (tx, rx) = oneshot::channel::<Result<Model, ModelError>>();
        drop(tx);
        let mut pending = PendingModel { rx };
        assert!(matches!(pending.try_take(), Some(Err(ModelError::Canceled))));
    }
}
