//! Scene importers: model file on disk -> [`ImportedScene`].

use std::path::Path;

use crate::error::{AssetError, AssetResult};
use crate::scene::ImportedScene;

mod gltf_scene;
mod obj;

pub use self::gltf_scene::GltfImporter;
pub use self::obj::ObjImporter;

/// Anything that can turn a model file into an [`ImportedScene`].
///
/// Implementations report unreadable files as [`AssetError::SceneImport`];
/// structural problems are flagged on the scene (`incomplete`, missing root)
/// and rejected by the caller.
pub trait SceneImporter {
    fn import(&self, path: &Path) -> AssetResult<ImportedScene>;
}

/// Picks an importer by file extension (case-insensitive).
#[derive(Clone, Copy, Debug, Default)]
pub struct FileImporter;

impl SceneImporter for FileImporter {
    fn import(&self, path: &Path) -> AssetResult<ImportedScene> {
        if !path.is_file() {
            return Err(AssetError::SceneImport {
                path: path.to_path_buf(),
                reason: "file not found".into(),
            });
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("obj") => ObjImporter.import(path),
            Some("gltf" | "glb") => GltfImporter.import(path),
            _ => Err(AssetError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_import_error_with_path() {
        let err = FileImporter
            .import(Path::new("models/does-not-exist.obj"))
            .unwrap_err();
        assert!(matches!(err, AssetError::SceneImport { .. }));
        assert!(err.to_string().contains("models/does-not-exist.obj"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teapots.DAE");
        std::fs::write(&path, "<COLLADA/>").unwrap();
        let err = FileImporter.import(&path).unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedFormat { .. }));
    }
}
