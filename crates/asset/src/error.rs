//! Errors raised by the loading pipeline. Every variant is fatal for the load
//! that produced it; nothing is retried.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Texture failed to load at path: {}", path.display())]
    TextureDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Unsupported texture format: {channels} channels in {}", path.display())]
    UnsupportedChannels { path: PathBuf, channels: u8 },

    #[error("Could not read the model file {}: {reason}", path.display())]
    SceneImport { path: PathBuf, reason: String },

    #[error("Model file {} produced an incomplete scene", path.display())]
    IncompleteScene { path: PathBuf },

    #[error("Model file {} has no root node", path.display())]
    MissingRootNode { path: PathBuf },

    #[error("No importer for model file {}", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Invalid mesh '{name}' in {}: {reason}", path.display())]
    InvalidMesh {
        path: PathBuf,
        name: String,
        reason: String,
    },

    #[error("GPU upload failed: {0}")]
    Gpu(String),
}

pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_offending_path() {
        let err = AssetError::SceneImport {
            path: PathBuf::from("models/missing.obj"),
            reason: "No such file or directory".into(),
        };
        assert!(err.to_string().contains("models/missing.obj"));

        let err = AssetError::UnsupportedChannels {
            path: PathBuf::from("grey_alpha.png"),
            channels: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("2 channels"));
        assert!(msg.contains("grey_alpha.png"));
    }
}
