//! Path-keyed caches for textures and models.
//!
//! The [`ResourceManager`] owns every [`Texture`] and [`Model`] in arenas;
//! meshes and callers hold plain ids. Loading is single-threaded: all
//! mutation goes through `&mut self`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::AssetResult;
use crate::gpu::{GpuDevice, ShaderProgram};
use crate::import::{FileImporter, SceneImporter};
use crate::model::Model;
use crate::paths;
use crate::scene::{ImportedMaterial, TextureSlot};
use crate::texture::{Texture, TextureRole};

/// Index of a texture in its [`TextureCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Index of a model in its [`ResourceManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelId(pub u32);

/// Textures keyed by normalized path; at most one load per key.
#[derive(Debug, Default)]
pub struct TextureCache {
    textures: Vec<Texture>,
    by_path: HashMap<PathBuf, TextureId>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every `slot` texture of `material` (relative to the parent
    /// directory of `relative_to`) and return their ids in declaration order,
    /// decoding and uploading only the paths not seen before.
    pub fn load_textures(
        &mut self,
        material: &ImportedMaterial,
        slot: TextureSlot,
        role: TextureRole,
        relative_to: Option<&Path>,
        gpu: &mut dyn GpuDevice,
    ) -> AssetResult<Vec<TextureId>> {
        let references = material.textures(slot);
        let mut ids = Vec::with_capacity(references.len());
        for reference in references {
            let key = paths::resolve_reference(reference, relative_to);
            ids.push(self.get_or_load(key, role, gpu)?);
        }
        Ok(ids)
    }

    fn get_or_load(
        &mut self,
        key: PathBuf,
        role: TextureRole,
        gpu: &mut dyn GpuDevice,
    ) -> AssetResult<TextureId> {
        if let Some(&id) = self.by_path.get(&key) {
            log::debug!("Texture {} already loaded, reusing {:?}", key.display(), id);
            return Ok(id);
        }

        let texture = Texture::load(&key, role, gpu)?;
        let id = TextureId(self.textures.len() as u32);
        self.textures.push(texture);
        self.by_path.insert(key, id);
        Ok(id)
    }

    pub fn get(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0 as usize)
    }

    pub fn find(&self, path: &Path) -> Option<TextureId> {
        self.by_path.get(&paths::normalize(path)).copied()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// Owner of all loaded models and textures.
pub struct ResourceManager {
    importer: Box<dyn SceneImporter>,
    textures: TextureCache,
    models: Vec<Model>,
    model_index: HashMap<PathBuf, ModelId>,
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new(Box::new(FileImporter))
    }
}

impl ResourceManager {
    pub fn new(importer: Box<dyn SceneImporter>) -> Self {
        Self {
            importer,
            textures: TextureCache::new(),
            models: Vec::new(),
            model_index: HashMap::new(),
        }
    }

    /// Load the model at `path`, or return the id of the earlier load of the
    /// same normalized path. A failed load leaves the cache untouched.
    pub fn load_model(
        &mut self,
        path: impl AsRef<Path>,
        gpu: &mut dyn GpuDevice,
    ) -> AssetResult<ModelId> {
        let path = path.as_ref();
        let key = paths::normalize(path);
        log::debug!("Loading model from {}", path.display());

        if let Some(&id) = self.model_index.get(&key) {
            log::debug!("\tModel already loaded, returning cached value.");
            return Ok(id);
        }

        log::debug!("\tModel not loaded, loading.");
        let model = Model::load(path, self.importer.as_ref(), &mut self.textures, gpu)?;
        Ok(self.insert(key, model))
    }

    /// Resolve material textures through the shared texture cache.
    pub fn load_textures(
        &mut self,
        material: &ImportedMaterial,
        slot: TextureSlot,
        role: TextureRole,
        relative_to: Option<&Path>,
        gpu: &mut dyn GpuDevice,
    ) -> AssetResult<Vec<TextureId>> {
        self.textures
            .load_textures(material, slot, role, relative_to, gpu)
    }

    /// Register a model built in code (e.g. terrain) under `key`. If the key is
    /// taken the existing id is returned and `model` is dropped.
    pub fn insert_model(&mut self, key: impl AsRef<Path>, model: Model) -> ModelId {
        let key = paths::normalize(key.as_ref());
        if let Some(&id) = self.model_index.get(&key) {
            log::warn!("Model key {} already registered", key.display());
            return id;
        }
        self.insert(key, model)
    }

    fn insert(&mut self, key: PathBuf, model: Model) -> ModelId {
        let id = ModelId(self.models.len() as u32);
        self.models.push(model);
        self.model_index.insert(key, id);
        id
    }

    pub fn model(&self, id: ModelId) -> Option<&Model> {
        self.models.get(id.0 as usize)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn contains_model(&self, path: impl AsRef<Path>) -> bool {
        self.model_index
            .contains_key(&paths::normalize(path.as_ref()))
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Draw every mesh of `id`. Unknown ids draw nothing.
    pub fn draw_model(&self, id: ModelId, program: &mut dyn ShaderProgram) {
        if let Some(model) = self.model(id) {
            model.draw(&self.textures, program);
        }
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("models", &self.model_index)
            .field("textures", &self.textures.by_path)
            .finish()
    }
}
