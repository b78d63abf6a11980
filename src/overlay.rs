use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BoothError, Result};

/// A decorative frame drawn on top of every captured shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay {
    pub name: String,
    /// Image path, relative to the assets directory unless absolute.
    pub resource: PathBuf,
}

impl Overlay {
    pub fn new(name: impl Into<String>, resource: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            resource: resource.into(),
        }
    }
}

/// Fixed, ordered overlay list with exactly one selected entry.
#[derive(Debug, Clone)]
pub struct OverlayCatalog {
    assets_dir: PathBuf,
    overlays: Vec<Overlay>,
    selected: usize,
}

impl OverlayCatalog {
    pub fn new(assets_dir: impl Into<PathBuf>, overlays: Vec<Overlay>) -> Result<Self> {
        if overlays.is_empty() {
            return Err(BoothError::Config("overlay list is empty".into()));
        }
        Ok(Self {
            assets_dir: assets_dir.into(),
            overlays,
            selected: 0,
        })
    }

    pub fn select(&mut self, index: usize) -> Result<&Overlay> {
        if index >= self.overlays.len() {
            return Err(BoothError::Config(format!(
                "overlay index {} out of range (have {})",
                index,
                self.overlays.len()
            )));
        }
        self.selected = index;
        Ok(&self.overlays[index])
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> &Overlay {
        &self.overlays[self.selected]
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    /// Filesystem path of an overlay's image.
    pub fn resolve(&self, overlay: &Overlay) -> PathBuf {
        resolve_in(&self.assets_dir, &overlay.resource)
    }
}

fn resolve_in(assets_dir: &Path, resource: &Path) -> PathBuf {
    if resource.is_absolute() {
        resource.to_path_buf()
    } else {
        assets_dir.join(resource)
    }
}
