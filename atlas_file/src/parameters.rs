use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The `parameters.json` document that ships with every atlas folder. Both
/// fields are required; a missing one fails the load.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtlasParameters {
    /// Grid spacing used to partition the mesh, in meters.
    pub split_size: f32,
    /// Texels per ptex face tile.
    pub tile_size: u32,
}

impl AtlasParameters {
    pub fn load_json(path: &Path) -> Result<Self> {
        let serialized = std::fs::read_to_string(path)
            .with_context(|| format!("Unable to read atlas parameters '{}'", path.display()))?;
        let deserialized = serde_json::from_str(&serialized)
            .with_context(|| format!("Unable to parse atlas parameters '{}'", path.display()))?;
        Ok(deserialized)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)
            .with_context(|| format!("Unable to write atlas parameters '{}'", path.display()))?;
        Ok(())
    }
}
