//! Translation options and per-call results.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::{ConversionLog, Error, Result, SearchPath};

/// glTF to MaterialX options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GltfToMtlxOptions {
    /// Populate every definition input on created shaders.
    pub add_all_inputs: bool,
    /// Create a look binding materials to geometry paths.
    pub create_assignments: bool,
    /// Log progress at info level.
    pub verbose: bool,
}

impl Default for GltfToMtlxOptions {
    fn default() -> Self {
        Self {
            add_all_inputs: false,
            create_assignments: true,
            verbose: false,
        }
    }
}

/// MaterialX to glTF options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MtlxToGltfOptions {
    /// Replace materials already present in the base geometry.
    pub reset_materials: bool,
    /// Emit constants even when they equal the definition default.
    pub write_default_inputs: bool,
    /// Duplicate the base geometry once per material.
    pub prims_per_material: bool,
    /// Grid row count for duplicated geometry; integer square root of the
    /// material count when unset.
    pub row_count: Option<usize>,
    /// Directories used to resolve image files.
    pub search_paths: SearchPath,
    /// Serialize node graphs without a fixed glTF mapping into `KHR_procedurals`.
    pub create_procedural_textures: bool,
    /// Where packed images are written; next to the first source image when unset.
    pub image_output_dir: Option<PathBuf>,
    /// Log progress at info level.
    pub verbose: bool,
}

impl Default for MtlxToGltfOptions {
    fn default() -> Self {
        Self {
            reset_materials: true,
            write_default_inputs: false,
            prims_per_material: false,
            row_count: None,
            search_paths: SearchPath::new(),
            create_procedural_textures: false,
            image_output_dir: None,
            verbose: false,
        }
    }
}

/// Read options from a JSON file; missing fields take their defaults.
pub fn load_options<T: serde::de::DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

/// Output of one translation call with its log.
#[derive(Debug, Clone)]
pub struct Conversion<T> {
    pub output: T,
    pub log: ConversionLog,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_options() {
        let text = r#"{"write_default_inputs": true, "search_paths": ["textures"]}"#;
        let options: MtlxToGltfOptions = serde_json::from_str(text).unwrap();
        assert!(options.write_default_inputs);
        assert!(options.reset_materials);
        assert_eq!(options.search_paths.dirs(), &[PathBuf::from("textures")]);

        let options: GltfToMtlxOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, GltfToMtlxOptions::default());
    }

    #[test]
    fn test_load_options_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{"create_assignments": false}"#).unwrap();

        let options: GltfToMtlxOptions = load_options(&path).unwrap();
        assert!(!options.create_assignments);
        assert!(matches!(
            load_options::<GltfToMtlxOptions>(dir.path().join("missing.json")),
            Err(Error::FileNotFound(_))
        ));
    }
}
