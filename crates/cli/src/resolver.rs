use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use dropwatch_registry::FilesetResolver;

/// Built-in membership policy: files in one directory sharing a stem form
/// one unit, keyed by the data file.
///
/// A unit is recognized once its data file exists; until then companion
/// changes resolve to nothing and stay out of the registry.
pub struct SidecarResolver {
    data_extensions: Vec<String>,
    companion_extensions: Vec<String>,
}

impl SidecarResolver {
    pub fn new(data_extensions: Vec<String>, companion_extensions: Vec<String>) -> Self {
        Self {
            data_extensions: lowered(data_extensions),
            companion_extensions: lowered(companion_extensions),
        }
    }

    fn is_data(&self, path: &Path) -> bool {
        if self.data_extensions.is_empty() {
            return true;
        }
        extension(path).is_some_and(|ext| self.data_extensions.contains(&ext))
    }

    fn is_companion(&self, path: &Path) -> bool {
        extension(path).is_some_and(|ext| self.companion_extensions.contains(&ext))
    }

    fn is_member(&self, path: &Path) -> bool {
        self.is_data(path) || self.is_companion(path)
    }
}

fn lowered(list: Vec<String>) -> Vec<String> {
    list.into_iter().map(|ext| ext.to_lowercase()).collect()
}

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(OsStr::to_str).map(str::to_lowercase)
}

impl FilesetResolver for SidecarResolver {
    fn resolve(&self, path: &Path) -> HashMap<PathBuf, Vec<PathBuf>> {
        let (Some(dir), Some(stem)) = (path.parent(), path.file_stem()) else {
            return HashMap::new();
        };

        let mut members: Vec<PathBuf> = Vec::new();
        if let Ok(entries) = fs::read_dir(dir) {
            for entry in entries.flatten() {
                let candidate = entry.path();
                if candidate.file_stem() == Some(stem) && self.is_member(&candidate) {
                    members.push(candidate);
                }
            }
        }
        // The changed path counts even when it is already gone again.
        if self.is_member(path) && !members.iter().any(|m| m == path) {
            members.push(path.to_path_buf());
        }
        members.sort();

        let Some(key) = members.iter().find(|m| self.is_data(m)).cloned() else {
            return HashMap::new();
        };
        HashMap::from([(key, members)])
    }
}
