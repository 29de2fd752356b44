use std::path::Path;

use serde::{Deserialize, Serialize};

/// Platform housekeeping files dropped when `skip_housekeeping` is set.
const HOUSEKEEPING_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini", ".directory"];

/// Filename and extension selection applied to changed paths before fileset
/// resolution. Empty include lists admit everything; exclusion wins over
/// inclusion. Extensions are matched without the dot, case-insensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathFilter {
    pub include_names: Vec<String>,
    pub exclude_names: Vec<String>,
    pub include_extensions: Vec<String>,
    pub exclude_extensions: Vec<String>,
    pub skip_housekeeping: bool,
}

impl PathFilter {
    pub fn admits(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        if self.skip_housekeeping && is_housekeeping(name) {
            return false;
        }

        if self.exclude_names.iter().any(|n| n == name) {
            return false;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        if let Some(ext) = &ext {
            if self.exclude_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                return false;
            }
        }

        let name_included =
            self.include_names.is_empty() || self.include_names.iter().any(|n| n == name);
        let ext_included = self.include_extensions.is_empty()
            || ext
                .as_deref()
                .is_some_and(|ext| {
                    self.include_extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
                });

        name_included && ext_included
    }
}

fn is_housekeeping(name: &str) -> bool {
    HOUSEKEEPING_NAMES.contains(&name)
        || name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".tmp")
        || name.starts_with("~$")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn default_filter_admits_everything() {
        let filter = PathFilter::default();
        assert!(filter.admits(Path::new("/drop/a.tif")));
        assert!(filter.admits(Path::new("/drop/.DS_Store")));
    }

    #[test]
    fn housekeeping_flag_drops_platform_noise() {
        let filter = PathFilter {
            skip_housekeeping: true,
            ..PathFilter::default()
        };
        assert!(!filter.admits(Path::new("/drop/.DS_Store")));
        assert!(!filter.admits(Path::new("/drop/Thumbs.db")));
        assert!(!filter.admits(Path::new("/drop/a.tif.swp")));
        assert!(!filter.admits(Path::new("/drop/backup~")));
        assert!(filter.admits(Path::new("/drop/a.tif")));
    }

    #[test]
    fn extension_include_list_restricts() {
        let filter = PathFilter {
            include_extensions: vec!["tif".into(), "xml".into()],
            ..PathFilter::default()
        };
        assert!(filter.admits(Path::new("/drop/a.tif")));
        assert!(filter.admits(Path::new("/drop/a.TIF")));
        assert!(filter.admits(Path::new("/drop/meta.xml")));
        assert!(!filter.admits(Path::new("/drop/notes.txt")));
        assert!(!filter.admits(Path::new("/drop/no_extension")));
    }

    #[test]
    fn exclusion_wins_over_inclusion() {
        let filter = PathFilter {
            include_extensions: vec!["tif".into()],
            exclude_names: vec!["calibration.tif".into()],
            ..PathFilter::default()
        };
        assert!(filter.admits(Path::new("/drop/a.tif")));
        assert!(!filter.admits(Path::new("/drop/calibration.tif")));
    }

    #[test]
    fn name_include_list_restricts() {
        let filter = PathFilter {
            include_names: vec!["manifest.xml".into()],
            ..PathFilter::default()
        };
        assert!(filter.admits(Path::new("/drop/manifest.xml")));
        assert!(!filter.admits(Path::new("/drop/other.xml")));
    }
}
