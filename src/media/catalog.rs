//! Effect lookup
//!
//! Effects are chosen by case-insensitive substring match against the asset
//! file names, so "applause" picks "Applause Sound Effect HD.mp3".

use std::path::{Path, PathBuf};

/// Find the first effect whose file name contains `name`
///
/// Matching ignores case and surrounding whitespace. A blank name never
/// matches anything.
pub fn find_effect(effects: &[PathBuf], name: &str) -> Option<PathBuf> {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    effects
        .iter()
        .find(|path| file_name_lower(path).contains(&needle))
        .cloned()
}

fn file_name_lower(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx() -> Vec<PathBuf> {
        vec![
            PathBuf::from("audio/fx/songA is awesome.mp3"),
            PathBuf::from("audio/fx/bad songB.mp3"),
        ]
    }

    #[test]
    fn test_substring_match() {
        let found = find_effect(&fx(), "songB").unwrap();
        assert_eq!(found, PathBuf::from("audio/fx/bad songB.mp3"));
    }

    #[test]
    fn test_match_ignores_case_and_whitespace() {
        let found = find_effect(&fx(), "  SONGA ").unwrap();
        assert_eq!(found, PathBuf::from("audio/fx/songA is awesome.mp3"));
    }

    #[test]
    fn test_no_match() {
        assert!(find_effect(&fx(), "songC").is_none());
    }

    #[test]
    fn test_blank_never_matches() {
        assert!(find_effect(&fx(), "").is_none());
        assert!(find_effect(&fx(), "   ").is_none());
    }

    #[test]
    fn test_directory_part_not_matched() {
        // "fx" appears in the directory, not in any file name
        assert!(find_effect(&fx(), "fx").is_none());
    }
}
