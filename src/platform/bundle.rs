//! Application bundle inspection
//!
//! Validates `.app` bundles and reads their `Info.plist`.

use std::path::{Path, PathBuf};

/// What the blocklist needs to know about a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    /// Canonical bundle path, used as the blocklist identifier
    pub path: PathBuf,
    pub display_name: String,
    pub bundle_id: Option<String>,
}

/// Inspect `path` as an application bundle.
///
/// Returns `None` unless it is an existing directory with the `.app`
/// extension. A missing or unreadable `Info.plist` is tolerated; the name
/// then falls back to the file stem.
pub fn inspect_bundle(path: &Path) -> Option<BundleInfo> {
    if !has_app_extension(path) {
        return None;
    }
    let canonical = path.canonicalize().ok()?;
    if !canonical.is_dir() {
        return None;
    }

    let info = read_info_plist(&canonical);
    let plist_string = |key: &str| {
        info.as_ref()
            .and_then(|dict| dict.get(key))
            .and_then(plist::Value::as_string)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from)
    };

    let display_name = plist_string("CFBundleDisplayName")
        .or_else(|| plist_string("CFBundleName"))
        .or_else(|| {
            canonical
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })?;

    Some(BundleInfo {
        bundle_id: plist_string("CFBundleIdentifier"),
        display_name,
        path: canonical,
    })
}

/// Outermost `.app` directory containing `executable`, if any.
///
/// Helper apps nested inside another bundle resolve to the outer bundle so
/// that blocking an application covers all of its processes.
pub fn enclosing_bundle(executable: &Path) -> Option<PathBuf> {
    executable
        .ancestors()
        .filter(|ancestor| has_app_extension(ancestor))
        .last()
        .map(Path::to_path_buf)
}

/// `CFBundleIdentifier` of the bundle at `bundle_path`
pub fn bundle_identifier(bundle_path: &Path) -> Option<String> {
    read_info_plist(bundle_path)?
        .get("CFBundleIdentifier")
        .and_then(plist::Value::as_string)
        .map(String::from)
}

fn has_app_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("app"))
        .unwrap_or(false)
}

fn read_info_plist(bundle_path: &Path) -> Option<plist::Dictionary> {
    let info_path = bundle_path.join("Contents").join("Info.plist");
    plist::Value::from_file(info_path)
        .ok()?
        .into_dictionary()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_info_plist(bundle: &Path, entries: &[(&str, &str)]) {
        let mut dict = plist::Dictionary::new();
        for (key, value) in entries {
            dict.insert(key.to_string(), plist::Value::String(value.to_string()));
        }
        let contents = bundle.join("Contents");
        fs::create_dir_all(&contents).unwrap();
        plist::Value::Dictionary(dict)
            .to_file_xml(contents.join("Info.plist"))
            .unwrap();
    }

    #[test]
    fn test_bundle_with_display_name() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("Games.app");
        write_info_plist(
            &bundle,
            &[
                ("CFBundleName", "Games"),
                ("CFBundleDisplayName", "Fun Games"),
                ("CFBundleIdentifier", "com.example.games"),
            ],
        );

        let info = inspect_bundle(&bundle).unwrap();
        assert_eq!(info.display_name, "Fun Games");
        assert_eq!(info.bundle_id.as_deref(), Some("com.example.games"));
        assert_eq!(info.path, bundle.canonicalize().unwrap());
    }

    #[test]
    fn test_bundle_name_falls_back_to_stem() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("Chess.app");
        fs::create_dir_all(&bundle).unwrap();

        let info = inspect_bundle(&bundle).unwrap();
        assert_eq!(info.display_name, "Chess");
        assert!(info.bundle_id.is_none());
    }

    #[test]
    fn test_non_bundle_paths_rejected() {
        let dir = tempdir().unwrap();

        let plain_dir = dir.path().join("Games");
        fs::create_dir_all(&plain_dir).unwrap();
        assert!(inspect_bundle(&plain_dir).is_none());

        let file = dir.path().join("Fake.app");
        fs::write(&file, b"not a bundle").unwrap();
        assert!(inspect_bundle(&file).is_none());

        assert!(inspect_bundle(&dir.path().join("Missing.app")).is_none());
    }

    #[test]
    fn test_enclosing_bundle_prefers_outermost() {
        let exe = Path::new(
            "/Applications/Browser.app/Contents/Frameworks/Helper.app/Contents/MacOS/Helper",
        );
        assert_eq!(
            enclosing_bundle(exe),
            Some(PathBuf::from("/Applications/Browser.app"))
        );
    }

    #[test]
    fn test_enclosing_bundle_none_outside_bundles() {
        assert_eq!(enclosing_bundle(Path::new("/usr/bin/ls")), None);
    }

    #[test]
    fn test_bundle_identifier_reads_plist() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("Games.app");
        write_info_plist(&bundle, &[("CFBundleIdentifier", "com.example.games")]);
        assert_eq!(bundle_identifier(&bundle).as_deref(), Some("com.example.games"));
    }
}
