//! Extracts the bundled builtin function stubs to a per-user cache
//! directory, so that goto-definition can hand the
//! client a real `file://` path it can open rather than a synthetic URI no
//! editor can read from.
//!
//! Bundled assets are extracted to a cache directory at startup
//! (`dirs::cache_dir()`) rather than addressed in place, since the stub
//! files live inside the binary, not on disk anywhere a URI could name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tower_lsp::lsp_types::Url;

use super::functions::BUILTIN_SOURCES;

pub const CACHE_DIR_NAME: &str = "buildfile-language-server";

/// Resolves the directory builtin stubs are extracted into: `override_dir`
/// if the caller supplied one (tests, or a future CLI flag), otherwise
/// `<user-cache>/buildfile-language-server/`.
pub fn resolve_cache_dir(override_dir: Option<PathBuf>) -> PathBuf {
    override_dir.unwrap_or_else(|| {
        dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join(CACHE_DIR_NAME)
    })
}

/// Writes every bundled builtin source file into `cache_dir`, creating it
/// if absent, at mode `0644` on Unix. Re-extracting on every startup is
/// acceptable here: the cache is addressed only by filename,
/// so a newer binary's bundled stubs simply overwrite the old ones in place.
pub fn extract_all(cache_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(cache_dir)?;
    for (file, source) in BUILTIN_SOURCES {
        write_one(cache_dir, file, source)?;
    }
    Ok(())
}

/// Ensures one builtin's stub file exists in the cache, re-extracting it if
/// the cache directory was cleared since startup. Called from goto-definition
/// so a stale/missing cache never produces a `Location` pointing nowhere.
pub fn ensure_extracted(cache_dir: &Path, file: &str) -> io::Result<PathBuf> {
    let path = cache_dir.join(file);
    if !path.exists() {
        let source = BUILTIN_SOURCES
            .iter()
            .find(|(name, _)| *name == file)
            .map(|(_, source)| *source)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no bundled source named {file}")))?;
        write_one(cache_dir, file, source)?;
    }
    Ok(path)
}

fn write_one(cache_dir: &Path, file: &str, source: &str) -> io::Result<()> {
    let path = cache_dir.join(file);
    fs::write(&path, source)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))?;
    }
    Ok(())
}

/// The `file://` URI goto-definition reports for a builtin, once its stub
/// is guaranteed to exist on disk.
pub fn file_uri(cache_dir: &Path, file: &str) -> Option<Url> {
    Url::from_file_path(cache_dir.join(file)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_all_writes_every_bundled_stub() {
        let dir = tempfile::tempdir().unwrap();
        extract_all(dir.path()).unwrap();
        for (file, source) in BUILTIN_SOURCES {
            let contents = fs::read_to_string(dir.path().join(file)).unwrap();
            assert_eq!(&contents, source);
        }
    }

    #[test]
    fn ensure_extracted_recreates_a_missing_stub() {
        let dir = tempfile::tempdir().unwrap();
        extract_all(dir.path()).unwrap();
        let (file, _) = BUILTIN_SOURCES[0];
        fs::remove_file(dir.path().join(file)).unwrap();

        let path = ensure_extracted(dir.path(), file).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_uri_points_at_the_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let uri = file_uri(dir.path(), "go.build_rules").unwrap();
        assert!(uri.path().ends_with("go.build_rules"));
    }
}
