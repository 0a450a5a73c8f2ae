//! Stable, mount-independent identity for played media items. The same file
//! on a re-mounted removable drive resolves to the same record name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use blake2::digest::consts::U16;
use blake2::{Blake2b, Digest};
use percent_encoding::percent_decode_str;
use thiserror::Error;
use tracing::{debug, error};

/// 128-bit BLAKE2b, hex-encoded to the 32-character record file name.
type Blake2b128 = Blake2b<U16>;

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("mountpoint {mountpoint:?} is not a prefix of {path:?}")]
    MountpointMismatch { mountpoint: String, path: String },
}

/// Strip the `file://` scheme and collapse percent escapes.
pub fn decode_raw_path(raw_path: &str) -> String {
    let stripped = raw_path.strip_prefix(FILE_SCHEME).unwrap_or(raw_path);
    percent_decode_str(stripped).decode_utf8_lossy().into_owned()
}

/// Nearest mount boundary containing `path`, or "" when that boundary is the
/// root filesystem. Any resolution failure also degrades to "" so the player
/// is never blocked on identity lookup.
pub fn resolve_mountpoint(path: &Path) -> String {
    match mount_boundary(path) {
        Ok(boundary) if boundary == Path::new("/") => String::new(),
        Ok(boundary) => boundary.to_string_lossy().into_owned(),
        Err(err) => {
            debug!("failed to resolve mountpoint of {}: {err}", path.display());
            String::new()
        }
    }
}

#[cfg(unix)]
fn mount_boundary(path: &Path) -> io::Result<PathBuf> {
    let mut current = fs::canonicalize(path)?;
    while !is_mount(&current)? {
        current = match current.parent() {
            Some(parent) => parent.to_path_buf(),
            None => break,
        };
    }
    Ok(current)
}

#[cfg(unix)]
fn is_mount(path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let Some(parent) = path.parent() else {
        return Ok(true);
    };
    let meta = fs::metadata(path)?;
    let parent_meta = fs::metadata(parent)?;
    Ok(meta.dev() != parent_meta.dev() || meta.ino() == parent_meta.ino())
}

#[cfg(not(unix))]
fn mount_boundary(_path: &Path) -> io::Result<PathBuf> {
    Ok(PathBuf::from("/"))
}

/// Mount-independent identity: the decoded path with the mountpoint prefix
/// removed. A non-empty mountpoint that is not actually a prefix of the
/// decoded path is a logic error, not something to ignore silently.
pub fn relative_path(raw_path: &str, mountpoint: &str) -> Result<String, IdentityError> {
    let decoded = decode_raw_path(raw_path);
    if mountpoint.is_empty() {
        return Ok(decoded);
    }
    match decoded.strip_prefix(mountpoint) {
        Some(rest) => Ok(rest.to_string()),
        None => Err(IdentityError::MountpointMismatch {
            mountpoint: mountpoint.to_string(),
            path: decoded,
        }),
    }
}

/// Stable digest of the relative path, used as the record file name. Same
/// input gives the same 32 lowercase hex characters on every run and host.
pub fn identity_hash(relative_path: &str) -> String {
    hex::encode(Blake2b128::digest(relative_path.as_bytes()))
}

/// One playable item as delivered by the player, resolved to its
/// mount-independent identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    raw_path: String,
    mountpoint: String,
    relative_path: String,
    identity_hash: String,
}

impl MediaReference {
    /// Resolve the identity of a player-delivered path. Resolution never
    /// fails: a mountpoint that cannot be determined, or that turns out not
    /// to prefix the decoded path, degrades to the empty mountpoint with the
    /// full decoded path as identity.
    pub fn resolve(raw_path: &str) -> Self {
        let decoded = decode_raw_path(raw_path);
        let mountpoint = resolve_mountpoint(Path::new(&decoded));
        let (mountpoint, relative) = match relative_path(raw_path, &mountpoint) {
            Ok(relative) => (mountpoint, relative),
            Err(err) => {
                error!("identity resolution for {raw_path:?} degraded: {err}");
                (String::new(), decoded)
            }
        };
        let identity_hash = identity_hash(&relative);
        Self {
            raw_path: raw_path.to_string(),
            mountpoint,
            relative_path: relative,
            identity_hash,
        }
    }

    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn mountpoint(&self) -> &str {
        &self.mountpoint
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub fn identity_hash(&self) -> &str {
        &self.identity_hash
    }

    /// Decoded absolute location on disk, used for existence checks.
    pub fn source_path(&self) -> PathBuf {
        PathBuf::from(decode_raw_path(&self.raw_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_scheme_and_percent_escapes() {
        assert_eq!(
            decode_raw_path("file:///videos/some%20show%20%5B1080p%5D.mkv"),
            "/videos/some show [1080p].mkv"
        );
    }

    #[test]
    fn decode_leaves_plain_paths_untouched() {
        assert_eq!(decode_raw_path("/videos/plain.mkv"), "/videos/plain.mkv");
    }

    #[test]
    fn relative_path_with_empty_mountpoint_is_the_decoded_path() {
        let relative =
            relative_path("file:///videos/a%20b.mkv", "").expect("empty mountpoint never fails");
        assert_eq!(relative, "/videos/a b.mkv");
    }

    #[test]
    fn relative_path_strips_the_mountpoint_prefix() {
        let relative = relative_path("file:///mnt/usb/videos/a.mkv", "/mnt/usb")
            .expect("mountpoint is a prefix");
        assert_eq!(relative, "/videos/a.mkv");
    }

    #[test]
    fn relative_path_surfaces_a_non_prefix_mountpoint() {
        let err = relative_path("/videos/a.mkv", "/mnt/usb")
            .expect_err("non-prefix mountpoint must be surfaced");
        assert!(matches!(err, IdentityError::MountpointMismatch { .. }));
    }

    #[test]
    fn identity_hash_is_deterministic_and_32_lowercase_hex_chars() {
        let first = identity_hash("/videos/a b.mkv");
        let second = identity_hash("/videos/a b.mkv");
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);
        assert!(first.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn identity_hash_depends_on_the_path_bytes() {
        assert_ne!(identity_hash("/videos/a.mkv"), identity_hash("/videos/b.mkv"));
    }

    #[test]
    fn resolve_degrades_for_nonexistent_paths_instead_of_failing() {
        let reference = MediaReference::resolve("file:///no/such/place/video%20one.mkv");
        assert_eq!(reference.raw_path(), "file:///no/such/place/video%20one.mkv");
        assert_eq!(reference.mountpoint(), "");
        assert_eq!(reference.relative_path(), "/no/such/place/video one.mkv");
        assert_eq!(
            reference.identity_hash(),
            identity_hash("/no/such/place/video one.mkv")
        );
    }
}
