//! SHA-256 fingerprints for files and folders
//!
//! Every fingerprint uses a single canonical format (`sha256:<hex>`) so it can
//! be stored, compared and displayed as a plain string.
//!
//! A file fingerprint covers the byte content plus the base name. A folder
//! fingerprint covers the folder name and, for every child in name order, the
//! child name and the child's own fingerprint. Folder fingerprints are
//! therefore sensitive to any change anywhere in the subtree.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix for all fingerprints produced by this module
const PREFIX: &str = "sha256:";

/// Read size used when streaming file content through the digest.
pub const CHUNK_SIZE: usize = 4096;

/// A content or structure digest in `sha256:<hex>` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    fn from_digest(hasher: Sha256) -> Self {
        Self(format!("{}{:x}", PREFIX, hasher.finalize()))
    }

    /// Accept a stored fingerprint string. Returns `None` for anything that
    /// is not in canonical form.
    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.strip_prefix(PREFIX)?;
        if hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(value.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First characters of the hex digest, for compact display.
    pub fn short(&self) -> &str {
        let hex = &self.0[PREFIX.len()..];
        &hex[..hex.len().min(12)]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn name_bytes(name: &std::ffi::OsStr) -> Vec<u8> {
    name.to_string_lossy().into_owned().into_bytes()
}

/// Fingerprint a regular file: content in [`CHUNK_SIZE`] reads, then the
/// base name.
///
/// Returns `None` when the path is a directory, has vanished, or cannot be
/// read. `None` means "currently unmeasurable", never "changed".
pub fn hash_file(path: &Path) -> Option<Fingerprint> {
    let metadata = fs::metadata(path).ok()?;
    if metadata.is_dir() {
        return None;
    }

    let mut file = File::open(path).ok()?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buf[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "File became unreadable while hashing");
                return None;
            }
        }
    }

    if let Some(name) = path.file_name() {
        hasher.update(name_bytes(name));
    }
    Some(Fingerprint::from_digest(hasher))
}

/// Fingerprint a symbolic link by its target text and base name.
///
/// Links are never followed, so a link pointing at one of its own ancestors
/// cannot cause unbounded traversal.
pub fn hash_link(path: &Path) -> Option<Fingerprint> {
    let target = fs::read_link(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(target.to_string_lossy().as_bytes());
    if let Some(name) = path.file_name() {
        hasher.update(name_bytes(name));
    }
    Some(Fingerprint::from_digest(hasher))
}

/// Fingerprint any non-folder entry, without following symbolic links.
pub fn hash_leaf(path: &Path) -> Option<Fingerprint> {
    let metadata = fs::symlink_metadata(path).ok()?;
    if metadata.file_type().is_symlink() {
        hash_link(path)
    } else {
        hash_file(path)
    }
}

/// Incremental folder digest.
///
/// Children must be folded in ascending name order. Both [`hash_folder`] and
/// the directory scanner drive this builder, which keeps their results
/// identical for the same tree.
pub struct FolderDigest {
    hasher: Sha256,
}

impl FolderDigest {
    pub fn new(name: &std::ffi::OsStr) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name_bytes(name));
        Self { hasher }
    }

    /// Fold a non-folder child. An unmeasurable child contributes its name only.
    pub fn child_file(&mut self, name: &std::ffi::OsStr, fingerprint: Option<&Fingerprint>) {
        self.hasher.update(name_bytes(name));
        if let Some(fingerprint) = fingerprint {
            self.hasher.update(fingerprint.as_str().as_bytes());
        }
    }

    pub fn child_folder(&mut self, name: &std::ffi::OsStr, fingerprint: &Fingerprint) {
        self.hasher.update(name_bytes(name));
        self.hasher.update(fingerprint.as_str().as_bytes());
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint::from_digest(self.hasher)
    }
}

struct Child {
    name: OsString,
    path: PathBuf,
    is_dir: bool,
}

struct Frame {
    name: OsString,
    digest: FolderDigest,
    children: std::vec::IntoIter<Child>,
}

impl Frame {
    fn open(path: &Path, name: OsString, include: &dyn Fn(&Path) -> bool) -> Self {
        let digest = FolderDigest::new(&name);
        let mut children = Vec::new();
        match fs::read_dir(path) {
            Ok(read_dir) => {
                for dirent in read_dir.flatten() {
                    let child_path = dirent.path();
                    if !include(&child_path) {
                        continue;
                    }
                    // file_type() does not follow links
                    let is_dir = dirent.file_type().map(|t| t.is_dir()).unwrap_or(false);
                    children.push(Child {
                        name: dirent.file_name(),
                        path: child_path,
                        is_dir,
                    });
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot list folder, hashing as empty");
            }
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            name,
            digest,
            children: children.into_iter(),
        }
    }
}

/// Fingerprint a folder from its sorted structure and subtree content.
///
/// Returns `None` when `path` is not a directory. Subfolders that vanish or
/// cannot be listed mid-walk hash as empty rather than failing the whole
/// fingerprint.
pub fn hash_folder(path: &Path) -> Option<Fingerprint> {
    hash_folder_filtered(path, &|_| true)
}

/// Like [`hash_folder`], skipping any descendant for which `include` is false.
///
/// Traversal uses an explicit stack, so depth is bounded only by memory.
pub fn hash_folder_filtered(path: &Path, include: &dyn Fn(&Path) -> bool) -> Option<Fingerprint> {
    let metadata = fs::symlink_metadata(path).ok()?;
    if !metadata.is_dir() {
        return None;
    }
    fs::read_dir(path).ok()?;

    let root_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| path.as_os_str().to_os_string());
    let mut stack = vec![Frame::open(path, root_name, include)];

    while let Some(top) = stack.last_mut() {
        match top.children.next() {
            Some(child) if child.is_dir => {
                stack.push(Frame::open(&child.path, child.name, include));
            }
            Some(child) => {
                let fingerprint = hash_leaf(&child.path);
                top.digest.child_file(&child.name, fingerprint.as_ref());
            }
            None => {
                let done = stack.pop()?;
                let fingerprint = done.digest.finish();
                match stack.last_mut() {
                    Some(parent) => parent.digest.child_folder(&done.name, &fingerprint),
                    None => return Some(fingerprint),
                }
            }
        }
    }
    None
}
