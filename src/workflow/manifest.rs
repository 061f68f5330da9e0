//! package.json rewriting.
//!
//! Points dependency entries at locally packed tarballs so every package
//! in a family is tested against its siblings' local builds instead of
//! their published releases.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::core::{Error, Result};

const SECTIONS: [&str; 2] = ["dependencies", "devDependencies"];

/// Rewrite dependency entries in the manifest at `path`.
///
/// `deps` maps package names to tarball paths relative to `work_dir`.
/// Every name present in `dependencies` or `devDependencies` has its
/// version specifier replaced with a `file:` reference relative to the
/// manifest's own directory; names the manifest does not list are
/// silently skipped. When nothing matches, the file is left untouched
/// byte for byte. Otherwise it is written back atomically with 2-space
/// indentation, preserving key order.
///
/// Returns the `(name, replacement)` pairs that were applied.
pub fn rewrite(
    path: &Path,
    work_dir: &Path,
    deps: &BTreeMap<String, String>,
) -> Result<Vec<(String, String)>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::ManifestMissing { path: path.to_path_buf() });
        }
        Err(e) => return Err(e.into()),
    };

    let mut document: Value = serde_json::from_str(&text)
        .map_err(|source| Error::ManifestMalformed { path: path.to_path_buf(), source })?;

    let manifest_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut applied = Vec::new();

    for (name, tarball) in deps {
        let reference = file_reference(manifest_dir, &work_dir.join(tarball));
        for section in SECTIONS {
            if let Some(entries) = document.get_mut(section).and_then(Value::as_object_mut) {
                if let Some(entry) = entries.get_mut(name) {
                    *entry = Value::String(reference.clone());
                    applied.push((name.clone(), reference.clone()));
                }
            }
        }
    }

    if !applied.is_empty() {
        let mut rendered = serde_json::to_string_pretty(&document)?;
        rendered.push('\n');
        write_atomic(path, rendered.as_bytes())?;
    }

    Ok(applied)
}

/// Write `contents` to `path` via a sibling temp file and rename, so a
/// reader never observes a half-written file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Build a `file:` reference from the manifest's directory to a tarball,
/// always using forward slashes.
fn file_reference(from: &Path, to: &Path) -> String {
    let rel = relative_path(from, to);
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::ParentDir => parts.push("..".to_string()),
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            other => parts.push(other.as_os_str().to_string_lossy().into_owned()),
        }
    }
    format!("file:{}", parts.join("/"))
}

/// Compute `to` relative to `from` by stripping the shared prefix and
/// backing out of what remains. Both paths must share a common base.
fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from_components: Vec<_> = from.components().collect();
    let to_components: Vec<_> = to.components().collect();

    let common =
        from_components.iter().zip(&to_components).take_while(|(a, b)| a == b).count();

    let mut rel = PathBuf::new();
    for _ in common..from_components.len() {
        rel.push("..");
    }
    for component in &to_components[common..] {
        rel.push(component);
    }
    rel
}
