//! Capability-scoped reads of caller-supplied paths.

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;

/// Read a UTF-8 file by opening its parent directory as a capability.
///
/// Paths without a parent are resolved against the current directory.
pub(crate) fn read_to_string(path: &Utf8Path) -> std::io::Result<String> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let file_name = path.file_name().unwrap_or(path.as_str());
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    dir.read_to_string(file_name)
}
