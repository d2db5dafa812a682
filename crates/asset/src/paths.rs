//! Cache-key normalization for model and texture paths.

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding normal component. The file system is never consulted, so
/// symlinks are not resolved.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Resolve a material texture reference against the file that declared it.
///
/// `reference` is taken as written in the model file; backslash separators
/// (common in files exported on Windows) are treated as `/`. Relative
/// references are joined onto the parent directory of `relative_to`.
pub fn resolve_reference(reference: &str, relative_to: Option<&Path>) -> PathBuf {
    let reference = PathBuf::from(reference.trim().replace('\\', "/"));
    let joined = match relative_to.and_then(Path::parent) {
        Some(dir) if reference.is_relative() => dir.join(reference),
        _ => reference,
    };
    normalize(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_next_to_model() {
        let key = resolve_reference("wood.png", Some(Path::new("models/tree.DAE")));
        assert_eq!(key, PathBuf::from("models/wood.png"));
    }

    #[test]
    fn dot_segments_collapse() {
        assert_eq!(
            normalize(Path::new("models/./textures/../wood.png")),
            PathBuf::from("models/wood.png")
        );
        assert_eq!(
            resolve_reference("../shared/bark.png", Some(Path::new("models/tree/tree.obj"))),
            PathBuf::from("models/shared/bark.png")
        );
    }

    #[test]
    fn leading_parent_dirs_are_kept() {
        assert_eq!(normalize(Path::new("../a/./b")), PathBuf::from("../a/b"));
    }

    #[test]
    fn backslashes_and_absolute_references() {
        assert_eq!(
            resolve_reference("textures\\leaf.png", Some(Path::new("models/tree.obj"))),
            PathBuf::from("models/textures/leaf.png")
        );
        assert_eq!(
            resolve_reference("/opt/tex/leaf.png", Some(Path::new("models/tree.obj"))),
            PathBuf::from("/opt/tex/leaf.png")
        );
    }

    #[test]
    fn no_reference_file_means_as_written() {
        assert_eq!(resolve_reference("leaf.png", None), PathBuf::from("leaf.png"));
        assert_eq!(
            resolve_reference("leaf.png", Some(Path::new("tree.obj"))),
            PathBuf::from("leaf.png")
        );
    }
}
