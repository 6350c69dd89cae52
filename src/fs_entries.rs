use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Default)]
pub struct TopLevelDirectories {
    /// Sorted by name.
    pub directories: Vec<Utf8PathBuf>,
    /// Entries that could not be read or classified, with the reason.
    pub errors: Vec<anyhow::Error>,
}

/// Immediate subdirectories of `directory`. Only failing to open `directory` itself is an error.
pub fn top_level_directories(directory: &Utf8Path) -> anyhow::Result<TopLevelDirectories> {
    let mut top_level = TopLevelDirectories::default();

    for dir_entry in directory
        .read_dir_utf8()
        .context(format!("Failed to read entries of directory {directory}"))?
    {
        let dir_entry = match dir_entry {
            Ok(dir_entry) => dir_entry,
            Err(error) => {
                top_level.errors.push(
                    anyhow::Error::new(error)
                        .context(format!("Skipping unreadable entry of directory {directory}")),
                );
                continue;
            }
        };
        match dir_entry.file_type() {
            Ok(file_type) if file_type.is_dir() => {
                top_level.directories.push(dir_entry.path().to_path_buf())
            }
            Ok(_) => {}
            Err(error) => top_level.errors.push(anyhow::Error::new(error).context(format!(
                "Failed to determine file type of {}",
                dir_entry.path()
            ))),
        }
    }

    top_level
        .directories
        .sort_by(|left, right| left.file_name().cmp(&right.file_name()));
    Ok(top_level)
}

/// Everything below a directory, excluding the directory itself.
#[derive(Debug, Default)]
pub struct Descendants {
    pub directories: Vec<Utf8PathBuf>,
    pub files: Vec<Utf8PathBuf>,
    /// Entries that could not be enumerated, with the reason.
    pub errors: Vec<anyhow::Error>,
}

pub fn descendants(directory: &Utf8Path) -> Descendants {
    let mut descendants = Descendants::default();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                let location = error
                    .path()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| directory.to_string());
                descendants.errors.push(
                    anyhow::Error::new(error).context(format!("Failed to enumerate {location}")),
                );
                continue;
            }
        };
        let path = match Utf8PathBuf::try_from(entry.path().to_path_buf()) {
            Ok(path) => path,
            Err(error) => {
                descendants.errors.push(
                    anyhow::Error::new(error).context("Skipping entry with non-UTF-8 path"),
                );
                continue;
            }
        };
        if entry.file_type().is_dir() {
            descendants.directories.push(path);
        } else {
            descendants.files.push(path);
        }
    }
    descendants
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir, create_dir_all, write};
    use tempfile::tempdir;

    #[test]
    fn test_top_level_directories_sorted() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf())?;
        for name in ["delta", "alpha", "charlie"] {
            create_dir(root.join(name))?;
        }
        write(root.join("bravo"), "")?;

        let top_level = top_level_directories(&root)?;
        assert!(top_level.errors.is_empty());
        assert_eq!(
            top_level.directories,
            vec![root.join("alpha"), root.join("charlie"), root.join("delta")]
        );
        Ok(())
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_top_level_directories_non_utf8_name() -> anyhow::Result<()> {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp_dir = tempdir()?;
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf())?;
        create_dir(root.join("alpha"))?;
        create_dir(temp_dir.path().join(OsStr::from_bytes(b"bad\xff")))?;
        create_dir(root.join("zulu"))?;

        let top_level = top_level_directories(&root)?;
        assert_eq!(
            top_level.directories,
            vec![root.join("alpha"), root.join("zulu")]
        );
        assert_eq!(top_level.errors.len(), 1);
        Ok(())
    }

    #[test]
    fn test_top_level_directories_missing_root() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let root = Utf8PathBuf::try_from(temp_dir.path().join("missing"))?;
        assert!(top_level_directories(&root).is_err());
        Ok(())
    }

    #[test]
    fn test_descendants() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf())?;
        create_dir_all(root.join("alice").join("docs").join("old"))?;
        write(root.join("alice").join("notes.txt"), "")?;
        write(root.join("alice").join("docs").join("cv.pdf"), "")?;

        let descendants = descendants(&root.join("alice"));
        assert!(descendants.errors.is_empty());
        assert_eq!(
            descendants.directories,
            vec![
                root.join("alice").join("docs"),
                root.join("alice").join("docs").join("old")
            ]
        );
        assert_eq!(
            descendants.files,
            vec![
                root.join("alice").join("docs").join("cv.pdf"),
                root.join("alice").join("notes.txt")
            ]
        );
        Ok(())
    }
}
