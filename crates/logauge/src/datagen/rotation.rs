use crate::{IoContext, Result};
use std::{
    collections::VecDeque,
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Returns the path of the `index`-th (1-based) output file.
///
/// A single file keeps `base` as-is. Otherwise the first `.` of the file name
/// becomes `_<index>.`, or `_<index>` is appended when the name has no `.`.
/// Only the file name is rewritten, so dots in directory names are left
/// alone.
pub fn output_path_for(base: &Path, index: u32, num_files: u32) -> PathBuf {
    if num_files == 1 {
        return base.to_path_buf();
    }
    let Some(name) = base.file_name() else {
        return base.to_path_buf();
    };
    let name = name.to_string_lossy();
    let numbered = match name.split_once('.') {
        Some((stem, rest)) => format!("{stem}_{index}.{rest}"),
        None => format!("{name}_{index}"),
    };
    base.with_file_name(numbered)
}

/// Output files kept on disk, oldest first.
#[derive(Debug, Default)]
pub(crate) struct Retention {
    limit: usize,
    files: VecDeque<PathBuf>,
}

impl Retention {
    /// A `limit` of 0 keeps every file.
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            limit,
            files: VecDeque::new(),
        }
    }

    /// Deletes the oldest files until one more fits under the limit.
    pub(crate) fn make_room(&mut self) -> Result<()> {
        if self.limit == 0 {
            return Ok(());
        }
        while self.files.len() >= self.limit {
            let Some(oldest) = self.files.pop_front() else {
                break;
            };
            tracing::info!(
                "Removing old data file {} to make room for new ones",
                oldest.display()
            );
            match std::fs::remove_file(&oldest) {
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                other => other.with_path(&oldest)?,
            }
        }
        Ok(())
    }

    pub(crate) fn push(&mut self, path: PathBuf) {
        // Appending to the same file again does not create a new one.
        if self.files.back() != Some(&path) {
            self.files.push_back(path);
        }
    }

    pub(crate) fn into_files(self) -> Vec<PathBuf> {
        self.files.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_keeps_base_path() {
        let base = Path::new("out/data.log");
        assert_eq!(output_path_for(base, 1, 1), base);
    }

    #[test]
    fn numbers_first_dot_of_file_name() {
        assert_eq!(
            output_path_for(Path::new("out/data.log"), 2, 3),
            Path::new("out/data_2.log")
        );
        assert_eq!(
            output_path_for(Path::new("./v1.2/data.tar.gz"), 7, 0),
            Path::new("./v1.2/data_7.tar.gz")
        );
    }

    #[test]
    fn appends_index_without_extension() {
        assert_eq!(
            output_path_for(Path::new("/tmp/data"), 3, 5),
            Path::new("/tmp/data_3")
        );
    }

    #[test]
    fn make_room_deletes_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (1..=3)
            .map(|i| dir.path().join(format!("f{i}.log")))
            .collect();
        let mut retention = Retention::new(2);
        for path in &paths {
            retention.make_room().unwrap();
            std::fs::write(path, "x").unwrap();
            retention.push(path.clone());
        }
        assert!(!paths[0].exists());
        assert!(paths[1].exists());
        assert!(paths[2].exists());
        assert_eq!(retention.into_files(), paths[1..]);
    }

    #[test]
    fn zero_limit_keeps_everything() {
        let mut retention = Retention::new(0);
        for i in 0..10 {
            retention.make_room().unwrap();
            retention.push(PathBuf::from(format!("missing-{i}")));
        }
        assert_eq!(retention.into_files().len(), 10);
    }

    #[test]
    fn missing_old_file_is_not_an_error() {
        let mut retention = Retention::new(1);
        retention.push(PathBuf::from("/nonexistent/old.log"));
        retention.make_room().unwrap();
        assert!(retention.into_files().is_empty());
    }
}
