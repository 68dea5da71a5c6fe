use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::io::{AsyncSeekExt, SeekFrom};

use crate::core_fs::{File, FileReader, FileWriter, FsError};

/// A directory entry on the local disk.
#[derive(Debug, Clone)]
pub struct PhysicalFile {
    name: String,
    path: String,
    is_directory: bool,
    size: u64,
    mod_time: DateTime<Local>,
    mode: u32,
}

impl PhysicalFile {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        is_directory: bool,
        size: u64,
        mod_time: DateTime<Local>,
        mode: u32,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory,
            size,
            mod_time,
            mode,
        }
    }

    fn real_path(&self) -> PathBuf {
        PathBuf::from(&self.path).join(&self.name)
    }
}

#[async_trait]
impl File for PhysicalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn full_path(&self) -> String {
        self.real_path().display().to_string()
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn is_directory(&self) -> bool {
        self.is_directory
    }

    fn mod_time(&self) -> DateTime<Local> {
        self.mod_time
    }

    fn mode(&self) -> String {
        mode_string(self.is_directory, self.mode)
    }

    async fn read(&self, start_position: u64) -> Result<FileReader, FsError> {
        let mut file = tokio::fs::File::open(self.real_path()).await?;
        if start_position != 0 {
            file.seek(SeekFrom::Start(start_position)).await?;
        }
        Ok(Box::new(file))
    }

    async fn write(&self) -> Result<FileWriter, FsError> {
        let file = tokio::fs::File::create(self.real_path()).await?;
        Ok(Box::new(file))
    }

    async fn delete(&self) -> Result<(), FsError> {
        if self.is_directory {
            tokio::fs::remove_dir(self.real_path()).await?;
        } else {
            tokio::fs::remove_file(self.real_path()).await?;
        }
        Ok(())
    }

    fn clone_file(&self) -> Box<dyn File> {
        Box::new(self.clone())
    }
}

/// Renders unix permission bits the way `ls -l` does.
pub(crate) fn mode_string(is_directory: bool, mode: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push(if is_directory { 'd' } else { '-' });
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_string_renders_common_modes() {
        assert_eq!(mode_string(false, 0o644), "-rw-r--r--");
        assert_eq!(mode_string(false, 0o770), "-rwxrwx---");
        assert_eq!(mode_string(true, 0o755), "drwxr-xr-x");
        assert_eq!(mode_string(true, 0o777), "drwxrwxrwx");
    }

    #[test]
    fn full_path_joins_parent_and_name() {
        let file = PhysicalFile::new("hello.txt", "/srv/ftp/sub", false, 12, Local::now(), 0o644);
        assert_eq!(file.full_path(), "/srv/ftp/sub/hello.txt");
        assert_eq!(file.path(), "/srv/ftp/sub");
        assert_eq!(file.name(), "hello.txt");
    }
}
