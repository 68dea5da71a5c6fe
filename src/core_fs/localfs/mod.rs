//! Local-disk backend. The configured home directory is served as the
//! virtual root `/`; navigation is canonicalized and refuses to leave it.

mod physical_file;

pub use physical_file::PhysicalFile;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use log::debug;

use crate::core_auth::Identity;
use crate::core_fs::{File, FileProvider, FsError};

pub struct PhysicalFs {
    home: PathBuf,
    current: PathBuf,
    identity: Option<Identity>,
}

impl PhysicalFs {
    /// `home` is the real directory exposed as `/`.
    pub async fn new(home: impl Into<PathBuf>) -> Result<Self, FsError> {
        let home = tokio::fs::canonicalize(home.into()).await?;
        let meta = tokio::fs::metadata(&home).await?;
        if !meta.is_dir() {
            return Err(FsError::NotADirectory(home.display().to_string()));
        }
        Ok(Self {
            current: home.clone(),
            home,
            identity: None,
        })
    }

    /// Absolute wire paths are anchored at the home directory, relative
    /// ones at the current directory.
    fn resolve(&self, path: &str) -> PathBuf {
        match path.strip_prefix('/') {
            Some(stripped) => self.home.join(stripped),
            None => self.current.join(path),
        }
    }

    async fn resolve_existing(&self, path: &str) -> Result<PathBuf, FsError> {
        let real = tokio::fs::canonicalize(self.resolve(path)).await?;
        if !real.starts_with(&self.home) {
            return Err(FsError::OutsideRoot(path.to_string()));
        }
        Ok(real)
    }

    fn file_from_metadata(real: &Path, meta: &std::fs::Metadata) -> PhysicalFile {
        let name = real
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = real
            .parent()
            .unwrap_or(real)
            .to_string_lossy()
            .into_owned();
        PhysicalFile::new(
            name,
            parent,
            meta.is_dir(),
            meta.len(),
            mod_time(meta),
            metadata_mode(meta),
        )
    }
}

#[async_trait]
impl FileProvider for PhysicalFs {
    fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    fn clone_provider(&self) -> Box<dyn FileProvider> {
        Box::new(PhysicalFs {
            home: self.home.clone(),
            current: self.current.clone(),
            identity: None,
        })
    }

    async fn new_entry(&self, name: &str, is_directory: bool) -> Result<Box<dyn File>, FsError> {
        let name = sanitize_entry_name(name);
        let real = self.current.join(&name);
        debug!("creating {} under {}", name, self.current.display());

        if is_directory {
            tokio::fs::create_dir(&real).await?;
        } else {
            tokio::fs::File::create(&real).await?;
        }

        let meta = tokio::fs::metadata(&real).await?;
        Ok(Box::new(Self::file_from_metadata(&real, &meta)))
    }

    async fn get(&self, filename: &str) -> Result<Box<dyn File>, FsError> {
        let real = self.resolve_existing(filename).await?;
        let meta = tokio::fs::metadata(&real).await?;
        Ok(Box::new(Self::file_from_metadata(&real, &meta)))
    }

    async fn list(&self) -> Result<Vec<Box<dyn File>>, FsError> {
        let mut entries = tokio::fs::read_dir(&self.current).await?;
        let mut files: Vec<Box<dyn File>> = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            files.push(Box::new(Self::file_from_metadata(&entry.path(), &meta)));
        }

        Ok(files)
    }

    fn current_directory(&self) -> String {
        let rel = self
            .current
            .strip_prefix(&self.home)
            .unwrap_or_else(|_| Path::new(""));
        let rel = rel.to_string_lossy();
        if rel.is_empty() {
            String::from("/")
        } else {
            format!("/{}", rel)
        }
    }

    async fn change_directory(&mut self, path: &str) -> Result<(), FsError> {
        if self.current == self.home && path == ".." {
            return Ok(());
        }

        let target = self.resolve_existing(path).await?;
        let meta = tokio::fs::metadata(&target).await?;
        if !meta.is_dir() {
            return Err(FsError::NotADirectory(path.to_string()));
        }

        self.current = target;
        Ok(())
    }

    async fn create_directory(&self, name: &str) -> Result<(), FsError> {
        let name = sanitize_entry_name(name);
        tokio::fs::create_dir_all(self.current.join(name)).await?;
        Ok(())
    }

    async fn remove_directory(&self, name: &str) -> Result<(), FsError> {
        let name = sanitize_entry_name(name);
        tokio::fs::remove_dir(self.current.join(name)).await?;
        Ok(())
    }
}

/// Strips traversal sequences and leading slashes from entry names so a
/// new entry always lands under the current directory.
fn sanitize_entry_name(name: &str) -> String {
    let sanitized = name.replace("../", "").replace("..\\", "");
    sanitized.trim_start_matches('/').to_string()
}

fn mod_time(meta: &std::fs::Metadata) -> DateTime<Local> {
    meta.modified()
        .map(DateTime::<Local>::from)
        .unwrap_or_else(|_| Local::now())
}

#[cfg(unix)]
fn metadata_mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn metadata_mode(_meta: &std::fs::Metadata) -> u32 {
    0o644
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn provider_with_tree() -> (tempfile::TempDir, PhysicalFs) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/inner")).unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hello world").unwrap();
        std::fs::write(dir.path().join("sub/nested.txt"), b"nested").unwrap();
        let provider = PhysicalFs::new(dir.path()).await.unwrap();
        (dir, provider)
    }

    #[tokio::test]
    async fn starts_at_virtual_root() {
        let (_dir, provider) = provider_with_tree().await;
        assert_eq!(provider.current_directory(), "/");
    }

    #[tokio::test]
    async fn change_directory_tracks_virtual_path() {
        let (_dir, mut provider) = provider_with_tree().await;

        provider.change_directory("sub").await.unwrap();
        assert_eq!(provider.current_directory(), "/sub");

        provider.change_directory("inner").await.unwrap();
        assert_eq!(provider.current_directory(), "/sub/inner");

        provider.change_directory("..").await.unwrap();
        assert_eq!(provider.current_directory(), "/sub");

        provider.change_directory("/").await.unwrap();
        assert_eq!(provider.current_directory(), "/");
    }

    #[tokio::test]
    async fn dotdot_at_root_stays_at_root() {
        let (_dir, mut provider) = provider_with_tree().await;
        provider.change_directory("..").await.unwrap();
        assert_eq!(provider.current_directory(), "/");
    }

    #[tokio::test]
    async fn change_directory_rejects_files_and_missing_paths() {
        let (_dir, mut provider) = provider_with_tree().await;
        assert!(provider.change_directory("hello.txt").await.is_err());
        assert!(provider.change_directory("no-such-dir").await.is_err());
    }

    #[tokio::test]
    async fn get_reports_size_and_kind() {
        let (_dir, provider) = provider_with_tree().await;

        let file = provider.get("/hello.txt").await.unwrap();
        assert_eq!(file.name(), "hello.txt");
        assert_eq!(file.size(), 11);
        assert!(!file.is_directory());

        let dir = provider.get("sub").await.unwrap();
        assert!(dir.is_directory());
    }

    #[tokio::test]
    async fn read_honors_start_position() {
        use tokio::io::AsyncReadExt;

        let (_dir, provider) = provider_with_tree().await;
        let file = provider.get("/hello.txt").await.unwrap();

        let mut reader = file.read(6).await.unwrap();
        let mut contents = String::new();
        reader.read_to_string(&mut contents).await.unwrap();
        assert_eq!(contents, "world");
    }

    #[tokio::test]
    async fn list_returns_entries_of_current_directory() {
        let (_dir, mut provider) = provider_with_tree().await;

        let mut names: Vec<String> = provider
            .list()
            .await
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["hello.txt", "sub"]);

        provider.change_directory("sub").await.unwrap();
        let names: Vec<String> = provider
            .list()
            .await
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert!(names.contains(&"nested.txt".to_string()));
    }

    #[tokio::test]
    async fn escape_attempts_are_rejected() {
        let (_dir, provider) = provider_with_tree().await;
        assert!(provider.get("../..").await.is_err());
    }

    #[tokio::test]
    async fn clone_has_independent_navigation() {
        let (_dir, mut provider) = provider_with_tree().await;

        let clone = provider.clone_provider();
        provider.change_directory("sub").await.unwrap();

        assert_eq!(provider.current_directory(), "/sub");
        assert_eq!(clone.current_directory(), "/");
    }

    #[tokio::test]
    async fn new_entry_creates_files_and_directories() {
        let (dir, provider) = provider_with_tree().await;

        let file = provider.new_entry("fresh.txt", false).await.unwrap();
        assert!(!file.is_directory());
        assert!(dir.path().join("fresh.txt").exists());

        let folder = provider.new_entry("fresh-dir", true).await.unwrap();
        assert!(folder.is_directory());
        assert!(dir.path().join("fresh-dir").is_dir());
    }

    #[tokio::test]
    async fn remove_directory_only_removes_empty_dirs() {
        let (dir, provider) = provider_with_tree().await;

        provider.create_directory("scratch").await.unwrap();
        provider.remove_directory("scratch").await.unwrap();
        assert!(!dir.path().join("scratch").exists());

        assert!(provider.remove_directory("sub").await.is_err());
    }

    #[test]
    fn sanitize_strips_traversal() {
        assert_eq!(sanitize_entry_name("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_entry_name("/abs/name"), "abs/name");
        assert_eq!(sanitize_entry_name("plain.txt"), "plain.txt");
    }
}
