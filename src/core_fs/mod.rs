//! The abstract file-system contract consumed by the session.
//!
//! A `FileProvider` is the handle to a backend; it keeps the current
//! directory so relative navigation works per session. Providers are
//! cloned for each new session: the clone shares any expensive backend
//! handle but gets its own navigation state.

pub mod error;
pub mod localfs;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::core_auth::Identity;
pub use error::FsError;

pub type FileReader = Box<dyn AsyncRead + Send + Unpin>;
pub type FileWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A file or directory entry as exposed on the wire.
#[async_trait]
pub trait File: Send + Sync {
    fn name(&self) -> &str;
    fn path(&self) -> &str;
    fn full_path(&self) -> String;
    fn size(&self) -> u64;
    fn is_directory(&self) -> bool;
    fn mod_time(&self) -> DateTime<Local>;
    /// Textual mode string as shown in LIST output, e.g. `drwxr-xr-x`.
    fn mode(&self) -> String;

    async fn read(&self, start_position: u64) -> Result<FileReader, FsError>;
    async fn write(&self) -> Result<FileWriter, FsError>;
    async fn delete(&self) -> Result<(), FsError>;

    fn clone_file(&self) -> Box<dyn File>;
}

#[async_trait]
pub trait FileProvider: Send + Sync {
    fn identity(&self) -> Option<&Identity>;
    fn set_identity(&mut self, identity: Identity);

    /// Independent navigation state over the same backend.
    fn clone_provider(&self) -> Box<dyn FileProvider>;

    async fn new_entry(&self, name: &str, is_directory: bool) -> Result<Box<dyn File>, FsError>;
    async fn get(&self, filename: &str) -> Result<Box<dyn File>, FsError>;
    async fn list(&self) -> Result<Vec<Box<dyn File>>, FsError>;

    /// Always begins with `/`.
    fn current_directory(&self) -> String;
    async fn change_directory(&mut self, path: &str) -> Result<(), FsError>;
    async fn create_directory(&self, name: &str) -> Result<(), FsError>;
    async fn remove_directory(&self, name: &str) -> Result<(), FsError>;
}
