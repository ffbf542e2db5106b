use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, trace, warn};

use crate::storage::{AppendReceipt, Result, Storage};
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};

/// Stores every file as a plain file named after it under `root`.
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        match fs::create_dir_all(&root).await {
            Ok(()) => {
                info!(root=%root.display(),"Created root for storage");
            }
            Err(e) => {
                error!(root=%root.display(),error=%e,"Error while creating the root for storage");
                return Err(e.into());
            }
        }
        Ok(FileStorage { root })
    }
    pub fn root(&self) -> &Path {
        &self.root
    }
    fn get_file_path(&self, file_name: &str) -> Result<PathBuf> {
        let is_plain_name = !file_name.is_empty()
            && file_name != "."
            && file_name != ".."
            && !file_name.contains(['/', '\\', '\0']);
        if !is_plain_name {
            return Err(format!("Invalid file name {file_name:?}").into());
        }
        Ok(self.root.join(file_name))
    }
}

impl Storage for FileStorage {
    #[instrument(name = "file_storage_append", skip(self, data), fields(bytes = data.len()))]
    async fn append(&self, file_name: &str, data: &[u8]) -> Result<AppendReceipt> {
        let file_path = self.get_file_path(file_name)?;
        let created = !fs::try_exists(&file_path).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await?;
        let previous_len = file.metadata().await?.len();
        let written = async {
            file.write_all(data).await?;
            file.flush().await?;
            file.sync_data().await
        }
        .await;
        if let Err(e) = written {
            // a partial append must not stay behind
            warn!(%file_name, error = %e, "append failed, trimming back to {previous_len} bytes");
            if let Err(trim_error) = file.set_len(previous_len).await {
                error!(%file_name, error = %trim_error, "Error while trimming a failed append");
            }
            return Err(e.into());
        }
        trace!(%file_name, previous_len, "data appended successfully");
        Ok(AppendReceipt {
            previous_len,
            bytes_written: data.len() as u64,
            created,
        })
    }
    #[instrument(name = "file_storage_undo", skip(self))]
    async fn undo(&self, file_name: &str, receipt: &AppendReceipt) -> Result<()> {
        let file_path = self.get_file_path(file_name)?;
        if receipt.created {
            match fs::remove_file(&file_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            info!(%file_name, "removed file created by the undone append");
            return Ok(());
        }
        let file = OpenOptions::new().write(true).open(&file_path).await?;
        file.set_len(receipt.previous_len).await?;
        file.sync_data().await?;
        info!(%file_name, len = receipt.previous_len, "file truncated back");
        Ok(())
    }
    #[instrument(name = "file_storage_read", skip(self))]
    async fn read(&self, file_name: &str) -> Result<Box<dyn tokio::io::AsyncRead + Unpin + Send>> {
        let file_path = self.get_file_path(file_name)?;
        let file = File::open(file_path).await?;
        Ok(Box::new(file))
    }
    async fn contains(&self, file_name: &str) -> bool {
        let Ok(file_path) = self.get_file_path(file_name) else {
            return false;
        };
        match fs::metadata(file_path).await {
            Ok(metadata) => metadata.is_file(),
            Err(_) => false,
        }
    }
    async fn file_size(&self, file_name: &str) -> Result<u64> {
        let file_path = self.get_file_path(file_name)?;
        Ok(fs::metadata(file_path).await?.len())
    }
    #[instrument(name = "file_storage_available_files", skip(self))]
    async fn available_files(&self) -> Result<Vec<String>> {
        let mut dir_enteries = fs::read_dir(&self.root).await?;
        let mut file_names = vec![];
        while let Some(entry) = dir_enteries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                file_names.push(
                    entry
                        .file_name()
                        .into_string()
                        .map_err(|_| "Invalid file name")?,
                );
            }
        }
        file_names.sort();
        Ok(file_names)
    }
}
