//! Content hashing for feed fingerprints, SipHash-2-4 with a fixed zero key.
//!
//! Not cryptographic. A fingerprint only has to change when the data does.

use async_recursion::async_recursion;
use futures::stream::StreamExt;
use path_clean::PathClean;
use siphasher::sip::SipHasher24;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;
use tokio_stream::wrappers::ReadDirStream;

const BUFFER_SIZE: usize = 8192;

const SIPHASH_ZERO_KEY: [u8; 16] = [0u8; 16];

#[derive(Error, Debug)]
pub enum FolderHashError {
    #[error("I/O error accessing path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to strip prefix '{prefix}' from path '{path}'")]
    StripPrefix { prefix: PathBuf, path: PathBuf },
}

macro_rules! io_err {
    ($path:expr, $err:expr) => {
        FolderHashError::Io {
            path: $path.to_path_buf(),
            source: $err,
        }
    };
}

pub fn hash_bytes_sip_zero(bytes: &[u8]) -> u64 {
    let mut hasher = SipHasher24::new_with_key(&SIPHASH_ZERO_KEY);
    hasher.write(bytes);
    hasher.finish()
}

pub async fn hash_file_sip_zero(file_path: &Path) -> Result<u64, FolderHashError> {
    let mut file = File::open(file_path)
        .await
        .map_err(|e| io_err!(file_path, e))?;
    let mut hasher = SipHasher24::new_with_key(&SIPHASH_ZERO_KEY);
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| io_err!(file_path, e))?;
        if n == 0 {
            break;
        }
        hasher.write(&buffer[..n]);
    }
    Ok(hasher.finish())
}

/// Hidden files such as `.DS_Store` are left out.
#[async_recursion]
async fn collect_file_hashes(
    base_path: &Path,
    current_path: &Path,
    file_hashes: &mut BTreeMap<PathBuf, u64>,
) -> Result<(), FolderHashError> {
    let mut entries = ReadDirStream::new(
        fs::read_dir(current_path)
            .await
            .map_err(|e| io_err!(current_path, e))?,
    );

    while let Some(entry_result) = entries.next().await {
        let entry = entry_result.map_err(|e| io_err!(current_path, e))?;
        let path = entry.path();

        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let metadata = entry.metadata().await.map_err(|e| io_err!(&path, e))?;

        if metadata.is_dir() {
            collect_file_hashes(base_path, &path, file_hashes).await?;
        } else if metadata.is_file() {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| FolderHashError::StripPrefix {
                    prefix: base_path.to_path_buf(),
                    path: path.clone(),
                })?
                .to_path_buf()
                .clean();

            file_hashes.insert(relative_path, hash_file_sip_zero(&path).await?);
        }
    }
    Ok(())
}

/// Hashes the sorted map of relative path to file hash, so renames count
/// as changes and directory listing order does not.
pub async fn hash_folder_sip_zero(folder_path: &Path) -> Result<u64, FolderHashError> {
    let mut file_hashes = BTreeMap::new();

    collect_file_hashes(folder_path, folder_path, &mut file_hashes).await?;

    let mut final_hasher = SipHasher24::new_with_key(&SIPHASH_ZERO_KEY);
    file_hashes.hash(&mut final_hasher);

    Ok(final_hasher.finish())
}
