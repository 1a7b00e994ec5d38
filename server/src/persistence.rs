//! Loading and saving the JSON data files.
//!
//! Saves are split in two steps: [`snapshot`] serializes the requested
//! collections while the caller holds the store lock, and
//! [`Snapshot::write`] performs the file I/O after the lock is released.

use crate::error::ServerError;
use crate::store::Store;
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::{Hotel, Review, User};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Hotels,
    Users,
    Reviews,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Hotels, Collection::Users, Collection::Reviews];
}

#[derive(Debug, Clone)]
pub struct DataFiles {
    pub hotels: PathBuf,
    pub users: PathBuf,
    pub reviews: PathBuf,
}

impl DataFiles {
    pub fn path(&self, collection: Collection) -> &Path {
        match collection {
            Collection::Hotels => &self.hotels,
            Collection::Users => &self.users,
            Collection::Reviews => &self.reviews,
        }
    }

    /// Reads all three files. A missing users or reviews file loads as empty,
    /// the hotels file is required.
    pub fn load(&self) -> Result<Store, ServerError> {
        let hotels: Vec<Hotel> = read_json(&self.hotels, false)?;
        let users: Vec<User> = read_json(&self.users, true)?;
        let reviews: Vec<Review> = read_json(&self.reviews, true)?;

        debug!(
            "Loaded {} hotels, {} users, {} reviews",
            hotels.len(),
            users.len(),
            reviews.len()
        );
        Ok(Store::new(hotels, users, reviews))
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, optional: bool) -> Result<Vec<T>, ServerError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if optional && e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(ServerError::DataFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&contents).map_err(|e| ServerError::DataFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn to_pretty<T: Serialize>(records: &[T]) -> Option<String> {
    match serde_json::to_string_pretty(records) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("Failed to serialize records: {}", e);
            None
        }
    }
}

/// Serialized collections waiting to be written.
#[derive(Debug, Default)]
pub struct Snapshot {
    files: Vec<(PathBuf, String)>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes every file, logging failures. Returns the number written.
    pub async fn write(self) -> usize {
        let mut written = 0;
        for (path, contents) in self.files {
            match tokio::fs::write(&path, contents).await {
                Ok(()) => {
                    debug!("Saved {}", path.display());
                    written += 1;
                }
                Err(e) => error!("Failed to save {}: {}", path.display(), e),
            }
        }
        written
    }
}

/// Serializes `collections` from `store`. Call while holding the store lock.
pub fn snapshot(store: &Store, files: &DataFiles, collections: &[Collection]) -> Snapshot {
    let entries = collections
        .iter()
        .filter_map(|&collection| {
            let json = match collection {
                Collection::Hotels => to_pretty(store.hotels()),
                Collection::Users => to_pretty(store.users()),
                Collection::Reviews => to_pretty(store.reviews()),
            }?;
            Some((files.path(collection).to_path_buf(), json))
        })
        .collect();
    Snapshot { files: entries }
}
