//! Local collection store.
//!
//! An append-only JSON array of deployed collections at
//! `<data_dir>/collections.json`, keyed by collection id. Records are
//! immutable once written; supply fields cross the file boundary as decimal
//! strings.

use crate::{Error, MinterProvider};
use std::io::Read;
use std::path::{Path, PathBuf};
use tapmint_primitives::CollectionInfo;

const COLLECTION_STORE_FILE_NAME: &str = "collections.json";

#[derive(Debug)]
pub struct CollectionStore {
    file_path: PathBuf,
}

impl CollectionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            file_path: data_dir.join(COLLECTION_STORE_FILE_NAME),
        }
    }

    /// Every stored collection, oldest first.
    pub fn all(&self) -> Result<Vec<CollectionInfo>, Error> {
        load_collections(&self.file_path)
            .map_err(|err| Error::Store(format!("{}: {err}", self.file_path.display())))
    }

    /// Looks a collection up by id.
    pub fn find(&self, collection_id: &str) -> Result<Option<CollectionInfo>, Error> {
        Ok(self
            .all()?
            .into_iter()
            .find(|info| info.collection_id == collection_id))
    }

    /// Appends a newly seen collection. Existing records are never
    /// rewritten.
    pub fn append(&self, info: CollectionInfo) -> Result<(), Error> {
        let mut collections = self.all()?;
        if collections
            .iter()
            .any(|existing| existing.collection_id == info.collection_id)
        {
            return Ok(());
        }
        collections.push(info);

        let file = std::fs::File::create(&self.file_path)
            .map_err(|err| Error::Store(format!("{}: {err}", self.file_path.display())))?;
        serde_json::to_writer_pretty(file, &collections)
            .map_err(|err| Error::Store(format!("failed to serialize collections: {err}")))
    }

    /// Looks a collection up locally first, falling back to the tracker and
    /// recording what it returns.
    pub async fn find_or_fetch(
        &self,
        provider: &dyn MinterProvider,
        collection_id: &str,
    ) -> Result<Option<CollectionInfo>, Error> {
        if let Some(info) = self.find(collection_id)? {
            return Ok(Some(info));
        }

        let fetched = provider
            .collection(collection_id)
            .await
            .map_err(Error::DataUnavailable)?;
        if let Some(info) = &fetched {
            self.append(info.clone())?;
        }
        Ok(fetched)
    }
}

fn load_collections(file_path: &Path) -> std::io::Result<Vec<CollectionInfo>> {
    match std::fs::File::open(file_path) {
        Ok(mut file) => {
            let mut data = String::new();
            file.read_to_string(&mut data)?;
            serde_json::from_str(&data).map_err(|err| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("failed to deserialize collections: {err}"),
                )
            })
        }
        Err(error) => match error.kind() {
            std::io::ErrorKind::NotFound => Ok(Vec::new()),
            _ => Err(error),
        },
    }
}
