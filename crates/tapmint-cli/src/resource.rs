//! Resource directory access.
//!
//! A collection's content lives in one directory, one file per slot:
//! `<localId>.<ext>` holds the content body (extension taken from the
//! content type) and an optional `<localId>.json` holds extra metadata
//! merged over the default `{"localId": n}`.

use std::path::PathBuf;
use tapmint_engine::{Error, ResourceLoader, SlotResource};

#[derive(Debug, Clone)]
pub struct DirResourceLoader {
    dir: PathBuf,
    content_type: String,
    extension: String,
}

impl DirResourceLoader {
    pub fn new(dir: PathBuf, content_type: String) -> Result<Self, Error> {
        let extension = content_type
            .split_once('/')
            .map(|(_, ext)| ext.to_string())
            .filter(|ext| !ext.is_empty())
            .ok_or_else(|| Error::Store(format!("unknown content type: {content_type}")))?;
        Ok(Self {
            dir,
            content_type,
            extension,
        })
    }

    /// Loads the resources of every slot up to `max`, in slot order.
    pub fn load_all(&self, max: u64) -> Result<Vec<SlotResource>, Error> {
        (0..max).map(|local_id| self.load(local_id)).collect()
    }
}

impl ResourceLoader for DirResourceLoader {
    fn load(&self, local_id: u64) -> Result<SlotResource, Error> {
        let body_path = self.dir.join(format!("{local_id}.{}", self.extension));
        let content_body = std::fs::read(&body_path)
            .map_err(|err| Error::Store(format!("{}: {err}", body_path.display())))?;

        let mut metadata = serde_json::json!({ "localId": local_id });
        let metadata_path = self.dir.join(format!("{local_id}.json"));
        if metadata_path.exists() {
            let extra = std::fs::read_to_string(&metadata_path)
                .map_err(|err| Error::Store(format!("{}: {err}", metadata_path.display())))
                .and_then(|data| {
                    serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&data)
                        .map_err(|err| {
                            Error::Store(format!("{}: {err}", metadata_path.display()))
                        })
                })?;
            let merged = metadata.as_object_mut().expect("built as an object");
            for (key, value) in extra {
                merged.insert(key, value);
            }
        }

        Ok(SlotResource {
            content_type: self.content_type.clone(),
            content_body,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_body_and_merges_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0.png"), b"pixels").unwrap();
        std::fs::write(dir.path().join("0.json"), r#"{"name": "Wombat #0"}"#).unwrap();
        std::fs::write(dir.path().join("1.png"), b"more pixels").unwrap();

        let loader =
            DirResourceLoader::new(dir.path().to_path_buf(), "image/png".to_string()).unwrap();

        let slot0 = loader.load(0).unwrap();
        assert_eq!(slot0.content_body, b"pixels");
        assert_eq!(slot0.metadata["localId"], 0);
        assert_eq!(slot0.metadata["name"], "Wombat #0");

        let slot1 = loader.load(1).unwrap();
        assert_eq!(slot1.metadata.get("name"), None);

        assert_eq!(loader.load_all(2).unwrap().len(), 2);
        assert!(loader.load(2).is_err());
    }

    #[test]
    fn rejects_extensionless_content_types() {
        let err = DirResourceLoader::new(PathBuf::from("."), "png".to_string()).unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }
}
