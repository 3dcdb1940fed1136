use std::fs;
use std::path::PathBuf;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::IndexedAttribute;

/// Where every file of one record store lives.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub log_path: PathBuf,            // record frames
    pub primary_index_path: PathBuf,  // (id, valid, offset) entries
    pub inverted_prefix: PathBuf,     // substores are `<prefix>_<suffix>`
}

impl StorageLayout {
    pub fn new(config: &Config) -> Result<Self> {
        let layout = StorageLayout {
            log_path: config.log_path.clone(),
            primary_index_path: config.primary_index_path.clone(),
            inverted_prefix: config.inverted_store_prefix.clone(),
        };

        // Create directories
        for path in [&layout.log_path, &layout.primary_index_path, &layout.inverted_prefix] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        }

        Ok(layout)
    }

    pub fn store_path(&self, attribute: IndexedAttribute) -> PathBuf {
        let mut name = self.inverted_prefix.as_os_str().to_owned();
        name.push("_");
        name.push(attribute.store_suffix());
        PathBuf::from(name)
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.log_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }
}
