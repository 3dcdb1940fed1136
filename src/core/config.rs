use std::path::{Path, PathBuf};
use crate::core::types::{IndexedAttributes, SyncMode};

#[derive(Debug, Clone)]
pub struct Config {
    pub log_path: PathBuf,               // append-only data file
    pub primary_index_path: PathBuf,     // append-only (id, valid, offset) entries
    pub inverted_store_prefix: PathBuf,  // `<prefix>_text`, `<prefix>_count`, ...
    pub indexed_attributes: IndexedAttributes,

    pub sync_mode: SyncMode,
    pub compact_substores_on_close: bool,
}

impl Config {
    /// Places every file under `dir` with the default file names.
    pub fn under_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Config {
            log_path: dir.join("crash_data.db"),
            primary_index_path: dir.join("crash_data.idx"),
            inverted_store_prefix: dir.join("crash_data_inv"),
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_path: PathBuf::from("./data/crash_data.db"),
            primary_index_path: PathBuf::from("./data/crash_data.idx"),
            inverted_store_prefix: PathBuf::from("./data/crash_data_inv"),
            indexed_attributes: IndexedAttributes::default(),

            sync_mode: SyncMode::Flush,
            compact_substores_on_close: true,
        }
    }
}
