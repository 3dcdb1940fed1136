pub mod core;
pub mod storage;
pub mod index;
pub mod search;
pub mod manager;

pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::record::{FieldValue, Record};
pub use crate::core::stats::ManagerStats;
pub use crate::core::types::{IndexedAttribute, IndexedAttributes, RecordId, SyncMode};
pub use crate::manager::record_manager::{ImportSummary, RecordManager};
pub use crate::manager::shared::SharedRecordManager;

/*
┌──────────────────────────────── CRASHLOG LAYOUT ────────────────────────────────┐
│                                                                                  │
│  struct RecordManager                                                            │
│  ├── log: PrimaryLog          crash_data.db    [id|valid|sha256|size|payload]*   │
│  ├── index: PrimaryIndex      crash_data.idx   [id|valid|offset]* (13 B each)    │
│  ├── inverted: InvertedIndex                                                     │
│  │   ├── crash_data_inv_text       key -> postings                               │
│  │   ├── crash_data_inv_count      key -> postings                               │
│  │   ├── crash_data_inv_lighting   key -> postings                               │
│  │   └── crash_data_inv_severity   key -> postings                               │
│  └── _lock: FileLock          crash_data.db.lock                                 │
│                                                                                  │
│  write order per operation:  log  ->  primary index  ->  inverted substores      │
│                                                                                  │
│  search_text_attribute(patterns)                                                 │
│      AhoCorasick(patterns) over every text key -> union of matching postings     │
│                                                                                  │
└──────────────────────────────────────────────────────────────────────────────────┘
*/
