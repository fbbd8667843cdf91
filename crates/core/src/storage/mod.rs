mod error;
mod traits;
mod types;

pub use error::{BoxError, Result, StorageError};
pub use traits::{StorageEngine, DEFAULT_READ_BATCH_LIMIT, DEFAULT_WRITE_BATCH_LIMIT};
pub use types::{
    CountPage, Item, LastKey, PrimaryKey, PutCondition, QueryPage, QueryRequest,
    PARTITION_KEY_ATTR, SORT_KEY_ATTR, TYPE_TAG_ATTR,
};
