pub mod document;
pub mod error;
pub mod id;
pub mod time;

pub use document::{
    CREATED_AT_FIELD, Document, ID_FIELD, UPDATED_AT_FIELD, document_from_value, document_id,
    stamp_created, stamp_updated,
};
pub use error::{CoreError, Result};
pub use id::{IdError, generate_id, validate_id};
pub use time::{Timestamp, now_utc};
