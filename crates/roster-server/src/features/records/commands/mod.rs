pub mod upload;

pub use upload::{UploadRecordsCommand, UploadRecordsError, UploadRecordsResponse};
