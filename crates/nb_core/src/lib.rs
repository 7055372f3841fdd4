pub mod artifacts;
pub mod compose;
pub mod error;
pub mod fetch;
pub mod types;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::compose::{ComposeInput, Composer};
    pub use crate::fetch::Fetcher;
    pub use crate::types::{ArticleRecord, ArticleRecords, ScrapedFields, UploadedImages};
    pub use crate::{Error, Result};
}
