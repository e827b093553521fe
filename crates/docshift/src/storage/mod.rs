pub mod gateway;

pub use gateway::{has_content, StorageGateway, StoredUpload};
