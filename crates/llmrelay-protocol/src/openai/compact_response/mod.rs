pub mod request;
pub mod response;

pub use request::{CompactResponseRequest, CompactResponseRequestBody};
pub use response::{CompactResponseObjectType, CompactResponseOutputItem, CompactResponseResponse};
