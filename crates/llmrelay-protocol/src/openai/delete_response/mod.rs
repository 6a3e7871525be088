pub mod request;
pub mod response;

pub use request::{DeleteResponsePath, DeleteResponseRequest};
pub use response::{DeleteResponseObjectType, DeleteResponseResponse};
