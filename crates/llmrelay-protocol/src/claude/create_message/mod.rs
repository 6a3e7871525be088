pub mod request;
pub mod response;
pub mod stream;
pub mod types;

pub use request::{CreateMessageHeaders, CreateMessageRequest, CreateMessageRequestBody};
pub use response::CreateMessageResponse;
pub use stream::*;
pub use types::*;
