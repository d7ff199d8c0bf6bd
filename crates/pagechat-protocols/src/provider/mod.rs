//! Completion client protocol definitions.

mod request;
mod response;
mod traits;

pub use request::*;
pub use response::*;
pub use traits::*;
