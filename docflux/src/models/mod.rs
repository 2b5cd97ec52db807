mod extraction;
mod format;
mod request;

pub use extraction::*;
pub use format::*;
pub use request::*;
