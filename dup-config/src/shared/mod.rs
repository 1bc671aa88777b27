mod base;
mod duplication;
mod retry;

pub use base::*;
pub use duplication::*;
pub use retry::*;
