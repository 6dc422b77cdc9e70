pub mod decrypt;
pub mod encrypt;
pub mod info;

pub use decrypt::*;
pub use encrypt::*;
pub use info::*;
