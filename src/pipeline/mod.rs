pub mod block;
pub mod distribute;
pub mod secure;
pub mod shuffle;

pub use block::*;
pub use distribute::*;
pub use secure::*;
pub use shuffle::*;
