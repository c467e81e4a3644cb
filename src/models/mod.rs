pub mod diet;
pub mod features;

pub use diet::*;
pub use features::*;
