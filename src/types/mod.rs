pub mod events;
pub mod trading;

pub use events::*;
pub use trading::*;
