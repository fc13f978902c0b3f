pub mod enums;
pub mod glucose;
pub mod patient;

pub use enums::*;
pub use glucose::*;
pub use patient::*;
