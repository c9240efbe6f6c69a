pub mod enums;
pub mod records;
pub mod timeline;

pub use enums::*;
pub use records::*;
pub use timeline::*;
