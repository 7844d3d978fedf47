pub mod fields;
mod license;
mod product;
mod summary;

pub use license::*;
pub use product::*;
pub use summary::*;
