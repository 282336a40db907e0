mod chunk;
mod registry;
mod track;

pub use chunk::*;
pub use registry::*;
pub use track::*;
