pub mod resources;
pub mod text;
pub mod walkmap;

pub use resources::{DirectorySource, MemorySource, ResourceSource};
pub use text::{TextLine, TextParser, expand_numbers, split_args};
pub use walkmap::WalkMap;
