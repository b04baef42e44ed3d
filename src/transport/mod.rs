/// Filesystem corpus enumeration.
pub mod fs;
