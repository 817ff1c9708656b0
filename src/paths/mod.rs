pub mod path;

pub use path::{os_path_to_string, NotePath};
