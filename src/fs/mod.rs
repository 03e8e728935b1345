pub mod local;
pub mod paths;

pub use local::LocalFs;
pub use paths::{
    enumerate, extension, matches_any, minified_name, object_key, relocate, walk_tree,
    Enumeration,
};
