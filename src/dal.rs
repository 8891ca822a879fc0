pub mod lines;
pub mod paths;
pub mod stations;

pub use lines::*;
pub use paths::*;
pub use stations::*;
