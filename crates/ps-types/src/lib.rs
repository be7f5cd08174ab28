pub mod errors;
pub mod job;
pub mod value;

pub use errors::*;
pub use job::*;
pub use value::*;
