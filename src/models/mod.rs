pub mod call;
pub mod report;

pub use call::*;
pub use report::*;
