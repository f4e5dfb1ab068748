// Handlers da API JSON
pub mod export;
pub mod health;
pub mod months;
pub mod reports;
pub mod volumes;

pub use export::*;
pub use health::*;
pub use months::*;
pub use reports::*;
pub use volumes::*;
