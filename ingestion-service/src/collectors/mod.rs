pub mod eia;
pub mod ercot;

pub use eia::EiaCollector;
pub use ercot::ErcotCollector;
