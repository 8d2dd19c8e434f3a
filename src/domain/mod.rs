// Domain layer: slot model and ports. Concrete adapters live under crate::adapters.

pub mod model;
pub mod ports;
