// Domain layer: repository models, fact sheets, ecosystem settings and the ports adapters implement.

pub mod ecosystem;
pub mod facts;
pub mod model;
pub mod ports;
