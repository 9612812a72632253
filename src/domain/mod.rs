// Domain layer: graph models and ports (interfaces) to the collaborators around the engine.

pub mod model;
pub mod ports;
