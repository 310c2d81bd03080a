mod capture;
mod events;
mod instrument;
mod sampler;
mod sine;

pub use capture::*;
pub use events::*;
pub use instrument::*;
pub use sampler::*;
pub use sine::*;
