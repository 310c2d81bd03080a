//! Name to constructor table for building nodes by type name

use hashbrown::HashMap;

use crate::graph::GraphError;
use crate::node::{Node, ProcessContext};
use crate::nodes::{EventInput, Instrument, Sampler, Sine};

/// Builds a node for a graph running with the given context.
pub type NodeConstructor = fn(&ProcessContext) -> Result<Node, GraphError>;

/// An explicit table of constructible node types.
///
/// Built once at startup and handed to [`Graph::new`](crate::Graph::new) by
/// reference. There is no global registration; a registry only knows the
/// types added to it.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    constructors: HashMap<&'static str, NodeConstructor>,
}

impl NodeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in node that can be built from a
    /// context alone.
    ///
    /// `"Capture"` opens the default input device and fails with
    /// [`GraphError::Unavailable`] unless the `cpal_input` feature is enabled.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register("EventInput", |_| Ok(EventInput::new().into()));
        registry.register("Instrument", |_| Ok(Instrument::new().into()));
        registry.register("Sampler", |_| Ok(Sampler::new().into()));
        registry.register("Sine", |_| Ok(Sine::new().into()));
        registry.register("Capture", capture);
        registry
    }

    /// Register a constructor, returning the one it replaced.
    pub fn register(&mut self, name: &'static str, constructor: NodeConstructor) -> Option<NodeConstructor> {
        self.constructors.insert(name, constructor)
    }

    pub fn create(&self, name: &str, ctx: &ProcessContext) -> Result<Node, GraphError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| GraphError::UnknownType(name.to_owned()))?;
        constructor(ctx)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.constructors.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(feature = "cpal_input")]
fn capture(ctx: &ProcessContext) -> Result<Node, GraphError> {
    use crate::device::CpalInput;
    use crate::nodes::CaptureConfig;

    let input = CpalInput::default_input()?;
    if input.sample_rate() != ctx.sample_rate {
        tracing::warn!(
            device = input.sample_rate(),
            graph = ctx.sample_rate,
            "input device rate differs from graph rate; capture is not resampled"
        );
    }
    Ok(input.open(CaptureConfig::default())?.into())
}

#[cfg(not(feature = "cpal_input"))]
fn capture(_ctx: &ProcessContext) -> Result<Node, GraphError> {
    Err(GraphError::Unavailable("hardware capture (enable the `cpal_input` feature)"))
}
