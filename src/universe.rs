//! Polyphony algebra.
//!
//! Every signal in the graph belongs to a [`Universe`]: either [`Universe::Mono`]
//! (exactly one instance) or a polyphonic universe whose instance count is data
//! dependent and may change every tick. Each node maps the universes of its
//! inputs to a [`Descriptor`] naming the universe it reads its inputs in, runs
//! its internal computation in, and presents downstream.
//!
//! The graph composes these descriptors before a tick runs. When an edge
//! crosses universes the signal is adapted: a polyphonic signal entering a mono
//! input is summed (fan-in), a mono signal entering a polyphonic input is
//! broadcast to every instance (fan-out).
//!
//! The node that owns a polyphonic universe reports which instance slots it
//! removed and how many it appended during the tick. Downstream nodes that keep
//! per-instance state apply that report with [`Universes::compact`] so their
//! state stays attached to the same voices.

use itertools::Itertools;
use thiserror::Error;

/// Identifier of a polyphonic universe.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct UniverseId(pub(crate) u32);

/// The instance space a signal lives in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Universe {
    /// A single instance.
    #[default]
    Mono,
    /// A variable number of parallel instances.
    Poly(UniverseId),
}

impl Universe {
    #[inline]
    pub fn is_poly(&self) -> bool {
        matches!(self, Universe::Poly(_))
    }
}

/// How a node maps its inbound universes to its own.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Descriptor {
    /// Universe every input socket is adapted into.
    pub input: Universe,
    /// Universe of the node's own per-instance computation.
    pub internal: Universe,
    /// Universe presented on every output socket.
    pub output: Universe,
}

impl Descriptor {
    pub fn new(input: Universe, internal: Universe, output: Universe) -> Self {
        Self {
            input,
            internal,
            output,
        }
    }

    /// Mono in, mono inside, mono out. Polyphonic inputs are summed.
    pub fn mono() -> Self {
        Self::new(Universe::Mono, Universe::Mono, Universe::Mono)
    }

    /// All inputs forced into one shared universe, which is also used
    /// internally and on the outputs.
    ///
    /// Mono inputs are broadcast. Two different polyphonic universes on the
    /// inputs cannot be combined and produce [`PolyphonyError::Conflict`].
    pub fn shared(inputs: &[Universe]) -> Result<Self, PolyphonyError> {
        let mut polys = inputs
            .iter()
            .filter_map(|u| match u {
                Universe::Poly(id) => Some(*id),
                Universe::Mono => None,
            })
            .unique();

        let universe = match (polys.next(), polys.next()) {
            (None, _) => Universe::Mono,
            (Some(id), None) => Universe::Poly(id),
            (Some(first), Some(second)) => {
                return Err(PolyphonyError::Conflict { first, second });
            }
        };

        Ok(Self::new(universe, universe, universe))
    }
}

/// Structural polyphony failures. A graph in one of these states does not run.
///
/// The built-in nodes can only produce [`Conflict`](Self::Conflict): shared
/// inference rejects two universes before an edge could mismatch, and every
/// built-in inference settles in one pass. `Mismatch` and `NonConvergent`
/// guard node kinds whose input universe differs from their sources.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolyphonyError {
    #[error("inputs carry incompatible polyphonic universes {first:?} and {second:?}")]
    Conflict { first: UniverseId, second: UniverseId },

    /// A polyphonic edge into a different polyphonic universe. Not reachable
    /// with the built-in nodes.
    #[error("input in universe {found:?} cannot be adapted into {expected:?}")]
    Mismatch { expected: Universe, found: Universe },

    /// Descriptors still changing after the pass limit. Not reachable with
    /// the built-in nodes.
    #[error("polyphony did not converge after {passes} passes")]
    NonConvergent { passes: usize },
}

#[derive(Clone, Debug, Default)]
struct UniverseState {
    count: usize,
    removed: Vec<usize>,
    added: usize,
}

/// Arena of polyphonic universes and their per-tick change reports.
#[derive(Debug, Default)]
pub struct Universes {
    states: Vec<UniverseState>,
}

impl Universes {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate(&mut self) -> UniverseId {
        let id = UniverseId(self.states.len() as u32);
        self.states.push(UniverseState::default());
        id
    }

    /// Reserve room for `capacity` removals per tick so reports don't allocate.
    pub(crate) fn reserve_reports(&mut self, capacity: usize) {
        for state in &mut self.states {
            state.removed.reserve(capacity.saturating_sub(state.removed.capacity()));
        }
    }

    /// Number of instances in `universe`. Mono is always 1.
    #[inline]
    pub fn count(&self, universe: Universe) -> usize {
        match universe {
            Universe::Mono => 1,
            Universe::Poly(id) => self.state(id).map_or(0, |s| s.count),
        }
    }

    /// Slot positions removed this tick, ascending, relative to the previous tick.
    #[inline]
    pub fn removed(&self, universe: Universe) -> &[usize] {
        match universe {
            Universe::Mono => &[],
            Universe::Poly(id) => self.state(id).map_or(&[][..], |s| s.removed.as_slice()),
        }
    }

    /// Instances appended this tick, after the survivors.
    #[inline]
    pub fn added(&self, universe: Universe) -> usize {
        match universe {
            Universe::Mono => 0,
            Universe::Poly(id) => self.state(id).map_or(0, |s| s.added),
        }
    }

    /// Force the instance count without reporting a change.
    pub fn ensure(&mut self, id: UniverseId, count: usize) {
        if let Some(state) = self.state_mut(id) {
            state.count = count;
        }
    }

    /// Report this tick's change: the slots in `removed` (ascending, relative
    /// to the current count) disappear, then `added` new slots are appended.
    pub fn update(&mut self, id: UniverseId, removed: &[usize], added: usize) {
        let Some(state) = self.state_mut(id) else {
            return;
        };
        debug_assert!(removed.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(removed.last().map_or(true, |&last| last < state.count));

        state.removed.extend_from_slice(removed);
        state.count = state.count.saturating_sub(removed.len()) + added;
        state.added += added;
    }

    /// Apply this tick's change report of `universe` to a per-instance state
    /// vector: removed slots are dropped, new slots are filled with `fresh`,
    /// and the result always has exactly [`count`](Self::count) entries.
    pub fn compact<T: Clone>(&self, universe: Universe, state: &mut Vec<T>, fresh: T) {
        let removed = self.removed(universe);
        if !removed.is_empty() {
            let mut slot = 0;
            state.retain(|_| {
                let keep = removed.binary_search(&slot).is_err();
                slot += 1;
                keep
            });
        }
        state.extend(std::iter::repeat(fresh.clone()).take(self.added(universe)));
        state.resize(self.count(universe), fresh);
    }

    pub(crate) fn begin_tick(&mut self) {
        for state in &mut self.states {
            state.removed.clear();
            state.added = 0;
        }
    }

    fn state(&self, id: UniverseId) -> Option<&UniverseState> {
        self.states.get(id.0 as usize)
    }

    fn state_mut(&mut self, id: UniverseId) -> Option<&mut UniverseState> {
        self.states.get_mut(id.0 as usize)
    }
}
