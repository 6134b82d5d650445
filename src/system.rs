//! Composite neuron system assembly.
//!
//! A simulation integrates one [`NeuronModel`] together with an ordered set
//! of [`CurrentSource`]s. [`NeuronSystem`] concatenates their state
//! variables into a single flat state vector (model first, then each source
//! in attachment order) and exposes one derivative function over it. The
//! slice layout is fixed at assembly time and never changes during a run.
//!
//! By convention, component 0 of the model slice is the membrane voltage;
//! it is the only state variable shared with the current sources.

use crate::quantity::{Current, Time, Voltage};
use crate::schedule::EventSchedule;
use crate::solver::SolverError;

/// Right-hand side of an autonomous ODE system: dy/dt = f(t, y).
///
/// This is the only capability integrators depend on. Evaluation must be a
/// pure function of `(t, y)`; multi-stage methods call it several times per
/// step with trial states.
pub trait Dynamics {
    /// Dimension of the state vector.
    fn dim(&self) -> usize;

    /// Evaluate the derivative at `(t, y)`, writing into `dydt`.
    ///
    /// `t` is in seconds; `y` and `dydt` have length [`Dynamics::dim`].
    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]);
}

/// Membrane dynamics of a single neuron.
///
/// The model owns the first slice of the composite state vector; component
/// 0 of that slice is the membrane voltage in volts.
pub trait NeuronModel {
    /// Number of state variables of this model.
    fn state_len(&self) -> usize;

    /// Write the initial state into `s` (length [`NeuronModel::state_len`]).
    fn initial_state(&self, s: &mut [f64]);

    /// Evaluate the intrinsic membrane derivative given the total injected
    /// current. Must be pure in `(t, s, i_input)`.
    fn derivative(&self, t: Time, s: &[f64], i_input: Current, ds: &mut [f64]);

    /// Hook called after every accepted integration step. The model may
    /// mutate its own slice (e.g. a threshold reset) and reports whether a
    /// spike was emitted.
    fn post_step(&self, _t: Time, _s: &mut [f64]) -> bool {
        false
    }
}

/// A current source attached to the neuron (synapse, electrode, noise, ...).
///
/// Sources read only their own state slice plus the shared membrane
/// voltage, and write only their own state-delta slice.
pub trait CurrentSource {
    /// Number of internal state variables of this source.
    fn state_len(&self) -> usize;

    /// Write the initial state into `s` (length [`CurrentSource::state_len`]).
    fn initial_state(&self, s: &mut [f64]);

    /// Evaluate the derivative of the source's own state. Must be pure in
    /// `(t, s, v_m)`.
    fn derivative(&self, t: Time, s: &[f64], v_m: Voltage, ds: &mut [f64]);

    /// Current injected into the membrane at `(t, s)`.
    fn current(&self, t: Time, s: &[f64]) -> Current;

    /// Times at which this source's behaviour changes abruptly (input
    /// spikes, switching edges). May be empty for purely continuous
    /// sources. Order does not matter; the schedule sorts and merges.
    fn discontinuities(&self) -> Vec<Time> {
        Vec::new()
    }

    /// Apply the state jump for a discontinuity. Called exactly once per
    /// scheduled time the source contributed, with `t` equal to that time.
    fn handle_discontinuity(&self, _t: Time, _s: &mut [f64]) {}
}

/// One neuron model plus an ordered collection of current sources,
/// assembled into a single differential system.
pub struct NeuronSystem<M> {
    model: M,
    sources: Vec<Box<dyn CurrentSource>>,
    /// Start offset of each source's slice in the composite state vector.
    offsets: Vec<usize>,
    dim: usize,
}

impl<M: NeuronModel> NeuronSystem<M> {
    /// Assembles a system from a model with no current sources attached.
    pub fn new(model: M) -> Self {
        let dim = model.state_len();
        Self {
            model,
            sources: Vec::new(),
            offsets: Vec::new(),
            dim,
        }
    }

    /// Attaches a current source, appending its state slice to the layout.
    pub fn with_source(mut self, source: impl CurrentSource + 'static) -> Self {
        self.offsets.push(self.dim);
        self.dim += source.state_len();
        self.sources.push(Box::new(source));
        self
    }

    /// The neuron model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Number of attached current sources.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Concatenated initial state: model first, then each source in
    /// attachment order.
    pub fn initial_state(&self) -> Vec<f64> {
        let mut y = vec![0.0; self.dim];
        self.model.initial_state(&mut y[..self.model.state_len()]);
        for (src, &o) in self.sources.iter().zip(&self.offsets) {
            src.initial_state(&mut y[o..o + src.state_len()]);
        }
        y
    }

    /// Membrane voltage, read from the shared component of the state.
    pub fn membrane_voltage(&self, y: &[f64]) -> Voltage {
        Voltage::new(y[0])
    }

    /// Total current injected by all sources at `(t, y)`.
    pub fn current(&self, t: Time, y: &[f64]) -> Current {
        let mut total = Current::default();
        for (src, &o) in self.sources.iter().zip(&self.offsets) {
            total += src.current(t, &y[o..o + src.state_len()]);
        }
        total
    }

    /// Builds the merged discontinuity schedule over all sources.
    pub fn schedule(&self) -> Result<EventSchedule, SolverError> {
        EventSchedule::merge(self.sources.iter().map(|s| s.discontinuities()))
    }

    /// Dispatches a scheduled discontinuity at `t` to every source,
    /// letting each apply its state jump to its own slice.
    pub fn handle_discontinuity(&self, t: Time, y: &mut [f64]) {
        for (src, &o) in self.sources.iter().zip(&self.offsets) {
            src.handle_discontinuity(t, &mut y[o..o + src.state_len()]);
        }
    }

    /// Runs the model's post-step hook. Returns true if a spike was
    /// emitted.
    pub fn apply_post_step(&self, t: Time, y: &mut [f64]) -> bool {
        let len = self.model.state_len();
        self.model.post_step(t, &mut y[..len])
    }
}

impl<M: NeuronModel> Dynamics for NeuronSystem<M> {
    fn dim(&self) -> usize {
        self.dim
    }

    fn rhs(&self, t: f64, y: &[f64], dydt: &mut [f64]) {
        let t = Time::new(t);
        let v_m = Voltage::new(y[0]);
        let model_len = self.model.state_len();

        let mut i_total = Current::default();
        for (src, &o) in self.sources.iter().zip(&self.offsets) {
            let len = src.state_len();
            src.derivative(t, &y[o..o + len], v_m, &mut dydt[o..o + len]);
            i_total += src.current(t, &y[o..o + len]);
        }

        self.model
            .derivative(t, &y[..model_len], i_total, &mut dydt[..model_len]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Trivial one-variable membrane: dv/dt = i / 1 F.
    struct UnitMembrane;

    impl NeuronModel for UnitMembrane {
        fn state_len(&self) -> usize {
            1
        }
        fn initial_state(&self, s: &mut [f64]) {
            s[0] = -0.07;
        }
        fn derivative(&self, _t: Time, _s: &[f64], i_input: Current, ds: &mut [f64]) {
            ds[0] = i_input.value();
        }
    }

    /// Source with two state variables holding fixed currents.
    struct TwoCell(f64, f64);

    impl CurrentSource for TwoCell {
        fn state_len(&self) -> usize {
            2
        }
        fn initial_state(&self, s: &mut [f64]) {
            s[0] = self.0;
            s[1] = self.1;
        }
        fn derivative(&self, _t: Time, _s: &[f64], _v: Voltage, ds: &mut [f64]) {
            ds[0] = 0.0;
            ds[1] = 0.0;
        }
        fn current(&self, _t: Time, s: &[f64]) -> Current {
            Current::new(s[0] + s[1])
        }
    }

    #[test]
    fn layout_is_model_then_sources_in_order() {
        let sys = NeuronSystem::new(UnitMembrane)
            .with_source(TwoCell(1.0, 2.0))
            .with_source(TwoCell(3.0, 4.0));

        assert_eq!(sys.dim(), 5);
        assert_eq!(sys.initial_state(), vec![-0.07, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn rhs_sums_source_currents_into_model() {
        let sys = NeuronSystem::new(UnitMembrane)
            .with_source(TwoCell(1.0, 2.0))
            .with_source(TwoCell(3.0, 4.0));

        let y = sys.initial_state();
        let mut dydt = vec![0.0; sys.dim()];
        sys.rhs(0.0, &y, &mut dydt);

        // dv/dt = sum of all source currents = 10 A into 1 F
        assert_eq!(dydt[0], 10.0);
        assert_eq!(&dydt[1..], &[0.0; 4]);
    }

    #[test]
    fn rhs_is_pure() {
        let sys = NeuronSystem::new(UnitMembrane).with_source(TwoCell(0.5, 0.5));
        let y = sys.initial_state();
        let mut a = vec![0.0; sys.dim()];
        let mut b = vec![0.0; sys.dim()];
        sys.rhs(1.0, &y, &mut a);
        sys.rhs(1.0, &y, &mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn total_current_over_sources() {
        let sys = NeuronSystem::new(UnitMembrane)
            .with_source(TwoCell(1.0, 1.0))
            .with_source(TwoCell(2.0, 2.0));
        let y = sys.initial_state();
        assert_eq!(sys.current(Time::default(), &y).value(), 6.0);
    }
}
