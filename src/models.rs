//! Reference neuron model and current sources.
//!
//! The engine treats models and sources as pluggable collaborators; the
//! implementations here are the standard minimal set used by the tests,
//! examples and benchmarks.

use crate::quantity::{Capacitance, Conductance, Current, Time, Voltage};
use crate::system::{CurrentSource, NeuronModel};

/// Parameters of the leaky integrate-and-fire membrane.
#[derive(Debug, Clone, Copy)]
pub struct LifParameters {
    /// Membrane capacitance.
    pub cm: Capacitance,
    /// Leak conductance.
    pub gl: Conductance,
    /// Spike threshold potential.
    pub e_th: Voltage,
    /// Resting potential.
    pub e_rest: Voltage,
    /// Reset potential after a spike.
    pub e_reset: Voltage,
}

impl Default for LifParameters {
    fn default() -> Self {
        Self {
            cm: Capacitance::from_nf(1.0),
            gl: Conductance::from_us(2.0),
            e_th: Voltage::from_mv(-54.0),
            e_rest: Voltage::from_mv(-70.0),
            e_reset: Voltage::from_mv(-80.0),
        }
    }
}

/// Leaky integrate-and-fire neuron.
///
/// Membrane dynamics `cm * dv/dt = gl * (e_rest - v) + i_input`; a
/// threshold crossing resets the membrane to `e_reset` and emits a spike.
/// State: `[v]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifNeuron {
    p: LifParameters,
}

impl LifNeuron {
    /// Neuron with the given parameters.
    pub fn new(p: LifParameters) -> Self {
        Self { p }
    }

    /// The parameter set.
    pub fn parameters(&self) -> &LifParameters {
        &self.p
    }

    /// Smallest constant current that eventually drives the membrane over
    /// threshold.
    pub fn rheobase(&self) -> Current {
        (self.p.e_th - self.p.e_rest) * self.p.gl
    }
}

impl NeuronModel for LifNeuron {
    fn state_len(&self) -> usize {
        1
    }

    fn initial_state(&self, s: &mut [f64]) {
        s[0] = self.p.e_rest.value();
    }

    fn derivative(&self, _t: Time, s: &[f64], i_input: Current, ds: &mut [f64]) {
        let i_leak = (self.p.e_rest - Voltage::new(s[0])) * self.p.gl;
        ds[0] = (i_leak + i_input) / self.p.cm;
    }

    fn post_step(&self, _t: Time, s: &mut [f64]) -> bool {
        if s[0] > self.p.e_th.value() {
            s[0] = self.p.e_reset.value();
            true
        } else {
            false
        }
    }
}

/// Injects a constant current for the whole run. State: `[i]`.
#[derive(Debug, Clone, Copy)]
pub struct ConstantCurrent {
    i: Current,
}

impl ConstantCurrent {
    /// Source injecting `i` from start to end.
    pub fn new(i: Current) -> Self {
        Self { i }
    }
}

impl CurrentSource for ConstantCurrent {
    fn state_len(&self) -> usize {
        1
    }

    fn initial_state(&self, s: &mut [f64]) {
        s[0] = self.i.value();
    }

    fn derivative(&self, _t: Time, _s: &[f64], _v_m: Voltage, ds: &mut [f64]) {
        ds[0] = 0.0;
    }

    fn current(&self, _t: Time, s: &[f64]) -> Current {
        Current::new(s[0])
    }
}

/// Injects a constant current during `[t_on, t_off)`, zero outside.
/// State: `[i]`; the edges are scheduled discontinuities.
#[derive(Debug, Clone, Copy)]
pub struct StepCurrent {
    i: Current,
    t_on: Time,
    t_off: Time,
}

impl StepCurrent {
    /// Source injecting `i` during `[t_on, t_off)`.
    pub fn new(i: Current, t_on: Time, t_off: Time) -> Self {
        Self { i, t_on, t_off }
    }
}

impl CurrentSource for StepCurrent {
    fn state_len(&self) -> usize {
        1
    }

    fn initial_state(&self, s: &mut [f64]) {
        s[0] = 0.0;
    }

    fn derivative(&self, _t: Time, _s: &[f64], _v_m: Voltage, ds: &mut [f64]) {
        ds[0] = 0.0;
    }

    fn current(&self, _t: Time, s: &[f64]) -> Current {
        Current::new(s[0])
    }

    fn discontinuities(&self) -> Vec<Time> {
        vec![self.t_on, self.t_off]
    }

    fn handle_discontinuity(&self, t: Time, s: &mut [f64]) {
        s[0] = if t >= self.t_on && t < self.t_off {
            self.i.value()
        } else {
            0.0
        };
    }
}

/// Current-based synapse with exponential decay.
///
/// Every input spike increments the synaptic current by the weight `w`;
/// between spikes the current decays with time constant `tau`.
/// State: `[i_syn]`.
#[derive(Debug, Clone)]
pub struct CurExpSynapse {
    w: Current,
    tau: Time,
    input_spikes: Vec<Time>,
}

impl CurExpSynapse {
    /// Synapse with weight `w`, decay time constant `tau` and the given
    /// input spike train (sorted internally).
    pub fn new(w: Current, tau: Time, mut input_spikes: Vec<Time>) -> Self {
        input_spikes.sort_by(|a, b| a.partial_cmp(b).expect("spike times are finite"));
        Self {
            w,
            tau,
            input_spikes,
        }
    }
}

impl CurrentSource for CurExpSynapse {
    fn state_len(&self) -> usize {
        1
    }

    fn initial_state(&self, s: &mut [f64]) {
        s[0] = 0.0;
    }

    fn derivative(&self, _t: Time, s: &[f64], _v_m: Voltage, ds: &mut [f64]) {
        ds[0] = -s[0] / self.tau.value();
    }

    fn current(&self, _t: Time, s: &[f64]) -> Current {
        Current::new(s[0])
    }

    fn discontinuities(&self) -> Vec<Time> {
        self.input_spikes.clone()
    }

    fn handle_discontinuity(&self, t: Time, s: &mut [f64]) {
        // Coincident input spikes each contribute one weight increment
        for &spike in &self.input_spikes {
            if spike == t {
                s[0] += self.w.value();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn lif_rests_at_e_rest_without_input() {
        let lif = LifNeuron::default();
        let mut s = [0.0];
        lif.initial_state(&mut s);
        assert_relative_eq!(s[0], -70e-3);

        let mut ds = [0.0];
        lif.derivative(Time::default(), &s, Current::default(), &mut ds);
        assert_eq!(ds[0], 0.0);
    }

    #[test]
    fn lif_threshold_reset_emits_spike() {
        let lif = LifNeuron::default();
        let mut s = [-50e-3]; // above the -54 mV threshold
        assert!(lif.post_step(Time::default(), &mut s));
        assert_relative_eq!(s[0], -80e-3);

        // Below threshold nothing happens
        let mut s = [-60e-3];
        assert!(!lif.post_step(Time::default(), &mut s));
        assert_eq!(s[0], -60e-3);
    }

    #[test]
    fn lif_rheobase_matches_parameters() {
        let lif = LifNeuron::default();
        // 16 mV across 2 uS
        assert!((lif.rheobase().value() - 32e-9).abs() < 1e-18);
    }

    #[test]
    fn step_current_switches_on_and_off() {
        let step = StepCurrent::new(
            Current::from_na(5.0),
            Time::from_ms(10.0),
            Time::from_ms(20.0),
        );
        assert_eq!(
            step.discontinuities(),
            vec![Time::from_ms(10.0), Time::from_ms(20.0)]
        );

        let mut s = [0.0];
        step.handle_discontinuity(Time::from_ms(10.0), &mut s);
        assert_relative_eq!(s[0], 5e-9);
        step.handle_discontinuity(Time::from_ms(20.0), &mut s);
        assert_eq!(s[0], 0.0);
    }

    #[test]
    fn cur_exp_decays_and_accumulates_spikes() {
        let syn = CurExpSynapse::new(
            Current::from_na(2.0),
            Time::from_ms(5.0),
            vec![Time::from_ms(3.0), Time::from_ms(3.0), Time::from_ms(8.0)],
        );

        let mut s = [0.0];
        // Two coincident spikes inject twice the weight
        syn.handle_discontinuity(Time::from_ms(3.0), &mut s);
        assert!((s[0] - 4e-9).abs() < 1e-20);

        let mut ds = [0.0];
        syn.derivative(Time::from_ms(4.0), &s, Voltage::default(), &mut ds);
        assert!((ds[0] + s[0] / 5e-3).abs() < 1e-12);
    }
}
