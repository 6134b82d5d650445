//! Simulation driver.
//!
//! [`Solver`] orchestrates integrator, controller and recorder: it
//! repeatedly asks the integrator to advance, clamps every step so the grid
//! lands exactly on the next scheduled discontinuity (and on the end time),
//! absorbs adaptive step rejections, and forwards each accepted state to
//! the recorder before querying the controller for an early-stop verdict.

use thiserror::Error;
use tracing::{debug, trace};

use crate::controller::{ControlVerdict, Controller};
use crate::integrator::Integrator;
use crate::quantity::Time;
use crate::recorder::Recorder;
use crate::system::{NeuronModel, NeuronSystem};

/// Errors that terminate or prevent a simulation run.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Malformed configuration, rejected before integration starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The adaptive integrator cannot make progress above its minimum step
    /// size.
    #[error("step size underflow at t = {t} s (h = {h})")]
    StepSizeUnderflow {
        /// Time at which the underflow occurred.
        t: f64,
        /// Last suggested step size.
        h: f64,
    },

    /// A state component became NaN or infinite.
    #[error("non-finite value in state component {component} at t = {t} s")]
    NonFiniteState {
        /// Time of the offending step.
        t: f64,
        /// Index of the offending component in the composite state vector.
        component: usize,
    },

    /// Runaway-loop backstop.
    #[error("maximum number of steps ({0}) exceeded")]
    MaxStepsExceeded(u64),
}

/// Configuration surface of a simulation run.
#[derive(Debug, Clone)]
pub struct SolverOptions {
    /// Start time of the run.
    pub t_start: Time,
    /// End time of the run; reaching it always stops.
    pub t_end: Time,
    /// Step size: the actual step for fixed-step integrators, the initial
    /// step for adaptive ones.
    pub dt: Time,
    /// Bound on consecutive step rejections before the run fails.
    pub max_rejections: u32,
    /// Bound on total accepted steps.
    pub max_steps: u64,
}

impl SolverOptions {
    /// Options running from time zero to `t_end` with step `dt`.
    pub fn new(t_end: Time, dt: Time) -> Self {
        Self {
            t_start: Time::default(),
            t_end,
            dt,
            max_rejections: 64,
            max_steps: 10_000_000,
        }
    }

    /// Sets a non-zero start time.
    pub fn starting_at(mut self, t_start: Time) -> Self {
        self.t_start = t_start;
        self
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self::new(Time::from_s(1.0), Time::from_ms(0.1))
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The configured end time was reached.
    ReachedEnd,
    /// The controller permitted stopping and no discontinuities remained.
    Settled,
    /// The controller demanded an immediate stop.
    Aborted,
}

/// Run statistics for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Total number of derivative evaluations.
    pub fn_evals: u64,
    /// Number of accepted steps.
    pub accepted_steps: u64,
    /// Number of rejected steps.
    pub rejected_steps: u64,
    /// Number of spikes emitted by the neuron model.
    pub spikes: u64,
}

/// Final state of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Time at which the run ended.
    pub t: Time,
    /// State vector at the end of the run.
    pub state: Vec<f64>,
    /// Why the run ended.
    pub termination: Termination,
    /// Run statistics.
    pub stats: Stats,
}

/// Orchestrates one simulation run over a borrowed composite system.
pub struct Solver<'a, M, I, C, R> {
    sys: &'a NeuronSystem<M>,
    integrator: I,
    controller: C,
    recorder: &'a mut R,
}

impl<'a, M, I, C, R> Solver<'a, M, I, C, R>
where
    M: NeuronModel,
    I: Integrator,
    C: Controller<NeuronSystem<M>>,
    R: Recorder,
{
    /// Creates a solver borrowing the system and recorder for the run.
    pub fn new(sys: &'a NeuronSystem<M>, integrator: I, controller: C, recorder: &'a mut R) -> Self {
        Self {
            sys,
            integrator,
            controller,
            recorder,
        }
    }

    fn validate(&self, opts: &SolverOptions) -> Result<(), SolverError> {
        let t0 = opts.t_start.value();
        let t_end = opts.t_end.value();
        if !t0.is_finite() || !t_end.is_finite() {
            return Err(SolverError::InvalidConfig(
                "start and end times must be finite".into(),
            ));
        }
        if t0 < 0.0 {
            return Err(SolverError::InvalidConfig(format!(
                "start time {} is negative",
                opts.t_start
            )));
        }
        if t_end < t0 {
            return Err(SolverError::InvalidConfig(format!(
                "end time {} precedes start time {}",
                opts.t_end, opts.t_start
            )));
        }
        let dt = opts.dt.value();
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SolverError::InvalidConfig(format!(
                "step size {} must be positive",
                opts.dt
            )));
        }
        Ok(())
    }

    fn check_finite(y: &[f64], t: f64) -> Result<(), SolverError> {
        for (component, v) in y.iter().enumerate() {
            if !v.is_finite() {
                return Err(SolverError::NonFiniteState { t, component });
            }
        }
        Ok(())
    }

    /// Runs the simulation to `opts.t_end`, an `Abort` verdict, a settled
    /// stop, or a fatal numerical failure.
    pub fn solve(&mut self, opts: &SolverOptions) -> Result<RunSummary, SolverError> {
        self.validate(opts)?;

        let t0 = opts.t_start.value();
        let t_end = opts.t_end.value();

        let mut schedule = self.sys.schedule()?;
        schedule.advance_past(opts.t_start);

        let mut y = self.sys.initial_state();
        for (component, v) in y.iter().enumerate() {
            if !v.is_finite() {
                return Err(SolverError::InvalidConfig(format!(
                    "initial state component {} is not finite",
                    component
                )));
            }
        }

        let mut stats = Stats::default();
        debug!(
            t_start = t0,
            t_end,
            dim = y.len(),
            events = schedule.times().len(),
            "starting simulation run"
        );

        self.recorder.record(opts.t_start, &y);
        if t_end == t0 {
            return Ok(self.summary(opts.t_start, y, Termination::ReachedEnd, stats));
        }

        let mut t = t0;
        loop {
            // Clamp the step so it cannot cross the next unconsumed
            // discontinuity nor the end time
            let t_stop = match schedule.peek() {
                Some(te) if te.value() < t_end => te.value(),
                _ => t_end,
            };
            let dt_max = t_stop - t;
            let mut h = self.integrator.propose(opts.dt.value()).min(dt_max);

            // Step, absorbing bounded rejections (adaptive only)
            let mut rejections = 0u32;
            let result = loop {
                let result = self.integrator.step(self.sys, t, &y, h);
                stats.fn_evals += self.integrator.evals_per_step();
                if result.accepted {
                    break result;
                }
                stats.rejected_steps += 1;
                rejections += 1;
                if rejections > opts.max_rejections || result.h_next <= self.integrator.min_step() {
                    return Err(SolverError::StepSizeUnderflow {
                        t,
                        h: result.h_next,
                    });
                }
                h = result.h_next.min(dt_max);
            };
            stats.accepted_steps += 1;

            // Land exactly on the clamp target; `h` equals `dt_max`
            // bit-exactly whenever the clamp applied
            t = if h == dt_max { t_stop } else { result.t };
            y = result.y;
            Self::check_finite(&y, t)?;

            let now = Time::new(t);
            if self.sys.apply_post_step(now, &mut y) {
                stats.spikes += 1;
                self.recorder.record_spike(now);
            }
            self.recorder.record(now, &y);

            // Consume a discontinuity we landed on and record the state
            // again to represent the sharp jump
            if let Some(te) = schedule.peek() {
                if te.value() <= t {
                    trace!(t, "handling scheduled discontinuity");
                    self.sys.handle_discontinuity(te, &mut y);
                    schedule.consume();
                    self.recorder.record(now, &y);
                }
            }

            match self.controller.control(now, &y, self.sys) {
                ControlVerdict::Abort => {
                    debug!(t, "controller aborted the run");
                    return Ok(self.summary(now, y, Termination::Aborted, stats));
                }
                ControlVerdict::MayContinue if !schedule.has_entry_before(opts.t_end) => {
                    debug!(t, "settled with no discontinuities remaining");
                    return Ok(self.summary(now, y, Termination::Settled, stats));
                }
                _ => {}
            }

            if t >= t_end {
                debug!(t, accepted = stats.accepted_steps, "reached end time");
                return Ok(self.summary(now, y, Termination::ReachedEnd, stats));
            }
            if stats.accepted_steps >= opts.max_steps {
                return Err(SolverError::MaxStepsExceeded(opts.max_steps));
            }
        }
    }

    fn summary(&self, t: Time, state: Vec<f64>, termination: Termination, stats: Stats) -> RunSummary {
        RunSummary {
            t,
            state,
            termination,
            stats,
        }
    }
}
