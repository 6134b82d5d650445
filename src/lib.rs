//! # neurode: Single Spiking-Neuron ODE Integration Engine
//!
//! Integrates the autonomous ordinary differential equation of one
//! spiking-neuron model plus an arbitrary set of attached current sources,
//! producing a time series of state vectors and spike events.
//!
//! ## Features
//!
//! - Composite system assembly: one flat state vector and one derivative
//!   function over a neuron model and its current sources
//! - Fixed-step integrators (Euler, midpoint, classic Runge-Kutta) and an
//!   adaptive Dormand-Prince 5(4) embedded pair with step-size control
//! - Event-aligned stepping: the integration grid lands exactly on every
//!   scheduled discontinuity (input spikes, current switching edges)
//! - Composable early-termination controllers with a three-valued verdict
//!   protocol
//! - Pluggable recording sinks for trajectories and spike times
//!
//! ## Basic Usage
//!
//! ```rust
//! use neurode::{
//!     ConstantController, ControlVerdict, CurExpSynapse, LifNeuron, NeuronSystem, RungeKutta4,
//!     Solver, SolverOptions, Time, TraceRecorder, Current,
//! };
//!
//! // A LIF neuron driven by one exponential synapse receiving two spikes
//! let synapse = CurExpSynapse::new(
//!     Current::from_na(40.0),
//!     Time::from_ms(5.0),
//!     vec![Time::from_ms(10.0), Time::from_ms(30.0)],
//! );
//! let sys = NeuronSystem::new(LifNeuron::default()).with_source(synapse);
//!
//! let mut recorder = TraceRecorder::new();
//! let options = SolverOptions::new(Time::from_ms(100.0), Time::from_ms(0.1));
//!
//! let summary = Solver::new(
//!     &sys,
//!     RungeKutta4,
//!     ConstantController(ControlVerdict::Continue),
//!     &mut recorder,
//! )
//! .solve(&options)
//! .unwrap();
//!
//! assert!(!recorder.rows().is_empty());
//! println!("finished at {} after {} steps", summary.t, summary.stats.accepted_steps);
//! ```
//!
//! ## Early termination
//!
//! A [`SettledController`] lets a run stop as soon as the membrane has
//! returned to rest and no scheduled input remains, instead of integrating
//! to an arbitrarily large end time. Controllers compose with
//! [`CascadeController`]: any `Abort` vetoes the run, any `Continue`
//! overrides the "may stop" votes, and stopping requires unanimity.
//!
//! ## Concurrency
//!
//! One run is strictly single-threaded. Independent runs (parameter
//! sweeps) share nothing and can be distributed across threads by the
//! caller.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod coefficients;
pub mod controller;
pub mod integrator;
pub mod models;
pub mod quantity;
pub mod recorder;
pub mod schedule;
pub mod solver;
pub mod spikes;
pub mod system;

pub use controller::{
    settled_while, CascadeController, ConditionController, ConstantController, ControlVerdict,
    Controller, SettledController,
};
pub use integrator::{
    DormandPrince, Euler, Integrator, Midpoint, RungeKutta4, StepController, StepResult, Tolerances,
};
pub use models::{ConstantCurrent, CurExpSynapse, LifNeuron, LifParameters, StepCurrent};
pub use quantity::{Capacitance, Conductance, Current, Time, Voltage};
pub use recorder::{CsvRecorder, NullRecorder, Recorder, TraceRecorder};
pub use schedule::EventSchedule;
pub use solver::{RunSummary, Solver, SolverError, SolverOptions, Stats, Termination};
pub use system::{CurrentSource, Dynamics, NeuronModel, NeuronSystem};
