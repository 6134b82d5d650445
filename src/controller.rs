//! Early-termination controllers.
//!
//! After every accepted step the solver asks its controller for a verdict.
//! Controllers are small and composable: the cascade combinator reduces an
//! ordered list of sub-verdicts with an absolute-veto rule, so independent
//! stop conditions can be combined without losing correctness.

use crate::quantity::{Current, Time};
use crate::system::{Dynamics, NeuronModel, NeuronSystem};

/// Decision produced by a controller at every accepted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlVerdict {
    /// Keep going unconditionally until the end time is reached.
    Continue,
    /// The solver may stop once no more discontinuities remain, but is not
    /// forced to.
    MayContinue,
    /// Stop now.
    Abort,
}

/// Capability of deciding, at `(t, y)`, whether the simulation may stop.
///
/// Receivers are mutable: controller variants may hold scratch buffers or
/// stateful predicates.
pub trait Controller<S> {
    /// Produce a verdict for the current step.
    fn control(&mut self, t: Time, y: &[f64], sys: &S) -> ControlVerdict;
}

/// Always returns a fixed verdict. `ConstantController(Continue)` never
/// aborts a run and is the base case of composition.
#[derive(Debug, Clone, Copy)]
pub struct ConstantController(pub ControlVerdict);

impl<S> Controller<S> for ConstantController {
    fn control(&mut self, _t: Time, _y: &[f64], _sys: &S) -> ControlVerdict {
        self.0
    }
}

/// Permits stopping once the membrane has settled: the voltage rate is
/// small relative to the voltage itself and the total injected current is
/// back at its configured baseline.
#[derive(Debug, Clone)]
pub struct SettledController {
    offset: Current,
    rate_atol: f64,
    rate_rtol: f64,
    current_tol: Current,
    scratch: Vec<f64>,
}

impl SettledController {
    /// Default voltage-rate tolerances (absolute floor plus relative part).
    const RATE_TOL: f64 = 1e-3;
    /// Default tolerance on the injected-current baseline match.
    const CURRENT_TOL: Current = Current::from_a(1e-13);

    /// Controller with the reference tolerances and the given baseline
    /// "no current" offset.
    pub fn new(offset: Current) -> Self {
        Self::with_tolerances(offset, Self::RATE_TOL, Self::RATE_TOL, Self::CURRENT_TOL)
    }

    /// Controller with caller-supplied tolerances.
    pub fn with_tolerances(
        offset: Current,
        rate_atol: f64,
        rate_rtol: f64,
        current_tol: Current,
    ) -> Self {
        Self {
            offset,
            rate_atol,
            rate_rtol,
            current_tol,
            scratch: Vec::new(),
        }
    }
}

impl<M: NeuronModel> Controller<NeuronSystem<M>> for SettledController {
    fn control(&mut self, t: Time, y: &[f64], sys: &NeuronSystem<M>) -> ControlVerdict {
        self.scratch.resize(sys.dim(), 0.0);
        sys.rhs(t.value(), y, &mut self.scratch);

        let v = y[0];
        let dv = self.scratch[0];
        let rate_settled = dv.abs() <= self.rate_atol + self.rate_rtol * v.abs();

        let i = sys.current(t, y);
        let current_settled = (i - self.offset).abs() <= self.current_tol;

        if rate_settled && current_settled {
            ControlVerdict::MayContinue
        } else {
            ControlVerdict::Continue
        }
    }
}

/// Wraps an external zero-argument predicate: returns a configured verdict
/// (default [`ControlVerdict::MayContinue`]) while the predicate holds,
/// [`ControlVerdict::Abort`] once it no longer does.
pub struct ConditionController<F> {
    predicate: F,
    verdict: ControlVerdict,
}

impl<F: FnMut() -> bool> ConditionController<F> {
    /// Condition controller returning `MayContinue` while the predicate
    /// holds.
    pub fn new(predicate: F) -> Self {
        Self::with_verdict(predicate, ControlVerdict::MayContinue)
    }

    /// Condition controller returning the given verdict while the
    /// predicate holds.
    pub fn with_verdict(predicate: F, verdict: ControlVerdict) -> Self {
        Self { predicate, verdict }
    }
}

impl<S, F: FnMut() -> bool> Controller<S> for ConditionController<F> {
    fn control(&mut self, _t: Time, _y: &[f64], _sys: &S) -> ControlVerdict {
        if (self.predicate)() {
            self.verdict
        } else {
            ControlVerdict::Abort
        }
    }
}

/// Combines an ordered list of controllers.
///
/// Every member is evaluated on every step (members may be stateful, so
/// none is skipped). The verdicts reduce as: any `Abort` wins; else any
/// `Continue` wins; unanimous `MayContinue` is required to permit stopping.
pub struct CascadeController<S> {
    members: Vec<Box<dyn Controller<S>>>,
}

impl<S> CascadeController<S> {
    /// Empty cascade; with no members the verdict is `MayContinue`.
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Appends a controller to the cascade.
    pub fn with(mut self, controller: impl Controller<S> + 'static) -> Self {
        self.members.push(Box::new(controller));
        self
    }
}

impl<S> Default for CascadeController<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Controller<S> for CascadeController<S> {
    fn control(&mut self, t: Time, y: &[f64], sys: &S) -> ControlVerdict {
        let mut aborted = false;
        let mut continuing = false;
        for member in &mut self.members {
            match member.control(t, y, sys) {
                ControlVerdict::Abort => aborted = true,
                ControlVerdict::Continue => continuing = true,
                ControlVerdict::MayContinue => {}
            }
        }
        if aborted {
            ControlVerdict::Abort
        } else if continuing {
            ControlVerdict::Continue
        } else {
            ControlVerdict::MayContinue
        }
    }
}

/// Convenience cascade: stop once the membrane has settled *and* the
/// external condition still holds (the condition aborts the run outright
/// when it fails).
pub fn settled_while<M, F>(
    predicate: F,
    offset: Current,
) -> CascadeController<NeuronSystem<M>>
where
    M: NeuronModel + 'static,
    F: FnMut() -> bool + 'static,
{
    CascadeController::new()
        .with(ConditionController::new(predicate))
        .with(SettledController::new(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::Voltage;
    use crate::system::CurrentSource;
    use ControlVerdict::{Abort, Continue, MayContinue};

    /// Minimal system for controllers that never touch it.
    struct NoSystem;

    fn run(cascade: &mut CascadeController<NoSystem>) -> ControlVerdict {
        cascade.control(Time::default(), &[], &NoSystem)
    }

    fn cascade_of(verdicts: &[ControlVerdict]) -> CascadeController<NoSystem> {
        let mut cascade = CascadeController::new();
        for &v in verdicts {
            cascade = cascade.with(ConstantController(v));
        }
        cascade
    }

    /// Reduction expected from the cascade rule.
    fn reduce(verdicts: &[ControlVerdict]) -> ControlVerdict {
        if verdicts.contains(&Abort) {
            Abort
        } else if verdicts.contains(&Continue) {
            Continue
        } else {
            MayContinue
        }
    }

    #[test]
    fn constant_controller_returns_its_verdict() {
        for v in [Continue, MayContinue, Abort] {
            assert_eq!(
                ConstantController(v).control(Time::default(), &[], &NoSystem),
                v
            );
        }
    }

    #[test]
    fn cascade_exhaustive_pairs() {
        let all = [Continue, MayContinue, Abort];
        for a in all {
            for b in all {
                assert_eq!(run(&mut cascade_of(&[a, b])), reduce(&[a, b]), "{:?} {:?}", a, b);
            }
        }
    }

    #[test]
    fn cascade_exhaustive_triples() {
        let all = [Continue, MayContinue, Abort];
        for a in all {
            for b in all {
                for c in all {
                    assert_eq!(
                        run(&mut cascade_of(&[a, b, c])),
                        reduce(&[a, b, c]),
                        "{:?} {:?} {:?}",
                        a,
                        b,
                        c
                    );
                }
            }
        }
    }

    #[test]
    fn cascade_aborts_iff_any_member_aborts() {
        let all = [Continue, MayContinue, Abort];
        for a in all {
            for b in all {
                for c in all {
                    let got = run(&mut cascade_of(&[a, b, c]));
                    let any_abort = [a, b, c].contains(&Abort);
                    assert_eq!(got == Abort, any_abort);
                }
            }
        }
    }

    #[test]
    fn cascade_evaluates_every_member() {
        use std::cell::Cell;
        use std::rc::Rc;

        struct Counting(Rc<Cell<u32>>, ControlVerdict);
        impl<S> Controller<S> for Counting {
            fn control(&mut self, _t: Time, _y: &[f64], _sys: &S) -> ControlVerdict {
                self.0.set(self.0.get() + 1);
                self.1
            }
        }

        let hits = Rc::new(Cell::new(0));
        let mut cascade: CascadeController<NoSystem> = CascadeController::new()
            .with(Counting(hits.clone(), Abort))
            .with(Counting(hits.clone(), Continue))
            .with(Counting(hits.clone(), MayContinue));

        // No short-circuit: the leading Abort must not skip the rest
        assert_eq!(run(&mut cascade), Abort);
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn condition_controller_aborts_when_predicate_fails() {
        let mut remaining = 2;
        let mut controller = ConditionController::new(move || {
            remaining -= 1;
            remaining >= 0
        });
        assert_eq!(controller.control(Time::default(), &[], &NoSystem), MayContinue);
        assert_eq!(controller.control(Time::default(), &[], &NoSystem), MayContinue);
        assert_eq!(controller.control(Time::default(), &[], &NoSystem), Abort);
    }

    #[test]
    fn condition_controller_configured_verdict() {
        let mut controller = ConditionController::with_verdict(|| true, Continue);
        assert_eq!(controller.control(Time::default(), &[], &NoSystem), Continue);
    }

    /// Static membrane at rest with a 1 pF capacitance, so any injected
    /// current produces a large voltage rate.
    struct RestingMembrane;
    impl NeuronModel for RestingMembrane {
        fn state_len(&self) -> usize {
            1
        }
        fn initial_state(&self, s: &mut [f64]) {
            s[0] = -70e-3;
        }
        fn derivative(&self, _t: Time, _s: &[f64], i_input: Current, ds: &mut [f64]) {
            ds[0] = i_input.value() / 1e-12;
        }
    }

    struct FixedCurrent(Current);
    impl CurrentSource for FixedCurrent {
        fn state_len(&self) -> usize {
            0
        }
        fn initial_state(&self, _s: &mut [f64]) {}
        fn derivative(&self, _t: Time, _s: &[f64], _v: Voltage, _ds: &mut [f64]) {}
        fn current(&self, _t: Time, _s: &[f64]) -> Current {
            self.0
        }
    }

    #[test]
    fn settled_at_rest_with_zero_current() {
        let sys = NeuronSystem::new(RestingMembrane);
        let y = sys.initial_state();
        let mut controller = SettledController::new(Current::default());
        assert_eq!(controller.control(Time::default(), &y, &sys), MayContinue);
    }

    #[test]
    fn not_settled_while_current_flows() {
        let sys =
            NeuronSystem::new(RestingMembrane).with_source(FixedCurrent(Current::from_na(10.0)));
        let y = sys.initial_state();
        let mut controller = SettledController::new(Current::default());
        assert_eq!(controller.control(Time::default(), &y, &sys), Continue);
    }

    #[test]
    fn settled_against_matching_offset_baseline() {
        let baseline = Current::from_na(10.0);
        let sys = NeuronSystem::new(RestingMembrane).with_source(FixedCurrent(baseline));
        let y = sys.initial_state();

        // The injected current matches the baseline, but it still drives
        // the membrane, so the rate check keeps the run going
        let mut controller = SettledController::new(baseline);
        assert_eq!(controller.control(Time::default(), &y, &sys), Continue);

        // With a loose rate tolerance only the current check remains
        let mut loose =
            SettledController::with_tolerances(baseline, 1e6, 0.0, Current::from_a(1e-13));
        assert_eq!(loose.control(Time::default(), &y, &sys), MayContinue);
    }
}
