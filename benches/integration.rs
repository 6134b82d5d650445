use criterion::{black_box, criterion_group, criterion_main, Criterion};
use neurode::{
    spikes, ConstantController, ControlVerdict, CurExpSynapse, Current, DormandPrince, LifNeuron,
    NeuronSystem, NullRecorder, RungeKutta4, Solver, SolverOptions, Time, Tolerances,
};

fn spike_train_system() -> NeuronSystem<LifNeuron> {
    // 100 Hz regular input over one second
    let train = spikes::constant_frequency(Time::from_ms(10.0), Time::from_s(1.0), 100.0);
    NeuronSystem::new(LifNeuron::default()).with_source(CurExpSynapse::new(
        Current::from_na(40.0),
        Time::from_ms(5.0),
        train,
    ))
}

fn bench_lif_spike_train_rk4(c: &mut Criterion) {
    let sys = spike_train_system();

    c.bench_function("lif_spike_train_1s_rk4", |b| {
        b.iter(|| {
            let mut recorder = NullRecorder;
            let opts = SolverOptions::new(Time::from_s(1.0), Time::from_ms(0.05));
            Solver::new(
                black_box(&sys),
                RungeKutta4,
                ConstantController(ControlVerdict::Continue),
                &mut recorder,
            )
            .solve(&opts)
            .unwrap()
        })
    });
}

fn bench_lif_spike_train_dormand_prince(c: &mut Criterion) {
    let sys = spike_train_system();

    c.bench_function("lif_spike_train_1s_dormand_prince", |b| {
        b.iter(|| {
            let mut recorder = NullRecorder;
            let integrator = DormandPrince::new(Tolerances::new(1e-8, 1e-8));
            let opts = SolverOptions::new(Time::from_s(1.0), Time::from_ms(0.1));
            Solver::new(
                black_box(&sys),
                integrator,
                ConstantController(ControlVerdict::Continue),
                &mut recorder,
            )
            .solve(&opts)
            .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_lif_spike_train_rk4,
    bench_lif_spike_train_dormand_prince
);
criterion_main!(benches);
