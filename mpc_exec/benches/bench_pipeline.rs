//! Benchmark of a single control cycle, from raw telemetry payload to encoded reply.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::sim::{InboundFrame, OutboundFrame, Telemetry};
use mpc_lib::{
    mpc::{Mpc, MpcParams},
    mpc_ctrl::MpcCtrl,
    params::VehicleParams,
};
use util::module::State;

/// Telemetry for a vehicle on a gentle left hand curve, slightly off the road.
fn telemetry() -> Telemetry {
    let ptsx: Vec<f64> = (0..6).map(|k| 10.0 * k as f64).collect();
    let ptsy: Vec<f64> = ptsx.iter().map(|x| 0.5 + 0.004 * x * x).collect();

    Telemetry {
        ptsx,
        ptsy,
        x: 0.0,
        y: 0.0,
        psi: 0.0,
        speed: 25.0,
        steering_angle: -0.1,
        throttle: 0.3,
    }
}

fn bench_pipeline(c: &mut Criterion) {
    let vehicle = VehicleParams::default();
    let payload = telemetry().to_payload().unwrap();

    // Iteration bound only, so every cycle does the same work
    let params = MpcParams {
        max_solve_time_s: 1e3,
        ..MpcParams::default()
    };
    let mut ctrl = MpcCtrl::new(&vehicle, Mpc::new(params, &vehicle).unwrap());

    c.bench_function("telemetry_to_steer", |b| b.iter(|| {
        let t = match InboundFrame::from_payload(black_box(&payload)) {
            InboundFrame::Telemetry(t) => t,
            f => panic!("Expected telemetry, got {:?}", f),
        };
        let (cmd, _) = ctrl.proc(&t).unwrap();
        OutboundFrame::Steer(cmd).to_payload().unwrap()
    }));
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
