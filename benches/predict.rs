use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::sync::Arc;
use vapourcast::{train_artifact, BoosterParams, Observation, Predictor, TrainingConfig};

fn network() -> Vec<Observation> {
    let stations = [
        ("ALFA", 40.0, -105.0, 1600.0),
        ("BRAV", 41.0, -100.0, 900.0),
        ("CHAR", 38.0, -98.0, 400.0),
        ("DELT", 44.0, -103.0, 1100.0),
        ("ECHO", 36.0, -102.0, 1200.0),
    ];
    let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let mut rows = Vec::new();
    for (s, (id, lat, lon, elev)) in stations.iter().enumerate() {
        for h in 0..48 {
            let temperature = 10.0 + (h % 24) as f64 * 0.5 + s as f64;
            let zwd = 0.08 + 0.002 * (h % 24) as f64 + 0.01 * s as f64;
            rows.push(Observation {
                station_id: id.to_string(),
                latitude: *lat,
                longitude: *lon,
                elevation: *elev,
                timestamp: start + Duration::hours(h),
                zwd_m: zwd,
                temperature_c: temperature,
                pressure_hpa: 1010.0 - elev / 10.0,
                humidity_pct: 45.0 + (h % 24) as f64,
                satellite_azimuth: None,
                satellite_elevation: None,
                measured_pw_mm: Some(vapourcast::physics::bevis_pw_mm(zwd, temperature) + 1.0),
            });
        }
    }
    rows
}

fn bench_predict(c: &mut Criterion) {
    let observations = network();
    let artifact = train_artifact()
        .observations(&observations)
        .config(TrainingConfig {
            booster: BoosterParams {
                n_estimators: 50,
                ..BoosterParams::default()
            },
            ..TrainingConfig::default()
        })
        .call()
        .unwrap();
    let trained = Predictor::builder().artifact(Arc::new(artifact)).build();
    let untrained = Predictor::builder().build();

    let coordinates = json!({"latitude": 39.5, "longitude": -101.0});
    let features = json!({
        "stationLatitude": 40.0,
        "stationLongitude": -105.0,
        "stationElevation": 1600.0,
        "zwdObservation": 0.12,
        "temperature": 18.0,
        "pressure": 850.0,
        "humidity": 55.0,
        "year": 2024, "month": 7, "day": 2, "hour": 12
    });

    c.bench_function("coordinates_trained", |b| {
        b.iter(|| trained.predict_json(black_box(coordinates.clone())))
    });
    c.bench_function("features_trained", |b| {
        b.iter(|| trained.predict_json(black_box(features.clone())))
    });
    c.bench_function("features_untrained", |b| {
        b.iter(|| untrained.predict_json(black_box(features.clone())))
    });
}

criterion_group!(benches, bench_predict);
criterion_main!(benches);
