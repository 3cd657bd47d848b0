use serde_json::json;
use vapourcast::{resolve_model_path, Predictor, VapourcastError};

fn main() -> Result<(), VapourcastError> {
    // RUST_LOG=info (or debug) shows which prediction tier answered and why.
    env_logger::init();

    // Uses $VAPOURCAST_MODEL or the user data directory. Without an artifact
    // the predictor still answers through the fallback formulas.
    let predictor = Predictor::from_model_path(&resolve_model_path(None)?, None);
    println!("Model loaded: {}", predictor.has_model());

    let requests = [
        json!({"latitude": 40.0127, "longitude": -105.2535}),
        json!({"zwdObservation": 15}),
        json!({
            "stationLatitude": 40.0,
            "stationLongitude": -105.25,
            "stationElevation": 1650.0,
            "zwdObservation": 0.14,
            "temperature": 21.5,
            "pressure": 838.0,
            "humidity": 48.0,
            "dateString": "2024-07-14T18:00:00"
        }),
    ];

    for request in requests {
        println!("{}", request);
        match predictor.predict_json(request) {
            Ok(result) => println!("  -> {:#?}", result),
            Err(e) => eprintln!("  -> Error: {}", e),
        }
    }

    Ok(())
}
