use serde_json::json;
use solar_sizer::domain::{GeoLocation, ModelingMethod, ResourceSource, SystemConfiguration};
use solar_sizer::production::{
    synthesize_resource, EstimatorSettings, ModelRequest, ProductionError, ProductionEstimator,
    ProductionModel, ProductionRequest, PvWattsClient, SolarResourceProvider,
};
use solar_sizer::repo::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PVWATTS_PATH: &str = "/api/pvwatts/v8.json";

fn client(server: &MockServer) -> PvWattsClient {
    PvWattsClient::new(
        server.uri(),
        "TEST_KEY".into(),
        "nsrdb".into(),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn model_request() -> ModelRequest {
    let location = GeoLocation::new(34.05, -118.24);
    ModelRequest {
        system_size_kw: 8.0,
        configuration: SystemConfiguration::for_latitude(34.05),
        resource: synthesize_resource(&location),
        location,
    }
}

fn monthly_body(warnings: Vec<&str>, distance: f64) -> serde_json::Value {
    json!({
        "inputs": {},
        "errors": [],
        "warnings": warnings,
        "station_info": {
            "lat": 34.05,
            "lon": -118.26,
            "distance": distance,
            "city": "Los Angeles",
            "state": "California"
        },
        "outputs": {
            "ac_monthly": [800.0, 850.0, 1000.0, 1100.0, 1200.0, 1250.0,
                           1300.0, 1280.0, 1150.0, 1000.0, 850.0, 780.0],
            "ac_annual": 12560.0,
            "solrad_monthly": [4.0, 4.5, 5.5, 6.3, 6.8, 7.0, 7.2, 7.0, 6.2, 5.3, 4.4, 3.9],
            "capacity_factor": 17.9
        }
    })
}

#[tokio::test]
async fn monthly_estimate_is_translated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PVWATTS_PATH))
        .and(query_param("timeframe", "monthly"))
        .and(query_param("array_type", "1"))
        .and(query_param("api_key", "TEST_KEY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(monthly_body(vec![], 1.2)))
        .expect(1)
        .mount(&server)
        .await;

    let out = client(&server)
        .estimate_production(&model_request())
        .await
        .unwrap();

    assert_eq!(out.monthly_kwh.len(), 12);
    assert_eq!(out.annual_kwh, 12560.0);
    assert!((out.capacity_factor - 0.179).abs() < 1e-9);
    let station = out.station.unwrap();
    assert_eq!(station.city.as_deref(), Some("Los Angeles"));
    assert!(out.warnings.is_empty());
}

#[tokio::test]
async fn service_errors_surface_coordinates_and_configuration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PVWATTS_PATH))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "errors": ["tilt must be between 0 and 90"],
            "warnings": []
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .estimate_production(&model_request())
        .await
        .unwrap_err();

    match err {
        ProductionError::ServiceRejected {
            latitude,
            longitude,
            configuration,
            errors,
        } => {
            assert_eq!(latitude, 34.05);
            assert_eq!(longitude, -118.24);
            assert_eq!(*configuration, SystemConfiguration::for_latitude(34.05));
            assert_eq!(errors, vec!["tilt must be between 0 and 90".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn server_failure_is_recoverable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PVWATTS_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client(&server)
        .estimate_production(&model_request())
        .await
        .unwrap_err();
    assert!(err.is_recoverable(), "{err}");
}

#[tokio::test]
async fn hourly_failure_yields_empty_series() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PVWATTS_PATH))
        .and(query_param("timeframe", "hourly"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let hourly = client(&server).hourly_production(&model_request()).await;
    assert!(hourly.is_empty());
}

#[tokio::test]
async fn hourly_output_is_converted_to_kwh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PVWATTS_PATH))
        .and(query_param("timeframe", "hourly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [],
            "warnings": [],
            "outputs": { "ac": [0.0, 1500.0, 3000.0] }
        })))
        .mount(&server)
        .await;

    let hourly = client(&server).hourly_production(&model_request()).await;
    assert_eq!(hourly, vec![0.0, 1.5, 3.0]);
}

#[tokio::test]
async fn solar_resource_is_parsed_by_month() {
    let server = MockServer::start().await;
    let months = ["jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec"];
    let ghi: serde_json::Map<String, serde_json::Value> = months
        .iter()
        .enumerate()
        .map(|(i, m)| (m.to_string(), json!(3.0 + i as f64 * 0.25)))
        .collect();
    let dni: serde_json::Map<String, serde_json::Value> =
        months.iter().map(|m| (m.to_string(), json!(6.0))).collect();

    Mock::given(method("GET"))
        .and(path("/api/solar/solar_resource/v1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [],
            "outputs": {
                "avg_dni": { "annual": 6.0, "monthly": dni },
                "avg_ghi": { "annual": 4.4, "monthly": ghi },
                "avg_lat_tilt": "no data"
            }
        })))
        .mount(&server)
        .await;

    let resource = client(&server)
        .fetch_resource(&GeoLocation::new(34.05, -118.24))
        .await
        .unwrap();
    assert_eq!(resource.source, ResourceSource::Service);
    assert_eq!(resource.monthly.len(), 12);
    assert_eq!(resource.monthly[0].ghi, 3.0);
    assert_eq!(resource.monthly[11].ghi, 5.75);
    assert!(resource.monthly.iter().all(|m| m.dhi > 0.0 && m.dhi < m.ghi));
}

#[tokio::test]
async fn estimator_uses_service_and_records_station() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PVWATTS_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(monthly_body(vec!["station is far"], 80.0)),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let client = Arc::new(client(&server));
    let estimator = ProductionEstimator::new(
        client.clone(),
        client,
        store.clone(),
        store.clone(),
        EstimatorSettings::default(),
    );
    let request = ProductionRequest::new(
        Uuid::new_v4(),
        8.0,
        SystemConfiguration::for_latitude(34.05),
        GeoLocation::new(34.05, -118.24),
    );

    let estimate = estimator.estimate(&request).await.unwrap();
    assert_eq!(estimate.method, ModelingMethod::Pvwatts);
    // 0.85 - 0.10 (warnings) - 0.05 (station distance)
    assert!((estimate.confidence - 0.70).abs() < 1e-9);
    assert_eq!(estimate.specific_yield, 12560.0 / 8.0);
    assert_eq!(store.estimate_count(), 1);
}

#[tokio::test]
async fn slow_service_times_out_into_synthetic_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PVWATTS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(monthly_body(vec![], 1.0))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let client = Arc::new(client(&server));
    let settings = EstimatorSettings {
        service_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let estimator =
        ProductionEstimator::new(client.clone(), client, store.clone(), store, settings);
    let request = ProductionRequest::new(
        Uuid::new_v4(),
        8.0,
        SystemConfiguration::for_latitude(34.05),
        GeoLocation::new(34.05, -118.24),
    );

    let estimate = estimator.estimate(&request).await.unwrap();
    assert_eq!(estimate.method, ModelingMethod::Synthetic);
    assert!(estimate.capacity_factor > 0.0 && estimate.capacity_factor <= 1.0);
    assert!(estimate
        .warnings
        .iter()
        .any(|w| w.contains("synthetic model used")));
}

#[tokio::test]
async fn estimator_keeps_monthly_estimate_when_hourly_request_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PVWATTS_PATH))
        .and(query_param("timeframe", "monthly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(monthly_body(vec![], 1.0)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PVWATTS_PATH))
        .and(query_param("timeframe", "hourly"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let client = Arc::new(client(&server));
    let estimator = ProductionEstimator::new(
        client.clone(),
        client,
        store.clone(),
        store,
        EstimatorSettings::default(),
    );
    let request = ProductionRequest::new(
        Uuid::new_v4(),
        8.0,
        SystemConfiguration::for_latitude(34.05),
        GeoLocation::new(34.05, -118.24),
    )
    .with_hourly();

    let estimate = estimator.estimate(&request).await.unwrap();
    assert_eq!(estimate.method, ModelingMethod::Pvwatts);
    assert_eq!(estimate.annual_kwh, 12560.0);
    assert!(estimate.hourly_kwh.is_empty());
    assert!(estimate.warnings.is_empty());
}
