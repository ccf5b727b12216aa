use futures::future::join_all;
use reqwest::{Method, StatusCode};
use std::collections::HashSet;
use std::time::Duration;
use weather_devkit::{clock_of, station, TestHarness};

#[tokio::test]
async fn first_put_creates_then_updates() {
    let harness = TestHarness::start().await.unwrap();

    let resp = harness.put_station(&station("IDS60901").adelaide().build()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(clock_of(&resp), Some(1));
    assert_eq!(resp.headers()["connection"], "close");

    let updated = station("IDS60901").adelaide().with("air_temp", "14.1").build();
    let resp = harness.put_station(&updated).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(clock_of(&resp), Some(2));

    let resp = harness.get().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(clock_of(&resp), Some(3));
    let readings = harness.readings().await.unwrap();
    assert_eq!(readings, vec![updated]);

    harness.stop().await.unwrap();
}

#[tokio::test]
async fn foreign_clock_advances_aggregator() {
    let harness = TestHarness::start().await.unwrap();
    let resp = harness.put_raw(station("S1").to_json(), Some("100")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(clock_of(&resp), Some(101));

    let resp = harness.get().await.unwrap();
    assert_eq!(clock_of(&resp), Some(102));
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn empty_put_is_no_content() {
    let harness = TestHarness::start().await.unwrap();
    let resp = harness.put_raw(Vec::new(), None).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(harness.readings().await.unwrap().is_empty());
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_updates_are_unprocessable() {
    let harness = TestHarness::start().await.unwrap();

    for body in [r#"{"air_temp":"13.3"}"#, "{ broken", r#"{"id":"S1","nested":{"a":1}}"#] {
        let resp = harness.put_raw(body, None).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "body: {body}");
        assert_eq!(clock_of(&resp), Some(0));
    }

    let resp = harness.put_raw(station("S1").to_json(), Some("soon")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(clock_of(&resp), Some(0));

    assert!(harness.readings().await.unwrap().is_empty());
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn other_methods_are_bad_request() {
    let harness = TestHarness::start().await.unwrap();
    for method in [Method::POST, Method::DELETE] {
        let resp = harness.request(method.clone()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "method {method}");
    }
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn query_returns_latest_twenty() {
    let harness = TestHarness::start().await.unwrap();
    for i in 1..=25 {
        let resp = harness.put_station(&station(&format!("S{i:02}")).build()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let ids: Vec<String> = harness
        .readings()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r["id"].clone())
        .collect();
    let expected: Vec<String> = (6..=25).map(|i| format!("S{i:02}")).collect();
    assert_eq!(ids, expected);
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn silent_station_expires() {
    let harness = TestHarness::start_with(|cfg| {
        cfg.sweep_period = Duration::from_millis(50);
        cfg.staleness_deadline = Duration::from_millis(200);
    })
    .await
    .unwrap();

    harness.put_station(&station("quiet").build()).await.unwrap();
    assert_eq!(harness.readings().await.unwrap().len(), 1);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(harness.readings().await.unwrap().is_empty());
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn restart_recovers_readings_and_clock() {
    let harness = TestHarness::start().await.unwrap();
    harness.put_station(&station("S1").with("air_temp", "10").build()).await.unwrap();
    harness.put_station(&station("S2").with("air_temp", "20").build()).await.unwrap();

    // Leftover of a commit that never reached the rename.
    std::fs::write(harness.data_dir().join("weather_data.json.tmp"), b"[{\"garbage\"").unwrap();

    let harness = harness.restart().await.unwrap();
    assert!(!harness.data_dir().join("weather_data.json.tmp").exists());

    let resp = harness.get().await.unwrap();
    assert_eq!(clock_of(&resp), Some(3));
    let readings = harness.readings().await.unwrap();
    let ids: Vec<&str> = readings.iter().map(|r| r["id"].as_str()).collect();
    assert_eq!(ids, vec!["S1", "S2"]);
    assert_eq!(readings[1]["air_temp"], "20");

    // A recovered station is an existing slot, not a new one.
    let resp = harness.put_station(&station("S1").build()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    harness.stop().await.unwrap();
}

#[tokio::test]
async fn concurrent_producers_get_distinct_clocks() {
    let harness = TestHarness::start().await.unwrap();

    let stations: Vec<_> = (0..16).map(|i| station(&format!("P{i}")).adelaide().build()).collect();
    let responses = join_all(stations.iter().map(|s| harness.put_station(s))).await;

    let mut clocks = HashSet::new();
    for resp in responses {
        let resp = resp.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        clocks.insert(clock_of(&resp).unwrap());
    }
    assert_eq!(clocks.len(), 16);
    assert_eq!(harness.readings().await.unwrap().len(), 16);
    harness.stop().await.unwrap();
}
