use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};

use api_mock::{Registrar, RegistrarError};
use api_mock_mockserver::{Body, MockServerClient};
use serde_json::json;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use crate::{fixtures_dir, registered_expectations, setup_control_plane, AssertWrapper};

fn registrar(mock_server: &MockServer) -> Registrar<MockServerClient> {
    let client = MockServerClient::new(&mock_server.uri()).unwrap();
    Registrar::new(client, fixtures_dir())
}

#[tokio::test]
async fn test_registers_seven_rules() -> anyhow::Result<()> {
    let mock_server = setup_control_plane(1, 7).await;

    let report = registrar(&mock_server)
        .run(Some("4406144"))
        .await
        .assert_success();
    assert_eq!(report.expectations.len(), 7);

    let registered = registered_expectations(&mock_server).await;
    let targets: BTreeSet<_> = registered
        .iter()
        .map(|expectation| {
            (
                expectation.http_request.method.clone().unwrap(),
                expectation.http_request.headers["Host"][0].clone(),
                expectation.path().to_string(),
            )
        })
        .collect();

    let target = |host: &str, path: &str| ("GET".to_string(), host.to_string(), path.to_string());
    let metadata = |path: &str| target("169.254.169.254", path);
    let api = |path: &str| target("api.hetzner.cloud", path);
    assert_eq!(
        targets,
        BTreeSet::from([
            metadata("/latest/user-data"),
            metadata("/hetzner/v1/metadata/instance-id"),
            api("/v1/networks/50343"),
            api("/v1/floating_ips"),
            api("/v1/servers"),
            api("/v1/servers/4406144"),
            api("/v1/servers/4406228"),
        ])
    );

    for expectation in registered.iter().filter(|e| e.path().starts_with("/v1/")) {
        assert_eq!(
            expectation.http_request.headers["Authorization"],
            vec!["Bearer hcloudtoken".to_string()]
        );
        assert_eq!(
            expectation.http_response.headers["Content-Type"],
            vec!["application/json".to_string()]
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_instance_id_is_served_verbatim() -> anyhow::Result<()> {
    let mock_server = setup_control_plane(1, 7).await;
    registrar(&mock_server).run(Some("4406144")).await?;

    let registered = registered_expectations(&mock_server).await;
    let instance_id = registered
        .iter()
        .find(|e| e.path() == "/hetzner/v1/metadata/instance-id")
        .unwrap();

    assert_eq!(
        instance_id.http_response.body,
        Some(Body::Text("4406144".to_string()))
    );
    assert!(instance_id.http_response.headers.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_fixture_bodies_are_verbatim() -> anyhow::Result<()> {
    let mock_server = setup_control_plane(1, 7).await;
    registrar(&mock_server).run(Some("4406144")).await?;

    let registered = registered_expectations(&mock_server).await;
    for (route, fixture) in [
        ("/latest/user-data", "latest/user-data.yml"),
        ("/v1/networks/50343", "v1/networks/50343.json"),
        ("/v1/servers/4406228", "v1/servers/4406228.json"),
    ] {
        let expectation = registered.iter().find(|e| e.path() == route).unwrap();
        let on_disk = std::fs::read_to_string(fixtures_dir().join(fixture))?;
        assert_eq!(
            expectation.http_response.body.as_ref().and_then(Body::as_text),
            Some(on_disk.as_str()),
            "{route}"
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_custom_token() -> anyhow::Result<()> {
    let mock_server = setup_control_plane(1, 7).await;
    let client = MockServerClient::new(&mock_server.uri())?;
    Registrar::new(client, fixtures_dir())
        .token("othertoken")
        .run(Some("1"))
        .await?;

    let registered = registered_expectations(&mock_server).await;
    let expected = vec!["Bearer othertoken".to_string()];
    let authorized = registered
        .iter()
        .filter(|e| e.http_request.headers.get("Authorization") == Some(&expected))
        .count();
    assert_eq!(authorized, 5);

    Ok(())
}

#[tokio::test]
async fn test_whitespace_instance_id_is_served_verbatim() -> anyhow::Result<()> {
    let mock_server = setup_control_plane(1, 7).await;
    registrar(&mock_server).run(Some(" ")).await.assert_success();

    let registered = registered_expectations(&mock_server).await;
    let instance_id = registered
        .iter()
        .find(|e| e.path() == "/hetzner/v1/metadata/instance-id")
        .unwrap();
    assert_eq!(
        instance_id.http_response.body,
        Some(Body::Text(" ".to_string()))
    );

    Ok(())
}

#[tokio::test]
async fn test_registrations_run_concurrently() -> anyhow::Result<()> {
    let delay = Duration::from_millis(300);
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/mockserver/reset"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/mockserver/expectation"))
        .respond_with(ResponseTemplate::new(201).set_delay(delay))
        .expect(7)
        .mount(&mock_server)
        .await;

    let started = Instant::now();
    registrar(&mock_server).run(Some("4406144")).await?;
    let elapsed = started.elapsed();

    // one after another would take at least 7 delays
    assert!(elapsed >= delay, "{elapsed:?}");
    assert!(elapsed < delay * 5, "{elapsed:?}");

    Ok(())
}

#[tokio::test]
async fn test_missing_instance_id_makes_no_calls() -> anyhow::Result<()> {
    let mock_server = setup_control_plane(0, 0).await;
    let registrar = registrar(&mock_server);

    for raw in [None, Some("")] {
        let result = registrar.run(raw).await;
        assert!(matches!(result, Err(RegistrarError::EmptyInstanceId)));
    }
    assert!(mock_server.received_requests().await.unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_running_twice_registers_same_rules() -> anyhow::Result<()> {
    let mock_server = setup_control_plane(2, 14).await;
    let registrar = registrar(&mock_server);

    let mut first = registrar.run(Some("4406144")).await?.expectations;
    let mut second = registrar.run(Some("4406144")).await?.expectations;
    first.sort_by(|a, b| a.path().cmp(b.path()));
    second.sort_by(|a, b| a.path().cmp(b.path()));
    assert_eq!(first, second);

    // the second reset arrives after all seven registrations of the first run
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.path(), "/mockserver/reset");
    assert_eq!(requests[8].url.path(), "/mockserver/reset");

    Ok(())
}

#[tokio::test]
async fn test_missing_fixtures() -> anyhow::Result<()> {
    let empty = tempfile::tempdir()?;
    // only the literal instance id rule can be registered
    let mock_server = setup_control_plane(1, 1).await;
    let client = MockServerClient::new(&mock_server.uri())?;

    let result = Registrar::new(client, empty.path()).run(Some("4406144")).await;
    match result {
        Err(RegistrarError::Registration { failed, source }) => {
            assert_eq!(failed.len(), 6);
            assert!(!failed.contains(&"/hetzner/v1/metadata/instance-id".to_string()));
            assert!(matches!(*source, RegistrarError::Fixture { .. }));
        }
        other => panic!("expected a registration error, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_custom_fixtures_dir() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    for fixture in [
        "latest/user-data.yml",
        "v1/networks/50343.json",
        "v1/floating_ips.json",
        "v1/_servers.json",
        "v1/servers/4406144.json",
        "v1/servers/4406228.json",
    ] {
        let path = dir.path().join(fixture);
        std::fs::create_dir_all(path.parent().unwrap())?;
        std::fs::write(&path, format!("fixture {fixture}"))?;
    }

    let mock_server = setup_control_plane(1, 7).await;
    let client = MockServerClient::new(&mock_server.uri())?;
    Registrar::new(client, dir.path()).run(Some("4406144")).await?;

    let registered = registered_expectations(&mock_server).await;
    let servers = registered.iter().find(|e| e.path() == "/v1/servers").unwrap();
    assert_eq!(
        servers.http_response.body,
        Some(Body::Text("fixture v1/_servers.json".to_string()))
    );

    Ok(())
}

#[tokio::test]
async fn test_rejected_registrations() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/mockserver/reset"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/mockserver/expectation"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("incorrect expectation json format"),
        )
        .expect(7)
        .mount(&mock_server)
        .await;

    let result = registrar(&mock_server).run(Some("4406144")).await;
    match result {
        Err(RegistrarError::Registration { failed, source }) => {
            assert_eq!(failed.len(), 7);
            assert!(matches!(*source, RegistrarError::MockServer(_)));
        }
        other => panic!("expected a registration error, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_failed_reset_registers_nothing() -> anyhow::Result<()> {
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/mockserver/reset"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/mockserver/expectation"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    registrar(&mock_server)
        .run(Some("4406144"))
        .await
        .assert_error();

    Ok(())
}

#[tokio::test]
async fn test_verify_active_expectations() -> anyhow::Result<()> {
    let mock_server = setup_control_plane(1, 7).await;
    let registrar = registrar(&mock_server);
    let report = registrar.run(Some("4406144")).await?;

    Mock::given(method("PUT"))
        .and(path("/mockserver/retrieve"))
        .and(query_param("type", "ACTIVE_EXPECTATIONS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(report.expectations)))
        .expect(1)
        .mount(&mock_server)
        .await;

    registrar.verify(&report).await.assert_success();

    Ok(())
}

#[tokio::test]
async fn test_verify_reports_missing_expectation() -> anyhow::Result<()> {
    let mock_server = setup_control_plane(1, 7).await;
    let registrar = registrar(&mock_server);
    let report = registrar.run(Some("4406144")).await?;

    let active: Vec<_> = report
        .expectations
        .iter()
        .filter(|e| e.path() != "/v1/floating_ips")
        .collect();
    Mock::given(method("PUT"))
        .and(path("/mockserver/retrieve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(active)))
        .mount(&mock_server)
        .await;

    match registrar.verify(&report).await {
        Err(RegistrarError::Verification {
            expected,
            actual,
            missing,
        }) => {
            assert_eq!(expected, 7);
            assert_eq!(actual, 6);
            assert_eq!(missing, vec!["/v1/floating_ips".to_string()]);
        }
        other => panic!("expected a verification error, got {other:?}"),
    }

    Ok(())
}
