//! Proxy semantics, end to end: a second mock engine plays the
//! upstream, and the engine under test forwards to it.

mod common;

use common::{http_request, operation, pets_service, response, start_server};
use mockwire::config::MockSettings;
use mockwire::model::Service;

fn upstream_service() -> Service {
    Service {
        id: "up-1".into(),
        name: "Upstream".into(),
        version: "1.0".into(),
        operations: vec![operation("GET /pets/{id}", "GET", &["/pets/9"], None, None)],
    }
}

#[test]
fn test_proxy_dispatcher_forwards_unconditionally() {
    let upstream = start_server(
        vec![upstream_service()],
        vec![response(
            "up-1-GET /pets/{id}",
            "upstream pet",
            Some("application/json"),
            Some(r#"{"origin":"upstream"}"#),
            None,
        )],
        MockSettings::default(),
    );

    let proxy_base = format!("http://{}/rest/Upstream/1.0", upstream.addr);
    let service = pets_service(vec![operation(
        "GET /pets/{id}",
        "GET",
        &["/pets/9"],
        Some("PROXY"),
        Some(&proxy_base),
    )]);
    // A local response exists but PROXY forwards regardless.
    let local = response(
        "pets-1-GET /pets/{id}",
        "local pet",
        Some("application/json"),
        Some(r#"{"origin":"local"}"#),
        None,
    );
    let server = start_server(vec![service], vec![local], MockSettings::default());

    let reply = http_request(&server.addr, "GET", "/rest/Pets/1.0/pets/9", &[], None);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, r#"{"origin":"upstream"}"#);
}

#[test]
fn test_proxy_fallback_forwards_only_on_miss() {
    let upstream = start_server(
        vec![upstream_service()],
        vec![response(
            "up-1-GET /pets/{id}",
            "upstream pet",
            Some("application/json"),
            Some(r#"{"origin":"upstream"}"#),
            None,
        )],
        MockSettings::default(),
    );

    let proxy_base = format!("http://{}/rest/Upstream/1.0", upstream.addr);
    let rules = format!(
        r#"{{"dispatcher":"SEQUENCE","dispatcherRules":"id","proxyUrl":"{proxy_base}"}}"#
    );
    let service = pets_service(vec![operation(
        "GET /pets/{id}",
        "GET",
        &["/pets/1"],
        Some("PROXY_FALLBACK"),
        Some(&rules),
    )]);
    let responses = vec![response(
        "pets-1-GET /pets/{id}",
        "pet 1",
        Some("application/json"),
        Some(r#"{"origin":"local"}"#),
        Some("?id=1"),
    )];
    let server = start_server(vec![service], responses, MockSettings::default());

    // Criteria hit: served locally.
    let reply = http_request(&server.addr, "GET", "/rest/Pets/1.0/pets/1", &[], None);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, r#"{"origin":"local"}"#);

    // Criteria miss: forwarded upstream.
    let reply = http_request(&server.addr, "GET", "/rest/Pets/1.0/pets/9", &[], None);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, r#"{"origin":"upstream"}"#);
}

#[test]
fn test_proxy_transport_failure_surfaces_as_502() {
    // Point at a port nothing listens on.
    let service = pets_service(vec![operation(
        "GET /pets/{id}",
        "GET",
        &["/pets/9"],
        Some("PROXY"),
        Some("http://127.0.0.1:9/rest/Upstream/1.0"),
    )]);
    let server = start_server(vec![service], vec![], MockSettings::default());

    let reply = http_request(&server.addr, "GET", "/rest/Pets/1.0/pets/9", &[], None);
    assert_eq!(reply.status, 502);
}
