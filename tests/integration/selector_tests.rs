//! Transport selector routing: network first, BLE fallback.

use serde_json::json;

use wandrpc::{Availability, Client, ClientConfig, DiscoveryOptions, TransportKind};

use crate::mock_link::{Outcome, ScriptedTransport};

fn config() -> ClientConfig {
    ClientConfig {
        call_timeout_ms: 100,
        ..ClientConfig::default()
    }
}

fn all() -> DiscoveryOptions {
    DiscoveryOptions {
        use_wireless: true,
        use_mdns: true,
        ..DiscoveryOptions::default()
    }
}

fn client(net: ScriptedTransport, ble: ScriptedTransport) -> Client<ScriptedTransport, ScriptedTransport> {
    Client::with_transports(net, ble, &config())
}

fn net(found: bool, outcome: Outcome) -> ScriptedTransport {
    ScriptedTransport::new(TransportKind::Network, found, outcome)
}

fn ble(found: bool, outcome: Outcome) -> ScriptedTransport {
    ScriptedTransport::new(TransportKind::Wireless, found, outcome)
}

#[tokio::test]
async fn network_success_never_touches_wireless() {
    let c = client(
        net(true, Outcome::Respond(json!("http"))),
        ble(true, Outcome::Respond(json!("ble"))),
    );
    c.find(&all()).await;

    let r = c.call("sys", "health", vec![]).await.unwrap();
    assert_eq!(r.result, Some(json!("http")));
    assert_eq!(c.network().calls(), 1);
    assert_eq!(c.wireless().calls(), 0);
}

#[tokio::test]
async fn network_failure_falls_back_to_wireless() {
    let c = client(net(true, Outcome::Fail), ble(true, Outcome::Respond(json!("ble"))));
    c.find(&all()).await;

    let r = c.call("wand", "get_percent", vec![]).await.unwrap();
    assert_eq!(r.result, Some(json!("ble")));
    assert_eq!(c.network().calls(), 1);
    assert_eq!(c.wireless().calls(), 1);
}

#[tokio::test]
async fn unavailable_network_skips_straight_to_wireless() {
    let c = client(
        net(false, Outcome::Respond(json!("http"))),
        ble(true, Outcome::Respond(json!("ble"))),
    );
    c.find(&all()).await;
    assert_eq!(c.availability(TransportKind::Network), Availability::Unavailable);

    let r = c.call("sys", "health", vec![]).await.unwrap();
    assert_eq!(r.result, Some(json!("ble")));
    assert_eq!(c.network().calls(), 0);
}

#[tokio::test]
async fn undiscovered_network_is_not_tried() {
    let c = client(
        net(true, Outcome::Respond(json!("http"))),
        ble(true, Outcome::Respond(json!("ble"))),
    );
    assert_eq!(c.availability(TransportKind::Network), Availability::Unknown);

    let r = c.call("sys", "health", vec![]).await.unwrap();
    assert_eq!(r.result, Some(json!("ble")));
    assert_eq!(c.network().calls(), 0);
}

#[tokio::test]
async fn both_failing_surfaces_the_wireless_error() {
    let c = client(net(true, Outcome::Fail), ble(true, Outcome::Fail));
    c.find(&all()).await;

    let err = c.call("sys", "restart", vec![]).await.unwrap_err();
    assert_eq!(err.transport_kind(), Some(TransportKind::Wireless));
    assert!(err.to_string().contains("sys:restart"));
    assert_eq!(c.network().calls(), 1);
    assert_eq!(c.wireless().calls(), 1);
}

#[tokio::test]
async fn peer_error_does_not_trigger_fallback() {
    let c = client(
        net(true, Outcome::PeerError("bad percent".into())),
        ble(true, Outcome::Respond(json!("ble"))),
    );
    c.find(&all()).await;

    let r = c.call("wand", "set_percent", vec![json!(250)]).await.unwrap();
    assert_eq!(r.error.as_deref(), Some("bad percent"));
    assert_eq!(c.wireless().calls(), 0);

    let err = r.into_result("wand:set_percent").unwrap_err();
    assert!(err.is_peer_reported());
}

#[tokio::test]
async fn hung_network_times_out_then_falls_back() {
    let c = client(net(true, Outcome::Hang), ble(true, Outcome::Respond(json!("ble"))));
    c.find(&all()).await;

    let r = c.call("sys", "health", vec![]).await.unwrap();
    assert_eq!(r.result, Some(json!("ble")));
}

#[tokio::test]
async fn hung_wireless_surfaces_timeout() {
    let c = client(net(false, Outcome::Fail), ble(true, Outcome::Hang));
    c.find(&all()).await;

    let err = c.call("uart", "get_last", vec![]).await.unwrap_err();
    assert!(matches!(
        err,
        wandrpc::RpcError::Timeout {
            transport: TransportKind::Wireless,
            ..
        }
    ));
}

#[tokio::test]
async fn find_records_each_transport_independently() {
    let c = client(net(true, Outcome::Fail), ble(false, Outcome::Fail));
    c.find(&all()).await;
    assert_eq!(c.availability(TransportKind::Network), Availability::Available);
    assert_eq!(c.availability(TransportKind::Wireless), Availability::Unavailable);
}

#[tokio::test]
async fn find_only_discovers_what_was_asked_for() {
    let c = client(net(true, Outcome::Fail), ble(true, Outcome::Fail));
    c.find(&DiscoveryOptions {
        use_wireless: false,
        use_mdns: false,
        address: None,
        rediscover: false,
    })
    .await;
    assert_eq!(c.network().discovers(), 0);
    assert_eq!(c.wireless().discovers(), 0);
    assert_eq!(c.availability(TransportKind::Wireless), Availability::Unknown);

    c.find(&DiscoveryOptions {
        address: Some("10.0.0.2:8080".into()),
        ..DiscoveryOptions::default()
    })
    .await;
    assert_eq!(c.network().discovers(), 1);
    assert_eq!(c.wireless().discovers(), 0);
}

#[tokio::test]
async fn failed_call_does_not_demote_network() {
    let c = client(net(true, Outcome::Fail), ble(true, Outcome::Respond(json!(1))));
    c.find(&all()).await;

    c.call("sys", "health", vec![]).await.unwrap();
    assert_eq!(c.availability(TransportKind::Network), Availability::Available);

    // Still tried first on the next call.
    c.network().set_outcome(Outcome::Respond(json!(2)));
    let r = c.call("sys", "health", vec![]).await.unwrap();
    assert_eq!(r.result, Some(json!(2)));
    assert_eq!(c.wireless().calls(), 1);
}

#[tokio::test]
async fn named_wrappers_shape_calls() {
    let c = client(net(true, Outcome::Respond(json!(42))), ble(false, Outcome::Fail));
    c.find(&all()).await;

    assert_eq!(c.wand_get_percent().await.unwrap().result, Some(json!(42)));
    c.wand_set_percent(50).await.unwrap();
    c.set_wifi(&wandrpc::WifiConfig::wpa2_personal("home", "pw")).await.unwrap();
    assert_eq!(c.network().calls(), 3);
}

#[tokio::test]
async fn named_wrappers_fix_method_and_argument_order() {
    let c = client(net(true, Outcome::Respond(json!(null))), ble(false, Outcome::Fail));
    c.find(&all()).await;

    c.set_lovense_mapping(10, 90).await.unwrap();
    let sent = c.network().last_call().unwrap();
    assert_eq!(sent.qualified(), "wand:update_lovense_mapping");
    assert_eq!(sent.args(), [json!(10), json!(90)]);

    c.set_light_mappings(1, 2, 3, 4).await.unwrap();
    let sent = c.network().last_call().unwrap();
    assert_eq!(sent.qualified(), "wand:set_light_mappings");
    assert_eq!(sent.args(), [json!(1), json!(2), json!(3), json!(4)]);

    c.set_button_increments(5, 15).await.unwrap();
    let sent = c.network().last_call().unwrap();
    assert_eq!(sent.qualified(), "wand:set_button_increments");
    assert_eq!(sent.args(), [json!(5), json!(15)]);

    c.set_wifi(&wandrpc::WifiConfig::wpa2_enterprise("corp", "anon", "me", "pw"))
        .await
        .unwrap();
    let sent = c.network().last_call().unwrap();
    assert_eq!(sent.namespace(), "conn");
    assert_eq!(sent.method(), "set_wifi");
    assert_eq!(
        sent.args(),
        [json!({
            "ssid": "corp",
            "authentication": {
                "type": "enterprise",
                "identity": "anon",
                "username": "me",
                "password": "pw"
            }
        })]
    );

    c.uart_send("ping").await.unwrap();
    let sent = c.network().last_call().unwrap();
    assert_eq!(sent.qualified(), "uart:send");
    assert_eq!(sent.args(), [json!("ping")]);
}

#[tokio::test]
async fn liveness_check_rederives_network_availability() {
    let c = client(net(true, Outcome::Fail), ble(false, Outcome::Fail));
    assert_eq!(c.check_network().await, Availability::Available);
    assert_eq!(c.availability(TransportKind::Network), Availability::Available);

    let dead = client(net(false, Outcome::Fail), ble(false, Outcome::Fail));
    assert_eq!(dead.check_network().await, Availability::Unavailable);
}
