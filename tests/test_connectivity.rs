use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use genserve::config::{Config, StaticIp};
use genserve::eventlog::EventKind;
use genserve::http::response::ResponseKind;
use genserve::net::LinkStatus;
use genserve::server::{ConnectivityState, Controller, ServiceStep};
use genserve::sim::{SimClient, SimHost, SimRadio};
use tokio::time::{Instant, advance};

fn browser() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 1, 50))
}

fn setup(cfg: Config) -> (Controller<SimRadio, SimHost>, SimRadio, SimHost) {
    let radio = SimRadio::new();
    let host = SimHost::new();
    let controller = Controller::new(cfg, radio.clone(), host.clone()).unwrap();
    (controller, radio, host)
}

async fn associate(controller: &Controller<SimRadio, SimHost>) {
    assert_eq!(
        controller.service().await,
        ServiceStep::AssociationStarted { attempt: 1 }
    );
    assert_eq!(controller.service().await, ServiceStep::Associated);
}

fn post(path: &str, body: &str) -> String {
    format!(
        "POST {path} HTTP/1.1\r\nHost: 192.168.1.10\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
}

#[tokio::test(start_paused = true)]
async fn test_association_reaches_awaiting_client() {
    let (controller, radio, host) = setup(Config::default());

    associate(&controller).await;

    assert_eq!(
        controller.with_context(|ctx| ctx.state()).await,
        ConnectivityState::AwaitingClient
    );
    assert_eq!(radio.servers_started(), vec![80]);
    assert!(host.link_led());
    let (connects, attempts) = controller
        .with_context(|ctx| (ctx.stats.connects, ctx.link.connect_attempts))
        .await;
    assert_eq!(connects, 1);
    assert_eq!(attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_reassociation_while_connected() {
    let (controller, radio, _host) = setup(Config::default());
    associate(&controller).await;

    for _ in 0..5 {
        assert_eq!(controller.service().await, ServiceStep::Idle);
    }

    assert_eq!(radio.begin_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_association_pending_while_idle() {
    let (controller, radio, _host) = setup(Config::default());
    radio.script_status([LinkStatus::Idle, LinkStatus::Idle]);

    assert!(matches!(
        controller.service().await,
        ServiceStep::AssociationStarted { .. }
    ));
    assert_eq!(controller.service().await, ServiceStep::AssociationPending);
    assert_eq!(controller.service().await, ServiceStep::AssociationPending);
    assert_eq!(controller.service().await, ServiceStep::Associated);
}

#[tokio::test(start_paused = true)]
async fn test_resets_once_after_max_attempts() {
    let (controller, radio, host) = setup(Config::default());
    radio.set_fallback(LinkStatus::ConnectFailed);

    for attempt in 1..=3 {
        assert_eq!(
            controller.service().await,
            ServiceStep::AssociationStarted { attempt }
        );
        assert_eq!(
            controller.service().await,
            ServiceStep::AssociationFailed {
                attempts: attempt,
                reset: attempt == 3,
            }
        );
        assert!(!host.link_led());
        if attempt < 3 {
            assert_eq!(controller.service().await, ServiceStep::RetryWait);
            assert_eq!(radio.resets(), 0);
        }
        advance(Duration::from_secs(10)).await;
    }

    assert_eq!(radio.resets(), 1);
    let (attempts, resets, failures) = controller
        .with_context(|ctx| {
            (
                ctx.link.connect_attempts,
                ctx.stats.resets,
                ctx.stats.connect_failures,
            )
        })
        .await;
    assert_eq!(attempts, 0);
    assert_eq!(resets, 1);
    assert_eq!(failures, 3);

    // The ladder starts over after the reset.
    assert_eq!(
        controller.service().await,
        ServiceStep::AssociationStarted { attempt: 1 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_waits_for_connect_delay() {
    let (controller, radio, _host) = setup(Config::default());
    radio.script_status([LinkStatus::NoNetwork]);

    controller.service().await;
    assert!(matches!(
        controller.service().await,
        ServiceStep::AssociationFailed { attempts: 1, reset: false }
    ));

    advance(Duration::from_secs(9)).await;
    assert_eq!(controller.service().await, ServiceStep::RetryWait);
    advance(Duration::from_secs(1)).await;
    assert_eq!(
        controller.service().await,
        ServiceStep::AssociationStarted { attempt: 2 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_link_loss_resets_module() {
    let (controller, radio, host) = setup(Config::default());
    associate(&controller).await;

    radio.script_status([LinkStatus::ConnectionLost]);
    assert_eq!(controller.service().await, ServiceStep::LinkLost);

    assert_eq!(radio.resets(), 1);
    assert!(!host.link_led());
    let (state, disconnects, kinds) = controller
        .with_context(|ctx| {
            (
                ctx.state(),
                ctx.stats.disconnects,
                ctx.log.iter_newest_first().map(|e| e.kind).collect::<Vec<_>>(),
            )
        })
        .await;
    assert_eq!(state, ConnectivityState::Disconnected);
    assert_eq!(disconnects, 1);
    assert_eq!(
        kinds,
        vec![
            EventKind::WifiReset,
            EventKind::WifiDisconnected,
            EventKind::WifiConnected,
        ]
    );

    assert_eq!(controller.service().await, ServiceStep::RetryWait);
    advance(Duration::from_secs(10)).await;
    associate(&controller).await;
    assert_eq!(radio.servers_started(), vec![80, 80]);
}

#[tokio::test(start_paused = true)]
async fn test_service_is_not_reentrant() {
    let (controller, radio, _host) = setup(Config::default());
    let gate = radio.block_begin();

    let (first, second) = tokio::join!(controller.service(), async {
        tokio::task::yield_now().await;
        let step = controller.service().await;
        gate.notify_one();
        step
    });

    assert_eq!(first, ServiceStep::AssociationStarted { attempt: 1 });
    assert_eq!(second, ServiceStep::Busy);
    assert_eq!(radio.begin_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_power_gating() {
    let (controller, radio, host) = setup(Config::default());

    host.update(|panel| panel.power = false);
    assert_eq!(controller.service().await, ServiceStep::PowerWait);

    host.update(|panel| {
        panel.power = true;
        panel.power_restored_at = Some(Instant::now());
    });
    assert_eq!(controller.service().await, ServiceStep::PowerWait);
    advance(Duration::from_secs(119)).await;
    assert_eq!(controller.service().await, ServiceStep::PowerWait);
    assert_eq!(radio.begin_calls(), 0);

    advance(Duration::from_secs(1)).await;
    assert!(matches!(
        controller.service().await,
        ServiceStep::AssociationStarted { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_static_ip_applied_before_association() {
    let mut cfg = Config::default();
    cfg.wifi.static_ip = Some(StaticIp {
        address: Ipv4Addr::new(192, 168, 1, 10),
        gateway: Ipv4Addr::new(192, 168, 1, 1),
        dns: Ipv4Addr::new(192, 168, 1, 1),
        subnet: Ipv4Addr::new(255, 255, 255, 0),
    });
    let (controller, radio, _host) = setup(cfg);

    controller.service().await;

    assert_eq!(radio.static_configs(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_status_page_served() {
    let (controller, radio, host) = setup(Config::default());
    host.set_display(["Utility on", "", "", ""]);
    associate(&controller).await;

    let client = SimClient::new(browser(), "GET / HTTP/1.1\r\nHost: x\r\n\r\n");
    radio.push_client(client.clone());

    assert_eq!(
        controller.service().await,
        ServiceStep::Responded(ResponseKind::Status)
    );
    let out = client.output_text();
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("Utility&nbsp;on"));
    assert!(client.is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_favicon_not_counted_as_visit() {
    let (controller, radio, _host) = setup(Config::default());
    associate(&controller).await;

    let favicon = SimClient::new(browser(), "GET /favicon.ico HTTP/1.1\r\n\r\n");
    radio.push_client(favicon.clone());
    assert_eq!(
        controller.service().await,
        ServiceStep::Responded(ResponseKind::Favicon)
    );
    assert!(favicon.output_text().contains("Content-Type: image/jpg"));

    let (count, requests) = controller
        .with_context(|ctx| {
            (
                ctx.visitors.get(browser()).map(|r| r.count),
                ctx.stats.requests_processed,
            )
        })
        .await;
    assert_eq!(count, Some(0));
    assert_eq!(requests, 0);

    radio.push_client(SimClient::new(browser(), "GET /log HTTP/1.1\r\n\r\n"));
    assert_eq!(
        controller.service().await,
        ServiceStep::Responded(ResponseKind::Log)
    );
    let count = controller
        .with_context(|ctx| ctx.visitors.get(browser()).map(|r| r.count))
        .await;
    assert_eq!(count, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_request_gets_diagnostic_page() {
    let (controller, radio, _host) = setup(Config::default());
    associate(&controller).await;

    let client = SimClient::new(browser(), "GET /admin HTTP/1.1\r\n\r\n");
    radio.push_client(client.clone());

    assert_eq!(
        controller.service().await,
        ServiceStep::Responded(ResponseKind::Unknown)
    );
    assert!(client.output_text().contains("UNKNOWN HTTP REQUEST"));
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_push_asks_for_password() {
    let (controller, radio, host) = setup(Config::default());
    associate(&controller).await;

    let client = SimClient::new(browser(), post("/pushbutton.html", "button=2"));
    radio.push_client(client.clone());

    assert_eq!(
        controller.service().await,
        ServiceStep::Responded(ResponseKind::AskPassword)
    );
    assert!(host.pressed().is_empty());
    assert!(client.output_text().contains("setpass.html"));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_button_is_unknown() {
    let (controller, radio, host) = setup(Config::default());
    associate(&controller).await;

    radio.push_client(SimClient::new(
        browser(),
        post("/pushbutton.html", "button=7"),
    ));
    assert_eq!(
        controller.service().await,
        ServiceStep::Responded(ResponseKind::Unknown)
    );

    radio.push_client(SimClient::new(
        browser(),
        post("/pushbutton.html", "button=two"),
    ));
    assert_eq!(
        controller.service().await,
        ServiceStep::Responded(ResponseKind::Unknown)
    );
    assert!(host.pressed().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wrong_password_rejected() {
    let (controller, radio, _host) = setup(Config::default());
    associate(&controller).await;

    radio.push_client(SimClient::new(browser(), post("/setpass.html", "pwd=letmein")));
    assert_eq!(
        controller.service().await,
        ServiceStep::Responded(ResponseKind::AskPassword)
    );

    let authorized = controller
        .with_context(|ctx| ctx.visitors.get(browser()).map(|r| r.authorized))
        .await;
    assert_eq!(authorized, Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_empty_password_body_is_unknown() {
    let (controller, radio, _host) = setup(Config::default());
    associate(&controller).await;

    radio.push_client(SimClient::new(
        browser(),
        "POST /setpass.html HTTP/1.1\r\nContent-Length: 0\r\n\r\n",
    ));
    assert_eq!(
        controller.service().await,
        ServiceStep::Responded(ResponseKind::Unknown)
    );
}

#[tokio::test(start_paused = true)]
async fn test_authorized_push_defers_status_page() {
    let (controller, radio, host) = setup(Config::default());
    associate(&controller).await;

    radio.push_client(SimClient::new(browser(), post("/setpass.html", "pwd=password")));
    assert_eq!(
        controller.service().await,
        ServiceStep::Responded(ResponseKind::Status)
    );

    let push = SimClient::new(browser(), post("/pushbutton.html", "button=2"));
    radio.push_client(push.clone());
    assert_eq!(controller.service().await, ServiceStep::Deferred);
    assert_eq!(host.pressed(), vec![2]);
    assert!(push.output().is_empty());
    assert_eq!(
        controller.with_context(|ctx| ctx.state()).await,
        ConnectivityState::ProcessingRequest
    );

    let deadline = controller
        .with_context(|ctx| ctx.pending.deadline())
        .await
        .unwrap();
    assert_eq!(deadline - Instant::now(), Duration::from_millis(1000));

    assert_eq!(controller.service().await, ServiceStep::DeferredWaiting);
    advance(Duration::from_millis(1000)).await;
    assert_eq!(controller.service().await, ServiceStep::DeferredWaiting);
    assert!(push.output().is_empty());

    advance(Duration::from_millis(1)).await;
    assert_eq!(controller.service().await, ServiceStep::DeferredSent);
    assert_eq!(
        controller.with_context(|ctx| ctx.pending.deadline()).await,
        None
    );

    let out = push.output_text();
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("<p class=\"lcd\">"));
    assert!(push.is_stopped());
    assert_eq!(
        controller.with_context(|ctx| ctx.state()).await,
        ConnectivityState::AwaitingClient
    );
}

#[tokio::test(start_paused = true)]
async fn test_fatal_error_shown_on_status_page() {
    let (controller, radio, host) = setup(Config::default());
    host.update(|panel| panel.fatal = Some("no battery".to_string()));
    associate(&controller).await;

    let client = SimClient::new(browser(), "GET / HTTP/1.1\r\n\r\n");
    radio.push_client(client.clone());
    controller.service().await;

    assert!(client.output_text().contains("FATAL ERROR: no battery"));
}
