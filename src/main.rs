use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use genserve::config::Config;
use genserve::eventlog::EventKind;
use genserve::net::TcpRadio;
use genserve::server::{Controller, ServiceStep};
use genserve::sim::SimHost;

const SERVICE_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(cfg.log_level.as_tracing())
        .init();

    let radio = TcpRadio::new(
        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        cfg.timing.read_timeout(),
        cfg.timing.connect_timeout(),
    );

    let host = SimHost::new();
    host.set_display([
        "Utility power on",
        "Generator off",
        "Batt 13.1V  \x7e menu",
        "",
    ]);
    host.update(|panel| {
        panel.indicators.util_connected = true;
        panel.indicators.util_on = true;
        panel.indicators.at_home = true;
    });

    let controller = Controller::new(cfg, radio, host)?;
    controller
        .with_context(|ctx| ctx.log_event(EventKind::Startup, None, None))
        .await;

    let mut ticker = tokio::time::interval(SERVICE_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let step @ (ServiceStep::LinkLost | ServiceStep::AssociationFailed { .. }) =
                    controller.service().await
                {
                    tracing::warn!(?step, "Network service degraded");
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
