use tokio::time::Instant;
use tracing::{debug, info};

use crate::host::{Host, NUM_BUTTONS};
use crate::http::assets::{BUTTON_IMAGE_JPG, FAVICON_JPG};
use crate::http::parser::read_request;
use crate::http::render::{self, PageHeader};
use crate::http::request::{Request, Route};
use crate::http::response::{Response, ResponseKind};
use crate::http::writer::send_response;
use crate::net::{ClientConnection, Radio};
use crate::server::state::WebContext;

/// What became of a request once it was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A response was sent (or abandoned) and the connection closed.
    Responded(ResponseKind),
    /// A button push was queued; the connection stays open until the
    /// deferred status page goes out.
    Deferred,
}

/// Reads one request from `client`, decides the response, and sends it.
pub async fn process_client_request<R: Radio, H: Host>(
    ctx: &mut WebContext<R, H>,
    client: &mut R::Client,
) -> Disposition {
    let peer = client.peer_addr();
    ctx.visitors.lookup_or_create(peer);

    let request = read_request(client, &ctx.reader).await;
    info!(peer = %peer, route = request.route.name(), "Request received");

    if request.route != Route::Favicon {
        if let Some(record) = ctx.visitors.get_mut(peer) {
            record.record_visit();
        }
        ctx.stats.requests_processed += 1;
    }

    let kind = match request.route {
        Route::Root => ResponseKind::Status,
        Route::ButtonImage => ResponseKind::ButtonImage,
        Route::Log => ResponseKind::Log,
        Route::Visitors => ResponseKind::Visitors,
        Route::Favicon => ResponseKind::Favicon,
        Route::PushButton => push_button(ctx, &request, peer),
        Route::SetPass => set_password(ctx, &request, peer),
        Route::Unknown => ResponseKind::Unknown,
    };

    if kind == ResponseKind::None {
        return Disposition::Deferred;
    }
    respond(ctx, client, kind).await;
    Disposition::Responded(kind)
}

fn push_button<R: Radio, H: Host>(
    ctx: &mut WebContext<R, H>,
    request: &Request,
    peer: std::net::IpAddr,
) -> ResponseKind {
    let Some(button) = request
        .form_field("button")
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|b| *b < NUM_BUTTONS)
    else {
        debug!(body = ?request.body, "Push without a valid button");
        return ResponseKind::Unknown;
    };

    let authorized = ctx.visitors.get(peer).is_some_and(|r| r.authorized);
    if !authorized {
        info!(peer = %peer, button, "Button push needs password");
        return ResponseKind::AskPassword;
    }

    info!(peer = %peer, button, "Queuing button push");
    ctx.host.push_button(button);
    let delay = ctx.config.timing.delayed_response();
    ctx.pending.arm(Instant::now(), delay);
    ResponseKind::None
}

fn set_password<R: Radio, H: Host>(
    ctx: &mut WebContext<R, H>,
    request: &Request,
    peer: std::net::IpAddr,
) -> ResponseKind {
    if request.body.is_empty() {
        return ResponseKind::Unknown;
    }
    match request.form_field("pwd") {
        Some(pwd) if pwd == ctx.config.site.action_password => {
            if let Some(record) = ctx.visitors.get_mut(peer) {
                record.authorized = true;
            }
            info!(peer = %peer, "Password accepted");
            ResponseKind::Status
        }
        _ => {
            info!(peer = %peer, "Password rejected");
            ResponseKind::AskPassword
        }
    }
}

/// Renders `kind` and writes it to the client, closing the connection.
pub async fn respond<R: Radio, H: Host>(
    ctx: &mut WebContext<R, H>,
    client: &mut R::Client,
    kind: ResponseKind,
) {
    let response = build_response(ctx, kind);
    debug!(kind = kind.name(), bytes = response.body.len(), "Generating response");
    let pause = ctx.config.timing.chunk_pause();
    // A failed write has already been logged; the client is gone either way.
    let _ = send_response(client, &response, &ctx.writer, pause).await;
}

pub fn build_response<R: Radio, H: Host>(ctx: &WebContext<R, H>, kind: ResponseKind) -> Response {
    let header = PageHeader {
        title: &ctx.config.site.title,
        now: ctx.host.wall_clock(),
    };

    match kind {
        ResponseKind::Favicon => Response::image(kind, FAVICON_JPG),
        ResponseKind::ButtonImage => Response::image(kind, BUTTON_IMAGE_JPG),
        ResponseKind::Status => {
            let fatal = ctx.host.fatal_error();
            let html = render::status_page(
                &header,
                fatal.as_deref(),
                &ctx.host.display(),
                ctx.host.indicators(),
            );
            Response::html(kind, html)
        }
        ResponseKind::Log => Response::html(kind, render::log_page(&header, &ctx.log)),
        ResponseKind::Visitors => Response::html(
            kind,
            render::visitors_page(&header, &ctx.visitors, &ctx.stats, ctx.config.wifi.port),
        ),
        ResponseKind::AskPassword => Response::html(kind, render::ask_password_page(&header)),
        ResponseKind::Unknown | ResponseKind::None => {
            Response::html(kind, render::unknown_page(&header, kind))
        }
    }
}
