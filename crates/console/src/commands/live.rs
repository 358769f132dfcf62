//! `laneguard live`: follow the realtime stream and render its overlay.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use laneguard_client::client::{realtime_image_url, WsConnector};
use laneguard_client::events::ClientEvent;
use laneguard_client::stream::StreamManager;
use laneguard_core::geometry::DisplayRect;
use laneguard_core::types::{ConnectionState, StreamMessage};
use laneguard_overlay::{drive, OverlayRenderer, RasterSurface};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::Context;
use crate::cli::LiveArgs;

pub async fn run(ctx: &Context, args: LiveArgs) -> anyhow::Result<()> {
    let params = args.stream_params();
    let cache_buster = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    println!(
        "Live image: {}",
        realtime_image_url(&ctx.config.api_url, &params, cache_buster)?
    );

    let mut manager = StreamManager::new(Arc::new(WsConnector), ctx.config.ws_url.clone());
    let cancel = super::interrupt_token();
    let watcher = tokio::spawn(report_connection(manager.subscribe(), cancel.clone()));

    manager.set_params(params).await?;

    let display = DisplayRect::new(args.width, args.height);
    let mut renderer = OverlayRenderer::new(RasterSurface::new(1, 1));
    let mut frames: u64 = 0;

    drive(
        &mut renderer,
        manager.watch_latest(),
        &|| display,
        &cancel,
        |surface, message| {
            println!("{}", format_frame(message));
            if let Some(path) = &args.out {
                if let Err(e) = surface.save_png(path) {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to write overlay");
                }
            }
            frames += 1;
            if args.frames.is_some_and(|limit| frames >= limit) {
                cancel.cancel();
            }
        },
    )
    .await;

    manager.shutdown().await;
    watcher.abort();

    if let Some(error) = manager.last_error() {
        anyhow::bail!("Stream ended with an error: {error}");
    }
    Ok(())
}

/// Print connection changes; stop the session once the stream closes.
async fn report_connection(mut events: broadcast::Receiver<ClientEvent>, cancel: CancellationToken) {
    let mut connected = false;
    loop {
        match events.recv().await {
            Ok(ClientEvent::StreamStateChanged { state }) => {
                println!("Stream {}", state.as_str());
                match state {
                    ConnectionState::Connected => connected = true,
                    ConnectionState::Disconnected => {
                        if !connected {
                            eprintln!("Could not connect to the realtime stream");
                        }
                        cancel.cancel();
                        return;
                    }
                    ConnectionState::Connecting => {}
                }
            }
            Ok(ClientEvent::StreamError { error }) => eprintln!("Stream error: {error}"),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// `"#412 yolo 14.2 fps  3 detections  max DANGER"`.
pub fn format_frame(message: &StreamMessage) -> String {
    let mut line = match message.frame_id {
        Some(id) => format!("#{id}"),
        None => "#?".to_string(),
    };
    if let Some(mode) = message.detection_mode.as_deref() {
        line.push(' ');
        line.push_str(mode);
    }
    if let Some(fps) = message.inference_fps {
        line.push_str(&format!(" {fps:.1} fps"));
    }
    line.push_str(&format!("  {} detections", message.detections.len()));
    if let Some(risk) = message.max_risk() {
        line.push_str("  max ");
        line.push_str(risk.label());
    }
    line
}
