//! Overlay renderer.
//!
//! Paints detection boxes and labels for the latest stream message onto a
//! [`Surface`] aligned pixel-for-pixel with the live image.

use std::sync::Arc;

use laneguard_core::geometry::{label_text, place_label, DisplayRect, Scale, BOX_LINE_WIDTH};
use laneguard_core::risk::LABEL_TEXT_COLOR;
use laneguard_core::types::StreamMessage;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::surface::Surface;

/// Reports the current on-screen size of the live image.
pub trait DisplaySource {
    fn display_rect(&self) -> DisplayRect;
}

impl<F> DisplaySource for F
where
    F: Fn() -> DisplayRect,
{
    fn display_rect(&self) -> DisplayRect {
        self()
    }
}

pub struct OverlayRenderer<S> {
    surface: S,
}

impl<S: Surface> OverlayRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Redraw the whole overlay.
    ///
    /// The surface is first resynced to `display` and cleared. Nothing
    /// more is drawn without a message or when the message lacks frame
    /// dimensions.
    pub fn render(&mut self, message: Option<&StreamMessage>, display: DisplayRect) {
        let target = display.surface_size();
        if self.surface.size() != target {
            self.surface.resize(target.0, target.1);
        }
        self.surface.clear();

        let Some(message) = message else {
            return;
        };
        let Some(frame) = message.frame_size() else {
            tracing::trace!(frame_id = ?message.frame_id, "Message lacks frame dimensions");
            return;
        };
        let Some(scale) = Scale::between(target, frame) else {
            return;
        };

        for detection in &message.detections {
            let rect = scale.map(&detection.bbox);
            let color = detection.risk_level.color();
            self.surface.stroke_rect(rect, color, BOX_LINE_WIDTH);

            let text = label_text(detection);
            let placement = place_label(&rect, self.surface.measure_text(&text));
            self.surface.fill_rect(placement.background, color);
            self.surface
                .fill_text(&text, placement.text_x, placement.text_y, LABEL_TEXT_COLOR);
        }
    }
}

/// Redraw once per message published to `latest` until cancelled or the
/// sender goes away.
///
/// The current value is drawn immediately; afterwards the renderer only
/// wakes on change, so bursts collapse into a single redraw of the newest
/// message. `after_render` runs after every redraw (e.g. to present or
/// export the surface).
pub async fn drive<S, D, F>(
    renderer: &mut OverlayRenderer<S>,
    mut latest: watch::Receiver<Option<Arc<StreamMessage>>>,
    display: &D,
    cancel: &CancellationToken,
    mut after_render: F,
) where
    S: Surface,
    D: DisplaySource + ?Sized,
    F: FnMut(&S, &StreamMessage),
{
    loop {
        let message = latest.borrow_and_update().clone();
        renderer.render(message.as_deref(), display.display_rect());
        if let Some(message) = &message {
            after_render(renderer.surface(), message);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            changed = latest.changed() => {
                if changed.is_err() {
                    tracing::debug!("Stream message source closed; overlay stopped");
                    return;
                }
            }
        }
    }
}
