//! Overlay renderer output against recording and raster surfaces.

use std::sync::Arc;
use std::time::Duration;

use laneguard_core::geometry::{DisplayRect, Rect};
use laneguard_core::risk::{DANGER_COLOR, INFO_COLOR, LABEL_TEXT_COLOR, WARNING_COLOR};
use laneguard_core::types::StreamMessage;
use laneguard_overlay::{drive, DrawOp, OverlayRenderer, RasterSurface, RecordingSurface, Surface};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

fn message(frame: (u32, u32), detections: serde_json::Value) -> StreamMessage {
    serde_json::from_value(serde_json::json!({
        "frame_id": 1,
        "frame_width": frame.0,
        "frame_height": frame.1,
        "detection_mode": "yolo",
        "fps": 10.0,
        "detections": detections,
    }))
    .unwrap()
}

fn person(risk: &str, x: f64, y: f64) -> serde_json::Value {
    serde_json::json!({
        "class_name": "person",
        "confidence": 0.874,
        "bbox": {"x": x, "y": y, "w": 50, "h": 100},
        "risk_level": risk,
    })
}

fn strokes(surface: &RecordingSurface) -> Vec<(Rect, laneguard_core::risk::Color)> {
    surface
        .ops()
        .iter()
        .filter_map(|op| match op {
            DrawOp::StrokeRect { rect, color, .. } => Some((*rect, *color)),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Test: one detection produces stroke, label background and label text
// ---------------------------------------------------------------------------

#[test]
fn draws_box_label_and_text() {
    let mut renderer = OverlayRenderer::new(RecordingSurface::default());
    let msg = message((640, 480), serde_json::json!([person("danger", 100.0, 200.0)]));

    renderer.render(Some(&msg), DisplayRect::new(640.0, 480.0));

    let text = "DANGER | person 87%";
    let text_width = renderer.surface().measure_text(text);
    assert_eq!(
        renderer.surface().ops(),
        &[
            DrawOp::StrokeRect {
                rect: Rect::new(100.0, 200.0, 50.0, 100.0),
                color: DANGER_COLOR,
                line_width: 2.0,
            },
            DrawOp::FillRect {
                rect: Rect::new(100.0, 182.0, text_width + 8.0, 18.0),
                color: DANGER_COLOR,
            },
            DrawOp::FillText {
                text: text.to_string(),
                x: 104.0,
                y: 195.0,
                color: LABEL_TEXT_COLOR,
            },
        ]
    );
}

// ---------------------------------------------------------------------------
// Test: boxes scale independently on each axis
// ---------------------------------------------------------------------------

#[test]
fn scales_to_display_rect() {
    let mut renderer = OverlayRenderer::new(RecordingSurface::default());
    let msg = message((640, 480), serde_json::json!([person("warning", 100.0, 200.0)]));

    renderer.render(Some(&msg), DisplayRect::new(1280.9, 240.0));

    assert_eq!(renderer.surface().size(), (1280, 240));
    assert_eq!(
        strokes(renderer.surface()),
        vec![(Rect::new(200.0, 100.0, 100.0, 50.0), WARNING_COLOR)]
    );
}

// ---------------------------------------------------------------------------
// Test: unknown risk levels use the info color and label
// ---------------------------------------------------------------------------

#[test]
fn unknown_risk_uses_info_color_and_wire_label() {
    let mut renderer = OverlayRenderer::new(RecordingSurface::default());
    let detection = serde_json::json!({
        "confidence": 0.5,
        "x": 10, "y": 40, "w": 20, "h": 20,
        "risk_level": "catastrophic",
    });
    let msg = message((100, 100), serde_json::json!([detection]));

    renderer.render(Some(&msg), DisplayRect::new(100.0, 100.0));

    assert_eq!(
        strokes(renderer.surface()),
        vec![(Rect::new(10.0, 40.0, 20.0, 20.0), INFO_COLOR)]
    );
    assert!(renderer.surface().ops().iter().any(|op| matches!(
        op,
        DrawOp::FillText { text, .. } if text == "CATASTROPHIC | obj 50%"
    )));
}

// ---------------------------------------------------------------------------
// Test: labels near the top edge are clamped inside the surface
// ---------------------------------------------------------------------------

#[test]
fn label_is_clamped_at_top_edge() {
    let mut renderer = OverlayRenderer::new(RecordingSurface::default());
    let msg = message((200, 200), serde_json::json!([person("info", 5.0, 3.0)]));

    renderer.render(Some(&msg), DisplayRect::new(200.0, 200.0));

    let ops = renderer.surface().ops();
    assert!(matches!(&ops[1], DrawOp::FillRect { rect, .. } if rect.y == 0.0));
    assert!(matches!(&ops[2], DrawOp::FillText { x, y, .. } if *x == 9.0 && *y == 14.0));
}

// ---------------------------------------------------------------------------
// Test: no message or missing frame size only clears
// ---------------------------------------------------------------------------

#[test]
fn nothing_drawn_without_frame_dimensions() {
    let mut renderer = OverlayRenderer::new(RecordingSurface::default());

    renderer.render(None, DisplayRect::new(320.0, 240.0));
    assert!(renderer.surface().ops().is_empty());
    assert_eq!(renderer.surface().size(), (320, 240));

    let msg = message((0, 0), serde_json::json!([person("danger", 1.0, 1.0)]));
    renderer.render(Some(&msg), DisplayRect::new(320.0, 240.0));
    assert!(renderer.surface().ops().is_empty());
    assert_eq!(renderer.surface().clear_count(), 2);
}

// ---------------------------------------------------------------------------
// Test: redrawing the same message is idempotent and only the newest counts
// ---------------------------------------------------------------------------

#[test]
fn redraw_is_idempotent_and_replaces_previous() {
    let mut renderer = OverlayRenderer::new(RecordingSurface::default());
    let display = DisplayRect::new(640.0, 480.0);
    let first = message((640, 480), serde_json::json!([person("danger", 10.0, 100.0)]));
    let second = message((640, 480), serde_json::json!([person("warning", 300.0, 300.0)]));

    renderer.render(Some(&first), display);
    renderer.render(Some(&second), display);
    let once = renderer.surface().ops().to_vec();
    renderer.render(Some(&second), display);

    assert_eq!(renderer.surface().ops(), once.as_slice());
    assert_eq!(
        strokes(renderer.surface()),
        vec![(Rect::new(300.0, 300.0, 50.0, 100.0), WARNING_COLOR)]
    );
    assert_eq!(renderer.surface().resize_count(), 1);
}

// ---------------------------------------------------------------------------
// Test: raster surface paints box and label background
// ---------------------------------------------------------------------------

#[test]
fn raster_output_matches_geometry() {
    let mut renderer = OverlayRenderer::new(RasterSurface::new(1, 1));
    let msg = message((320, 240), serde_json::json!([person("danger", 100.0, 100.0)]));

    renderer.render(Some(&msg), DisplayRect::new(320.0, 240.0));

    let image = renderer.surface().image();
    assert_eq!(image.dimensions(), (320, 240));
    // Stroke band on the left edge.
    assert_eq!(image.get_pixel(99, 150)[3], 242);
    // Inside the box stays clear.
    assert_eq!(image.get_pixel(125, 150)[3], 0);
    // Label background above the box, left of the text inset.
    assert_eq!(image.get_pixel(101, 90)[0], 255);
    assert!(image.get_pixel(101, 90)[3] >= 242);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overlay.png");
    renderer.surface().save_png(&path).unwrap();
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

// ---------------------------------------------------------------------------
// Test: raster surface paints label text inside the label background
// ---------------------------------------------------------------------------

#[test]
fn raster_label_text_is_painted_and_fits_background() {
    let mut renderer = OverlayRenderer::new(RasterSurface::new(1, 1));
    let detection = serde_json::json!({
        "class_name": "person",
        "confidence": 0.9,
        "bbox": {"x": 40, "y": 100, "w": 60, "h": 60},
        "risk_level": "danger",
    });
    let msg = message((400, 200), serde_json::json!([detection]));

    renderer.render(Some(&msg), DisplayRect::new(400.0, 200.0));

    let surface = renderer.surface();
    let text_width = surface.measure_text("DANGER | person 90%");
    let band_end = (40.0 + text_width + 8.0) as u32;
    let image = surface.image();

    // Text over the red background pulls pixels toward #0b1020.
    let dark = (82..100)
        .flat_map(|y| (40..band_end).map(move |x| (x, y)))
        .filter(|&(x, y)| {
            let p = image.get_pixel(x, y);
            p[0] < 128 && p[3] > 200
        })
        .count();
    assert!(dark > 20, "dark text pixels inside label band: {dark}");

    // The text stays within its background: the padding column right
    // after the last glyph is still pure background.
    let right = band_end.saturating_sub(2);
    assert_eq!(image.get_pixel(right, 90)[0], 255);
}

// ---------------------------------------------------------------------------
// Test: drive() redraws once per published message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn drive_redraws_on_each_message() {
    let (tx, rx) = watch::channel::<Option<Arc<StreamMessage>>>(None);
    let cancel = CancellationToken::new();
    let display = || DisplayRect::new(640.0, 480.0);
    let mut renderer = OverlayRenderer::new(RecordingSurface::default());

    let (seen_tx, mut seen_rx) = tokio::sync::mpsc::unbounded_channel();
    let driver_cancel = cancel.clone();
    let driver = tokio::spawn(async move {
        drive(&mut renderer, rx, &display, &driver_cancel, |surface, msg| {
            let _ = seen_tx.send((msg.frame_id, surface.ops().len()));
        })
        .await;
        renderer
    });

    let mut msg = message((640, 480), serde_json::json!([person("danger", 1.0, 20.0)]));
    msg.frame_id = Some(7);
    tx.send_replace(Some(Arc::new(msg)));

    let seen = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen, (Some(7), 3));

    cancel.cancel();
    let renderer = driver.await.unwrap();
    assert_eq!(renderer.surface().ops().len(), 3);
}
