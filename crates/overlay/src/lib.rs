//! Detection overlay rendering.
//!
//! [`OverlayRenderer`] redraws a transparent [`Surface`] that sits on top
//! of the live image, once per received stream message. Two surfaces are
//! provided: [`RecordingSurface`], which records draw operations for a
//! host to replay, and [`RasterSurface`], which paints into an RGBA image.

pub mod raster;
pub mod renderer;
pub mod surface;

pub use raster::RasterSurface;
pub use renderer::{drive, DisplaySource, OverlayRenderer};
pub use surface::{DrawOp, RecordingSurface, Surface};
