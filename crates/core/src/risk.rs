//! Risk classification and its display style.
//!
//! The server classifies every detection by how far down the frame its
//! lower edge reaches. The client only maps the level onto a color and a
//! summary bucket; it never re-classifies.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Severity of a detection, ordered `Info < Warning < Danger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Info,
    Warning,
    Danger,
}

impl RiskLevel {
    /// Map a wire value onto a level. Anything unrecognized (including a
    /// missing value) is treated as `Info`.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("danger") => RiskLevel::Danger,
            Some("warning") => RiskLevel::Warning,
            _ => RiskLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Info => "info",
            RiskLevel::Warning => "warning",
            RiskLevel::Danger => "danger",
        }
    }

    /// Upper-cased name used at the start of overlay labels.
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Info => "INFO",
            RiskLevel::Warning => "WARNING",
            RiskLevel::Danger => "DANGER",
        }
    }

    /// Stroke and label-background color for this level.
    pub fn color(&self) -> Color {
        match self {
            RiskLevel::Danger => DANGER_COLOR,
            RiskLevel::Warning => WARNING_COLOR,
            RiskLevel::Info => INFO_COLOR,
        }
    }

    /// Whether events of this level are counted in a result summary.
    pub fn is_counted(&self) -> bool {
        matches!(self, RiskLevel::Warning | RiskLevel::Danger)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(RiskLevel::from_wire(raw.as_deref()))
    }
}

/// An sRGB color with straight (non-premultiplied) alpha in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: f32,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, alpha: f32) -> Self {
        Self { r, g, b, alpha }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    /// CSS `rgba(...)` notation, for hosts that paint with CSS colors.
    pub fn to_css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.alpha)
    }
}

pub const DANGER_COLOR: Color = Color::rgba(255, 60, 60, 0.95);
pub const WARNING_COLOR: Color = Color::rgba(255, 215, 0, 0.95);
pub const INFO_COLOR: Color = Color::rgba(0, 255, 255, 0.85);

/// Text color painted over the label background (`#0b1020`).
pub const LABEL_TEXT_COLOR: Color = Color::rgb(0x0b, 0x10, 0x20);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(RiskLevel::Info < RiskLevel::Warning);
        assert!(RiskLevel::Warning < RiskLevel::Danger);
        assert_eq!(
            [RiskLevel::Danger, RiskLevel::Info, RiskLevel::Warning]
                .iter()
                .max(),
            Some(&RiskLevel::Danger)
        );
    }

    #[test]
    fn unknown_wire_values_fall_back_to_info() {
        assert_eq!(RiskLevel::from_wire(Some("critical")), RiskLevel::Info);
        assert_eq!(RiskLevel::from_wire(Some("DANGER")), RiskLevel::Info);
        assert_eq!(RiskLevel::from_wire(None), RiskLevel::Info);
    }

    #[test]
    fn deserializes_null_and_unknown_as_info() {
        let levels: Vec<RiskLevel> =
            serde_json::from_str(r#"["warning", null, "danger", "bogus", "info"]"#).unwrap();
        assert_eq!(
            levels,
            vec![
                RiskLevel::Warning,
                RiskLevel::Info,
                RiskLevel::Danger,
                RiskLevel::Info,
                RiskLevel::Info,
            ]
        );
    }

    #[test]
    fn colors_match_levels() {
        assert_eq!(RiskLevel::Danger.color(), DANGER_COLOR);
        assert_eq!(RiskLevel::Warning.color(), WARNING_COLOR);
        assert_eq!(RiskLevel::Info.color(), INFO_COLOR);
        assert_eq!(DANGER_COLOR.to_css(), "rgba(255, 60, 60, 0.95)");
    }

    #[test]
    fn only_warning_and_danger_are_counted() {
        assert!(!RiskLevel::Info.is_counted());
        assert!(RiskLevel::Warning.is_counted());
        assert!(RiskLevel::Danger.is_counted());
    }
}
