//! Realtime stream message parser.
//!
//! The server pushes one JSON object per analyzed frame:
//! `{"frame_id":..,"frame_width":..,"frame_height":..,"detections":[..],"detection_mode":..,"fps":..}`.
//! This module decodes them into [`StreamMessage`].

use laneguard_core::types::StreamMessage;
use laneguard_core::CoreError;

/// Parse a realtime text frame.
///
/// Returns `Err` for malformed JSON and for JSON values that are not
/// objects. Callers drop such frames and keep consuming the stream.
pub fn parse_message(text: &str) -> Result<StreamMessage, CoreError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(CoreError::Decode(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }
    Ok(serde_json::from_value(value)?)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use laneguard_core::RiskLevel;

    use super::*;

    #[test]
    fn parse_full_frame() {
        let json = r#"{"frame_id":7,"frame_width":1280,"frame_height":720,"detections":[{"class_name":"person","class_id":0,"confidence":0.91,"bbox":{"x":100,"y":200,"w":50,"h":120},"risk_level":"danger","reason":"bottom_y>=danger"}],"detection_mode":"yolo","fps":14.2}"#;
        let msg = parse_message(json).unwrap();
        assert_eq!(msg.frame_id, Some(7));
        assert_eq!(msg.frame_size(), Some((1280, 720)));
        assert_eq!(msg.detections.len(), 1);
        assert_eq!(msg.detections[0].risk_level, RiskLevel::Danger);
        assert_eq!(msg.detections[0].class_id, Some(0));
        assert_eq!(msg.max_risk(), Some(RiskLevel::Danger));
    }

    #[test]
    fn parse_frame_before_first_capture() {
        let json = r#"{"frame_id":-1,"frame_width":0,"frame_height":0,"detections":[],"detection_mode":"basic","fps":null}"#;
        let msg = parse_message(json).unwrap();
        assert!(msg.frame_size().is_none());
        assert!(msg.inference_fps.is_none());
        assert!(msg.max_risk().is_none());
    }

    #[test]
    fn parse_invalid_json_returns_error() {
        assert!(parse_message("not json at all").is_err());
        assert!(parse_message(r#"{"frame_width":"#).is_err());
    }

    #[test]
    fn parse_non_object_returns_error() {
        assert!(parse_message("[]").is_err());
        assert!(parse_message("42").is_err());
        assert!(parse_message("null").is_err());
    }

    #[test]
    fn parse_wrongly_typed_field_returns_error() {
        assert!(parse_message(r#"{"frame_width":"wide"}"#).is_err());
        assert!(parse_message(r#"{"detections":{"x":1}}"#).is_err());
    }
}
