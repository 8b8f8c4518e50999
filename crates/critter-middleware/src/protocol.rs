//! Simulator wire protocol.
//!
//! Inbound frames are JSON objects of the form
//! `{"Type": <kind>, "Content": <value>}`:
//!
//! | `Type` | `Content` |
//! |---|---|
//! | `sensor` | `[rays, state]`: the ray fan and the internal-state snapshot |
//! | `sim_control` | `connection_ready`, `on_hold`, `start` or `error` |
//! | `agent_control` | a `command:argument` directive string |
//!
//! Outbound frames are `{"type": <kind>, "content": <payload>}`, produced by
//! serialising a [`Command`].

use critter_types::{AgentState, Command, ControlSignal, CritterError, Directive, PerceptFrame};
use serde::Deserialize;
use serde_json::Value;

/// Maximum number of rays accepted in a single sensor frame.
///
/// Frames with more rays than this are rejected as malformed.
pub const MAX_RAYS: usize = 1024;

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A new sensor frame together with the matching internal state.
    Sensor {
        frame: PerceptFrame,
        state: AgentState,
    },
    Control(ControlSignal),
    Directive(Directive),
    /// The link to the simulator is gone. Produced by the reader task, never
    /// by [`decode`].
    Disconnected(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "Type", alias = "type")]
    kind: String,
    #[serde(rename = "Content", alias = "content", default)]
    content: Value,
}

/// Decode one text frame received from the simulator.
///
/// # Errors
///
/// Returns [`CritterError::Malformed`] when the frame is not valid JSON, has
/// an unknown `Type`, or carries content of the wrong shape.
pub fn decode(text: &str) -> Result<Inbound, CritterError> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| CritterError::Malformed(format!("invalid JSON frame: {e}")))?;

    match envelope.kind.as_str() {
        "sensor" => decode_sensor(envelope.content),
        "sim_control" => {
            let content = content_str(&envelope.content, "sim_control")?;
            ControlSignal::from_wire(content)
                .map(Inbound::Control)
                .ok_or_else(|| {
                    CritterError::Malformed(format!("unknown sim_control content {content:?}"))
                })
        }
        "agent_control" => {
            let content = content_str(&envelope.content, "agent_control")?;
            Directive::parse(content).map(Inbound::Directive)
        }
        other => Err(CritterError::Malformed(format!(
            "unknown message type {other:?}"
        ))),
    }
}

/// Encode a [`Command`] as the JSON text frame the simulator expects.
pub fn encode(command: &Command) -> Result<String, CritterError> {
    serde_json::to_string(command)
        .map_err(|e| CritterError::Malformed(format!("failed to encode command: {e}")))
}

fn decode_sensor(content: Value) -> Result<Inbound, CritterError> {
    let (frame, state): (PerceptFrame, AgentState) = serde_json::from_value(content)
        .map_err(|e| CritterError::Malformed(format!("invalid sensor content: {e}")))?;

    if frame.len() > MAX_RAYS {
        return Err(CritterError::Malformed(format!(
            "sensor frame has {} rays, exceeding the limit of {MAX_RAYS}",
            frame.len()
        )));
    }
    if !state.position.is_finite() || !state.rotation.is_finite() {
        return Err(CritterError::Malformed(
            "sensor frame carries a non-finite pose".to_string(),
        ));
    }

    Ok(Inbound::Sensor { frame, state })
}

fn content_str<'a>(content: &'a Value, kind: &str) -> Result<&'a str, CritterError> {
    content
        .as_str()
        .ok_or_else(|| CritterError::Malformed(format!("{kind} content must be a string")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use critter_types::Action;

    const SENSOR: &str = r#"{
        "Type": "sensor",
        "Content": [
            [
                {"hit": 1, "distance": 1.2, "tag": "Rock", "angle": -90},
                {"hit": 0, "distance": 0, "tag": null, "angle": 0},
                {"hit": 0, "distance": 0, "tag": null, "angle": 90}
            ],
            {"currentActions": ["mf"], "speed": 2.0,
             "position": {"x": 1, "y": 0, "z": 3},
             "rotation": {"x": 0, "y": 45, "z": 0}}
        ]
    }"#;

    #[test]
    fn decodes_sensor_frame() {
        match decode(SENSOR).unwrap() {
            Inbound::Sensor { frame, state } => {
                assert_eq!(frame.len(), 3);
                assert!(frame.left_half_hit());
                assert!((state.yaw() - 45.0).abs() < f32::EPSILON);
                assert!(state.active_actions.contains("mf"));
            }
            other => panic!("expected sensor, got {other:?}"),
        }
    }

    #[test]
    fn decodes_control_signals() {
        let msg = r#"{"Type":"sim_control","Content":"connection_ready"}"#;
        assert_eq!(decode(msg).unwrap(), Inbound::Control(ControlSignal::Ready));
        let msg = r#"{"Type":"sim_control","Content":"on_hold"}"#;
        assert_eq!(decode(msg).unwrap(), Inbound::Control(ControlSignal::Hold));
        let msg = r#"{"Type":"sim_control","Content":"start"}"#;
        assert_eq!(decode(msg).unwrap(), Inbound::Control(ControlSignal::Start));
    }

    #[test]
    fn decodes_directive() {
        let msg = r#"{"Type":"agent_control","Content":"goal:ForwardStop"}"#;
        match decode(msg).unwrap() {
            Inbound::Directive(d) => {
                assert_eq!(d.command, "goal");
                assert_eq!(d.argument, "ForwardStop");
            }
            other => panic!("expected directive, got {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode("not json"), Err(CritterError::Malformed(_))));
        assert!(matches!(
            decode(r#"{"Type":"telepathy","Content":"hi"}"#),
            Err(CritterError::Malformed(_))
        ));
        assert!(matches!(
            decode(r#"{"Type":"sim_control","Content":"explode"}"#),
            Err(CritterError::Malformed(_))
        ));
        assert!(matches!(
            decode(r#"{"Type":"sensor","Content":[[{"hit":1}]]}"#),
            Err(CritterError::Malformed(_))
        ));
    }

    #[test]
    fn encode_action_command() {
        let text = encode(&Command::action(Action::Forward)).unwrap();
        assert_eq!(text, r#"{"type":"action","content":"mf"}"#);
    }
}
