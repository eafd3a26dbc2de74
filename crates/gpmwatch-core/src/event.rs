//! Output events and their line formats.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::click::{Button, ClickReport, Multiplicity};
use crate::position::Position;

/// One line of the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The cursor moved since the last emitted position.
    Position(Position),
    /// A button was pressed.
    Click(ClickReport),
}

/// Text format: `pos: (x, y)` and `click (single, left, (x, y))`.
impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Position(pos) => write!(f, "pos: {}", pos),
            Event::Click(click) => {
                write!(f, "click ({}, {}, ", click.multiplicity, click.button)?;
                match click.position {
                    Some(pos) => write!(f, "{})", pos),
                    None => write!(f, "none)"),
                }
            }
        }
    }
}

/// How events are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonEvent {
    Position {
        x: i32,
        y: i32,
        at: DateTime<Utc>,
    },
    Click {
        multiplicity: Multiplicity,
        button: Button,
        position: Option<Position>,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Render as one output line, without the trailing newline.
    pub fn render(&self, format: OutputFormat, at: DateTime<Utc>) -> serde_json::Result<String> {
        match format {
            OutputFormat::Text => Ok(self.to_string()),
            OutputFormat::Json => {
                let json = match *self {
                    Event::Position(Position { x, y }) => JsonEvent::Position { x, y, at },
                    Event::Click(click) => JsonEvent::Click {
                        multiplicity: click.multiplicity,
                        button: click.button,
                        position: click.position,
                        at,
                    },
                };
                serde_json::to_string(&json)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(position: Option<Position>) -> Event {
        Event::Click(ClickReport {
            multiplicity: Multiplicity::Double,
            button: Button::Right,
            position,
        })
    }

    #[test]
    fn test_text_position() {
        assert_eq!(Event::Position(Position::new(12, 34)).to_string(), "pos: (12, 34)");
    }

    #[test]
    fn test_text_click() {
        assert_eq!(
            click(Some(Position::new(5, 6))).to_string(),
            "click (double, right, (5, 6))"
        );
        assert_eq!(click(None).to_string(), "click (double, right, none)");
    }

    #[test]
    fn test_json_position() {
        let at = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let line = Event::Position(Position::new(1, 2))
            .render(OutputFormat::Json, at)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["type"], "position");
        assert_eq!(value["x"], 1);
        assert_eq!(value["y"], 2);
        assert!(value["at"].as_str().unwrap().starts_with("2024-01-02T03:04:05"));
    }

    #[test]
    fn test_json_click() {
        let line = click(Some(Position::new(7, 8)))
            .render(OutputFormat::Json, Utc::now())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["type"], "click");
        assert_eq!(value["multiplicity"], "double");
        assert_eq!(value["button"], "right");
        assert_eq!(value["position"]["x"], 7);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_text_render_ignores_timestamp() {
        let event = Event::Position(Position::new(1, 1));
        assert_eq!(
            event.render(OutputFormat::Text, Utc::now()).unwrap(),
            event.to_string()
        );
    }
}
