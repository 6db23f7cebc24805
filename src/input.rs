//! Pointer input -> viewer adjustments
//!
//! The viewer never sees raw pointer events. `PointerMapper` tracks the
//! held button and the last pointer position and turns each event into
//! an `Adjustment` (all fields are deltas):
//!
//! - primary drag: pan by the pointer delta
//! - secondary drag: level (center) by dy, width by dx
//! - middle drag: zoom by (dx + dy) / 50, accepted and ignored downstream
//! - wheel: slice +1 / -1
//!
//! Deltas are incremental: each move reports the distance from the
//! previous pointer position, not from where the drag started.

use core::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

impl FromStr for PointerButton {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "primary" | "left" => Ok(Self::Primary),
            "middle" => Ok(Self::Middle),
            "secondary" | "right" => Ok(Self::Secondary),
            other => Err(Error::Config(format!("unknown pointer button {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Down { button: PointerButton, x: i32, y: i32 },
    Move { x: i32, y: i32 },
    Up { button: PointerButton },
    /// Positive scrolls forward through the stack.
    Wheel { delta: i32 },
}

/// One step of viewer state change; every field is a delta.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Adjustment {
    pub slice: i32,
    pub center: i32,
    pub width: i32,
    pub pan_x: i32,
    pub pan_y: i32,
    pub zoom: f32,
}

impl Adjustment {
    pub fn slice(delta: i32) -> Self {
        Self {
            slice: delta,
            ..Self::default()
        }
    }

    pub fn window(center: i32, width: i32) -> Self {
        Self {
            center,
            width,
            ..Self::default()
        }
    }

    pub fn pan(dx: i32, dy: i32) -> Self {
        Self {
            pan_x: dx,
            pan_y: dy,
            ..Self::default()
        }
    }

    pub fn zoom(delta: f32) -> Self {
        Self {
            zoom: delta,
            ..Self::default()
        }
    }
}

/// Translates pointer events into adjustments.
pub struct PointerMapper {
    held: Option<PointerButton>,
    last: (i32, i32),
}

impl Default for PointerMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerMapper {
    pub const fn new() -> Self {
        Self {
            held: None,
            last: (0, 0),
        }
    }

    pub fn map_event(&mut self, event: PointerEvent) -> Option<Adjustment> {
        match event {
            PointerEvent::Down { button, x, y } => {
                self.held = Some(button);
                self.last = (x, y);
                None
            }
            PointerEvent::Up { .. } => {
                self.held = None;
                None
            }
            PointerEvent::Move { x, y } => {
                let button = self.held?;
                let (dx, dy) = (x - self.last.0, y - self.last.1);
                self.last = (x, y);
                if dx == 0 && dy == 0 {
                    return None;
                }
                Some(match button {
                    PointerButton::Primary => Adjustment::pan(dx, dy),
                    PointerButton::Secondary => Adjustment::window(dy, dx),
                    PointerButton::Middle => Adjustment::zoom((dx + dy) as f32 / 50.0),
                })
            }
            PointerEvent::Wheel { delta } => match delta.signum() {
                0 => None,
                step => Some(Adjustment::slice(step)),
            },
        }
    }
}

/// Parse one line of an event script:
/// `down <button> X Y`, `move X Y`, `up <button>`, `wheel D`.
impl FromStr for PointerEvent {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Error> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let int = |s: &str| {
            s.parse::<i32>()
                .map_err(|_| Error::Config(format!("not an integer: {s:?}")))
        };
        match fields.as_slice() {
            ["down", button, x, y] => Ok(Self::Down {
                button: button.parse()?,
                x: int(x)?,
                y: int(y)?,
            }),
            ["move", x, y] => Ok(Self::Move {
                x: int(x)?,
                y: int(y)?,
            }),
            ["up", button] => Ok(Self::Up {
                button: button.parse()?,
            }),
            ["wheel", delta] => Ok(Self::Wheel { delta: int(delta)? }),
            _ => Err(Error::Config(format!("bad pointer event {line:?}"))),
        }
    }
}

/// Parse a whole script; blank lines and `#` comments are skipped.
pub fn parse_script(text: &str) -> Result<Vec<PointerEvent>, Error> {
    let mut events = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let event = line
            .parse()
            .map_err(|e| Error::Config(format!("events line {}: {e}", n + 1)))?;
        events.push(event);
    }
    Ok(events)
}
