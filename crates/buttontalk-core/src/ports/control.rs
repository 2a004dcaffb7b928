use serde::{Deserialize, Serialize};

/// Edge events from the physical momentary control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlEvent {
    Pressed,
    Released,
}
