//! Pure translation from stick positions to pointer, scroll and direction
//! output.

pub mod axis;
pub mod discretizer;
pub mod teleport;

pub use axis::{map_axis, pointer_delta, scroll_delta, AxisMapping, Inversion};
pub use discretizer::{discretize, DirectionEdge, DirectionTracker, DEFAULT_ACTIVATION_THRESHOLD};
pub use teleport::TeleportAnimator;
