pub mod error;
pub mod exchange;
pub mod geometry;
pub mod id;
pub mod model;
pub mod routing;
pub mod visual;

pub use error::{GraphError, ImportError};
pub use exchange::{ImportOutcome, ImportWarning, WorkflowMeta};
pub use geometry::{Anchor, Axis, BoundaryHit, BoundaryPoint, Side};
pub use id::{EdgeId, GateId, NodeId, RoleId};
pub use model::*;
pub use routing::{EdgeRoute, RouteInput, WaypointHandle, route_edge, route_transition};
pub use visual::{EdgeVisual, LabelPlacement, SnapSettings, VisualLayout};

// Re-export kurbo so hosts and downstream crates share one geometry type set
pub use kurbo;
