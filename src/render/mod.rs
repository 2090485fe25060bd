//! Software rendering pipeline: mesh warp, overlays, composite and blur
//! passes over RGBA8 surfaces.

pub mod composite;
pub mod mesh;
pub mod overlay;
pub mod surface;
pub mod warp;

pub use composite::{CompositeStage, PassKind, SlotPipeline};
pub use mesh::{Mesh, MeshWarpStage, Vertex, WarpContext};
pub use surface::Surface;
