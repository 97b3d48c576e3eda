//! 3D layout of a model's tensors
//!
//! - [`region`]: architecture-driven region per (role, layer, expert)
//! - [`allocation`]: point budget per tensor
//! - [`points`]: jittered point placement and the renderer-facing buffers
//! - [`palette`]: color modes

pub mod allocation;
pub mod config;
pub mod palette;
pub mod points;
pub mod region;

pub use allocation::allocate_points;
pub use config::LayoutConfig;
pub use palette::{role_color, ColorMode, Rgb};
pub use points::{apply_colors, build_point_cloud, PointCloud, TensorRange};
pub use region::{LayoutEngine, Region, Stage, LAST_STAGE_OFFSET};
