//! 阶梯进度展示

mod projector;
mod renderer;

pub use projector::{
    COMPLETION_MESSAGE, ProgressProjector, ProgressView, TierProgress, project, select_campaign,
};
pub use renderer::{LatestProgress, ProgressRenderer};
