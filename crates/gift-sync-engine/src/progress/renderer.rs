//! 进度渲染输出

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::projector::ProgressView;

/// 进度渲染目标
#[cfg_attr(test, mockall::automock)]
pub trait ProgressRenderer: Send + Sync {
    fn render(&self, view: &ProgressView);

    /// 没有生效中的进度活动
    fn clear(&self);
}

/// 保存最近一次渲染结果，供 `/progress` 读取
#[derive(Default)]
pub struct LatestProgress {
    current: ArcSwapOption<ProgressView>,
}

impl LatestProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Arc<ProgressView>> {
        self.current.load_full()
    }
}

impl ProgressRenderer for LatestProgress {
    fn render(&self, view: &ProgressView) {
        self.current.store(Some(Arc::new(view.clone())));
    }

    fn clear(&self) {
        self.current.store(None);
    }
}
