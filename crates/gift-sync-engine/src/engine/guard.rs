//! 对账互斥标记
//!
//! 同一时刻最多一轮对账。获取失败的触发直接丢弃，不排队；
//! 守卫在作用域结束时释放标记，包括提前返回与 panic 展开。

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct InFlightFlag {
    held: AtomicBool,
}

impl InFlightFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试占用标记，已被占用时返回 None
    pub fn try_acquire(&self) -> Option<InFlightGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| InFlightGuard { flag: self })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// 互斥守卫，drop 时释放
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    flag: &'a InFlightFlag,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let flag = InFlightFlag::new();
        let guard = flag.try_acquire();
        assert!(guard.is_some());
        assert!(flag.is_held());
        assert!(flag.try_acquire().is_none());

        drop(guard);
        assert!(!flag.is_held());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn test_released_on_panic() {
        let flag = InFlightFlag::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = flag.try_acquire().unwrap();
            panic!("pass blew up");
        }));
        assert!(result.is_err());
        assert!(!flag.is_held());
    }
}
