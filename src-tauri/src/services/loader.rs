// ============================================================================
// 加载遮罩控制器
// ============================================================================
//
// 二值可见性（shown / hidden），显示时武装一个兜底定时器：
// 到点仍未隐藏就强制隐藏，保证用户不会被卡在遮罩后面。
// 同一时刻最多只有一个待触发的定时器；重复 show 只刷新尺寸，不重置定时器。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::models::dtos::{Bounds, Notification};
use crate::services::surface::{Notifier, OverlaySurface};

/// 兜底定时器到点时的回调，参数为武装时的代号
pub type FailsafeSink = Arc<dyn Fn(u64) + Send + Sync>;

pub struct LoaderController {
    overlay: Arc<dyn OverlaySurface>,
    notifier: Arc<dyn Notifier>,
    failsafe: Duration,
    on_expire: FailsafeSink,
    shown: bool,
    /// 每次武装定时器加一，用来识别过期的到点消息
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl LoaderController {
    pub fn new(
        overlay: Arc<dyn OverlaySurface>,
        notifier: Arc<dyn Notifier>,
        failsafe: Duration,
        on_expire: FailsafeSink,
    ) -> Self {
        LoaderController {
            overlay,
            notifier,
            failsafe,
            on_expire,
            shown: false,
            generation: 0,
            timer: None,
        }
    }

    /// 显示遮罩；已显示时只按新尺寸重新铺满
    pub fn show(&mut self, bounds: Bounds) {
        if let Err(e) = self.overlay.raise(bounds) {
            log::warn!("遮罩抬起失败：{}", e);
        }
        if self.shown {
            return;
        }

        self.shown = true;
        self.generation += 1;
        let generation = self.generation;
        let failsafe = self.failsafe;
        let on_expire = self.on_expire.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(failsafe).await;
            on_expire(generation);
        }));
        self.notifier.notify(Notification::Loading(true));
        log::debug!("遮罩显示（兜底 {} ms）", failsafe.as_millis());
    }

    /// 隐藏遮罩并取消兜底定时器；已隐藏时不做任何事
    pub fn hide(&mut self) {
        if !self.shown {
            return;
        }
        self.shown = false;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Err(e) = self.overlay.lower() {
            log::warn!("遮罩撤下失败：{}", e);
        }
        self.notifier.notify(Notification::Loading(false));
        log::debug!("遮罩隐藏");
    }

    /// 兜底定时器到点；只有代号匹配且仍在显示时才强制隐藏
    pub fn on_failsafe(&mut self, generation: u64) {
        if self.shown && generation == self.generation {
            log::warn!(
                "加载遮罩超过 {} ms 未被隐藏，强制隐藏",
                self.failsafe.as_millis()
            );
            self.timer = None;
            self.hide();
        }
    }

    /// 窗口尺寸变化时，若正在显示则跟随
    pub fn resize(&mut self, bounds: Bounds) {
        if self.shown {
            self.show(bounds);
        }
    }

    pub fn is_shown(&self) -> bool {
        self.shown
    }

    /// 当前待触发的兜底定时器数量（0 或 1）
    pub fn pending_timers(&self) -> usize {
        self.timer
            .as_ref()
            .filter(|t| !t.is_finished())
            .map_or(0, |_| 1)
    }
}

impl Drop for LoaderController {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::surface::fakes::{FakeNotifier, FakeOverlay};
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    const FAILSAFE: Duration = Duration::from_secs(8);

    fn bounds(width: f64) -> Bounds {
        Bounds {
            x: 0.0,
            y: 64.0,
            width,
            height: 500.0,
        }
    }

    fn controller() -> (
        LoaderController,
        Arc<FakeOverlay>,
        Arc<FakeNotifier>,
        mpsc::UnboundedReceiver<u64>,
    ) {
        let overlay = FakeOverlay::new();
        let notifier = FakeNotifier::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: FailsafeSink = Arc::new(move |generation| {
            let _ = tx.send(generation);
        });
        let loader = LoaderController::new(overlay.clone(), notifier.clone(), FAILSAFE, sink);
        (loader, overlay, notifier, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_twice_keeps_single_timer() {
        let (mut loader, overlay, notifier, _rx) = controller();
        loader.show(bounds(800.0));
        loader.show(bounds(1000.0));

        assert!(loader.is_shown());
        assert_eq!(loader.pending_timers(), 1);
        assert!(overlay.is_raised());
        // 第二次只刷新尺寸
        assert_eq!(overlay.raised.lock().unwrap().unwrap().width, 1000.0);
        assert_eq!(
            *notifier.sent.lock().unwrap(),
            vec![Notification::Loading(true)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_when_hidden_is_noop() {
        let (mut loader, overlay, notifier, _rx) = controller();
        loader.hide();
        assert_eq!(*overlay.lower_count.lock().unwrap(), 0);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_cancels_timer() {
        let (mut loader, overlay, _notifier, mut rx) = controller();
        loader.show(bounds(800.0));
        loader.hide();
        assert_eq!(loader.pending_timers(), 0);
        assert!(!overlay.is_raised());

        tokio::time::sleep(FAILSAFE * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failsafe_hides_after_timeout() {
        let (mut loader, overlay, _notifier, mut rx) = controller();
        let start = Instant::now();
        loader.show(bounds(800.0));

        let generation = rx.recv().await.unwrap();
        loader.on_failsafe(generation);

        let elapsed = start.elapsed();
        assert!(elapsed >= FAILSAFE);
        assert!(elapsed < FAILSAFE + Duration::from_millis(50));
        assert!(!loader.is_shown());
        assert!(!overlay.is_raised());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failsafe_is_ignored() {
        let (mut loader, _overlay, _notifier, _rx) = controller();
        loader.show(bounds(800.0));
        loader.hide();
        loader.show(bounds(800.0));
        // 第一次武装的代号已过期
        loader.on_failsafe(1);
        assert!(loader.is_shown());
        loader.on_failsafe(2);
        assert!(!loader.is_shown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resize_only_when_shown() {
        let (mut loader, overlay, _notifier, _rx) = controller();
        loader.resize(bounds(640.0));
        assert!(!overlay.is_raised());
        loader.show(bounds(800.0));
        loader.resize(bounds(640.0));
        assert_eq!(overlay.raised.lock().unwrap().unwrap().width, 640.0);
        assert_eq!(loader.pending_timers(), 1);
    }
}
