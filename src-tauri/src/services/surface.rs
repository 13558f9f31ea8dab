// ============================================================================
// 渲染面抽象
// ============================================================================
//
// 状态机只通过这里的 trait 接触 webview：
// - RenderingSurface: 唯一的页面宿主（加载、改尺寸、注入脚本）
// - OverlaySurface:   叠在渲染面之上的加载遮罩
// - Notifier:         发往顶部栏 UI 的通知
// - ResourceSource:   站点模块资源包的读取来源
//
// Tauri 实现位于 crate::shell，测试使用本文件底部的假实现。

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::models::dtos::{Bounds, Notification};
use crate::utils::error::{AppError, AppResult};

/// 渲染面加载目标
#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceTarget {
    /// 第三方真实页面
    Remote(Url),
    /// 应用内置页面（模板文档），路径相对于前端资源根目录
    App(String),
}

impl std::fmt::Display for SurfaceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceTarget::Remote(url) => write!(f, "{}", url),
            SurfaceTarget::App(path) => write!(f, "app:{}", path),
        }
    }
}

/// 渲染面：可离屏的单例页面宿主
pub trait RenderingSurface: Send + Sync {
    /// 开始加载目标，不等待加载完成
    fn load(&self, target: &SurfaceTarget) -> AppResult<()>;

    /// 设置可见区域；零尺寸即隐藏
    fn set_bounds(&self, bounds: Bounds) -> AppResult<()>;

    /// 在当前文档上下文中执行脚本（不取返回值，取值走 ScriptBroker）
    fn eval(&self, script: &str) -> AppResult<()>;

    /// 重新加载当前文档
    fn reload(&self) -> AppResult<()>;
}

/// 加载遮罩所在的覆盖层
pub trait OverlaySurface: Send + Sync {
    /// 置于渲染面之上并铺满给定区域
    fn raise(&self, bounds: Bounds) -> AppResult<()>;

    /// 撤下覆盖层
    fn lower(&self) -> AppResult<()>;
}

/// 发往应用自身 UI 的通知出口
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// 站点模块资源读取来源
pub trait ResourceSource: Send + Sync {
    /// 读取资源文本，`path` 为相对路径（如 "modules/amazon/scrape.js"）
    fn read(&self, path: &str) -> AppResult<String>;
}

// ============================================================================
// 磁盘目录资源
// ============================================================================

/// 从磁盘目录读取模块资源（`modules_dir` 设置项或开发期的 ui/ 目录）
pub struct DirResources {
    root: PathBuf,
}

impl DirResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirResources { root: root.into() }
    }
}

impl ResourceSource for DirResources {
    fn read(&self, path: &str) -> AppResult<String> {
        let relative = Path::new(path);
        // 只允许普通路径分量，拒绝 .. 和绝对路径
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::ModuleError(format!("非法资源路径：{}", path)));
        }
        let full = self.root.join(relative);
        std::fs::read_to_string(&full).map_err(|e| {
            AppError::ModuleError(format!("无法读取资源 {}: {}", full.display(), e))
        })
    }
}

// ============================================================================
// 测试用假实现
// ============================================================================

#[cfg(test)]
pub mod fakes {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use serde_json::Value;
    use tokio::sync::watch;
    use url::Url;

    use super::*;
    use crate::models::dtos::ScriptReport;
    use crate::services::extraction::{parse_eval_id, ScriptBroker};

    /// 渲染面调用记录
    #[derive(Clone, Debug, PartialEq)]
    pub enum SurfaceCall {
        Load(SurfaceTarget),
        Bounds(Bounds),
        Eval(String),
        Reload,
    }

    /// 根据 (当前地址, 脚本) 决定页面回传什么；返回 None 表示页面不回应
    pub type Responder = Box<dyn Fn(Option<&Url>, &str) -> Option<Result<Value, String>> + Send>;

    /// 记录所有调用的假渲染面，可选地自动回应 ScriptBroker 包装过的脚本
    #[derive(Default)]
    pub struct FakeSurface {
        pub calls: Mutex<Vec<SurfaceCall>>,
        pub current: Mutex<Option<Url>>,
        pub bounds: Mutex<Option<Bounds>>,
        broker: Mutex<Option<ScriptBroker>>,
        responder: Mutex<Option<Responder>>,
        load_signal: Mutex<Option<watch::Sender<Option<Url>>>>,
        /// 地址 -> 加载时是否立即触发完成信号（默认触发）
        pub stalled: Mutex<HashMap<String, bool>>,
    }

    impl FakeSurface {
        pub fn new() -> Arc<Self> {
            Arc::new(FakeSurface::default())
        }

        pub fn with_broker(&self, broker: ScriptBroker, responder: Responder) {
            *self.broker.lock().unwrap() = Some(broker);
            *self.responder.lock().unwrap() = Some(responder);
        }

        pub fn with_load_signal(&self, tx: watch::Sender<Option<Url>>) {
            *self.load_signal.lock().unwrap() = Some(tx);
        }

        /// 模拟渲染面完成一次加载（可以是重定向后的地址或迟到的旧页面）
        pub fn finish_load(&self, url: &Url) {
            *self.current.lock().unwrap() = Some(url.clone());
            if let Some(tx) = self.load_signal.lock().unwrap().as_ref() {
                tx.send_replace(Some(url.clone()));
            }
        }

        pub fn calls(&self) -> Vec<SurfaceCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }

        pub fn loads(&self) -> Vec<SurfaceTarget> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    SurfaceCall::Load(t) => Some(t),
                    _ => None,
                })
                .collect()
        }

        pub fn evals(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    SurfaceCall::Eval(s) => Some(s),
                    _ => None,
                })
                .collect()
        }

        pub fn last_bounds(&self) -> Option<Bounds> {
            *self.bounds.lock().unwrap()
        }
    }

    impl RenderingSurface for FakeSurface {
        fn load(&self, target: &SurfaceTarget) -> AppResult<()> {
            self.calls.lock().unwrap().push(SurfaceCall::Load(target.clone()));
            if let SurfaceTarget::Remote(url) = target {
                *self.current.lock().unwrap() = Some(url.clone());
                let stalled = self
                    .stalled
                    .lock()
                    .unwrap()
                    .get(url.as_str())
                    .copied()
                    .unwrap_or(false);
                if !stalled {
                    if let Some(tx) = self.load_signal.lock().unwrap().as_ref() {
                        tx.send_replace(Some(url.clone()));
                    }
                }
            }
            Ok(())
        }

        fn set_bounds(&self, bounds: Bounds) -> AppResult<()> {
            self.calls.lock().unwrap().push(SurfaceCall::Bounds(bounds));
            *self.bounds.lock().unwrap() = Some(bounds);
            Ok(())
        }

        fn eval(&self, script: &str) -> AppResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(SurfaceCall::Eval(script.to_string()));
            let Some(id) = parse_eval_id(script) else {
                return Ok(());
            };
            let current = self.current.lock().unwrap().clone();
            let answer = self
                .responder
                .lock()
                .unwrap()
                .as_ref()
                .and_then(|r| r(current.as_ref(), script));
            if let (Some(answer), Some(broker)) = (answer, self.broker.lock().unwrap().as_ref()) {
                let report = match answer {
                    Ok(value) => ScriptReport {
                        id,
                        ok: true,
                        value,
                        error: None,
                    },
                    Err(error) => ScriptReport {
                        id,
                        ok: false,
                        value: Value::Null,
                        error: Some(error),
                    },
                };
                broker.resolve(report);
            }
            Ok(())
        }

        fn reload(&self) -> AppResult<()> {
            self.calls.lock().unwrap().push(SurfaceCall::Reload);
            Ok(())
        }
    }

    /// 假遮罩：记录当前是否处于抬起状态以及抬起次数
    #[derive(Default)]
    pub struct FakeOverlay {
        pub raised: Mutex<Option<Bounds>>,
        pub raise_count: Mutex<usize>,
        pub lower_count: Mutex<usize>,
    }

    impl FakeOverlay {
        pub fn new() -> Arc<Self> {
            Arc::new(FakeOverlay::default())
        }

        pub fn is_raised(&self) -> bool {
            self.raised.lock().unwrap().is_some()
        }
    }

    impl OverlaySurface for FakeOverlay {
        fn raise(&self, bounds: Bounds) -> AppResult<()> {
            *self.raised.lock().unwrap() = Some(bounds);
            *self.raise_count.lock().unwrap() += 1;
            Ok(())
        }

        fn lower(&self) -> AppResult<()> {
            *self.raised.lock().unwrap() = None;
            *self.lower_count.lock().unwrap() += 1;
            Ok(())
        }
    }

    /// 假通知出口
    #[derive(Default)]
    pub struct FakeNotifier {
        pub sent: Mutex<Vec<Notification>>,
    }

    impl FakeNotifier {
        pub fn new() -> Arc<Self> {
            Arc::new(FakeNotifier::default())
        }

        pub fn toasts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|n| match n {
                    Notification::Toast(t) => Some(t.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl Notifier for FakeNotifier {
        fn notify(&self, notification: Notification) {
            self.sent.lock().unwrap().push(notification);
        }
    }

    /// 内存资源表
    #[derive(Default)]
    pub struct MapResources {
        pub files: HashMap<String, String>,
    }

    impl MapResources {
        pub fn with(mut self, path: &str, content: &str) -> Self {
            self.files.insert(path.to_string(), content.to_string());
            self
        }
    }

    impl ResourceSource for MapResources {
        fn read(&self, path: &str) -> AppResult<String> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| AppError::ModuleError(format!("缺少资源：{}", path)))
        }
    }
}

// ============================================================================
// 单元测试
// ============================================================================
