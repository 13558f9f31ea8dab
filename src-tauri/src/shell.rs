// ============================================================================
// Tauri 宿主适配层
// ✅ 只能做：创建主窗口与三个子 webview、把 services::surface 的 trait 落到 Tauri API 上、
//          把 webview 生命周期回调转成 PipelineEvent
// ⛔ 禁止：包含状态机逻辑
// ============================================================================

use std::sync::Arc;

use tauri::webview::{PageLoadEvent, WebviewBuilder};
use tauri::window::WindowBuilder;
use tauri::{
    AppHandle, Emitter, LogicalPosition, LogicalSize, Manager, Webview, WebviewUrl, WindowEvent,
};
use tokio::sync::mpsc;
use url::Url;

use crate::models::dtos::{Bounds, Notification, Viewport};
use crate::services::pipeline::PipelineEvent;
use crate::services::surface::{
    Notifier, OverlaySurface, RenderingSurface, ResourceSource, SurfaceTarget,
};
use crate::services::{content_bounds, TOP_BAR_HEIGHT};
use crate::utils::error::{AppError, AppResult};

pub const MAIN_WINDOW: &str = "main";
pub const TOPBAR_LABEL: &str = "topbar";
pub const SURFACE_LABEL: &str = "surface";
pub const LOADER_LABEL: &str = "loader";

/// 发往顶部栏的通知事件名
pub const NOTIFY_EVENT: &str = "boring://notify";

const INITIAL_WIDTH: f64 = 1200.0;
const INITIAL_HEIGHT: f64 = 900.0;

/// 应用内置页面的源
#[cfg(windows)]
const APP_ORIGIN: &str = "http://tauri.localhost/";
#[cfg(not(windows))]
const APP_ORIGIN: &str = "tauri://localhost/";

// ============================================================================
// 地址换算
// ============================================================================

/// 内置页面路径 → 可供 webview 导航的地址
pub fn app_url(path: &str) -> AppResult<Url> {
    Url::parse(APP_ORIGIN)
        .and_then(|origin| origin.join(path))
        .map_err(|e| AppError::SurfaceError(format!("内置页面地址非法 {}: {}", path, e)))
}

/// webview 报告的地址 → 加载目标
pub fn classify(url: &Url) -> SurfaceTarget {
    let is_app = url.scheme() == "tauri" || url.host_str() == Some("tauri.localhost");
    if is_app {
        SurfaceTarget::App(url.path().trim_start_matches('/').to_string())
    } else {
        SurfaceTarget::Remote(url.clone())
    }
}

fn surface_err(what: &str, e: tauri::Error) -> AppError {
    AppError::SurfaceError(format!("{}: {}", what, e))
}

fn place(webview: &Webview, bounds: Bounds) -> AppResult<()> {
    webview
        .set_position(LogicalPosition::new(bounds.x, bounds.y))
        .map_err(|e| surface_err("设置位置失败", e))?;
    webview
        .set_size(LogicalSize::new(bounds.width, bounds.height))
        .map_err(|e| surface_err("设置尺寸失败", e))
}

// ============================================================================
// trait 实现
// ============================================================================

/// 渲染面：`surface` 子 webview
pub struct TauriSurface {
    webview: Webview,
}

impl RenderingSurface for TauriSurface {
    fn load(&self, target: &SurfaceTarget) -> AppResult<()> {
        let url = match target {
            SurfaceTarget::Remote(url) => url.clone(),
            SurfaceTarget::App(path) => app_url(path)?,
        };
        self.webview
            .navigate(url)
            .map_err(|e| surface_err("导航失败", e))
    }

    fn set_bounds(&self, bounds: Bounds) -> AppResult<()> {
        place(&self.webview, bounds)
    }

    fn eval(&self, script: &str) -> AppResult<()> {
        self.webview
            .eval(script)
            .map_err(|e| surface_err("脚本注入失败", e))
    }

    fn reload(&self) -> AppResult<()> {
        self.webview
            .reload()
            .map_err(|e| surface_err("重新加载失败", e))
    }
}

/// 加载遮罩：最后添加的 `loader` 子 webview，天然位于渲染面之上
pub struct TauriLoader {
    webview: Webview,
}

impl OverlaySurface for TauriLoader {
    fn raise(&self, bounds: Bounds) -> AppResult<()> {
        place(&self.webview, bounds)
    }

    fn lower(&self) -> AppResult<()> {
        place(&self.webview, Bounds::collapsed())
    }
}

/// 通知出口：向顶部栏发事件
pub struct TauriNotifier {
    app: AppHandle,
}

impl TauriNotifier {
    pub fn new(app: AppHandle) -> Self {
        TauriNotifier { app }
    }
}

impl Notifier for TauriNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(e) = self.app.emit_to(TOPBAR_LABEL, NOTIFY_EVENT, &notification) {
            log::warn!("通知发送失败：{}", e);
        }
    }
}

/// 打包进前端资源的站点模块
pub struct AssetResources {
    app: AppHandle,
}

impl AssetResources {
    pub fn new(app: AppHandle) -> Self {
        AssetResources { app }
    }
}

impl ResourceSource for AssetResources {
    fn read(&self, path: &str) -> AppResult<String> {
        let asset = self
            .app
            .asset_resolver()
            .get(path.to_string())
            .ok_or_else(|| AppError::ModuleError(format!("缺少打包资源：{}", path)))?;
        String::from_utf8(asset.bytes().to_vec())
            .map_err(|e| AppError::ModuleError(format!("资源 {} 不是 UTF-8 文本: {}", path, e)))
    }
}

// ============================================================================
// 窗口装配
// ============================================================================

/// 装配完成的宿主句柄
pub struct Shell {
    pub surface: Arc<TauriSurface>,
    pub loader: Arc<TauriLoader>,
    pub viewport: Viewport,
}

/// 创建主窗口：顶部栏、渲染面、遮罩三个子 webview，按添加顺序自下而上叠放
pub fn build_window(
    app: &AppHandle,
    events: mpsc::UnboundedSender<PipelineEvent>,
) -> tauri::Result<Shell> {
    let window = WindowBuilder::new(app, MAIN_WINDOW)
        .title("Boring Browser")
        .inner_size(INITIAL_WIDTH, INITIAL_HEIGHT)
        .min_inner_size(640.0, 480.0)
        .build()?;

    let viewport = Viewport {
        width: INITIAL_WIDTH,
        height: INITIAL_HEIGHT,
    };
    let content = content_bounds(viewport);

    let topbar = window.add_child(
        WebviewBuilder::new(TOPBAR_LABEL, WebviewUrl::App("index.html".into())),
        LogicalPosition::new(0.0, 0.0),
        LogicalSize::new(INITIAL_WIDTH, TOP_BAR_HEIGHT),
    )?;

    let nav_tx = events.clone();
    let load_tx = events.clone();
    let surface_builder = WebviewBuilder::new(SURFACE_LABEL, WebviewUrl::App("blank.html".into()))
        .on_navigation(move |url| {
            let _ = nav_tx.send(PipelineEvent::NavigationStarted(classify(url)));
            true
        })
        .on_page_load(move |_webview, payload| {
            if let PageLoadEvent::Finished = payload.event() {
                let _ = load_tx.send(PipelineEvent::LoadFinished(classify(payload.url())));
            }
        });
    let surface = window.add_child(
        surface_builder,
        LogicalPosition::new(content.x, content.y),
        LogicalSize::new(content.width, content.height),
    )?;

    let loader = window.add_child(
        WebviewBuilder::new(LOADER_LABEL, WebviewUrl::App("loader.html".into())),
        LogicalPosition::new(0.0, 0.0),
        LogicalSize::new(0.0, 0.0),
    )?;

    let resize_window = window.clone();
    window.on_window_event(move |event| {
        if let WindowEvent::Resized(size) = event {
            let scale = resize_window.scale_factor().unwrap_or(1.0);
            let logical = size.to_logical::<f64>(scale);
            if let Err(e) = topbar.set_size(LogicalSize::new(logical.width, TOP_BAR_HEIGHT)) {
                log::warn!("顶部栏尺寸调整失败：{}", e);
            }
            let _ = events.send(PipelineEvent::Resized(Viewport {
                width: logical.width,
                height: logical.height,
            }));
        }
    });

    log::info!("主窗口已创建（{}×{}）", INITIAL_WIDTH, INITIAL_HEIGHT);
    Ok(Shell {
        surface: Arc::new(TauriSurface { webview: surface }),
        loader: Arc::new(TauriLoader { webview: loader }),
        viewport,
    })
}

// ============================================================================
// 单元测试
// ============================================================================
