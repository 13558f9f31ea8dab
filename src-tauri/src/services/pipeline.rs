// ============================================================================
// 抓取-渲染状态机
// ✅ 只能做：持有唯一的阶段值、响应渲染面生命周期事件、编排隐藏/提取/模板加载/结账
// ⛔ 禁止：依赖 tauri::*（渲染面、遮罩、通知都经由 trait 注入）
// ============================================================================
//
// 所有状态集中在一个 Pipeline 值里，由单个事件循环串行驱动（`run`）。
// 提取、结账、定时器这些异步工作都在独立任务里跑，完成后把结果作为事件投回同一个循环；
// 结果带上发起时的代号，代号过期（期间发生了新导航或开关切换）的结果直接丢弃。

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::models::dtos::{Bounds, CartItem, Notification, Viewport};
use crate::services::checkout::{run_checkout, CheckoutContext, CheckoutReport};
use crate::services::config::PipelineConfig;
use crate::services::content_bounds;
use crate::services::extraction::{
    delivery_script, overlay_injection_script, run_extraction, ScrapedPayload, ScriptBroker,
};
use crate::services::history::NavHistory;
use crate::services::loader::{FailsafeSink, LoaderController};
use crate::services::navigation::normalize_input;
use crate::services::registry::{ModuleRegistry, SiteModule};
use crate::services::surface::{
    Notifier, OverlaySurface, RenderingSurface, ResourceSource, SurfaceTarget,
};
use crate::utils::error::{AppError, AppResult};

// ============================================================================
// 阶段与事件
// ============================================================================

/// 状态机阶段，同一时刻只有一个实例
#[derive(Clone, Debug)]
pub enum ScrapePhase {
    Idle,
    /// 真实页面在隐藏的渲染面里加载
    Scraping {
        module: Arc<SiteModule>,
        source: Url,
    },
    /// 模板文档加载中，载荷等待投递；`payload` 为空时投递默认首页载荷
    Template {
        module: Arc<SiteModule>,
        source: Url,
        payload: Option<ScrapedPayload>,
    },
}

impl ScrapePhase {
    pub fn name(&self) -> &'static str {
        match self {
            ScrapePhase::Idle => "Idle",
            ScrapePhase::Scraping { .. } => "Scraping",
            ScrapePhase::Template { .. } => "Template",
        }
    }

    /// 当前阶段背后的真实地址
    pub fn source(&self) -> Option<&Url> {
        match self {
            ScrapePhase::Idle => None,
            ScrapePhase::Scraping { source, .. } | ScrapePhase::Template { source, .. } => {
                Some(source)
            }
        }
    }
}

/// 事件循环的输入
#[derive(Debug)]
pub enum PipelineEvent {
    // ---- 来自应用 UI 与模板的命令 ----
    /// 地址栏输入或模板发起的导航（网址或搜索词）
    Navigate(String),
    Back,
    Forward,
    Reload,
    ToggleOverlay,
    BeginCheckout(Vec<CartItem>),
    /// 替换界面已绘制完成
    OverlayReady,

    // ---- 渲染面生命周期 ----
    NavigationStarted(SurfaceTarget),
    LoadFinished(SurfaceTarget),
    Resized(Viewport),

    // ---- 异步工作回报 ----
    ExtractionFinished {
        generation: u64,
        result: AppResult<ScrapedPayload>,
    },
    LoaderFailsafe(u64),
    TemplateTimeout(u64),
    CheckoutFinished {
        run: u64,
        report: CheckoutReport,
    },
}

/// 覆盖功能开关变化时的持久化回调
pub type OverlayPersist = Arc<dyn Fn(bool) + Send + Sync>;

/// 状态机依赖的外部能力
pub struct PipelineDeps {
    pub surface: Arc<dyn RenderingSurface>,
    pub overlay: Arc<dyn OverlaySurface>,
    pub notifier: Arc<dyn Notifier>,
    pub resources: Arc<dyn ResourceSource>,
    pub registry: Arc<ModuleRegistry>,
    pub broker: ScriptBroker,
}

/// 进行中的结账运行
struct ActiveCheckout {
    run: u64,
    cancel: CancellationToken,
    /// 渲染面最近一次加载完成的地址，结账任务据此等待商品页
    loads: watch::Sender<Option<Url>>,
}

// ============================================================================
// Pipeline
// ============================================================================

pub struct Pipeline {
    surface: Arc<dyn RenderingSurface>,
    notifier: Arc<dyn Notifier>,
    resources: Arc<dyn ResourceSource>,
    registry: Arc<ModuleRegistry>,
    broker: ScriptBroker,
    loader: LoaderController,
    config: PipelineConfig,
    events: mpsc::UnboundedSender<PipelineEvent>,
    persist: Option<OverlayPersist>,

    phase: ScrapePhase,
    /// 每次导航/取消加一；异步结果必须与之匹配才会被采纳
    generation: u64,
    overlay_enabled: bool,
    viewport: Viewport,
    surface_visible: bool,
    history: NavHistory,
    /// 进行中的提取任务
    work: Option<CancellationToken>,
    watchdog: Option<JoinHandle<()>>,
    checkout: Option<ActiveCheckout>,
    checkout_runs: u64,
    /// 最近一次由本状态机发起、尚未收到开始事件的加载
    pending_load: Option<Url>,
    /// 自己发起的加载已开始、尚未完成；此间渲染面自行开始的导航视为服务器重定向
    own_load_in_flight: bool,
    /// 下一次加载该地址时不拦截（模板失败后的原样回退）
    bypass_once: Option<Url>,
    /// 当前显示在渲染面里的模板（Idle 阶段）
    showing_template: Option<(Arc<SiteModule>, Url)>,
}

impl Pipeline {
    pub fn new(
        deps: PipelineDeps,
        config: PipelineConfig,
        overlay_enabled: bool,
        viewport: Viewport,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Self {
        let expire_tx = events.clone();
        let on_expire: FailsafeSink = Arc::new(move |generation| {
            let _ = expire_tx.send(PipelineEvent::LoaderFailsafe(generation));
        });
        let loader = LoaderController::new(
            deps.overlay,
            deps.notifier.clone(),
            config.loader_failsafe,
            on_expire,
        );

        Pipeline {
            surface: deps.surface,
            notifier: deps.notifier,
            resources: deps.resources,
            registry: deps.registry,
            broker: deps.broker,
            loader,
            config,
            events,
            persist: None,
            phase: ScrapePhase::Idle,
            generation: 0,
            overlay_enabled,
            viewport,
            surface_visible: true,
            history: NavHistory::new(),
            work: None,
            watchdog: None,
            checkout: None,
            checkout_runs: 0,
            pending_load: None,
            own_load_in_flight: false,
            bypass_once: None,
            showing_template: None,
        }
    }

    /// 开关变化时持久化
    pub fn with_overlay_persist(mut self, persist: OverlayPersist) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn phase(&self) -> &ScrapePhase {
        &self.phase
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay_enabled
    }

    pub fn checkout_active(&self) -> bool {
        self.checkout.is_some()
    }

    /// 启动：同步开关状态并加载首页
    pub fn start(&mut self) {
        self.notifier
            .notify(Notification::OverlayFeature(self.overlay_enabled));
        let home = self.config.home_url.clone();
        self.navigate_to(home, true);
    }

    /// 事件循环：先加载首页，之后串行处理所有事件
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PipelineEvent>) {
        self.start();
        while let Some(event) = rx.recv().await {
            self.handle(event);
        }
        log::info!("状态机事件循环结束");
    }

    /// 处理单个事件
    pub fn handle(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Navigate(input) => match normalize_input(&input) {
                Ok(url) => self.navigate_to(url, true),
                Err(e) => {
                    log::warn!("忽略非法导航输入 {:?}：{}", input, e);
                    self.toast(e.to_string());
                }
            },
            PipelineEvent::Back => {
                if self.refuse_during_checkout() {
                    return;
                }
                match self.history.back() {
                    Some(url) => self.navigate_to(url, false),
                    None => log::debug!("没有可后退的历史"),
                }
            }
            PipelineEvent::Forward => {
                if self.refuse_during_checkout() {
                    return;
                }
                match self.history.forward() {
                    Some(url) => self.navigate_to(url, false),
                    None => log::debug!("没有可前进的历史"),
                }
            }
            PipelineEvent::Reload => self.reload(),
            PipelineEvent::ToggleOverlay => self.toggle_overlay(),
            PipelineEvent::BeginCheckout(items) => self.begin_checkout(items),
            PipelineEvent::OverlayReady => {
                if self.checkout.is_none() {
                    self.loader.hide();
                }
            }
            PipelineEvent::NavigationStarted(target) => self.on_navigation_started(target),
            PipelineEvent::LoadFinished(target) => self.on_load_finished(target),
            PipelineEvent::Resized(viewport) => self.on_resized(viewport),
            PipelineEvent::ExtractionFinished { generation, result } => {
                self.on_extraction_finished(generation, result)
            }
            PipelineEvent::LoaderFailsafe(generation) => self.loader.on_failsafe(generation),
            PipelineEvent::TemplateTimeout(generation) => self.on_template_timeout(generation),
            PipelineEvent::CheckoutFinished { run, report } => {
                self.on_checkout_finished(run, report)
            }
        }
    }

    // ========================================================================
    // 导航
    // ========================================================================

    /// 统一导航入口：新导航总是覆盖当前阶段，不排队
    fn navigate_to(&mut self, url: Url, record: bool) {
        if self.refuse_during_checkout() {
            return;
        }
        if record {
            self.history.push(&url);
        }
        self.notifier.notify(Notification::UrlChanged(url.to_string()));
        self.cancel_in_flight();
        self.showing_template = None;

        match self.template_module(&url) {
            Some(module) => self.enter_scraping(module, url, true),
            None => {
                self.set_phase(ScrapePhase::Idle);
                self.load_remote(url);
                self.reveal();
            }
        }
    }

    /// 进入 Scraping：先折叠渲染面，再显示遮罩，最后才开始加载
    fn enter_scraping(&mut self, module: Arc<SiteModule>, source: Url, load: bool) {
        self.conceal();
        self.loader.show(self.content_bounds());
        log::info!("抓取 {}（模块 {}）", source, module.id);
        self.set_phase(ScrapePhase::Scraping {
            module,
            source: source.clone(),
        });
        if load {
            self.load_remote(source);
        }
    }

    fn reload(&mut self) {
        if self.refuse_during_checkout() {
            return;
        }
        // 周期进行中：从头再来一遍
        if let Some(source) = self.phase.source().cloned() {
            self.navigate_to(source, false);
            return;
        }
        match self.showing_template.take() {
            // 正在显示模板：不重跑抓取，重新加载模板并投递默认载荷
            Some((module, source)) => {
                self.cancel_in_flight();
                self.conceal();
                self.loader.show(self.content_bounds());
                self.set_phase(ScrapePhase::Template {
                    module,
                    source,
                    payload: None,
                });
                self.arm_watchdog();
                self.surface_call("重新加载", |s| s.reload());
            }
            None => self.surface_call("重新加载", |s| s.reload()),
        }
    }

    fn toggle_overlay(&mut self) {
        self.overlay_enabled = !self.overlay_enabled;
        let enabled = self.overlay_enabled;
        log::info!("覆盖功能{}", if enabled { "开启" } else { "关闭" });
        if let Some(persist) = &self.persist {
            persist(enabled);
        }
        self.notifier.notify(Notification::OverlayFeature(enabled));

        if enabled {
            // 重新打开：对当前地址重走一遍管线
            if self.checkout.is_none() {
                if let Some(current) = self.current_destination() {
                    self.navigate_to(current, false);
                }
            }
            return;
        }

        // 关闭：丢弃一切进行中的状态，恢复为原样可见的页面
        let restore = self.current_destination();
        let was_plain = matches!(self.phase, ScrapePhase::Idle)
            && self.showing_template.is_none()
            && self.checkout.is_none();
        self.cancel_in_flight();
        if let Some(active) = self.checkout.take() {
            log::info!("关闭覆盖功能，取消结账运行 #{}", active.run);
            active.cancel.cancel();
        }
        self.showing_template = None;
        self.set_phase(ScrapePhase::Idle);
        if was_plain {
            // 去掉已注入的样式
            self.surface_call("重新加载", |s| s.reload());
        } else if let Some(url) = restore {
            self.load_remote(url);
        }
        self.reveal();
        self.loader.hide();
    }

    // ========================================================================
    // 渲染面生命周期
    // ========================================================================

    fn on_navigation_started(&mut self, target: SurfaceTarget) {
        if self.checkout.is_some() {
            return;
        }
        // 模板文档都是本状态机自己加载的
        let SurfaceTarget::Remote(url) = target else {
            return;
        };

        let own_load = self.pending_load.as_ref() == Some(&url);
        let redirected = !own_load && self.own_load_in_flight;
        if own_load {
            self.pending_load = None;
            self.own_load_in_flight = true;
        }
        self.notifier.notify(Notification::UrlChanged(url.to_string()));

        if self.bypass_once.as_ref() == Some(&url) {
            self.bypass_once = None;
            return;
        }

        let scraping = matches!(self.phase, ScrapePhase::Scraping { .. });
        let idle = matches!(self.phase, ScrapePhase::Idle);
        match (scraping, self.template_module(&url)) {
            // 抓取中发生重定向：目标仍可模板化就保持隐藏
            (true, Some(module)) => {
                self.loader.show(self.content_bounds());
                if !own_load {
                    self.history.replace_current(&url);
                    self.set_phase(ScrapePhase::Scraping {
                        module,
                        source: url,
                    });
                }
            }
            // 重定向到了没有模板的站点：放弃本轮抓取，页面原样显示
            (true, None) => {
                log::info!("抓取目标重定向到 {}，改为原样显示", url);
                self.history.replace_current(&url);
                self.cancel_in_flight();
                self.set_phase(ScrapePhase::Idle);
                self.reveal();
            }
            // 页面内点击等由渲染面自己发起的导航：就地进入抓取
            (_, Some(module)) if !own_load => {
                self.record_started(&url, redirected);
                self.cancel_in_flight();
                self.showing_template = None;
                self.enter_scraping(module, url, false);
            }
            (false, None) if idle && !own_load => {
                self.record_started(&url, redirected);
                self.showing_template = None;
            }
            _ => {}
        }
    }

    /// 渲染面自行开始的导航：重定向替换当前条目，其余记为新的历史
    fn record_started(&mut self, url: &Url, redirected: bool) {
        if redirected {
            log::debug!("服务器重定向到 {}，替换当前历史条目", url);
            self.history.replace_current(url);
        } else {
            self.history.push(url);
        }
    }

    fn on_load_finished(&mut self, target: SurfaceTarget) {
        self.own_load_in_flight = false;
        if let Some(active) = &self.checkout {
            if let SurfaceTarget::Remote(url) = &target {
                active.loads.send_replace(Some(url.clone()));
            }
            return;
        }

        match (&self.phase, &target) {
            (ScrapePhase::Scraping { module, .. }, SurfaceTarget::Remote(_)) => {
                let module = module.clone();
                self.start_extraction(&module);
            }
            (
                ScrapePhase::Template {
                    module,
                    source,
                    payload,
                },
                SurfaceTarget::App(path),
            ) if module.template.as_deref() == Some(path.as_str()) => {
                let (module, source, payload) = (module.clone(), source.clone(), payload.clone());
                self.deliver_template(module, source, payload);
            }
            // 模板文档被意外重新加载（页面自己 reload）：投递默认载荷
            (ScrapePhase::Idle, SurfaceTarget::App(path)) => {
                if let Some((module, source)) = self.showing_template.clone() {
                    if module.template.as_deref() == Some(path.as_str()) {
                        self.deliver_template(module, source, None);
                    }
                }
            }
            (ScrapePhase::Idle, SurfaceTarget::Remote(url)) => {
                let url = url.clone();
                self.loader.hide();
                self.apply_direct_overlay(&url);
            }
            (phase, target) => {
                log::debug!("{} 阶段忽略加载完成事件：{}", phase.name(), target);
            }
        }
    }

    fn on_resized(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let bounds = self.content_bounds();
        if self.surface_visible {
            self.surface_call("调整尺寸", |s| s.set_bounds(bounds));
        }
        self.loader.resize(bounds);
    }

    // ========================================================================
    // 提取与模板
    // ========================================================================

    fn start_extraction(&mut self, module: &SiteModule) {
        if self.work.is_some() {
            log::debug!("提取已在进行，忽略重复的加载完成事件");
            return;
        }
        let script = match module
            .scrape_script
            .as_deref()
            .ok_or_else(|| AppError::ModuleError(format!("模块 {} 没有提取脚本", module.id)))
            .and_then(|path| self.resources.read(path))
        {
            Ok(script) => script,
            Err(e) => {
                self.fail_to_original(&e);
                return;
            }
        };

        let token = CancellationToken::new();
        self.work = Some(token.clone());
        let generation = self.generation;
        let broker = self.broker.clone();
        let surface = self.surface.clone();
        let events = self.events.clone();
        let timeout = self.config.extraction_timeout;
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(AppError::Cancelled),
                result = run_extraction(&broker, surface.as_ref(), &script, timeout) => result,
            };
            let _ = events.send(PipelineEvent::ExtractionFinished { generation, result });
        });
    }

    fn on_extraction_finished(&mut self, generation: u64, result: AppResult<ScrapedPayload>) {
        if generation != self.generation {
            log::debug!("丢弃过期的提取结果（代号 {}）", generation);
            return;
        }
        let ScrapePhase::Scraping { module, source } = self.phase.clone() else {
            return;
        };
        self.work = None;

        match result {
            Ok(payload) => {
                let Some(template) = module.template.clone() else {
                    self.fail_to_original(&AppError::TemplateError(format!(
                        "模块 {} 没有模板文档",
                        module.id
                    )));
                    return;
                };
                log::info!("提取成功：{} 页面（{}）", payload.kind_name(), source);
                self.set_phase(ScrapePhase::Template {
                    module,
                    source,
                    payload: Some(payload),
                });
                self.arm_watchdog();
                self.surface_call("加载模板", |s| s.load(&SurfaceTarget::App(template)));
            }
            Err(AppError::Cancelled) => {}
            Err(e) => self.fail_to_original(&e),
        }
    }

    /// 模板加载完成：投递一次载荷，显示渲染面
    fn deliver_template(
        &mut self,
        module: Arc<SiteModule>,
        source: Url,
        payload: Option<ScrapedPayload>,
    ) {
        self.abort_watchdog();
        let payload = payload.unwrap_or_else(|| {
            log::info!("没有待投递的载荷，使用默认首页载荷");
            ScrapedPayload::homepage_default(Some(&source))
        });
        log::debug!("向模板投递 {} 载荷", payload.kind_name());
        self.surface_call("投递载荷", |s| s.eval(&delivery_script(&payload.raw)));
        self.reveal();
        self.loader.hide();
        self.set_phase(ScrapePhase::Idle);
        self.showing_template = Some((module, source));
    }

    fn on_template_timeout(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        let ScrapePhase::Template { source, .. } = self.phase.clone() else {
            return;
        };
        log::warn!(
            "模板文档 {} ms 内未加载完成，回退到原始页面",
            self.config.template_timeout.as_millis()
        );
        self.watchdog = None;
        self.set_phase(ScrapePhase::Idle);
        self.bypass_once = Some(source.clone());
        self.load_remote(source);
        self.reveal();
        self.loader.hide();
        self.toast("模板加载失败，已显示原始页面".to_string());
    }

    /// 提取失败或资源缺失：渲染面里已是真实页面，直接原样显示
    fn fail_to_original(&mut self, error: &AppError) {
        log::warn!("{}，回退到原始页面", error);
        self.work = None;
        self.set_phase(ScrapePhase::Idle);
        self.reveal();
        self.loader.hide();
        self.toast("无法简化此页面，已显示原始页面".to_string());
    }

    /// Idle 阶段：直接覆盖模块向可见页面注入样式和脚本
    fn apply_direct_overlay(&mut self, url: &Url) {
        if !self.overlay_enabled {
            return;
        }
        let Some(module) = self.registry.resolve(url) else {
            return;
        };
        if module.uses_template {
            return;
        }
        let read = |path: &Option<String>| -> Option<String> {
            let path = path.as_deref()?;
            match self.resources.read(path) {
                Ok(content) => Some(content),
                Err(e) => {
                    log::warn!("读取覆盖资源失败：{}", e);
                    None
                }
            }
        };
        let css = read(&module.stylesheet);
        let js = read(&module.overlay_script);
        let script = overlay_injection_script(css.as_deref(), js.as_deref());
        if script.is_empty() {
            return;
        }
        log::debug!("向 {} 注入覆盖样式（模块 {}）", url, module.id);
        self.surface_call("注入覆盖", |s| s.eval(&script));
    }

    // ========================================================================
    // 结账
    // ========================================================================

    fn begin_checkout(&mut self, items: Vec<CartItem>) {
        if self.checkout.is_some() {
            self.toast("已有结账正在进行".to_string());
            return;
        }
        if items.is_empty() {
            self.toast("购物篮是空的".to_string());
            return;
        }
        let module = Url::parse(&items[0].url)
            .ok()
            .and_then(|url| self.registry.resolve(&url))
            .filter(|m| m.checkout.is_some());
        let Some(module) = module else {
            self.toast("该站点不支持自动结账".to_string());
            return;
        };

        self.cancel_in_flight();
        self.showing_template = None;
        self.set_phase(ScrapePhase::Idle);
        self.conceal();
        self.loader.show(self.content_bounds());

        self.checkout_runs += 1;
        let run = self.checkout_runs;
        let cancel = CancellationToken::new();
        let (loads_tx, loads_rx) = watch::channel(None);
        self.checkout = Some(ActiveCheckout {
            run,
            cancel: cancel.clone(),
            loads: loads_tx,
        });
        self.toast(format!("开始结账：{} 件商品", items.len()));

        let ctx = CheckoutContext {
            module,
            surface: self.surface.clone(),
            broker: self.broker.clone(),
            loads: loads_rx,
            config: self.config.checkout.clone(),
            cancel,
        };
        let events = self.events.clone();
        tokio::spawn(async move {
            let report = run_checkout(items, ctx).await;
            let _ = events.send(PipelineEvent::CheckoutFinished { run, report });
        });
    }

    fn on_checkout_finished(&mut self, run: u64, report: CheckoutReport) {
        if self.checkout.as_ref().map(|c| c.run) != Some(run) {
            log::debug!("丢弃已取消的结账运行 #{} 的回报", run);
            return;
        }
        self.checkout = None;
        self.toast(report.summary());

        match report.cart_url {
            Some(cart) if !report.cancelled => self.navigate_to(cart, true),
            _ => {
                self.reveal();
                self.loader.hide();
            }
        }
    }

    // ========================================================================
    // 工具方法
    // ========================================================================

    fn set_phase(&mut self, next: ScrapePhase) {
        if self.phase.name() != next.name() {
            log::info!("阶段 {} → {}", self.phase.name(), next.name());
        }
        self.phase = next;
    }

    /// 作废所有进行中的提取与模板看门狗
    fn cancel_in_flight(&mut self) {
        self.generation += 1;
        if let Some(token) = self.work.take() {
            token.cancel();
        }
        self.abort_watchdog();
    }

    fn arm_watchdog(&mut self) {
        self.abort_watchdog();
        let generation = self.generation;
        let timeout = self.config.template_timeout;
        let events = self.events.clone();
        self.watchdog = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(PipelineEvent::TemplateTimeout(generation));
        }));
    }

    fn abort_watchdog(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
    }

    fn template_module(&self, url: &Url) -> Option<Arc<SiteModule>> {
        if !self.overlay_enabled {
            return None;
        }
        self.registry.resolve_template(url)
    }

    /// 当前页面背后的真实地址
    fn current_destination(&self) -> Option<Url> {
        self.phase
            .source()
            .or(self.showing_template.as_ref().map(|(_, source)| source))
            .or(self.history.current())
            .cloned()
    }

    fn load_remote(&mut self, url: Url) {
        self.pending_load = Some(url.clone());
        self.surface_call("加载页面", |s| s.load(&SurfaceTarget::Remote(url)));
    }

    fn content_bounds(&self) -> Bounds {
        content_bounds(self.viewport)
    }

    /// 渲染面铺满内容区
    fn reveal(&mut self) {
        let bounds = self.content_bounds();
        self.surface_visible = true;
        self.surface_call("显示渲染面", |s| s.set_bounds(bounds));
    }

    /// 渲染面折叠为零尺寸
    fn conceal(&mut self) {
        self.surface_visible = false;
        self.surface_call("隐藏渲染面", |s| s.set_bounds(Bounds::collapsed()));
    }

    fn surface_call(&self, what: &str, call: impl FnOnce(&dyn RenderingSurface) -> AppResult<()>) {
        if let Err(e) = call(self.surface.as_ref()) {
            log::error!("{}失败：{}", what, e);
        }
    }

    fn refuse_during_checkout(&self) -> bool {
        if self.checkout.is_some() {
            log::info!("结账进行中，忽略导航");
            self.notifier
                .notify(Notification::Toast("结账进行中，请稍候".to_string()));
            return true;
        }
        false
    }

    fn toast(&self, message: String) {
        self.notifier.notify(Notification::Toast(message));
    }
}

// ============================================================================
// 单元测试
// ============================================================================
