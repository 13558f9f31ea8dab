// ============================================================================
// 结账自动化
// ============================================================================
//
// 逐个商品复用同一个渲染面，把本地购物篮里的商品加入站点真实购物车：
// 加载商品页 → 有界轮询加购表单/按钮 → 提交表单或点击按钮 → 停顿 → 下一个。
// 单个商品失败只记日志，不会中止整个流程；本地购物篮不会被清空。
// 整个过程中渲染面保持隐藏，状态机的阶段切换由 run-active 标志压制（见 pipeline）。

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::models::dtos::CartItem;
use crate::services::config::CheckoutConfig;
use crate::services::extraction::ScriptBroker;
use crate::services::poll::{pause, poll_until, PollOutcome, RetryPolicy};
use crate::services::registry::{CheckoutProfile, SiteModule};
use crate::services::surface::{RenderingSurface, SurfaceTarget};
use crate::utils::error::{AppError, AppResult};

// ============================================================================
// 结果
// ============================================================================

/// 单个商品的处理结果，只进日志，不回写本地购物篮
#[derive(Clone, Debug, PartialEq)]
pub enum ItemOutcome {
    /// 表单已提交（站点返回的 HTTP 状态码）
    Submitted { status: u16 },
    /// 未找到表单，已点击加购按钮
    Clicked,
    /// 轮询时限内没有出现表单或按钮
    NotFound,
    /// 加载、提交或脚本执行出错
    Error(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ItemResult {
    pub item_id: String,
    pub outcome: ItemOutcome,
}

/// 一次结账运行的汇总
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckoutReport {
    pub results: Vec<ItemResult>,
    /// 运行结束后要展示的站点购物车页
    pub cart_url: Option<Url>,
    /// 是否被中途取消（关闭覆盖功能）
    pub cancelled: bool,
}

impl CheckoutReport {
    /// 成功加入购物车的数量（提交或点击）
    pub fn added(&self) -> usize {
        self.results
            .iter()
            .filter(|r| {
                matches!(
                    r.outcome,
                    ItemOutcome::Submitted { .. } | ItemOutcome::Clicked
                )
            })
            .count()
    }

    /// 给用户看的一句话汇总
    pub fn summary(&self) -> String {
        let total = self.results.len();
        let added = self.added();
        if self.cancelled {
            format!("结账已取消：已处理 {} 件，其中 {} 件加入购物车", total, added)
        } else if added == total {
            format!("已将 {} 件商品加入站点购物车", added)
        } else {
            format!("已加入 {}/{} 件商品，其余未能自动加入", added, total)
        }
    }
}

/// 探测到的加购入口
#[derive(Clone, Copy, Debug, PartialEq)]
enum AddControl {
    Form,
    Button,
}

// ============================================================================
// 运行
// ============================================================================

/// 结账运行依赖的外部能力
pub struct CheckoutContext {
    pub module: Arc<SiteModule>,
    pub surface: Arc<dyn RenderingSurface>,
    pub broker: ScriptBroker,
    /// 渲染面最近一次加载完成的地址
    pub loads: watch::Receiver<Option<Url>>,
    pub config: CheckoutConfig,
    pub cancel: CancellationToken,
}

/// 站点购物车页地址：取第一个商品的源站 + 模块声明的购物车路径
pub fn cart_url_for(items: &[CartItem], profile: &CheckoutProfile) -> Option<Url> {
    let first = Url::parse(&items.first()?.url).ok()?;
    first.join(&profile.cart_path).ok()
}

/// 顺序处理所有商品；永不整体失败，只产出部分结果
pub async fn run_checkout(items: Vec<CartItem>, mut ctx: CheckoutContext) -> CheckoutReport {
    let mut report = CheckoutReport::default();
    let Some(profile) = ctx.module.checkout.clone() else {
        log::warn!("模块 {} 未声明结账配置，跳过结账", ctx.module.id);
        return report;
    };
    report.cart_url = cart_url_for(&items, &profile);

    log::info!("开始结账：模块 {}，共 {} 件商品", ctx.module.id, items.len());

    let count = items.len();
    for (index, item) in items.into_iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let outcome = match process_item(&item, &profile, &mut ctx).await {
            Ok(outcome) => outcome,
            Err(AppError::Cancelled) => {
                report.cancelled = true;
                break;
            }
            Err(e) => ItemOutcome::Error(e.to_string()),
        };

        match &outcome {
            ItemOutcome::Submitted { status } => {
                log::info!("[{}/{}] {} 表单已提交（HTTP {}）", index + 1, count, item.id, status)
            }
            ItemOutcome::Clicked => {
                log::info!("[{}/{}] {} 已点击加购按钮", index + 1, count, item.id)
            }
            ItemOutcome::NotFound => {
                log::warn!("[{}/{}] {} 未找到加购表单或按钮", index + 1, count, item.id)
            }
            ItemOutcome::Error(e) => {
                log::warn!("[{}/{}] {} 处理失败：{}", index + 1, count, item.id, e)
            }
        }
        report.results.push(ItemResult {
            item_id: item.id.clone(),
            outcome,
        });

        if index + 1 < count && !pause(ctx.config.settle_pause, &ctx.cancel).await {
            report.cancelled = true;
            break;
        }
    }

    log::info!("结账结束：{}", report.summary());
    report
}

/// 处理单个商品
async fn process_item(
    item: &CartItem,
    profile: &CheckoutProfile,
    ctx: &mut CheckoutContext,
) -> AppResult<ItemOutcome> {
    let url = Url::parse(&item.url)
        .map_err(|e| AppError::CheckoutError(format!("商品链接非法 {}: {}", item.url, e)))?;
    if !url.host_str().is_some_and(|h| ctx.module.matches_host(h)) {
        return Err(AppError::CheckoutError(format!(
            "商品 {} 不属于站点 {}",
            item.id, ctx.module.id
        )));
    }

    // 1. 加载商品页并等待它自己的加载完成
    ctx.loads.borrow_and_update();
    ctx.surface.load(&SurfaceTarget::Remote(url.clone()))?;
    let page_load_timeout = ctx.config.page_load_timeout;
    let wait = wait_for_item_page(&mut ctx.loads, &ctx.module, &url);
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => return Err(AppError::Cancelled),
        loaded = tokio::time::timeout(page_load_timeout, wait) => match loaded {
            Ok(result) => result?,
            Err(_) => {
                return Err(AppError::Timeout(format!(
                    "商品页 {} ms 内未加载完成",
                    page_load_timeout.as_millis()
                )))
            }
        },
    }

    // 2. 有界轮询加购表单或按钮
    let detect_owned = detect_script(profile);
    let detect = detect_owned.as_str();
    let broker = &ctx.broker;
    let surface = ctx.surface.as_ref();
    let probe_timeout = ctx.config.probe_timeout;
    let policy = RetryPolicy::fixed(ctx.config.poll_interval, ctx.config.poll_timeout);
    let found = poll_until(policy, &ctx.cancel, move |_| {
        async move {
            match broker.evaluate(surface, detect, probe_timeout).await {
                Ok(Value::String(kind)) if kind == "form" => Some(AddControl::Form),
                Ok(Value::String(kind)) if kind == "button" => Some(AddControl::Button),
                Ok(_) => None,
                Err(e) => {
                    log::debug!("加购探测未完成：{}", e);
                    None
                }
            }
        }
    })
    .await;

    match found {
        // 3. 表单：同源带凭据提交
        PollOutcome::Ready(AddControl::Form) => {
            let script = submit_script(profile, item);
            let value = broker
                .evaluate(surface, &script, ctx.config.submit_timeout)
                .await?;
            let status = value.get("status").and_then(Value::as_u64).unwrap_or(0) as u16;
            let ok = value.get("ok").and_then(Value::as_bool).unwrap_or(false);
            if ok {
                Ok(ItemOutcome::Submitted { status })
            } else {
                Ok(ItemOutcome::Error(format!("加购请求返回 HTTP {}", status)))
            }
        }
        // 4. 只有按钮：直接点击
        PollOutcome::Ready(AddControl::Button) => {
            broker
                .evaluate(surface, &click_script(profile), probe_timeout)
                .await?;
            Ok(ItemOutcome::Clicked)
        }
        // 5. 都没找到
        PollOutcome::Exhausted { attempts } => {
            log::debug!("{} 次探测均未命中", attempts);
            Ok(ItemOutcome::NotFound)
        }
        PollOutcome::Cancelled => Err(AppError::Cancelled),
    }
}

/// 等到请求的商品页加载完成；其他页面（上一个页面迟到的完成、点击按钮引起的跳转）一律跳过
async fn wait_for_item_page(
    loads: &mut watch::Receiver<Option<Url>>,
    module: &SiteModule,
    requested: &Url,
) -> AppResult<()> {
    loop {
        loads
            .changed()
            .await
            .map_err(|_| AppError::CheckoutError("渲染面已关闭".to_string()))?;
        let finished = loads.borrow_and_update().clone();
        match finished {
            Some(loaded) if is_item_page(&loaded, requested, module) => return Ok(()),
            Some(other) => log::debug!("等待 {} 时跳过无关的加载完成：{}", requested, other),
            None => {}
        }
    }
}

/// 加载完成的地址是否就是请求的商品页（允许站内重定向：同一模块的主机且路径或商品键一致）
fn is_item_page(loaded: &Url, requested: &Url, module: &SiteModule) -> bool {
    if !loaded.host_str().is_some_and(|h| module.matches_host(h)) {
        return false;
    }
    if loaded.path() == requested.path() {
        return true;
    }
    match module.product_key(requested.as_str()) {
        Some(key) => module.product_key(loaded.as_str()).as_deref() == Some(key.as_str()),
        None => false,
    }
}

// ============================================================================
// 页面脚本
// ============================================================================

/// 探测脚本：返回 "form" / "button" / null
fn detect_script(profile: &CheckoutProfile) -> String {
    let form = Value::String(profile.form_selector.clone());
    let button = Value::String(profile.button_selector.clone());
    format!(
        r#"// boring-checkout:detect
if (document.querySelector({form})) return 'form';
if (document.querySelector({button})) return 'button';
return null;"#
    )
}

/// 提交脚本：收集具名字段（尊重 checkbox/radio 勾选状态），补齐商品键与数量，
/// 以同源带凭据请求提交到表单 action 或模块默认端点
fn submit_script(profile: &CheckoutProfile, item: &CartItem) -> String {
    let cfg = json!({
        "formSelector": profile.form_selector,
        "itemField": profile.item_field,
        "quantityField": profile.quantity_field,
        "defaultEndpoint": profile.default_endpoint,
        "itemId": item.id,
        "quantity": item.quantity.max(1),
    });
    format!(
        r#"// boring-checkout:submit
const cfg = {cfg};
const form = document.querySelector(cfg.formSelector);
if (!form) throw new Error('add-to-cart form disappeared');
const body = new URLSearchParams();
for (const el of Array.from(form.elements)) {{
  if (!el.name || el.disabled) continue;
  const type = (el.type || '').toLowerCase();
  if (type === 'checkbox' || type === 'radio') {{ if (!el.checked) continue; }}
  if (type === 'submit' || type === 'button' || type === 'file' || type === 'reset') continue;
  if (el.tagName === 'SELECT' && el.multiple) {{
    for (const o of Array.from(el.selectedOptions)) body.append(el.name, o.value);
    continue;
  }}
  body.append(el.name, el.value);
}}
if (!body.get(cfg.itemField)) body.set(cfg.itemField, cfg.itemId);
const qty = parseInt(body.get(cfg.quantityField), 10);
if (!(qty > 0) || cfg.quantity > 1) body.set(cfg.quantityField, String(cfg.quantity));
const action = new URL(form.getAttribute('action') || cfg.defaultEndpoint, location.href);
if (action.origin !== location.origin) throw new Error('cross-origin form action ' + action.origin);
const res = await fetch(action.href, {{
  method: 'POST',
  body,
  credentials: 'include',
  headers: {{ 'Content-Type': 'application/x-www-form-urlencoded' }}
}});
return {{ status: res.status, ok: res.ok }};"#
    )
}

/// 点击脚本
fn click_script(profile: &CheckoutProfile) -> String {
    let button = Value::String(profile.button_selector.clone());
    format!(
        r#"// boring-checkout:click
const btn = document.querySelector({button});
if (!btn) throw new Error('add-to-cart control disappeared');
btn.click();
return 'clicked';"#
    )
}

// ============================================================================
// 单元测试
// ============================================================================
