// ============================================================================
// 提取契约：在页面上下文中求值脚本并取回 JSON
// ✅ 只能做：脚本包装、求值结果回传配对、载荷形状校验
// ⛔ 禁止：依赖 tauri::*，修改状态机阶段
// ============================================================================
//
// Tauri 的 eval 不带返回值，所以求值被拆成两半：
// 1. ScriptBroker 分配请求 id、登记一次性通道，把脚本体包进异步 IIFE 后 eval；
// 2. 页面内的包装代码通过 `surface_report` command 回传 {id, ok, value|error}，
//    command 调用 ScriptBroker::resolve 唤醒等待方。
// 等待方始终带超时，超时或被丢弃时登记项随之移除。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::oneshot;
use url::Url;

use crate::models::dtos::{ExtractedPayload, ScriptReport};
use crate::services::surface::RenderingSurface;
use crate::services::{DELIVERY_HOOK, REPORT_COMMAND};
use crate::utils::error::{AppError, AppResult};

/// 包装脚本首行的标记，后接请求 id
const EVAL_MARKER: &str = "/*boring-eval:";

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, String>>>;

// ============================================================================
// ScriptBroker
// ============================================================================

/// 页面脚本求值的请求/回传配对器
#[derive(Clone, Default)]
pub struct ScriptBroker {
    next_id: Arc<AtomicU64>,
    pending: Arc<Mutex<PendingMap>>,
}

impl ScriptBroker {
    pub fn new() -> Self {
        ScriptBroker::default()
    }

    /// 在渲染面当前文档中执行 `body`（一个可含 await 的函数体，用 return 给出结果）
    ///
    /// # 返回
    /// - `Ok(Value)`: 脚本 return 的 JSON 值（undefined 记为 null）
    /// - `Err(AppError::SurfaceError)`: 脚本抛出异常，或 eval 本身失败
    /// - `Err(AppError::Timeout)`: 超时未回传
    pub async fn evaluate(
        &self,
        surface: &dyn RenderingSurface,
        body: &str,
        timeout: Duration,
    ) -> AppResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(id, tx);

        // 无论以何种方式离开（超时、被取消、正常返回），都移除登记项
        let pending = self.pending.clone();
        let _cleanup = scopeguard::guard((), move |_| {
            if let Ok(mut map) = pending.lock() {
                map.remove(&id);
            }
        });

        surface.eval(&wrap_script(id, body))?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(AppError::SurfaceError(format!("脚本异常：{}", message))),
            Ok(Err(_)) => Err(AppError::Cancelled),
            Err(_) => Err(AppError::Timeout(format!(
                "脚本 #{} 在 {} ms 内未回传结果",
                id,
                timeout.as_millis()
            ))),
        }
    }

    /// 页面回传结果，返回是否匹配到等待中的请求
    pub fn resolve(&self, report: ScriptReport) -> bool {
        let sender = self.lock_pending().remove(&report.id);
        match sender {
            Some(tx) => {
                let result = if report.ok {
                    Ok(report.value)
                } else {
                    Err(report
                        .error
                        .unwrap_or_else(|| "未知脚本错误".to_string()))
                };
                tx.send(result).is_ok()
            }
            None => {
                log::debug!("忽略过期的脚本回传 #{}", report.id);
                false
            }
        }
    }

    /// 等待中的请求数
    pub fn pending_count(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, PendingMap> {
        // 持锁期间不会 panic，中毒时直接沿用内部数据
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 把脚本体包装为会自行回传结果的异步 IIFE
pub fn wrap_script(id: u64, body: &str) -> String {
    format!(
        r#"{marker}{id}*/
(async () => {{
  const __report = (r) => window.__TAURI_INTERNALS__.invoke('{command}', {{ report: r }});
  try {{
    const value = await (async () => {{
{body}
    }})();
    await __report({{ id: {id}, ok: true, value: value === undefined ? null : value }});
  }} catch (e) {{
    await __report({{ id: {id}, ok: false, error: String((e && e.stack) || e) }});
  }}
}})();"#,
        marker = EVAL_MARKER,
        id = id,
        command = REPORT_COMMAND,
        body = body
    )
}

/// 从包装脚本中取回请求 id
pub fn parse_eval_id(script: &str) -> Option<u64> {
    let rest = script.strip_prefix(EVAL_MARKER)?;
    let end = rest.find("*/")?;
    rest[..end].parse().ok()
}

// ============================================================================
// 载荷
// ============================================================================

/// 通过形状校验的提取结果
///
/// `raw` 是脚本原样返回的 JSON，投递给模板时原样转发；`parsed` 只用于校验和日志。
#[derive(Clone, Debug, PartialEq)]
pub struct ScrapedPayload {
    pub parsed: ExtractedPayload,
    pub raw: Value,
}

impl ScrapedPayload {
    /// 没有可用载荷时的兜底首页载荷
    pub fn homepage_default(origin: Option<&Url>) -> Self {
        let mut raw = json!({ "type": "homepage" });
        if let Some(url) = origin {
            raw["origin"] = Value::String(url.origin().ascii_serialization());
        }
        ScrapedPayload {
            parsed: ExtractedPayload::Homepage {},
            raw,
        }
    }

    /// 页面类型名，用于日志
    pub fn kind_name(&self) -> &'static str {
        match self.parsed {
            ExtractedPayload::Listing { .. } => "listing",
            ExtractedPayload::ProductDetail { .. } => "product",
            ExtractedPayload::Cart { .. } => "cart",
            ExtractedPayload::Homepage {} => "homepage",
        }
    }
}

/// 最小形状校验：必须是带合法 `type` 判别字段的对象
pub fn validate_payload(value: Value) -> AppResult<ScrapedPayload> {
    match value.get("type") {
        Some(Value::String(_)) => {}
        Some(_) => {
            return Err(AppError::ExtractionError(
                "载荷的 type 字段不是字符串".to_string(),
            ))
        }
        None => {
            return Err(AppError::ExtractionError(
                "脚本未返回带 type 字段的对象".to_string(),
            ))
        }
    }

    let parsed: ExtractedPayload = serde_json::from_value(value.clone())
        .map_err(|e| AppError::ExtractionError(format!("载荷结构不合法：{}", e)))?;

    Ok(ScrapedPayload { parsed, raw: value })
}

/// 执行模块提取脚本并校验结果
///
/// 抛异常、超时、形状不合法三种失败统一为 `AppError::ExtractionError`。
pub async fn run_extraction(
    broker: &ScriptBroker,
    surface: &dyn RenderingSurface,
    script: &str,
    timeout: Duration,
) -> AppResult<ScrapedPayload> {
    let value = broker
        .evaluate(surface, script, timeout)
        .await
        .map_err(|e| match e {
            AppError::Cancelled => AppError::Cancelled,
            other => AppError::ExtractionError(other.to_string()),
        })?;
    validate_payload(value)
}

// ============================================================================
// 注入脚本
// ============================================================================

/// 模板文档加载完成后投递载荷的一次性脚本
///
/// 先暂存到 `window.__boringPending`，模板脚本若尚未注册回调可在初始化时自取。
pub fn delivery_script(payload: &Value) -> String {
    let data = payload.to_string();
    format!(
        "window.__boringPending = {data};\nif (typeof window.{hook} === 'function') {{ window.{hook}(window.__boringPending); window.__boringPending = undefined; }}",
        data = data,
        hook = DELIVERY_HOOK
    )
}

/// 直接覆盖模式：向可见页面注入样式表和脚本
pub fn overlay_injection_script(stylesheet: Option<&str>, script: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(css) = stylesheet {
        let css = Value::String(css.to_string());
        out.push_str(&format!(
            r#"(() => {{
  let style = document.getElementById('boring-style');
  if (!style) {{
    style = document.createElement('style');
    style.id = 'boring-style';
    (document.head || document.documentElement).appendChild(style);
  }}
  style.textContent = {css};
}})();
"#,
            css = css
        ));
    }
    if let Some(js) = script {
        out.push_str(&format!(
            "(() => {{\n  try {{\n{js}\n  }} catch (e) {{ console.error('[Boring Mode] overlay script failed', e); }}\n}})();\n",
            js = js
        ));
    }
    out
}

// ============================================================================
// 单元测试
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dtos::ProductRecord;
    use crate::services::surface::fakes::{FakeSurface, SurfaceCall};

    fn listing_json() -> Value {
        json!({
            "type": "listing",
            "products": [{"asin": "A1", "title": "Shoe", "price": "$10", "rating": "4.5 / 5"}]
        })
    }

    #[test]
    fn test_wrap_script_round_trips_id() {
        let script = wrap_script(42, "return 1;");
        assert_eq!(parse_eval_id(&script), Some(42));
        assert!(script.contains("surface_report"));
        assert!(script.contains("return 1;"));
    }

    #[test]
    fn test_parse_eval_id_rejects_plain_script() {
        assert_eq!(parse_eval_id("history.back()"), None);
    }

    #[test]
    fn test_validate_listing_payload() {
        let payload = validate_payload(listing_json()).unwrap();
        assert_eq!(payload.kind_name(), "listing");
        match &payload.parsed {
            ExtractedPayload::Listing { products } => {
                assert_eq!(products.len(), 1);
                assert_eq!(products[0].id.as_deref(), Some("A1"));
                assert_eq!(products[0].title.as_deref(), Some("Shoe"));
            }
            other => panic!("应为 listing，实际为 {:?}", other),
        }
        // 原始 JSON 保持不变
        assert_eq!(payload.raw, listing_json());
    }

    #[test]
    fn test_validate_product_payload_accepts_name_alias() {
        let value = json!({"type": "product", "product": {"name": "Kettle", "details": ["1.7L"]}});
        let payload = validate_payload(value).unwrap();
        assert_eq!(
            payload.parsed,
            ExtractedPayload::ProductDetail {
                product: ProductRecord {
                    title: Some("Kettle".to_string()),
                    details: vec!["1.7L".to_string()],
                    ..Default::default()
                }
            }
        );
    }

    #[test]
    fn test_validate_rejects_missing_discriminant() {
        let err = validate_payload(json!({"products": []})).unwrap_err();
        assert!(matches!(err, AppError::ExtractionError(_)));
    }

    #[test]
    fn test_validate_rejects_unknown_kind() {
        assert!(validate_payload(json!({"type": "video"})).is_err());
    }

    #[test]
    fn test_validate_rejects_non_object() {
        assert!(validate_payload(json!("listing")).is_err());
        assert!(validate_payload(Value::Null).is_err());
    }

    #[test]
    fn test_validate_rejects_wrong_field_type() {
        assert!(validate_payload(json!({"type": "listing", "products": "none"})).is_err());
    }

    #[test]
    fn test_homepage_default_carries_origin() {
        let url = Url::parse("https://www.amazon.com/s?k=tea").unwrap();
        let payload = ScrapedPayload::homepage_default(Some(&url));
        assert_eq!(payload.parsed, ExtractedPayload::Homepage {});
        assert_eq!(payload.raw["type"], "homepage");
        assert_eq!(payload.raw["origin"], "https://www.amazon.com");
    }

    #[test]
    fn test_delivery_script_embeds_payload_json() {
        let script = delivery_script(&listing_json());
        assert!(script.contains("__boringDeliver"));
        assert!(script.contains(r#""asin":"A1""#));
    }

    #[test]
    fn test_overlay_injection_escapes_css() {
        let script = overlay_injection_script(Some("a::after { content: \"x\" }"), None);
        assert!(script.contains(r#"content: \"x\""#));
        assert!(script.contains("boring-style"));
    }

    #[test]
    fn test_overlay_injection_empty_when_nothing_to_inject() {
        assert!(overlay_injection_script(None, None).is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_returns_reported_value() {
        let broker = ScriptBroker::new();
        let surface = FakeSurface::new();
        surface.with_broker(broker.clone(), Box::new(|_, _| Some(Ok(json!({"n": 1})))));

        let value = broker
            .evaluate(surface.as_ref(), "return {n: 1};", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(value, json!({"n": 1}));
        assert_eq!(broker.pending_count(), 0);
        assert!(matches!(surface.calls()[0], SurfaceCall::Eval(_)));
    }

    #[tokio::test]
    async fn test_evaluate_maps_script_exception() {
        let broker = ScriptBroker::new();
        let surface = FakeSurface::new();
        surface.with_broker(
            broker.clone(),
            Box::new(|_, _| Some(Err("TypeError: x is null".to_string()))),
        );

        let err = broker
            .evaluate(surface.as_ref(), "throw 1;", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("TypeError"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluate_times_out_and_cleans_up() {
        let broker = ScriptBroker::new();
        let surface = FakeSurface::new();
        surface.with_broker(broker.clone(), Box::new(|_, _| None));

        let err = broker
            .evaluate(surface.as_ref(), "return 1;", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn test_resolve_unknown_id_is_ignored() {
        let broker = ScriptBroker::new();
        let matched = broker.resolve(ScriptReport {
            id: 99,
            ok: true,
            value: Value::Null,
            error: None,
        });
        assert!(!matched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_extraction_treats_all_failures_alike() {
        let broker = ScriptBroker::new();
        let surface = FakeSurface::new();

        // 抛异常
        surface.with_broker(broker.clone(), Box::new(|_, _| Some(Err("boom".to_string()))));
        let thrown = run_extraction(&broker, surface.as_ref(), "x", Duration::from_secs(1)).await;
        assert!(matches!(thrown, Err(AppError::ExtractionError(_))));

        // 超时
        surface.with_broker(broker.clone(), Box::new(|_, _| None));
        let timed_out =
            run_extraction(&broker, surface.as_ref(), "x", Duration::from_secs(1)).await;
        assert!(matches!(timed_out, Err(AppError::ExtractionError(_))));

        // 形状不合法
        surface.with_broker(broker.clone(), Box::new(|_, _| Some(Ok(json!({"kind": "x"})))));
        let malformed =
            run_extraction(&broker, surface.as_ref(), "x", Duration::from_secs(1)).await;
        assert!(matches!(malformed, Err(AppError::ExtractionError(_))));
    }
}
