// ============================================================================
// 模板与页面脚本 Commands
// 模板从不直接导航渲染面，一律经由这里回到状态机
// ============================================================================

use tauri::State;
use tauri_plugin_opener::OpenerExt;
use url::Url;

use super::PipelineHandle;
use crate::models::dtos::{CartItem, ScriptReport};
use crate::services::extraction::ScriptBroker;
use crate::services::pipeline::PipelineEvent;

/// 模板发起的导航
#[tauri::command]
pub async fn template_navigate(
    pipeline: State<'_, PipelineHandle>,
    url: String,
) -> Result<(), String> {
    pipeline.send(PipelineEvent::Navigate(url))
}

/// 模板发起的结账
#[tauri::command]
pub async fn template_checkout(
    pipeline: State<'_, PipelineHandle>,
    items: Vec<CartItem>,
) -> Result<(), String> {
    pipeline.send(PipelineEvent::BeginCheckout(items))
}

/// 替换界面绘制完成
#[tauri::command]
pub async fn overlay_ready(pipeline: State<'_, PipelineHandle>) -> Result<(), String> {
    pipeline.send(PipelineEvent::OverlayReady)
}

/// 页面脚本回传求值结果（ScriptBroker 包装代码调用）
#[tauri::command]
pub async fn surface_report(
    broker: State<'_, ScriptBroker>,
    report: ScriptReport,
) -> Result<(), String> {
    broker.resolve(report);
    Ok(())
}

/// 在系统浏览器中打开商品页
#[tauri::command]
pub async fn open_external(app: tauri::AppHandle, url: String) -> Result<(), String> {
    let parsed = Url::parse(&url).map_err(|e| format!("打开失败：地址非法 {}: {}", url, e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(format!("打开失败：不支持的协议 {}", parsed.scheme()));
    }
    app.opener()
        .open_url(parsed.as_str(), None::<&str>)
        .map_err(|e| format!("打开失败：{}", e))
}
