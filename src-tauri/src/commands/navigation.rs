// ============================================================================
// 导航 Commands（顶部栏调用）
// ============================================================================

use tauri::State;

use super::PipelineHandle;
use crate::services::pipeline::PipelineEvent;

/// 地址栏提交：网址或搜索词
#[tauri::command]
pub async fn nav_go(pipeline: State<'_, PipelineHandle>, input: String) -> Result<(), String> {
    pipeline.send(PipelineEvent::Navigate(input))
}

#[tauri::command]
pub async fn nav_back(pipeline: State<'_, PipelineHandle>) -> Result<(), String> {
    pipeline.send(PipelineEvent::Back)
}

#[tauri::command]
pub async fn nav_forward(pipeline: State<'_, PipelineHandle>) -> Result<(), String> {
    pipeline.send(PipelineEvent::Forward)
}

#[tauri::command]
pub async fn nav_reload(pipeline: State<'_, PipelineHandle>) -> Result<(), String> {
    pipeline.send(PipelineEvent::Reload)
}

/// 切换覆盖功能；新状态通过 overlay_feature 通知回传
#[tauri::command]
pub async fn toggle_overlay(pipeline: State<'_, PipelineHandle>) -> Result<(), String> {
    pipeline.send(PipelineEvent::ToggleOverlay)
}
