// ============================================================================
// Commands 层：前端与模板调用的薄接口
// 只负责取参数、取 State、转发给状态机或数据库，不含业务逻辑
// ============================================================================

pub mod cart;
pub mod navigation;
pub mod settings;
pub mod template;

use tokio::sync::mpsc;

use crate::services::pipeline::PipelineEvent;

/// 状态机事件入口（Tauri managed state）
pub struct PipelineHandle {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl PipelineHandle {
    pub fn new(tx: mpsc::UnboundedSender<PipelineEvent>) -> Self {
        PipelineHandle { tx }
    }

    /// 投递事件；事件循环已退出时返回错误
    pub fn send(&self, event: PipelineEvent) -> Result<(), String> {
        self.tx
            .send(event)
            .map_err(|_| "状态机已停止，无法处理请求".to_string())
    }
}
