// ============================================================================
// 统一错误类型定义
// 使用 thiserror 派生宏，services 层统一返回 AppResult
// ============================================================================

use thiserror::Error;

/// 应用统一错误枚举
///
/// 每个变体对应一类失败场景。所有错误都在本地恢复，不会导致宿主进程崩溃。
/// 通过 `impl From<AppError> for String` 保持与 Tauri command 的兼容性。
#[derive(Debug, Error)]
pub enum AppError {
    /// 地址栏输入无法解析为合法 URL
    #[error("无效地址：{0}")]
    InvalidUrl(String),

    /// 提取脚本抛出异常、超时或返回结构不合法
    #[error("提取失败：{0}")]
    ExtractionError(String),

    /// 模板文档加载失败
    #[error("模板加载失败：{0}")]
    TemplateError(String),

    /// 渲染面（webview）操作失败
    #[error("渲染面操作失败：{0}")]
    SurfaceError(String),

    /// 结账自动化单步失败
    #[error("结账步骤失败：{0}")]
    CheckoutError(String),

    /// 站点模块清单或资源缺失
    #[error("站点模块错误：{0}")]
    ModuleError(String),

    /// 配置项非法
    #[error("配置错误：{0}")]
    ConfigError(String),

    /// 有界等待超时
    #[error("等待超时：{0}")]
    Timeout(String),

    /// 被新的导航或开关切换取消
    #[error("cancelled")]
    Cancelled,
}

/// 便捷类型别名，统一项目内的 Result 签名
pub type AppResult<T> = Result<T, AppError>;

/// Tauri 的 `#[tauri::command]` 要求错误类型可序列化，这里统一转为 String
impl From<AppError> for String {
    fn from(err: AppError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_is_localized() {
        let err = AppError::InvalidUrl("ftp://x".to_string());
        assert_eq!(err.to_string(), "无效地址：ftp://x");
    }

    #[test]
    fn test_error_into_string() {
        let msg: String = AppError::Cancelled.into();
        assert_eq!(msg, "cancelled");
    }
}
