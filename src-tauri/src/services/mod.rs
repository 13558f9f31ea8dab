// ============================================================================
// 业务层：纯 Rust 核心逻辑
// ✅ 特点：不依赖 `tauri::*`，渲染面/遮罩/通知都经由 surface 模块的 trait 注入，
//          方便用假实现写 #[test]
// ⛔ 禁止：直接返回前端专用的错误格式
// ============================================================================

pub mod checkout;
pub mod config;
pub mod extraction;
pub mod history;
pub mod loader;
pub mod navigation;
pub mod pipeline;
pub mod poll;
pub mod registry;
pub mod surface;

use crate::models::dtos::{Bounds, Viewport};

// ============================================================================
// 常量定义
// ============================================================================

/// 顶部地址栏高度（逻辑像素），渲染面与遮罩都从它下方开始
pub const TOP_BAR_HEIGHT: f64 = 64.0;

/// 默认首页
pub const DEFAULT_HOME_URL: &str = "https://duckduckgo.com/";

/// 地址栏输入被判定为搜索词时使用的搜索入口
pub const SEARCH_ENDPOINT: &str = "https://duckduckgo.com/";

/// 站点模块清单在资源目录中的位置
pub const REGISTRY_MANIFEST: &str = "modules/registry.json";

/// 模板页面收取载荷的全局函数名（模板伴随脚本负责定义）
pub const DELIVERY_HOOK: &str = "__boringDeliver";

/// 页面脚本回传求值结果所调用的 command 名
pub const REPORT_COMMAND: &str = "surface_report";

/// 渲染面在窗口中的正常可见区域：内容区减去顶部栏
pub fn content_bounds(viewport: Viewport) -> Bounds {
    Bounds {
        x: 0.0,
        y: TOP_BAR_HEIGHT,
        width: viewport.width.max(0.0),
        height: (viewport.height - TOP_BAR_HEIGHT).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_bounds_subtracts_top_bar() {
        let b = content_bounds(Viewport {
            width: 1200.0,
            height: 900.0,
        });
        assert_eq!(b.x, 0.0);
        assert_eq!(b.y, 64.0);
        assert_eq!(b.width, 1200.0);
        assert_eq!(b.height, 836.0);
        assert!(b.is_visible());
    }

    #[test]
    fn test_content_bounds_never_negative() {
        let b = content_bounds(Viewport {
            width: 300.0,
            height: 40.0,
        });
        assert_eq!(b.height, 0.0);
        assert!(!b.is_visible());
    }
}
