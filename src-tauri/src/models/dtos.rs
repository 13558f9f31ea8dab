// ============================================================================
// 数据传输对象（DTO）定义
// 前后端、宿主与页面脚本之间通信的数据结构，仅包含字段定义和序列化派生
// ⛔ 禁止：包含复杂的业务逻辑方法
// ============================================================================

use serde::{Deserialize, Serialize};

/// 窗口内容区尺寸（逻辑像素）
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// 子 webview 的位置与尺寸（逻辑像素）
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// 折叠为零尺寸，页面继续渲染但不可见
    pub fn collapsed() -> Self {
        Bounds {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        }
    }

    /// 是否占据可见面积
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// 单条商品记录：只含标量字段，不持有任何源文档引用
///
/// 字段全部可缺省，不同站点模块只填自己能拿到的部分。
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ProductRecord {
    /// 站点商品键（如 Amazon 的 ASIN）
    #[serde(alias = "asin")]
    pub id: Option<String>,
    #[serde(alias = "name")]
    pub title: Option<String>,
    pub price: Option<String>,
    pub rating: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    /// 详情页的要点列表
    pub details: Vec<String>,
}

/// 提取载荷：按页面类型打标签
///
/// 仅用于形状校验，真正投递给模板的是脚本返回的原始 JSON。
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExtractedPayload {
    /// 搜索/分类列表页
    Listing {
        #[serde(default)]
        products: Vec<ProductRecord>,
    },
    /// 商品详情页
    #[serde(rename = "product")]
    ProductDetail { product: ProductRecord },
    /// 站点购物车页
    Cart {
        #[serde(default)]
        items: Vec<ProductRecord>,
    },
    /// 首页或无法识别的页面
    Homepage {},
}

/// 本地购物篮中的一件商品
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CartItem {
    /// 站点商品键
    #[serde(alias = "asin")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub price: String,
    pub url: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// 发往顶部栏 UI 的通知
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Notification {
    /// 当前地址变化
    UrlChanged(String),
    /// 短暂提示消息
    Toast(String),
    /// 覆盖功能开关状态
    OverlayFeature(bool),
    /// 加载遮罩状态
    Loading(bool),
}

/// 页面脚本通过 `surface_report` 回传的求值结果
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ScriptReport {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}
