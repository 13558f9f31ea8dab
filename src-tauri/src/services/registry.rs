// ============================================================================
// 站点模块注册表
// ============================================================================
//
// 按主机名把目标地址映射到站点模块，并声明该模块走"抓取→模板"还是"直接覆盖"路径。
// 模块清单来自 modules/registry.json，经 ResourceSource 读取（打包资源或磁盘目录）。
// 新增站点只需在清单中加一项并放好资源包，无需改代码。

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::services::surface::ResourceSource;
use crate::services::REGISTRY_MANIFEST;
use crate::utils::error::{AppError, AppResult};

/// 从商品链接中提取商品键的默认规则（/dp/KEY 或 /gp/product/KEY）
const DEFAULT_PRODUCT_KEY_PATTERN: &str = r"/(?:dp|gp/product)/([A-Z0-9]{6,})";

// ============================================================================
// 数据结构
// ============================================================================

/// 结账自动化需要的站点细节
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutProfile {
    /// 加入购物车表单的选择器
    pub form_selector: String,
    /// 加入购物车按钮的选择器（找不到表单时使用）
    pub button_selector: String,
    /// 表单中承载商品键的字段名
    pub item_field: String,
    /// 表单中承载数量的字段名
    #[serde(default = "default_quantity_field")]
    pub quantity_field: String,
    /// 表单没有 action 时提交的默认端点（相对站点根）
    pub default_endpoint: String,
    /// 站点购物车页路径（相对站点根）
    pub cart_path: String,
}

fn default_quantity_field() -> String {
    "quantity".to_string()
}

/// 站点模块：一个站点族的提取/模板/样式资源包
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteModule {
    pub id: String,
    /// 主机名模式："example.com" 匹配自身及子域，"amazon.*" 匹配任意后缀
    pub hosts: Vec<String>,
    /// true: 抓取→模板；false: 直接覆盖
    #[serde(default)]
    pub uses_template: bool,
    #[serde(default)]
    pub scrape_script: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub stylesheet: Option<String>,
    #[serde(default)]
    pub overlay_script: Option<String>,
    #[serde(default)]
    pub product_key_pattern: Option<String>,
    #[serde(default)]
    pub checkout: Option<CheckoutProfile>,
}

impl SiteModule {
    /// 主机名是否属于本模块
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.hosts.iter().any(|p| host_matches(&host, p))
    }

    /// 从商品链接中提取商品键
    pub fn product_key(&self, url: &str) -> Option<String> {
        let custom;
        let re = match &self.product_key_pattern {
            Some(pattern) => {
                custom = Regex::new(pattern).ok()?;
                &custom
            }
            None => default_product_key_regex(),
        };
        re.captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

fn default_product_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DEFAULT_PRODUCT_KEY_PATTERN).expect("默认商品键正则合法"))
}

/// 通配后缀允许的二级域名（co.uk、com.au 这类国家代码后缀）
const SECOND_LEVEL_LABELS: &[&str] = &["co", "com", "ne", "or", "org", "net", "ac"];

/// 主机名模式匹配
fn host_matches(host: &str, pattern: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    if let Some(base) = pattern.strip_suffix(".*") {
        // amazon.* → amazon.com / www.amazon.co.uk，不接受 amazon.evil.test
        let prefix = format!("{}.", base);
        return host
            .match_indices(&prefix)
            .filter(|(i, _)| *i == 0 || host.as_bytes()[i - 1] == b'.')
            .any(|(i, _)| is_registry_suffix(&host[i + prefix.len()..]));
    }
    host == pattern || host.ends_with(&format!(".{}", pattern))
}

/// 形如公共后缀的尾部："com"、"de"、"co.uk"、"com.au"
fn is_registry_suffix(tail: &str) -> bool {
    let letters = |label: &str, max: usize| {
        (2..=max).contains(&label.len()) && label.bytes().all(|b| b.is_ascii_lowercase())
    };
    match tail.split('.').collect::<Vec<_>>().as_slice() {
        [tld] => letters(*tld, 3),
        [second, tld] => SECOND_LEVEL_LABELS.contains(second) && letters(*tld, 2),
        _ => false,
    }
}

/// 清单文件格式
#[derive(Deserialize)]
struct Manifest {
    modules: Vec<SiteModule>,
}

// ============================================================================
// 注册表
// ============================================================================

/// 不可变的站点模块注册表
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<SiteModule>>,
}

impl ModuleRegistry {
    /// 校验并构建注册表
    pub fn new(modules: Vec<SiteModule>) -> AppResult<Self> {
        let mut seen = HashSet::new();
        for module in &modules {
            if !seen.insert(module.id.clone()) {
                return Err(AppError::ModuleError(format!("模块 id 重复：{}", module.id)));
            }
            if module.hosts.is_empty() {
                return Err(AppError::ModuleError(format!(
                    "模块 {} 未声明任何主机名",
                    module.id
                )));
            }
            if module.uses_template
                && (module.scrape_script.is_none() || module.template.is_none())
            {
                return Err(AppError::ModuleError(format!(
                    "模板模块 {} 必须同时提供 scrapeScript 和 template",
                    module.id
                )));
            }
            if let Some(pattern) = &module.product_key_pattern {
                Regex::new(pattern).map_err(|e| {
                    AppError::ModuleError(format!("模块 {} 的商品键正则非法：{}", module.id, e))
                })?;
            }
        }
        Ok(ModuleRegistry {
            modules: modules.into_iter().map(Arc::new).collect(),
        })
    }

    /// 从 JSON 清单文本构建
    pub fn from_manifest(json: &str) -> AppResult<Self> {
        let manifest: Manifest = serde_json::from_str(json)
            .map_err(|e| AppError::ModuleError(format!("模块清单解析失败：{}", e)))?;
        Self::new(manifest.modules)
    }

    /// 从资源来源读取 modules/registry.json
    pub fn load(source: &dyn ResourceSource) -> AppResult<Self> {
        let json = source.read(REGISTRY_MANIFEST)?;
        let registry = Self::from_manifest(&json)?;
        log::info!("已加载 {} 个站点模块", registry.modules.len());
        Ok(registry)
    }

    /// 按目标地址查找模块；只处理 http/https
    pub fn resolve(&self, url: &Url) -> Option<Arc<SiteModule>> {
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?;
        self.modules.iter().find(|m| m.matches_host(host)).cloned()
    }

    /// 目标地址对应的模板模块（走"抓取→模板"路径）
    pub fn resolve_template(&self, url: &Url) -> Option<Arc<SiteModule>> {
        self.resolve(url).filter(|m| m.uses_template)
    }

    pub fn get(&self, id: &str) -> Option<Arc<SiteModule>> {
        self.modules.iter().find(|m| m.id == id).cloned()
    }

    pub fn modules(&self) -> &[Arc<SiteModule>] {
        &self.modules
    }
}

// ============================================================================
// 单元测试
// ============================================================================
