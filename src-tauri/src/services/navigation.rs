// ============================================================================
// 地址栏输入规范化
// ============================================================================

use url::Url;

use crate::services::SEARCH_ENDPOINT;
use crate::utils::error::{AppError, AppResult};

/// 把地址栏/模板传来的文本规范化为可加载的 URL
///
/// - 已带 http(s):// 前缀的按原样解析
/// - 带其他协议的拒绝（file:、javascript: 等不允许从地址栏进入渲染面）
/// - 含空白或不含点号（localhost 除外）的视为搜索词
/// - 其余补上 https:// 前缀
pub fn normalize_input(input: &str) -> AppResult<Url> {
    let text = input.trim();
    if text.is_empty() {
        return Err(AppError::InvalidUrl("地址为空".to_string()));
    }

    let lower = text.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return parse_web_url(text);
    }

    if has_scheme(text) {
        return Err(AppError::InvalidUrl(format!("不支持的协议：{}", text)));
    }

    if looks_like_query(text) {
        return search_url(text);
    }

    parse_web_url(&format!("https://{}", text))
}

/// 构造搜索地址
pub fn search_url(query: &str) -> AppResult<Url> {
    let mut url = Url::parse(SEARCH_ENDPOINT)
        .map_err(|e| AppError::InvalidUrl(format!("搜索入口非法：{}", e)))?;
    url.query_pairs_mut().append_pair("q", query.trim());
    Ok(url)
}

fn parse_web_url(text: &str) -> AppResult<Url> {
    let url = Url::parse(text).map_err(|e| AppError::InvalidUrl(format!("{}（{}）", text, e)))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(AppError::InvalidUrl(format!("缺少主机名：{}", text)));
    }
    Ok(url)
}

/// "scheme:" 开头且冒号后不是端口号
fn has_scheme(text: &str) -> bool {
    let Some((scheme, rest)) = text.split_once(':') else {
        return false;
    };
    let valid_scheme = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    let is_port = rest
        .split(['/', '?', '#'])
        .next()
        .is_some_and(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    valid_scheme && !is_port && !scheme.contains('.')
}

fn looks_like_query(text: &str) -> bool {
    if text.chars().any(char::is_whitespace) {
        return true;
    }
    let host = text.split(['/', '?', '#', ':']).next().unwrap_or("");
    !host.contains('.') && !host.eq_ignore_ascii_case("localhost")
}
