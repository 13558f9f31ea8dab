// ============================================================================
// 运行参数
// 默认值 + settings 表覆盖项；所有等待时长都在这里集中定义
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::database::AppSettings;
use crate::services::DEFAULT_HOME_URL;
use crate::utils::error::{AppError, AppResult};

/// 结账自动化的时间参数
#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutConfig {
    /// 单个商品页加载完成的最长等待
    pub page_load_timeout: Duration,
    /// 表单/按钮探测间隔（固定）
    pub poll_interval: Duration,
    /// 表单/按钮探测总时限
    pub poll_timeout: Duration,
    /// 单次探测脚本的求值时限
    pub probe_timeout: Duration,
    /// 表单提交脚本的求值时限
    pub submit_timeout: Duration,
    /// 商品之间的停顿，让站点自己的购物车更新落定
    pub settle_pause: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            page_load_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(500),
            poll_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(3),
            submit_timeout: Duration::from_secs(15),
            settle_pause: Duration::from_millis(1500),
        }
    }
}

/// 状态机运行参数
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// 加载遮罩兜底隐藏时限
    pub loader_failsafe: Duration,
    /// 提取脚本求值时限
    pub extraction_timeout: Duration,
    /// 模板文档加载看门狗时限
    pub template_timeout: Duration,
    /// 启动时加载的首页
    pub home_url: Url,
    pub checkout: CheckoutConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            loader_failsafe: Duration::from_secs(8),
            extraction_timeout: Duration::from_secs(12),
            template_timeout: Duration::from_secs(10),
            home_url: default_home(),
            checkout: CheckoutConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// 用 settings 表中的覆盖项修正默认值，非法值记警告后忽略
    pub fn from_settings(settings: &AppSettings) -> Self {
        let mut config = PipelineConfig::default();

        override_millis(
            &mut config.loader_failsafe,
            "loader_failsafe_ms",
            settings.loader_failsafe_ms.as_deref(),
        );
        override_millis(
            &mut config.extraction_timeout,
            "extraction_timeout_ms",
            settings.extraction_timeout_ms.as_deref(),
        );
        override_millis(
            &mut config.checkout.poll_timeout,
            "checkout_poll_timeout_ms",
            settings.checkout_poll_timeout_ms.as_deref(),
        );
        if let Some(home) = settings.home_url.as_deref() {
            match parse_home(home) {
                Ok(url) => config.home_url = url,
                Err(e) => log::warn!("忽略设置：{}", e),
            }
        }

        config
    }
}

fn default_home() -> Url {
    Url::parse(DEFAULT_HOME_URL).expect("DEFAULT_HOME_URL 是合法地址")
}

fn parse_millis(key: &str, raw: &str) -> AppResult<Duration> {
    let raw = raw.trim();
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(AppError::ConfigError(format!(
            "{} 必须是正整数毫秒数，实际为 {:?}",
            key, raw
        ))),
    }
}

fn parse_home(raw: &str) -> AppResult<Url> {
    match Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(url),
        _ => Err(AppError::ConfigError(format!(
            "home_url 必须是 http(s) 地址，实际为 {:?}",
            raw
        ))),
    }
}

fn override_millis(target: &mut Duration, key: &str, raw: Option<&str>) {
    let Some(raw) = raw else {
        return;
    };
    match parse_millis(key, raw) {
        Ok(ms) => *target = ms,
        Err(e) => log::warn!("忽略设置：{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AppSettings {
        AppSettings {
            overlay_enabled: true,
            home_url: None,
            modules_dir: None,
            loader_failsafe_ms: None,
            extraction_timeout_ms: None,
            checkout_poll_timeout_ms: None,
            db_path: String::new(),
        }
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = PipelineConfig::from_settings(&settings());
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.home_url.as_str(), DEFAULT_HOME_URL);
    }

    #[test]
    fn test_overrides_applied() {
        let mut s = settings();
        s.loader_failsafe_ms = Some("3000".to_string());
        s.checkout_poll_timeout_ms = Some(" 4000 ".to_string());
        s.home_url = Some("https://www.bbc.com/news".to_string());

        let config = PipelineConfig::from_settings(&s);
        assert_eq!(config.loader_failsafe, Duration::from_secs(3));
        assert_eq!(config.checkout.poll_timeout, Duration::from_secs(4));
        assert_eq!(config.home_url.as_str(), "https://www.bbc.com/news");
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let mut s = settings();
        s.loader_failsafe_ms = Some("soon".to_string());
        s.extraction_timeout_ms = Some("0".to_string());
        s.home_url = Some("file:///tmp/x.html".to_string());

        let config = PipelineConfig::from_settings(&s);
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = parse_millis("loader_failsafe_ms", "-5").unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        assert!(err.to_string().starts_with("配置错误"));
        assert!(matches!(
            parse_home("javascript:alert(1)"),
            Err(AppError::ConfigError(_))
        ));
    }
}
