//! 系统配置
//!
//! 加载顺序：默认值 → TOML配置文件 → 环境变量覆盖（前缀 BROADCASTER_ ，
//! 分隔符 `__` ，例如 `BROADCASTER_DATABASE__URL`）。

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub delivery: DeliveryConfig,
    pub dispatcher: DispatcherConfig,
    pub api: ApiConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

/// 外部投递API配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub base_url: String,
    pub product_id: String,
    pub api_token: String,
    pub request_timeout_seconds: u64,
}

/// 分发引擎参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// 每次从存储拉取的pending收件人数量上限
    pub batch_size: i64,
    /// 每条消息发送前的固定延迟（毫秒），用于遵守外部API限速
    pub rate_limit_delay_ms: u64,
    /// 单条消息的最大重试次数
    pub max_retries: u32,
    /// 两次重试之间的固定间隔（毫秒）
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub cors_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgresql://localhost/broadcaster".to_string(),
                max_connections: 10,
                min_connections: 1,
                connection_timeout_seconds: 30,
                idle_timeout_seconds: 600,
            },
            delivery: DeliveryConfig {
                base_url: "https://api.maytapi.com/api".to_string(),
                product_id: String::new(),
                api_token: String::new(),
                request_timeout_seconds: 30,
            },
            dispatcher: DispatcherConfig::default(),
            api: ApiConfig {
                enabled: true,
                bind_address: "0.0.0.0:3001".to_string(),
                cors_enabled: true,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            rate_limit_delay_ms: 1000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// # 参数
    ///
    /// * `config_path` - 配置文件路径，为None时尝试默认路径
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder().add_source(config::Config::try_from(&defaults)?);

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/broadcaster.toml",
                "broadcaster.toml",
                "/etc/broadcaster/config.toml",
            ];
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("BROADCASTER")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// 校验配置的合理性
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(anyhow::anyhow!("数据库URL不能为空"));
        }
        if self.dispatcher.batch_size <= 0 {
            return Err(anyhow::anyhow!(
                "批次大小必须大于0: {}",
                self.dispatcher.batch_size
            ));
        }
        if self.api.enabled && self.api.bind_address.is_empty() {
            return Err(anyhow::anyhow!("API绑定地址不能为空"));
        }
        Ok(())
    }

    /// 从TOML字符串解析配置
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    /// 序列化为TOML字符串
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}
