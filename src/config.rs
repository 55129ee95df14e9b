use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub matching: MatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    /// 超过该秒数的查询记为慢查询 (目录全量加载较慢)
    pub slow_query_secs: u64,
    /// 单个供应商历史查询的超时
    pub history_timeout_secs: u64,
}

/// 级联匹配参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// 历史/税务分类码阶段的最低分
    pub match_threshold: u8,
    /// 全目录阶段的最低分 (更严格)
    pub full_catalog_threshold: u8,
    /// 第一名与第二名的最小分差
    pub ambiguity_margin: u8,
    pub token_set_enabled: bool,
    /// 规范化描述短于该长度时跳过集合重叠阶段
    pub token_set_min_length: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            match_threshold: 90,
            full_catalog_threshold: 95,
            ambiguity_margin: 5,
            token_set_enabled: true,
            token_set_min_length: 5,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost/cfdi_matcher".to_string()),
                max_connections: 20,
                acquire_timeout_secs: 10,
                slow_query_secs: 5,
                history_timeout_secs: 30,
            },
            matching: MatchConfig::default(),
        }
    }
}

impl AppConfig {
    /// 加载配置：默认值 < matcher.{toml,yaml,json} < MATCHER_* 环境变量
    ///
    /// 嵌套键用 `__` 分隔，例如 `MATCHER_MATCHING__MATCH_THRESHOLD=92`。
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Environment::with_prefix("MATCHER"))
    }

    fn load_from(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("matcher").required(false))
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
