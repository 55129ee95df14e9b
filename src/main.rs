use axum::{
    routing::{get, post},
    Router,
};
use cfdi_product_matcher::{api, build_matcher, create_pool, AppConfig, MatcherService};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志 - 本地时间格式
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_target(true)
        .with_level(true)
        .init();

    // 加载配置
    let config = AppConfig::load()?;
    info!("Starting server with config: {:?}", config);

    // 创建数据库连接池
    let pool = create_pool(&config.database).await?;

    // 加载目录, 构建匹配引擎
    let matcher = build_matcher(&pool, &config).await?;
    info!("Catalog index ready: {} products", matcher.index().len());

    let state = api::AppState {
        service: Arc::new(MatcherService::new(matcher)),
        pool,
        config: Arc::new(config.clone()),
    };

    let app = Router::new()
        .route("/health", get(api::health_check))
        .route("/api/match", post(api::match_items))
        .route("/api/cache/invalidate", post(api::invalidate_cache))
        .route("/api/catalog/reload", post(api::reload_catalog))
        .with_state(state)
        .layer(ServiceBuilder::new());

    // 启动服务器
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/match             - 发票明细匹配");
    info!("  POST /api/cache/invalidate  - 清空供应商历史缓存");
    info!("  POST /api/catalog/reload    - 重新加载目录");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
