use anyhow::Result;
use extract_bill_data::api::{router, AppState};
use extract_bill_data::config::Config;
use extract_bill_data::utils::logging;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();
    logging::log_startup(&config);

    // 构建应用状态和路由
    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config)?;
    let app = router(state);

    // 启动服务
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("✓ 服务监听于 http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
