//! HTLC Bridge 主入口

use std::sync::Arc;

use anyhow::Result;
use htlc_bridge::{api, app_state::AppState, config::Config, infrastructure::logging};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载环境变量
    dotenvy::dotenv().ok();

    // 2. 加载配置（CONFIG_PATH 指向的 TOML 优先）
    let config = Config::from_env_and_file(std::env::var("CONFIG_PATH").ok())?;
    config.validate()?;

    // 3. 初始化日志
    if let Err(e) = logging::init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    tracing::info!(
        storage = ?config.storage.backend,
        bind_addr = %config.server.bind_addr,
        "Starting HTLC bridge"
    );

    // 4. 存储 + 链客户端 + 服务
    let bind_addr = config.server.bind_addr.clone();
    let state = Arc::new(AppState::from_config(config).await?);

    // 5. 路由
    let app = api::routes(state);

    // 6. 启动服务器
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);
    tracing::info!("Swagger UI: http://{}/docs", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
