use dashboard_server::{Config, Server, init_logger_with_file};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. 加载 .env
    let _ = dotenvy::dotenv();

    // 2. 加载配置（失败即退出）
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_logger_with_file(None, None);
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    // 3. 日志
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
    tracing::info!(
        "Starting dashboard-server v{} (env: {})",
        env!("CARGO_PKG_VERSION"),
        config.environment
    );
    for site in &config.sites {
        tracing::info!(
            site = %site.name,
            url = %site.url,
            signed_webhooks = site.webhook_secret.is_some(),
            "Site configured"
        );
    }

    // 4. 启动服务（后台任务包含启动刷新）
    let server = Server::new(config);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
