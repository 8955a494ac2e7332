use anyhow::Result;
use jewelry_enhance::{logger, App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置（可选的 TOML 路径作为第一个参数）
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    // 初始化日志
    logger::init(config.verbose_logging);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
