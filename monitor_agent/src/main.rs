use anyhow::Context;
use log::{info, LevelFilter};
use monitor_agent::agent::MonitorAgent;
use monitor_agent::config::{self, SERVER_URL_ENV};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志记录器，RUST_LOG 可覆盖默认级别
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .init();
    info!("[主程序] 日志系统已初始化 (env_logger)，默认级别: Info。");

    let config_path = config::config_path_from_args(std::env::args());
    let agent_config =
        config::load_or_create(&config_path).with_server_url_override(std::env::var(SERVER_URL_ENV).ok());
    info!(
        "[主程序] 采集端地址: {}，快照周期 {} 秒，日志周期 {} 秒",
        agent_config.server_url, agent_config.data_interval_secs, agent_config.log_interval_secs
    );

    let mut agent = MonitorAgent::new(agent_config).context("创建监控代理失败")?;
    agent.start().await;
    info!("[主程序] 监控代理已启动，按 Ctrl-C 退出。");

    tokio::signal::ctrl_c().await.context("等待 Ctrl-C 信号失败")?;
    info!("[主程序] 收到退出信号，正在停止...");
    agent.stop().await;
    Ok(())
}
