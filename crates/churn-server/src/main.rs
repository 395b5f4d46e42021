mod routes;
mod view;

use anyhow::Context;
use churn_core::{config::Config, pipeline::AppCore};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use routes::AppState;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Churn risk scoring web form")]
struct Args {
    /// JSON 配置文件；缺省时全部用默认值
    #[arg(long, env = "CHURN_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides config.
    #[arg(long, env = "CHURN_BIND")]
    bind: Option<String>,

    /// Model artifact candidates in lookup order (repeatable, or comma separated in env).
    #[arg(long = "model", value_name = "PATH", env = "CHURN_MODEL_PATH", value_delimiter = ',')]
    models: Vec<PathBuf>,
}

impl Args {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut cfg = match &self.config {
            Some(p) => Config::from_file(p)?,
            None => Config::default(),
        };
        if let Some(bind) = &self.bind {
            cfg.bind = bind.clone();
        }
        if !self.models.is_empty() {
            cfg.model_paths = self.models.clone();
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let cfg = args.load_config()?;

    // metrics recorder（进程内全局一次）
    let prom = PrometheusBuilder::new()
        .install_recorder()
        .context("install prometheus recorder")?;

    // 模型只在启动时加载一次；失败也照常启动（降级）
    let core = Arc::new(AppCore::load(cfg));
    if core.is_ready() {
        let policy = core.policy();
        tracing::info!(
            medium_at = policy.medium_at,
            high_at = policy.high_at,
            "risk tiers"
        );
    } else {
        tracing::warn!("serving without a model: every prediction will be refused");
    }

    let addr: SocketAddr = core
        .cfg
        .bind
        .parse()
        .with_context(|| format!("parse bind address '{}'", core.cfg.bind))?;

    let app = routes::router(AppState { core, prom });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!("churn-server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(err = %e, "ctrl-c handler failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
