use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;

use broadcaster_api::{create_app, AppState};
use broadcaster_core::config::AppConfig;
use broadcaster_core::traits::{BroadcastProcessService, DeliveryApi, RecipientRepository};
use broadcaster_dispatcher::{BatchSender, BroadcastWorker, RecipientResolver};
use broadcaster_infrastructure::{
    create_pool, MaytapiClient, PostgresBroadcastRepository, PostgresConversationRepository,
    PostgresRecipientRepository,
};

/// 应用运行模式
#[derive(Debug, Clone)]
pub enum AppMode {
    /// 运行HTTP服务器，由外部请求触发处理
    Serve,
    /// 一次性排空所有pending广播后退出
    Drain,
}

/// 组合根：装配仓储、投递客户端与处理工作器
pub struct Application {
    config: AppConfig,
    mode: AppMode,
    processor: Arc<dyn BroadcastProcessService>,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!("初始化应用程序，模式: {:?}", mode);

        let pool = create_pool(&config.database)
            .await
            .context("创建数据库连接池失败")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("执行数据库迁移失败")?;

        let broadcast_repo = Arc::new(PostgresBroadcastRepository::new(pool.clone()));
        let recipient_repo: Arc<dyn RecipientRepository> =
            Arc::new(PostgresRecipientRepository::new(pool.clone()));
        let conversation_repo = Arc::new(PostgresConversationRepository::new(pool.clone()));
        let delivery: Arc<dyn DeliveryApi> =
            Arc::new(MaytapiClient::new(&config.delivery).context("创建投递客户端失败")?);

        let resolver = RecipientResolver::new(conversation_repo, recipient_repo.clone());
        let sender = BatchSender::from_config(delivery, recipient_repo.clone(), &config.dispatcher);
        let worker = BroadcastWorker::new(
            broadcast_repo,
            recipient_repo,
            resolver,
            sender,
            config.dispatcher.batch_size,
        );

        Ok(Self {
            config,
            mode,
            processor: Arc::new(worker),
        })
    }

    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        match self.mode {
            AppMode::Drain => {
                info!("开始一次性排空pending广播");
                self.processor
                    .process_pending_broadcasts()
                    .await
                    .context("批量处理广播失败")?;
                info!("排空完成");
                Ok(())
            }
            AppMode::Serve => self.run_server(shutdown_rx).await,
        }
    }

    async fn run_server(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        if !self.config.api.enabled {
            anyhow::bail!("serve模式要求配置项api.enabled为true");
        }

        let app = create_app(
            AppState {
                processor: Arc::clone(&self.processor),
            },
            self.config.api.cors_enabled,
        );

        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;
        info!("HTTP服务器监听于 {}", self.config.api.bind_address);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP服务器开始优雅关闭");
            })
            .await
            .context("HTTP服务器运行失败")
    }
}
