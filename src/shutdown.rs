use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

/// 停机信号分发
///
/// 监听 ctrl-c / SIGTERM，广播给所有需要优雅退出的组件。
pub struct ShutdownSignal {
    tx: broadcast::Sender<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(4);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// 挂起系统信号监听任务；收到信号后广播停机
    pub fn listen(&self) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let ctrl_c = async {
                let _ = signal::ctrl_c().await;
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(_) => std::future::pending::<()>().await,
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => info!("收到 ctrl-c"),
                _ = terminate => info!("收到 SIGTERM"),
            }
            let _ = tx.send(());
        });
    }

    /// 手动触发停机（测试用）
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
