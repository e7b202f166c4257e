//! # Dependency Injection / 依赖注入模块
//!
//! The only place that sees both `cc-platform` and `cc-app`. It builds the
//! concrete adapters and hands them to the use cases as ports; it makes no
//! decisions of its own.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use cc_core::cache::ClientCache;
use cc_core::config::AppConfig;
use cc_core::ports::{
    AdmissionNotifierPort, ClipboardReaderPort, DataViewPort, SubscriberNotifierPort,
};
use cc_platform::adapters::{
    AutoCopyPresenter, ConsoleDataView, OperatorAdmissionNotifier, ShowAndConfirmPresenter,
};
use cc_platform::clipboard::SystemClipboard;
use cc_platform::net_utils::resolve_bind_address;

/// Result type for wiring operations
pub type WiringResult<T> = Result<T, WiringError>;

/// Errors during dependency injection
/// 依赖注入错误（平台初始化失败）
#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    #[error("Clipboard initialization failed: {0}")]
    ClipboardInit(String),

    #[error("Network initialization failed: {0}")]
    NetworkInit(String),
}

/// Everything the publisher needs besides its socket.
pub struct ServerDeps {
    pub bind_addr: SocketAddr,
    pub clipboard: Arc<dyn ClipboardReaderPort>,
    pub admission: Arc<dyn AdmissionNotifierPort>,
    pub data_view: Option<Arc<dyn DataViewPort>>,
}

/// How the subscriber presents updates.
pub enum Presenter {
    AutoCopy(Arc<AutoCopyPresenter>),
    /// Also needs a task feeding operator acknowledgements.
    ShowAndConfirm(ShowAndConfirmPresenter),
}

impl Presenter {
    pub fn as_notifier(&self) -> Arc<dyn SubscriberNotifierPort> {
        match self {
            Presenter::AutoCopy(presenter) => presenter.clone() as Arc<dyn SubscriberNotifierPort>,
            Presenter::ShowAndConfirm(presenter) => Arc::new(presenter.clone()),
        }
    }
}

pub struct ClientDeps {
    pub endpoint: String,
    pub cache: ClientCache,
    pub presenter: Presenter,
}

fn system_clipboard() -> WiringResult<Arc<SystemClipboard>> {
    SystemClipboard::new()
        .map(Arc::new)
        .map_err(|e| WiringError::ClipboardInit(e.to_string()))
}

pub fn wire_server(config: &AppConfig) -> WiringResult<ServerDeps> {
    let ip: IpAddr = resolve_bind_address(&config.server.address)
        .map_err(|e| WiringError::NetworkInit(e.to_string()))?;

    let admission: Arc<dyn AdmissionNotifierPort> =
        Arc::new(OperatorAdmissionNotifier::new(config.warnings));
    let data_view: Option<Arc<dyn DataViewPort>> = if config.server.show_data {
        Some(Arc::new(ConsoleDataView))
    } else {
        None
    };

    Ok(ServerDeps {
        bind_addr: SocketAddr::new(ip, config.server.port),
        clipboard: system_clipboard()?,
        admission,
        data_view,
    })
}

pub fn wire_client(config: &AppConfig) -> WiringResult<ClientDeps> {
    let clipboard = system_clipboard()?;
    let cache = ClientCache::new();
    let warn_on_disconnect = config.warnings.peer_disconnection;

    let presenter = if config.client.auto_copy {
        Presenter::AutoCopy(Arc::new(AutoCopyPresenter::new(clipboard, warn_on_disconnect)))
    } else {
        Presenter::ShowAndConfirm(ShowAndConfirmPresenter::new(
            clipboard,
            cache.clone(),
            warn_on_disconnect,
        ))
    };

    Ok(ClientDeps {
        endpoint: config.client.server_endpoint(),
        cache,
        presenter,
    })
}
