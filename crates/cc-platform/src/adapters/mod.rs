pub mod connection;
pub mod framing;
pub mod notifier;
pub mod registry;

pub use connection::{Connection, ConnectionReader, ConnectionWriter};
pub use notifier::{
    AutoCopyPresenter, ConsoleDataView, OperatorAdmissionNotifier, ShowAndConfirmPresenter,
    OPERATOR_TARGET,
};
pub use registry::ConnectionRegistry;
