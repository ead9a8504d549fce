pub mod config;
pub mod console;
pub mod dashboard;
pub mod error;
pub mod logging;
pub mod model;
pub mod notify;
pub mod resource;
pub mod resources;
pub mod session;
pub mod transport;

pub use config::{CliArgs, ConsoleConfig};
pub use console::{AdminConsole, Mounted};
pub use dashboard::{Dashboard, DashboardSnapshot, DashboardStats, MonthlySeries, StockSlice};
pub use error::{ConsoleError, ConsoleResult, ERROR_METRICS, ErrorKind, ErrorMetrics};
pub use logging::{LoggingConfig, init_logging, shutdown_telemetry};
pub use notify::{Notice, NoticeLevel, NoticeLog, Notifier, TracingNotifier};
pub use resource::{
    Ack, Confirm, ControllerState, Draft, DraftFields, DraftMode, Editable, Preset, Resource,
    ResourceController,
};
pub use session::{
    Credentials, FileTokenStore, GateDecision, MemoryTokenStore, Screen, SessionContext,
    SessionGate, StoredToken, TokenStore,
};
pub use transport::{ApiRequest, ApiTransport, Attachment, Endpoint, Envelope, HttpTransport};
