pub mod config;
pub mod gateway;
pub mod session;
pub mod transform;

pub use config::EditorConfig;
pub use gateway::{default_gateway_registry, EditGateway, GatewayRegistry};
pub use session::{EditorSession, ExportedImage, PendingRequest, UploadMode};
