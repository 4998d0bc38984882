pub mod chat;
pub mod error;
pub mod events;
pub mod history;
pub mod image_ref;
pub mod projects;

pub use error::EditorError;
pub use image_ref::ImageRef;

pub fn now_utc_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

pub fn unix_epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
