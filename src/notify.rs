use std::sync::Mutex;
use tracing::{error, info, warn};

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Non-blocking notification side-channel to the consuming UI layer.
///
/// Fatal extraction errors propagate as `ExtractionError`; this channel
/// carries everything that must not abort the workflow, such as the
/// audio-degradation notice.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);

    fn info(&self, message: &str) {
        self.notify(NoticeLevel::Info, message);
    }

    fn success(&self, message: &str) {
        self.notify(NoticeLevel::Success, message);
    }

    fn error(&self, message: &str) {
        self.notify(NoticeLevel::Error, message);
    }
}

/// Notifier that forwards notices to the tracing subscriber
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => info!("📣 {}", message),
            NoticeLevel::Success => info!("✅ {}", message),
            NoticeLevel::Error => error!("❌ {}", message),
        }
    }
}

/// Notifier that collects notices in memory, for embedders that render
/// their own notification UI and for tests.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        if level == NoticeLevel::Error {
            warn!("notice: {}", message);
        }
        self.notices.lock().unwrap().push((level, message.to_string()));
    }
}
