use std::sync::Arc;

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Warning,
    Error,
}

/// Side-effect sink for user-facing feedback (toasts, status lines).
///
/// The editor calls this but never looks at what it does.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, kind: NoticeKind, message: &str);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, kind: NoticeKind, message: &str) {
        (**self).notify(kind, message)
    }
}

/// Routes notices into the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Success | NoticeKind::Info => info!(?kind, "{}", message),
            NoticeKind::Warning => warn!("{}", message),
            NoticeKind::Error => error!("{}", message),
        }
    }
}
