//! User-facing notifications (toasts).

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Default,
    Warning,
    Destructive,
}

/// A short notification shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Toast {
    pub title: String,
    pub description: Option<String>,
    pub variant: ToastVariant,
}

impl Toast {
    pub fn success(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            variant: ToastVariant::Default,
        }
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            variant: ToastVariant::Warning,
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            variant: ToastVariant::Destructive,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Receives toasts raised by the page flows.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Notifier that keeps every toast in order, for front ends that render them after an action
/// completes (and for tests).
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the toasts collected so far.
    pub fn drain(&self) -> Vec<Toast> {
        match self.toasts.lock() {
            Ok(mut toasts) => std::mem::take(&mut *toasts),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, toast: Toast) {
        match toast.variant {
            ToastVariant::Default => tracing::info!(title = %toast.title, "toast"),
            ToastVariant::Warning => tracing::warn!(title = %toast.title, "toast"),
            ToastVariant::Destructive => tracing::warn!(title = %toast.title, "error toast"),
        }
        match self.toasts.lock() {
            Ok(mut toasts) => toasts.push(toast),
            Err(poisoned) => poisoned.into_inner().push(toast),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_notifier_drains_in_order() {
        let notifier = CollectingNotifier::new();
        notifier.notify(Toast::success("first"));
        notifier.notify(Toast::error("second").with_description("details"));

        let toasts = notifier.drain();
        assert_eq!(toasts.len(), 2);
        assert_eq!(toasts[0].title, "first");
        assert_eq!(toasts[1].variant, ToastVariant::Destructive);
        assert_eq!(toasts[1].description.as_deref(), Some("details"));
        assert!(notifier.drain().is_empty());
    }
}
