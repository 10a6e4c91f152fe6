use crate::types::DeviceId;
use core::fmt;

/// Trait for values that prefix log records with their origin.
pub trait LogMetadata {
    fn meta(&self) -> LinkContext;
}

/// Origin of a log record: which device and which protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkContext {
    pub device: DeviceId,
    pub layer: &'static str,
}

impl LinkContext {
    pub const fn new(device: DeviceId, layer: &'static str) -> Self {
        Self { device, layer }
    }
}

impl LogMetadata for LinkContext {
    fn meta(&self) -> LinkContext {
        *self
    }
}

impl<L: LogMetadata + ?Sized> LogMetadata for &L {
    fn meta(&self) -> LinkContext {
        (**self).meta()
    }
}

impl<L: LogMetadata + ?Sized> LogMetadata for &mut L {
    fn meta(&self) -> LinkContext {
        (**self).meta()
    }
}

impl fmt::Display for LinkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device={}, layer={}", self.device, self.layer)
    }
}

// =============================================
// Logging Macros (namespaced under crate::log)
// =============================================

// ===== link_info! =====
macro_rules! link_info {
    ($ctx:expr, $($arg:tt)+) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::info!("[{}] {}", meta, format_args!($($arg)+));
    }};
}

// ===== link_warn! =====
macro_rules! link_warn {
    ($ctx:expr, $($arg:tt)+) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::warn!("[{}] {}", meta, format_args!($($arg)+));
    }};
}

// ===== link_error! =====
macro_rules! link_error {
    ($ctx:expr, $($arg:tt)+) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::error!("[{}] {}", meta, format_args!($($arg)+));
    }};
}

// ===== link_debug! =====
macro_rules! link_debug {
    ($ctx:expr, $($arg:tt)+) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::debug!("[{}] {}", meta, format_args!($($arg)+));
    }};
}

// ===== link_trace! =====
macro_rules! link_trace {
    ($ctx:expr, $($arg:tt)+) => {{
        let meta = $crate::log::LogMetadata::meta(&$ctx);
        ::log::trace!("[{}] {}", meta, format_args!($($arg)+));
    }};
}

// Re-export macros for use in other files
pub(crate) use link_debug;
pub(crate) use link_error;
pub(crate) use link_info;
pub(crate) use link_trace;
pub(crate) use link_warn;
