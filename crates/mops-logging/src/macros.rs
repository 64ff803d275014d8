//! ---
//! mops_section: "03-logging"
//! mops_subsection: "module"
//! mops_type: "source"
//! mops_scope: "code"
//! mops_description: "Structured logging adapters and sinks."
//! mops_version: "v0.0.0-prealpha"
//! mops_owner: "tbd"
//! ---
//! Logging macros that attach a [`LogContext`](crate::LogContext) to every event.

#[doc(hidden)]
#[macro_export]
macro_rules! __mops_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            actor = ctx.actor.unwrap_or(""),
            role = ctx.role.unwrap_or(""),
            collection = ctx.collection.unwrap_or(""),
            resource = ctx.resource.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with session context.
#[macro_export]
macro_rules! mops_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__mops_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__mops_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with session context.
#[macro_export]
macro_rules! mops_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__mops_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__mops_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with session context.
#[macro_export]
macro_rules! mops_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__mops_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__mops_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}
