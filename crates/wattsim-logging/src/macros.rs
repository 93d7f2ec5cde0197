//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Structured logging adapters for simulation runs."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
/// Emit an informational log enriched with simulation context.
#[macro_export]
macro_rules! sim_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            run = ctx.run.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            step = ctx.step.unwrap_or_default(),
            mode = ctx.mode.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        tracing::event!(tracing::Level::INFO, message = %format_args!($($arg)+));
    }};
}

/// Emit a debug log enriched with simulation context.
#[macro_export]
macro_rules! sim_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            run = ctx.run.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            step = ctx.step.unwrap_or_default(),
            mode = ctx.mode.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        tracing::event!(tracing::Level::DEBUG, message = %format_args!($($arg)+));
    }};
}

/// Emit a warning log enriched with simulation context.
#[macro_export]
macro_rules! sim_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            run = ctx.run.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            step = ctx.step.unwrap_or_default(),
            mode = ctx.mode.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        tracing::event!(tracing::Level::WARN, message = %format_args!($($arg)+));
    }};
}
