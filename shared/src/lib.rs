pub mod config;
pub mod tracing;

/// Initialise the global tracing subscriber for the calling crate.
#[macro_export]
macro_rules! init_tracing {
    () => {
        $crate::tracing::init(env!("CARGO_PKG_NAME"))
    };
}
