use time::format_description;
use tracing_subscriber::{fmt, EnvFilter, FmtSubscriber};

// Sets up tracing. Goes to stderr, filtered by the TRACE env var, and is off
// by default. Levels are: trace, debug, info, warn, error
//
// For example:
//
// All targets, info level:              info
// Only the save steps, debug level:     shareledger::import=debug
// Global at info, backend at debug:     info,shareledger::store=debug
//
// More generally: target[span{field=value}]=level
// https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html
pub fn setup_tracing() {
    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_env("TRACE"));

    // 5 digits of sub-second precision is plenty. If the local offset can't
    // be determined, fall back to the default (UTC) timer.
    let time_format =
        format_description::parse("[hour]:[minute]:[second].[subsecond digits:5]");
    let offset = crate::util::date::local_utc_offset();
    let res = match (time_format, offset) {
        (Ok(format), Ok(offset)) => tracing::subscriber::set_global_default(
            builder
                .with_timer(fmt::time::OffsetTime::new(offset, format))
                .finish(),
        ),
        _ => tracing::subscriber::set_global_default(builder.finish()),
    };
    // Already set, in tests that run the command more than once.
    let _ = res;
}

/// Adds `directives` to TRACE, before `setup_tracing` reads it.
pub fn enable_trace_env(directives: &str) {
    const VAR_NAME: &str = "TRACE";
    if let Ok(existing_env) = std::env::var(VAR_NAME) {
        std::env::set_var(VAR_NAME, existing_env + "," + directives);
    } else {
        std::env::set_var(VAR_NAME, directives);
    }
}
