//! Optional Tracy instrumentation.
//!
//! Built with `--features tracy`, the `#[instrument]` spans on battle steps
//! and simulation chunks stream to a connected Tracy client, and every
//! resolved round or finished chunk leaves a secondary frame mark on the
//! timeline. Without the feature every function here compiles to nothing,
//! so callers never need their own `cfg` guards.

/// Most verbose span level forwarded to Tracy.
///
/// `Trace` includes the per-round spans, which dominate a long simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TraceLevel {
    #[default]
    Info,
    Debug,
    Trace,
}

impl std::str::FromStr for TraceLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("unknown trace level '{other}' (info, debug, trace)")),
        }
    }
}

/// Installs the Tracy layer as the global subscriber. Call once, before the
/// first battle is built; a second global subscriber panics.
#[cfg(feature = "tracy")]
pub fn init_tracy(level: TraceLevel) {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    let max_level = match level {
        TraceLevel::Info => LevelFilter::INFO,
        TraceLevel::Debug => LevelFilter::DEBUG,
        TraceLevel::Trace => LevelFilter::TRACE,
    };
    tracing_subscriber::registry()
        .with(tracing_tracy::TracyLayer::default())
        .with(max_level)
        .init();
}

#[cfg(not(feature = "tracy"))]
pub fn init_tracy(_level: TraceLevel) {}

#[cfg(feature = "tracy")]
#[inline]
pub fn frame_mark_round() {
    tracy_client::secondary_frame_mark!("round");
}

#[cfg(not(feature = "tracy"))]
#[inline]
pub fn frame_mark_round() {}

#[cfg(feature = "tracy")]
#[inline]
pub fn frame_mark_chunk() {
    tracy_client::secondary_frame_mark!("chunk");
}

#[cfg(not(feature = "tracy"))]
#[inline]
pub fn frame_mark_chunk() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_level_parses() {
        assert_eq!("DEBUG".parse::<TraceLevel>(), Ok(TraceLevel::Debug));
        assert_eq!("trace".parse::<TraceLevel>(), Ok(TraceLevel::Trace));
        let err = "verbose".parse::<TraceLevel>().unwrap_err();
        assert!(err.contains("verbose"));
        assert_eq!(TraceLevel::default(), TraceLevel::Info);
    }
}
