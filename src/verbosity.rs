//! Reporting levels for operator-facing output
//!
//! Fee lookups print two kinds of lines: the *primary* line of the call
//! (the resolved gas price) and *secondary* lines from the steps it runs
//! (markup factor, gate progress). A [`Verbosity`] is passed down the call
//! chain to say which of them reach the operator. Suppressed lines are
//! still emitted at `debug` level.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Verbosity {
    /// Primary and secondary output suppressed
    Quiet,
    /// Only secondary output
    PrimaryQuiet,
    /// Only primary output
    SecondaryQuiet,
    #[default]
    Verbose,
}

impl Verbosity {
    pub fn primary(self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::SecondaryQuiet)
    }

    pub fn secondary(self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::PrimaryQuiet)
    }
}

/// Log at `info` when `$enabled`, otherwise at `debug`
macro_rules! report {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

pub(crate) use report;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert!(Verbosity::Verbose.primary() && Verbosity::Verbose.secondary());
        assert!(!Verbosity::Quiet.primary() && !Verbosity::Quiet.secondary());
        assert!(!Verbosity::PrimaryQuiet.primary() && Verbosity::PrimaryQuiet.secondary());
        assert!(Verbosity::SecondaryQuiet.primary() && !Verbosity::SecondaryQuiet.secondary());
    }

    #[test]
    fn test_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            level: Verbosity,
        }
        let parsed: Wrapper = toml::from_str("level = \"secondary-quiet\"").unwrap();
        assert_eq!(parsed.level, Verbosity::SecondaryQuiet);
    }
}
