use std::env::{self, VarError};
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

/** Knobs shared by an e-graph lineage and the [`Analyzer`](crate::Analyzer).

Every snapshot descending from the same root shares one [`Config`],
fixed when the root is created with
[`EGraph::with_config`](crate::EGraph::with_config).

```
use egraph_dataflow::*;

let config = Config::default()
    .with_statistics(true)
    .with_short_history(0)
    .with_long_history(usize::MAX);
assert_eq!(config.iter_limit, 10_000);
```
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Log every join decision at `debug` level.
    pub debug: bool,
    /// Log every block the [`Analyzer`](crate::Analyzer) visits.
    pub debug_dfa: bool,
    /// Log history sizes of every join at `info` level.
    pub statistics: bool,
    /// A history at most this long is considered short.
    /// Joins replay only if both histories are longer. Default: 3
    pub short_history: usize,
    /// When one history is short and the other longer than this, the
    /// common ancestor search gives up and uses the roots. Default: 100
    pub long_history: usize,
    /// Number of block visits after which the
    /// [`Analyzer`](crate::Analyzer) stops. Default: 10,000
    pub iter_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            debug_dfa: false,
            statistics: false,
            short_history: 3,
            long_history: 100,
            iter_limit: 10_000,
        }
    }
}

/// A problem reading a [`Config`] from the environment.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The variable is set to something that isn't unicode.
    #[error("environment variable {0} isn't unicode")]
    NotUnicode(&'static str),
    /// The variable is set but doesn't parse.
    #[error("couldn't parse environment variable {name}={value}: {reason}")]
    Invalid {
        /// Name of the variable.
        name: &'static str,
        /// Its value.
        value: String,
        /// Why it didn't parse.
        reason: String,
    },
}

fn var<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(name)),
        Ok(value) => match value.parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(err) => Err(ConfigError::Invalid {
                name,
                reason: err.to_string(),
                value,
            }),
        },
    }
}

fn flag(name: &'static str) -> Result<Option<bool>, ConfigError> {
    let value = match var::<String>(name)? {
        Some(value) => value,
        None => return Ok(None),
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" | "" => Ok(Some(false)),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            reason: "expected a boolean flag".into(),
        }),
    }
}

impl Config {
    /// Reads the configuration from the environment, starting from the
    /// defaults.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `EGRAPH_DEBUG` | [`debug`](Config::debug) |
    /// | `EGRAPH_DEBUG_DFA` | [`debug_dfa`](Config::debug_dfa) |
    /// | `EGRAPH_STATISTICS` | [`statistics`](Config::statistics) |
    /// | `EGRAPH_SHORT_HISTORY` | [`short_history`](Config::short_history) |
    /// | `EGRAPH_LONG_HISTORY` | [`long_history`](Config::long_history) |
    /// | `EGRAPH_ITER_LIMIT` | [`iter_limit`](Config::iter_limit) |
    ///
    /// Flags accept `1`/`0`, `true`/`false`, `yes`/`no` and `on`/`off`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(debug) = flag("EGRAPH_DEBUG")? {
            config.debug = debug;
        }
        if let Some(debug_dfa) = flag("EGRAPH_DEBUG_DFA")? {
            config.debug_dfa = debug_dfa;
        }
        if let Some(statistics) = flag("EGRAPH_STATISTICS")? {
            config.statistics = statistics;
        }
        if let Some(short_history) = var("EGRAPH_SHORT_HISTORY")? {
            config.short_history = short_history;
        }
        if let Some(long_history) = var("EGRAPH_LONG_HISTORY")? {
            config.long_history = long_history;
        }
        if let Some(iter_limit) = var("EGRAPH_ITER_LIMIT")? {
            config.iter_limit = iter_limit;
        }
        Ok(config)
    }

    /// Sets [`debug`](Config::debug). Default: false
    pub fn with_debug(self, debug: bool) -> Self {
        Self { debug, ..self }
    }

    /// Sets [`debug_dfa`](Config::debug_dfa). Default: false
    pub fn with_debug_dfa(self, debug_dfa: bool) -> Self {
        Self { debug_dfa, ..self }
    }

    /// Sets [`statistics`](Config::statistics). Default: false
    pub fn with_statistics(self, statistics: bool) -> Self {
        Self { statistics, ..self }
    }

    /// Sets [`short_history`](Config::short_history). Default: 3
    pub fn with_short_history(self, short_history: usize) -> Self {
        Self {
            short_history,
            ..self
        }
    }

    /// Sets [`long_history`](Config::long_history). Default: 100
    pub fn with_long_history(self, long_history: usize) -> Self {
        Self {
            long_history,
            ..self
        }
    }

    /// Sets [`iter_limit`](Config::iter_limit). Default: 10,000
    pub fn with_iter_limit(self, iter_limit: usize) -> Self {
        Self { iter_limit, ..self }
    }
}
