use thiserror::Error;

/// Syntax errors reported by [`Config::parse`](crate::Config::parse).
///
/// Only the offending key is ever named, never the whole input, so a
/// configuration string carrying secrets does not leak into logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing key")]
    MissingKey,
    #[error("{0}: missing '='")]
    MissingEquals(String),
    #[error("{0}: missing value")]
    MissingValue(String),
    #[error("{0}: unbalanced quotes")]
    UnbalancedQuotes(String),
    #[error("{0}: unterminated escape sequence")]
    UnterminatedEscape(String),
    #[error("{0}: duplicate key")]
    DuplicateKey(String),
    #[error("{0}: - equals in key's value, enclosing double-quote needed {0}=\"value-with-=-symbol\"")]
    UnquotedEquals(String),
}

/// Errors raised by a provider implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("invalid provider {0}")]
    InvalidProvider(String),
    #[error("Invalid argument: `{0}`. Error message: `{1}`")]
    MalformedArgument(String, String),
    #[error("Argument with key: `{0}` is required")]
    MissingArgument(String),
    #[error("Unable to retrieve data from provider. Error message: `{0}`")]
    RequestFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiscoverError {
    #[error("discover: {0}")]
    Config(#[from] ConfigError),
    #[error("discover: no provider given")]
    MissingProvider,
    #[error("discover: unknown provider {0:?}")]
    UnknownProvider(String),
    #[error("discover: provider {0:?} is already registered")]
    DuplicateProvider(String),
    #[error("discover-{provider}: {source}")]
    Provider {
        provider: String,
        source: ProviderError,
    },
}
