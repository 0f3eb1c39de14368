use std::{
    collections::{btree_map, BTreeMap},
    fmt::{self, Write},
    iter::{FromIterator, Peekable},
    str::{Chars, FromStr},
};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// The key selecting which provider handles a configuration.
pub const PROVIDER_KEY: &str = "provider";

/// A parsed discovery configuration.
///
/// Built from a `key=value key=value ...` string. Keys are unique; the
/// textual form produced by [`Display`](fmt::Display) is canonical: the
/// `provider` key comes first, every other key follows in ascending byte
/// order, and only tokens that need it are quoted.
///
/// ```
/// use node_addrs::Config;
///
/// let c = Config::parse(r#"b=c "a a"="b b""#).unwrap();
/// assert_eq!(c.get("a a"), Some("b b"));
/// assert_eq!(c.to_string(), r#""a a"="b b" b=c"#);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    inner: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration string.
    ///
    /// Keys and values are either bare words or double-quoted strings in
    /// which `\"` and `\\` stand for a quote and a backslash. An unquoted
    /// value may not contain `=`. Empty or all-whitespace input yields an
    /// empty config. On error nothing is returned but the error, which names
    /// the offending key only.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let mut inner = BTreeMap::new();
        let mut scanner = Scanner::new(s);

        loop {
            scanner.skip_whitespace();
            if scanner.is_eof() {
                break;
            }

            let (key, value) = scanner.pair()?;
            match inner.entry(key) {
                btree_map::Entry::Occupied(e) => {
                    return Err(ConfigError::DuplicateKey(e.key().clone()))
                }
                btree_map::Entry::Vacant(e) => {
                    e.insert(value);
                }
            }
        }

        Ok(Self { inner })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(String::as_str)
    }

    /// The value of the `provider` key, if any.
    pub fn provider(&self) -> Option<&str> {
        self.get(PROVIDER_KEY)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.inner.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.inner.remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Config::parse(s)
    }
}

impl<K, V> FromIterator<(K, V)> for Config
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Config {
    type Item = (String, String);

    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let provider = self.inner.get_key_value(PROVIDER_KEY);
        let rest = self.inner.iter().filter(|(k, _)| *k != PROVIDER_KEY);

        for (i, (key, value)) in provider.into_iter().chain(rest).enumerate() {
            if i > 0 {
                f.write_char(' ')?;
            }
            write_token(f, key)?;
            f.write_char('=')?;
            write_token(f, value)?;
        }
        Ok(())
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '=' || c == '"')
}

fn write_token(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    if !needs_quotes(s) {
        return f.write_str(s);
    }

    f.write_char('"')?;
    for c in s.chars() {
        if c == '"' || c == '\\' {
            f.write_char('\\')?;
        }
        f.write_char(c)?;
    }
    f.write_char('"')
}

struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.chars().peekable(),
        }
    }

    fn is_eof(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    /// Returns whether any whitespace was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {
            skipped = true;
        }
        skipped
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.chars.next_if(|c| pred(*c)) {
            out.push(c);
        }
        out
    }

    fn pair(&mut self) -> Result<(String, String), ConfigError> {
        let key = self.key()?;

        self.skip_whitespace();
        if self.chars.next_if_eq(&'=').is_none() {
            return Err(ConfigError::MissingEquals(key));
        }

        let spaced = self.skip_whitespace();
        let value = self.value(&key, spaced)?;
        Ok((key, value))
    }

    fn key(&mut self) -> Result<String, ConfigError> {
        if self.chars.next_if_eq(&'"').is_some() {
            // an unterminated key may have swallowed the rest of the input
            return self.quoted(|partial| {
                partial
                    .split(|c: char| c.is_whitespace() || c == '=')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            });
        }

        let key = self.take_while(|c| !c.is_whitespace() && c != '=' && c != '"');
        if key.is_empty() {
            return Err(ConfigError::MissingKey);
        }
        Ok(key)
    }

    /// `spaced` tells whether whitespace followed the `=`. A spaced token
    /// containing `=` is the next pair, so the value is missing.
    fn value(&mut self, key: &str, spaced: bool) -> Result<String, ConfigError> {
        match self.chars.peek() {
            None => Err(ConfigError::MissingValue(key.to_string())),
            Some('"') => {
                self.chars.next();
                self.quoted(|_| key.to_string())
            }
            Some(_) => {
                let value = self.take_while(|c| !c.is_whitespace());
                if value.contains('=') {
                    return Err(if spaced {
                        ConfigError::MissingValue(key.to_string())
                    } else {
                        ConfigError::UnquotedEquals(key.to_string())
                    });
                }
                Ok(value)
            }
        }
    }

    /// Reads the rest of a quoted string, the opening quote already consumed.
    /// `name` produces the key reported in errors from what was read so far.
    fn quoted(&mut self, name: impl Fn(&str) -> String) -> Result<String, ConfigError> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err(ConfigError::UnbalancedQuotes(name(&out))),
                Some('"') => return Ok(out),
                Some('\\') => match self.chars.next() {
                    Some(c) => out.push(c),
                    None => return Err(ConfigError::UnterminatedEscape(name(&out))),
                },
                Some(c) => out.push(c),
            }
        }
    }
}
