//! Form and query-string parameters

use crate::{Error, Result};

/// Decoded `key=value` pairs with case-insensitive lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    /// Parse `a=1&b=two` form encoding; `+` decodes to a space
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let pairs = raw
            .split('&')
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (key, value) = part.split_once('=').unwrap_or((part, ""));
                (decode(key).trim().to_string(), decode(value))
            })
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { pairs }
    }

    /// First value for `key`, compared case-insensitively
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Number of decoded pairs
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Required parameter as text
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` when the parameter is missing
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::invalid_value(format!("Missing parameter '{key}'")))
    }

    /// Required floating point parameter, accepting `,` as decimal separator
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` when missing or not a number
    pub fn f64(&self, key: &str) -> Result<f64> {
        let raw = self.require(key)?;
        parse_f64(raw)
            .ok_or_else(|| Error::invalid_value(format!("'{raw}' is not a valid {key}")))
    }

    /// Required integer parameter
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` when missing or not an integer
    pub fn i32(&self, key: &str) -> Result<i32> {
        let raw = self.require(key)?;
        raw.trim()
            .parse()
            .map_err(|_| Error::invalid_value(format!("'{raw}' is not a valid {key}")))
    }

    /// Required boolean parameter, `true`/`false` in any case
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` when missing or not a boolean
    pub fn bool(&self, key: &str) -> Result<bool> {
        let raw = self.require(key)?;
        match raw.trim() {
            v if v.eq_ignore_ascii_case("true") => Ok(true),
            v if v.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(Error::invalid_value(format!(
                "'{raw}' is not a valid {key}, expected True or False"
            ))),
        }
    }

    /// Optional unsigned integer, `0` when absent or malformed
    #[must_use]
    pub fn u32_or_zero(&self, key: &str) -> u32 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// Parse a float, treating `,` as the decimal separator
#[must_use]
pub fn parse_f64(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse().ok()
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map_or_else(|_| spaced.clone(), std::borrow::Cow::into_owned)
}
