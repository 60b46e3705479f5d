use serde::{Deserialize, Serialize};
use std::fmt;

/// Instrument identifier (exchange code).
///
/// Always trimmed. Numeric exchange codes are often stored without their
/// leading zeros upstream, so [`InstrumentId::padded`] restores a fixed width.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_string())
    }

    /// Trim and left-pad with `'0'` up to `width` characters.
    pub fn padded(id: impl AsRef<str>, width: usize) -> Self {
        let trimmed = id.as_ref().trim();
        Self(format!("{trimmed:0>width$}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InstrumentId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_whitespace() {
        assert_eq!(InstrumentId::new("  005930 ").as_str(), "005930");
    }

    #[test]
    fn padded_restores_leading_zeros() {
        assert_eq!(InstrumentId::padded("5930", 6).as_str(), "005930");
        assert_eq!(InstrumentId::padded("069500", 6).as_str(), "069500");
        // Longer codes are never truncated
        assert_eq!(InstrumentId::padded("1234567", 6).as_str(), "1234567");
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut ids = vec![
            InstrumentId::new("000660"),
            InstrumentId::new("000020"),
            InstrumentId::new("005930"),
        ];
        ids.sort();
        assert_eq!(ids[0].as_str(), "000020");
        assert_eq!(ids[2].as_str(), "005930");
    }
}
