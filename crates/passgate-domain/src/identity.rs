//! Identities and the host entities they attach to

use std::fmt;

/// External address identifying a principal (e.g. an Ethereum wallet)
///
/// Always stored trimmed and lowercased so `0xABC…` and `0xabc…` are the
/// same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    /// Create a normalized identity
    ///
    /// # Errors
    /// Returns error if the address is empty after trimming
    ///
    /// # Examples
    ///
    /// ```
    /// use passgate_domain::Identity;
    ///
    /// let id = Identity::new("  0xAbCd  ").unwrap();
    /// assert_eq!(id.as_str(), "0xabcd");
    /// ```
    pub fn new(address: impl AsRef<str>) -> Result<Self, String> {
        let normalized = address.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err("Identity address cannot be empty".to_string());
        }
        Ok(Self(normalized))
    }

    /// Get the normalized address
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the address has the shape of an EVM account (`0x` + 40 hex digits)
    pub fn is_evm_address(&self) -> bool {
        match self.0.strip_prefix("0x") {
            Some(hex) => hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => false,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Identity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Forum user identifier (owned by the host)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub u64);

/// Category identifier (owned by the host)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CategoryId(pub u64);

/// Topic identifier (owned by the host)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopicId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A topic as resolved by the host, including its owning category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topic {
    /// Topic identifier
    pub id: TopicId,

    /// Owning category (uncategorized topics have none)
    pub category_id: Option<CategoryId>,
}

impl Topic {
    /// Create a topic that belongs to a category
    pub fn in_category(id: TopicId, category_id: CategoryId) -> Self {
        Self {
            id,
            category_id: Some(category_id),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: normalization is idempotent and case-insensitive
        #[test]
        fn test_normalization_idempotent(raw in "[ ]{0,2}0x[0-9a-fA-F]{1,40}[ ]{0,2}") {
            let once = Identity::new(&raw).unwrap();
            let twice = Identity::new(once.as_str()).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(once, Identity::new(raw.to_uppercase().replace("0X", "0x")).unwrap());
        }
    }
}
