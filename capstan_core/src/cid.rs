//! The content identifier type used by capstan.

use std::{borrow::Borrow, fmt, sync::Arc};

/// Opaque content identifier.
///
/// A `Cid` is treated as an opaque key: equality, hashing and ordering are
/// defined on its string form. Cloning is cheap (the string is shared).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(Arc<str>);

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cid").field(&self.as_str()).finish()
    }
}

impl Cid {
    /// Wraps the given string form.
    pub fn new(s: impl AsRef<str>) -> Self {
        Cid(Arc::from(s.as_ref()))
    }

    /// The full string form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A short prefix of the string form for friendly log output.
    pub fn fmt_short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl AsRef<str> for Cid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Cid {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Cid {
    fn from(value: &str) -> Self {
        Cid::new(value)
    }
}

impl From<String> for Cid {
    fn from(value: String) -> Self {
        Cid(Arc::from(value))
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_equality() {
        let a = Cid::new("QmTest");
        let b = Cid::new("QmTest");
        let c = Cid::new("QmOther");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_cid_ordering_is_lexicographic() {
        let a = Cid::new("QmA");
        let b = Cid::new("QmB");
        let c = Cid::new("Qmb");
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_cid_fmt_short() {
        let cid = Cid::new("QmP63DkAFEnDYNjDYBpyNDfttu1fvWw99Gpe6sqepAxkcv");
        assert_eq!(cid.fmt_short(), "QmP63DkA");
        assert!(cid.as_str().starts_with(cid.fmt_short()));

        let tiny = Cid::new("Qm");
        assert_eq!(tiny.fmt_short(), "Qm");
    }

    #[test]
    fn test_cid_debug() {
        let cid = Cid::new("QmTest");
        let debug = format!("{:?}", cid);
        assert!(debug.starts_with("Cid("));
        assert!(debug.contains("QmTest"));
    }

    #[test]
    fn test_cid_borrow_lookup() {
        use std::collections::HashMap;
        let mut map: HashMap<Cid, u32> = HashMap::new();
        map.insert(Cid::new("QmTest"), 1);
        assert_eq!(map.get("QmTest"), Some(&1));
    }
}
