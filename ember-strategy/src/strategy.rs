use derive_more::Display;
use smol_str::SmolStr;

/// Opaque handle to a trading strategy (§3 Data Model, §9 "printable,
/// stable hash"). The genetic generator that produces these is a C9
/// collaborator out of scope here; the core only needs something
/// nameable, hashable and cheap to clone to key `StrategyStorage` and
/// build squads around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("{signature}")]
pub struct Strategy {
    signature: SmolStr,
}

impl Strategy {
    pub fn new(signature: impl Into<SmolStr>) -> Self {
        Self {
            signature: signature.into(),
        }
    }

    pub fn signature(&self) -> &str {
        self.signature.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn strategies_with_equal_signatures_are_equal_and_hash_equal() {
        let a = Strategy::new("ma-cross-14-50");
        let b = Strategy::new("ma-cross-14-50");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn display_is_the_signature() {
        let s = Strategy::new("rsi-reversion");
        assert_eq!(s.to_string(), "rsi-reversion");
    }
}
