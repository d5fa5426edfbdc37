//! MECE partition declarations
//!
//! A declaration states that the values of one context key are mutually
//! exclusive and collectively exhaustive: summing every member's (n, k)
//! for a day reproduces the uncontexted series.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::dims::SliceDims;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeceDeclaration {
    pub key: String,
    pub values: BTreeSet<String>,
}

impl MeceDeclaration {
    pub fn new<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.key.trim().is_empty() {
            return Err("mece key must not be empty".into());
        }
        if self.values.is_empty() {
            return Err(format!("mece '{}' declares no values", self.key));
        }
        Ok(())
    }

    /// Returns true if the partition can refine `dims` (key not already fixed)
    pub fn applies_to(&self, dims: &SliceDims) -> bool {
        dims.context_value(&self.key).is_none()
    }

    /// Slice keys of every member, in value order
    pub fn member_keys(&self, dims: &SliceDims) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|value| {
                let member = dims.clone().with_context(self.key.clone(), value.clone());
                (value.clone(), member.key())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_keys() {
        let mece = MeceDeclaration::new("channel", ["google", "meta"]);
        let keys = mece.member_keys(&SliceDims::none());
        assert_eq!(
            keys,
            vec![
                ("google".to_string(), "context(channel:google)".to_string()),
                ("meta".to_string(), "context(channel:meta)".to_string()),
            ]
        );
    }

    #[test]
    fn test_applies_only_to_unfixed_key() {
        let mece = MeceDeclaration::new("channel", ["google"]);
        assert!(mece.applies_to(&SliceDims::none()));
        assert!(!mece.applies_to(&SliceDims::none().with_context("channel", "google")));
    }

    #[test]
    fn test_validate() {
        assert!(MeceDeclaration::new("channel", Vec::<String>::new()).validate().is_err());
        assert!(MeceDeclaration::new("", ["a"]).validate().is_err());
    }
}
