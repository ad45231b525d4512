//! Opaque, prefixed identifiers for spaces and runs.
//!
//! The source system used untyped strings (`spc_<12>`, `run_<12>`) for every
//! id. We keep the exact wire format but wrap it in a newtype per namespace so
//! a `SpaceId` can never be passed where a `RunId` is expected at compile
//! time.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::Deserialize;
use serde::Serialize;

fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

macro_rules! prefixed_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh id: `<prefix><12 lowercase alphanumeric chars>`.
            pub fn generate() -> Self {
                Self(format!("{}{}", $prefix, random_suffix(12)))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

prefixed_id!(SpaceId, "spc_");
prefixed_id!(RunId, "run_");

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn generated_ids_carry_the_right_prefix_and_length() {
        let space = SpaceId::generate();
        assert!(space.as_str().starts_with("spc_"));
        assert_eq!(space.as_str().len(), "spc_".len() + 12);

        let run = RunId::generate();
        assert!(run.as_str().starts_with("run_"));
    }

    #[test]
    fn ids_serialize_as_bare_strings() {
        let id = SpaceId::from("spc_abc123abc123");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"spc_abc123abc123\"");
    }
}
