use native_db::ToKey;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, num::ParseIntError, str::FromStr};

macro_rules! record_id {
    ($name:ident, $key_name:literal) => {
        #[derive(
            Serialize,
            Deserialize,
            Default,
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
        )]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl ToKey for $name {
            // Big endian so the index order matches numeric order
            fn to_key(&self) -> native_db::Key {
                native_db::Key::new(self.0.to_be_bytes().to_vec())
            }

            fn key_names() -> Vec<String> {
                vec![$key_name.to_string()]
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

record_id!(RomId, "romid");
record_id!(SaveStateId, "savestateid");
