//! Wire types shared by API responses

use serde::{Deserialize, Deserializer};

/// Boolean encoded by the API as `0`/`1` (sometimes as a string or a JSON bool)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntBool(pub bool);

impl From<IntBool> for bool {
    fn from(value: IntBool) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for IntBool {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(i64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => Ok(IntBool(b)),
            Raw::Int(0) => Ok(IntBool(false)),
            Raw::Int(1) => Ok(IntBool(true)),
            Raw::Str(s) if s == "0" => Ok(IntBool(false)),
            Raw::Str(s) if s == "1" => Ok(IntBool(true)),
            Raw::Int(n) => Err(serde::de::Error::custom(format!(
                "invalid boolean value {}",
                n
            ))),
            Raw::Str(s) => Err(serde::de::Error::custom(format!(
                "invalid boolean value '{}'",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_integer_booleans() {
        let values: Vec<IntBool> = serde_json::from_str(r#"[0, 1, "0", "1", true, false]"#).unwrap();
        let values: Vec<bool> = values.into_iter().map(bool::from).collect();
        assert_eq!(values, vec![false, true, false, true, true, false]);
    }

    #[test]
    fn rejects_other_integers() {
        assert!(serde_json::from_str::<IntBool>("2").is_err());
        assert!(serde_json::from_str::<IntBool>(r#""yes""#).is_err());
    }
}
