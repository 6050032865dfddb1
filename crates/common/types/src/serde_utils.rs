//! Serde helpers for the beacon REST API, which encodes integers as decimal strings.

pub mod quoted_u64 {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum QuotedOrPlain {
            Quoted(String),
            Plain(u64),
        }

        match QuotedOrPlain::deserialize(deserializer)? {
            QuotedOrPlain::Quoted(s) => s
                .parse()
                .map_err(|err| D::Error::custom(format!("invalid quoted integer {s:?}: {err}"))),
            QuotedOrPlain::Plain(value) => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Wrapper {
        #[serde(with = "super::quoted_u64")]
        slot: u64,
    }

    #[test]
    fn accepts_quoted_and_plain_integers() {
        let quoted: Wrapper = serde_json::from_str(r#"{"slot":"42"}"#).unwrap();
        let plain: Wrapper = serde_json::from_str(r#"{"slot":42}"#).unwrap();
        assert_eq!(quoted, Wrapper { slot: 42 });
        assert_eq!(plain, quoted);
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&Wrapper { slot: 7 }).unwrap();
        assert_eq!(json, r#"{"slot":"7"}"#);
    }

    #[test]
    fn rejects_non_numeric_strings() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"slot":"seven"}"#).is_err());
    }
}
