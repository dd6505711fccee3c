use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A port as stored by the editor forms: either a number or `""` when unset.
/// `0` is treated the same as unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Port(Option<u16>);

impl Port {
    pub fn new(port: u16) -> Self {
        if port == 0 {
            Self(None)
        } else {
            Self(Some(port))
        }
    }

    pub fn unset() -> Self {
        Self(None)
    }

    pub fn get(&self) -> Option<u16> {
        self.0
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }
}

impl From<u16> for Port {
    fn from(port: u16) -> Self {
        Port::new(port)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(port) => write!(f, "{}", port),
            None => Ok(()),
        }
    }
}

impl Serialize for Port {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(port) => serializer.serialize_u16(port),
            None => serializer.serialize_str(""),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPort {
    Number(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for Port {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = match RawPort::deserialize(deserializer)? {
            RawPort::Number(n) => n,
            RawPort::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(Port::unset());
                }
                s.parse::<i64>()
                    .map_err(|_| serde::de::Error::custom(format!("invalid port: {}", s)))?
            }
        };

        if number <= 0 {
            return Ok(Port::unset());
        }
        u16::try_from(number)
            .map(Port::new)
            .map_err(|_| serde::de::Error::custom(format!("port out of range: {}", number)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_accepts_number_string_and_empty() {
        let p: Port = serde_json::from_str("443").unwrap();
        assert_eq!(p.get(), Some(443));

        let p: Port = serde_json::from_str("\"8443\"").unwrap();
        assert_eq!(p.get(), Some(8443));

        let p: Port = serde_json::from_str("\"\"").unwrap();
        assert!(!p.is_set());

        let p: Port = serde_json::from_str("0").unwrap();
        assert!(!p.is_set());
    }

    #[test]
    fn test_port_rejects_out_of_range() {
        assert!(serde_json::from_str::<Port>("70000").is_err());
        assert!(serde_json::from_str::<Port>("\"abc\"").is_err());
    }

    #[test]
    fn test_port_serializes_like_the_forms() {
        assert_eq!(serde_json::to_string(&Port::new(53)).unwrap(), "53");
        assert_eq!(serde_json::to_string(&Port::unset()).unwrap(), "\"\"");
    }
}
