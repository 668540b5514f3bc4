//! Client descriptor: the JSON payload carried by a `vmess://` link.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A named client identity authorized on the proxy.
///
/// Field names follow the VMess share-link format (`ps`, `add`, `port`,
/// `id`). Every other key (`v`, `aid`, `net`, `type`, `host`, `path`, `tls`,
/// and anything a client app adds) is kept verbatim in `protocol`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDescriptor {
    /// Display name, unique among stored clients.
    #[serde(rename = "ps")]
    pub name: String,

    /// Public address clients dial.
    #[serde(rename = "add")]
    pub address: String,

    /// Inbound port. Encoded as a decimal string on the wire.
    #[serde(with = "port_string")]
    pub port: u16,

    /// Client UUID, the identity the daemon authorizes.
    pub id: Uuid,

    /// Remaining protocol fields.
    #[serde(flatten)]
    pub protocol: Map<String, Value>,
}

impl ClientDescriptor {
    /// A plain-TCP VMess client with `alterId` 0 and no TLS.
    pub fn tcp(name: impl Into<String>, address: impl Into<String>, port: u16, id: Uuid) -> Self {
        let mut protocol = Map::new();
        for (key, value) in [
            ("v", "2"),
            ("aid", "0"),
            ("net", "tcp"),
            ("type", "none"),
            ("host", ""),
            ("path", ""),
            ("tls", ""),
        ] {
            protocol.insert(key.to_string(), Value::String(value.to_string()));
        }

        Self {
            name: name.into(),
            address: address.into(),
            port,
            id,
            protocol,
        }
    }
}

mod port_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Number(u16),
        Text(String),
    }

    pub fn serialize<S: Serializer>(port: &u16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(port)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        match Wire::deserialize(deserializer)? {
            Wire::Number(port) => Ok(port),
            Wire::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let id = Uuid::new_v4();
        let descriptor = ClientDescriptor::tcp("alice", "203.0.113.9", 51820, id);
        let value = serde_json::to_value(&descriptor).unwrap();

        assert_eq!(value["ps"], "alice");
        assert_eq!(value["add"], "203.0.113.9");
        assert_eq!(value["port"], "51820");
        assert_eq!(value["id"], id.to_string());
        assert_eq!(value["net"], "tcp");
        assert_eq!(value["aid"], "0");
    }

    #[test]
    fn test_accepts_numeric_port_and_keeps_unknown_keys() {
        let descriptor: ClientDescriptor = serde_json::from_value(json!({
            "ps": "bob",
            "add": "example.net",
            "port": 443,
            "id": "0f8fad5b-d9cb-469f-a165-70867728950e",
            "tls": "tls",
            "sni": "cdn.example.net",
        }))
        .unwrap();

        assert_eq!(descriptor.port, 443);
        assert_eq!(descriptor.protocol["sni"], "cdn.example.net");
        assert_eq!(descriptor.protocol["tls"], "tls");
    }
}
