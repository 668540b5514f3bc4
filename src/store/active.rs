//! Active configuration document (`running.json`) and fragment files.
//!
//! Both share the daemon's config shape: a list of inbounds, the first of
//! which carries the managed client ids, plus whatever else the daemon
//! understands. Only the first inbound's listener and client list are ever
//! patched. Every other inbound, key and value is carried through as raw
//! JSON, so port ranges, extra protocols and hand-edited client entries
//! survive a rewrite unchanged.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

/// Address every managed inbound listens on.
pub const LISTEN_ALL: &str = "0.0.0.0";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveConfig {
    #[serde(default, deserialize_with = "nullable_list")]
    pub inbounds: Vec<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn nullable_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Plain-TCP VMess inbound on all interfaces with no clients.
fn vmess_inbound(port: u16) -> Value {
    json!({
        "listen": LISTEN_ALL,
        "port": port,
        "protocol": "vmess",
        "settings": { "clients": [] },
        "streamSettings": { "network": "tcp" },
    })
}

/// A port as the daemon accepts it: a number or a numeric string.
/// Ranges such as `"10000-10010"` have no single port.
fn single_port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl ActiveConfig {
    /// One empty inbound on `port` and a direct (`freedom`) outbound.
    pub fn base(port: u16) -> Self {
        let mut extra = Map::new();
        extra.insert("outbounds".to_string(), json!([{ "protocol": "freedom", "settings": {} }]));
        Self {
            inbounds: vec![vmess_inbound(port)],
            extra,
        }
    }

    /// The fragment document for a single client.
    pub fn single_client(port: u16, id: Uuid) -> Self {
        let mut config = Self::base(port);
        config.add_client(id, port);
        config
    }

    /// First inbound, created on `port` if the document has none or it is
    /// not an object.
    fn first_inbound_mut(&mut self, port: u16) -> &mut Value {
        if self.inbounds.is_empty() {
            self.inbounds.push(vmess_inbound(port));
        }
        let first = &mut self.inbounds[0];
        if !first.is_object() {
            *first = vmess_inbound(port);
        }
        first
    }

    /// Point the first inbound at `0.0.0.0:port`.
    pub fn set_listener_port(&mut self, port: u16) {
        let inbound = self.first_inbound_mut(port);
        inbound["listen"] = json!(LISTEN_ALL);
        inbound["port"] = json!(port);
    }

    /// Admit `id` on the first inbound, re-asserting its listener.
    pub fn add_client(&mut self, id: Uuid, port: u16) {
        self.set_listener_port(port);
        let inbound = self.first_inbound_mut(port);
        if !inbound["settings"].is_object() {
            inbound["settings"] = json!({});
        }
        let clients = &mut inbound["settings"]["clients"];
        if !clients.is_array() {
            *clients = json!([]);
        }
        if let Value::Array(clients) = clients {
            clients.push(json!({ "id": id.to_string(), "alterId": 0 }));
        }
    }

    /// Drop every client entry with `id` from the first inbound. Returns
    /// whether anything was removed.
    pub fn remove_client(&mut self, id: &str) -> bool {
        let Some(Value::Array(clients)) = self
            .inbounds
            .first_mut()
            .and_then(|inbound| inbound.pointer_mut("/settings/clients"))
        else {
            return false;
        };
        let before = clients.len();
        clients.retain(|client| client.get("id").and_then(Value::as_str) != Some(id));
        clients.len() != before
    }

    /// Client ids admitted on the first inbound. Entries without a string
    /// id are skipped.
    pub fn client_ids(&self) -> Vec<String> {
        self.inbounds
            .first()
            .and_then(|inbound| inbound.pointer("/settings/clients"))
            .and_then(Value::as_array)
            .map(|clients| {
                clients
                    .iter()
                    .filter_map(|client| client.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Single port of the first inbound, if it has one.
    pub fn listener_port(&self) -> Option<u16> {
        self.inbounds
            .first()
            .and_then(|inbound| inbound.get("port"))
            .and_then(single_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_document_shape() {
        let value = serde_json::to_value(ActiveConfig::base(51820)).unwrap();
        assert_eq!(
            value,
            json!({
                "inbounds": [{
                    "listen": "0.0.0.0",
                    "port": 51820,
                    "protocol": "vmess",
                    "settings": { "clients": [] },
                    "streamSettings": { "network": "tcp" }
                }],
                "outbounds": [{ "protocol": "freedom", "settings": {} }]
            })
        );
    }

    #[test]
    fn test_unknown_keys_survive() {
        let doc = json!({
            "log": { "loglevel": "warning" },
            "inbounds": [{
                "port": 1000,
                "protocol": "vmess",
                "sniffing": { "enabled": true },
                "settings": { "clients": [{ "id": "0f8fad5b-d9cb-469f-a165-70867728950e", "alterId": 0, "email": "a@b" }] }
            }],
            "outbounds": [{ "protocol": "freedom", "tag": "direct" }]
        });

        let mut config: ActiveConfig = serde_json::from_value(doc).unwrap();
        config.add_client(Uuid::new_v4(), 1000);
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(value["log"]["loglevel"], "warning");
        assert_eq!(value["inbounds"][0]["sniffing"]["enabled"], true);
        assert_eq!(value["inbounds"][0]["settings"]["clients"][0]["email"], "a@b");
        assert_eq!(value["inbounds"][0]["settings"]["clients"].as_array().unwrap().len(), 2);
        assert_eq!(value["outbounds"][0]["tag"], "direct");
    }

    #[test]
    fn test_foreign_inbounds_and_clients_round_trip() {
        let doc = json!({
            "inbounds": [
                {
                    "port": "51820",
                    "protocol": "vmess",
                    "settings": { "clients": [{ "id": "legacy-client", "level": 1 }, { "email": "no-id" }] }
                },
                {
                    "port": "10000-10010",
                    "protocol": "dokodemo-door",
                    "settings": { "address": "1.1.1.1", "network": "tcp,udp" }
                }
            ],
            "outbounds": [{ "protocol": "blackhole" }, { "tag": "no-protocol" }]
        });

        let mut config: ActiveConfig = serde_json::from_value(doc.clone()).unwrap();
        assert_eq!(config.listener_port(), Some(51820));
        assert_eq!(config.client_ids(), vec!["legacy-client".to_string()]);

        let id = Uuid::new_v4();
        config.add_client(id, 51820);
        assert!(config.remove_client(&id.to_string()));

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["inbounds"][1], doc["inbounds"][1]);
        assert_eq!(value["outbounds"], doc["outbounds"]);
        assert_eq!(value["inbounds"][0]["settings"], doc["inbounds"][0]["settings"]);
    }

    #[test]
    fn test_port_range_has_no_single_port() {
        let config: ActiveConfig =
            serde_json::from_value(json!({ "inbounds": [{ "port": "10000-10010" }] })).unwrap();
        assert_eq!(config.listener_port(), None);

        let config: ActiveConfig = serde_json::from_value(json!({ "inbounds": null })).unwrap();
        assert!(config.inbounds.is_empty());
    }

    #[test]
    fn test_add_client_repairs_missing_pieces() {
        let id = Uuid::new_v4();

        let mut empty = ActiveConfig::default();
        empty.add_client(id, 443);
        assert_eq!(empty.client_ids(), vec![id.to_string()]);
        assert_eq!(empty.listener_port(), Some(443));
        assert_eq!(empty.inbounds[0]["listen"], LISTEN_ALL);

        let mut odd: ActiveConfig =
            serde_json::from_value(json!({ "inbounds": [{ "port": 1, "settings": { "clients": "none" } }] })).unwrap();
        odd.add_client(id, 443);
        assert_eq!(odd.client_ids(), vec![id.to_string()]);
        assert_eq!(odd.listener_port(), Some(443));
    }

    #[test]
    fn test_remove_client() {
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        let mut config = ActiveConfig::single_client(443, keep);
        config.add_client(drop, 443);

        assert!(config.remove_client(&drop.to_string()));
        assert!(!config.remove_client(&drop.to_string()));
        assert_eq!(config.client_ids(), vec![keep.to_string()]);
        assert!(!ActiveConfig::default().remove_client(&keep.to_string()));
    }
}
