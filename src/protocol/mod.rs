//! Wire messages for the recent-orders protocol

mod handler;

pub use handler::{Handler, Outcome};

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::book::BookView;

/// Inbound request, tagged by its `type` field
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "simpleExchange/getRecentOrders")]
    GetRecentOrders {
        #[serde(rename = "instanceRegKey", default)]
        instance_reg_key: Option<String>,
    },

    #[serde(rename = "simpleExchange/subscribeRecentOrders")]
    SubscribeRecentOrders {
        #[serde(rename = "instanceRegKey", default)]
        instance_reg_key: Option<String>,
    },

    /// Any other message type; answered with no response
    #[serde(other)]
    Unhandled,
}

impl Request {
    /// Decode a JSON request
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Response payload, also used for pushed notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Response {
    #[serde(rename = "simpleExchange/recentOrders")]
    RecentOrders(BookView),

    #[serde(rename = "simpleExchange/subscribedToRecentOrders")]
    SubscribedToRecentOrders(SubscribeStatus),
}

/// Outcome of a subscribe request: `"already"` or `true` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeStatus {
    Already,
    Subscribed,
}

impl Serialize for SubscribeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SubscribeStatus::Already => serializer.serialize_str("already"),
            SubscribeStatus::Subscribed => serializer.serialize_bool(true),
        }
    }
}

impl<'de> Deserialize<'de> for SubscribeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Flag(bool),
            Text(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Flag(true) => Ok(SubscribeStatus::Subscribed),
            Wire::Text(text) if text == "already" => Ok(SubscribeStatus::Already),
            _ => Err(de::Error::custom("expected true or \"already\"")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_requests() {
        let get = Request::parse(r#"{"type":"simpleExchange/getRecentOrders","instanceRegKey":"X1"}"#)
            .unwrap();
        assert_eq!(
            get,
            Request::GetRecentOrders {
                instance_reg_key: Some("X1".to_string())
            }
        );

        let sub = Request::parse(r#"{"type":"simpleExchange/subscribeRecentOrders"}"#).unwrap();
        assert_eq!(
            sub,
            Request::SubscribeRecentOrders {
                instance_reg_key: None
            }
        );

        let other = Request::parse(r#"{"type":"simpleExchange/placeOrder","price":3}"#).unwrap();
        assert_eq!(other, Request::Unhandled);
    }

    #[test]
    fn test_parse_without_type_fails() {
        assert!(Request::parse(r#"{"instanceRegKey":"X1"}"#).is_err());
    }

    #[test]
    fn test_response_shapes() {
        let already = Response::SubscribedToRecentOrders(SubscribeStatus::Already);
        assert_eq!(
            serde_json::to_value(&already).unwrap(),
            json!({"type": "simpleExchange/subscribedToRecentOrders", "data": "already"})
        );

        let subscribed = Response::SubscribedToRecentOrders(SubscribeStatus::Subscribed);
        assert_eq!(
            serde_json::to_value(&subscribed).unwrap(),
            json!({"type": "simpleExchange/subscribedToRecentOrders", "data": true})
        );

        let orders = Response::RecentOrders(BookView {
            buy: vec![],
            sell: vec![],
        });
        assert_eq!(
            serde_json::to_value(&orders).unwrap(),
            json!({"type": "simpleExchange/recentOrders", "data": {"buy": [], "sell": []}})
        );
    }

    #[test]
    fn test_subscribe_status_rejects_false() {
        let parsed: Result<Response, _> = serde_json::from_value(
            json!({"type": "simpleExchange/subscribedToRecentOrders", "data": false}),
        );
        assert!(parsed.is_err());
    }
}
