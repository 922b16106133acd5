//! Data types relayed between a controller and its viewers.
//!
//! Defines the needs gauges pushed through the bus and the heartbeat
//! marker sent on idle streams.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Snapshot of a sim's needs.
///
/// Each gauge has a level and a rate of change. Values are not bounded
/// here; clamping is left to whoever renders them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NeedsState {
    pub bladder: i64,
    pub bladder_rate: i64,
    pub fun: i64,
    pub fun_rate: i64,
    pub hunger: i64,
    pub hunger_rate: i64,
    pub social: i64,
    pub social_rate: i64,
    pub energy: i64,
    pub energy_rate: i64,
    /// Spelled the way existing frontends expect it on the wire.
    pub hygeine: i64,
    pub hygeine_rate: i64,
}

impl NeedsState {
    /// The state every viewer sees before a controller has sent anything.
    pub fn baseline() -> Self {
        Self {
            bladder: 95,
            fun: 95,
            hunger: 28,
            social: 12,
            energy: 70,
            hygeine: 90,
            ..Default::default()
        }
    }

    /// `(wire name, level, rate)` for every gauge, in display order.
    pub fn gauges(&self) -> [(&'static str, i64, i64); 6] {
        [
            ("bladder", self.bladder, self.bladder_rate),
            ("fun", self.fun, self.fun_rate),
            ("hunger", self.hunger, self.hunger_rate),
            ("social", self.social, self.social_rate),
            ("energy", self.energy, self.energy_rate),
            ("hygeine", self.hygeine, self.hygeine_rate),
        ]
    }
}

/// Liveness marker for idle streams.
///
/// Shares no keys with [`NeedsState`], so clients can tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Unix timestamp (seconds) of when the beat was sent.
    pub heartbeat: i64,
}

impl Heartbeat {
    pub fn now() -> Self {
        Self {
            heartbeat: Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_values() {
        let needs = NeedsState::baseline();

        assert_eq!(needs.bladder, 95);
        assert_eq!(needs.fun, 95);
        assert_eq!(needs.hunger, 28);
        assert_eq!(needs.social, 12);
        assert_eq!(needs.energy, 70);
        assert_eq!(needs.hygeine, 90);
        assert_eq!(needs.bladder_rate, 0);
    }

    #[test]
    fn test_serialization_uses_wire_names() {
        let json = serde_json::to_value(NeedsState::baseline()).unwrap();

        assert_eq!(json["bladder"], 95);
        assert_eq!(json["bladderRate"], 0);
        assert_eq!(json["hygeine"], 90);
        assert!(json.get("hygeineRate").is_some());
        assert!(json.get("bladder_rate").is_none());
    }

    #[test]
    fn test_partial_payload_defaults_to_zero() {
        let needs: NeedsState = serde_json::from_str(r#"{"bladder": 50, "funRate": -3}"#).unwrap();

        assert_eq!(needs.bladder, 50);
        assert_eq!(needs.fun_rate, -3);
        assert_eq!(needs.hunger, 0);
    }

    #[test]
    fn test_gauges_match_wire_names() {
        let needs = NeedsState::baseline();
        let json = serde_json::to_value(needs).unwrap();

        for (name, level, _) in needs.gauges() {
            assert_eq!(json[name], level);
        }
    }

    #[test]
    fn test_heartbeat_is_distinguishable() {
        let json = serde_json::to_value(Heartbeat::now()).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object.len(), 1);
        assert!(object.contains_key("heartbeat"));
        assert!(serde_json::from_value::<Heartbeat>(
            serde_json::to_value(NeedsState::baseline()).unwrap()
        )
        .is_err());
    }
}
