//! Property-based tests using proptest
//!
//! These tests verify localized id parsing, the load balancer state
//! upgrade and attribute comparison using randomized inputs.

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use scw_provider::provider::upgrade_state;
use scw_provider::resources::lb::{lb_upgrade_v1_regional_to_zoned_id, lb_upgrade_v1_state};
use scw_provider::resources::LoadBalancer;
use scw_provider::schema::{Attribute, ValueType};
use scw_provider::scw::locality::{expand_id, parse_localized_id};
use scw_provider::scw::{Region, Zone, ZonedId};

fn arb_region() -> impl Strategy<Value = String> {
    prop_oneof!["fr-par", "nl-ams", "pl-waw"].prop_map(String::from)
}

fn arb_zone() -> impl Strategy<Value = String> {
    (arb_region(), 1u8..4).prop_map(|(region, n)| format!("{region}-{n}"))
}

fn arb_uuid() -> impl Strategy<Value = String> {
    "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}"
}

fn state_with_id(id: &str) -> Map<String, Value> {
    let mut state = Map::new();
    state.insert("id".to_string(), json!(id));
    state
}

proptest! {
    /// Zoned ids split back into their zone and uuid
    #[test]
    fn test_zoned_id_roundtrips(zone in arb_zone(), uuid in arb_uuid()) {
        let id = format!("{zone}/{uuid}");
        let (locality, bare) = parse_localized_id(&id).unwrap();
        prop_assert_eq!(locality, zone.as_str());
        prop_assert_eq!(bare, uuid.as_str());

        let parsed = ZonedId::parse(&id).unwrap();
        prop_assert_eq!(parsed.to_string(), id);
    }

    /// expand_id never leaves a locality behind and is idempotent
    #[test]
    fn test_expand_id_strips_any_prefix(prefix in "[a-z0-9/-]{0,20}", uuid in arb_uuid()) {
        let id = if prefix.is_empty() { uuid.clone() } else { format!("{prefix}/{uuid}") };
        let expanded = expand_id(&id);
        prop_assert_eq!(expanded, uuid.as_str());
        prop_assert_eq!(expand_id(expanded), expanded);
    }

    /// Arbitrary strings never panic the parser
    #[test]
    fn test_parse_localized_id_never_panics(s in "\\PC{0,64}") {
        if let Ok((locality, id)) = parse_localized_id(&s) {
            prop_assert!(!id.is_empty());
            prop_assert!(!id.contains('/'));
            prop_assert!(s.starts_with(locality));
        }
    }

    /// Every zone belongs to the region it was derived from
    #[test]
    fn test_zone_region_relationship(zone in arb_zone()) {
        let zone = Zone::parse(&zone).unwrap();
        let region = zone.region();
        prop_assert!(zone.as_str().starts_with(region.as_str()));
        prop_assert_eq!(Region::parse(region.as_str()).unwrap(), region.clone());
        prop_assert!(region.first_zone().as_str().ends_with("-1"));
    }

    /// Regional ids land in the first zone of their region
    #[test]
    fn test_lb_upgrade_regional_to_first_zone(region in arb_region(), uuid in arb_uuid()) {
        let upgraded = lb_upgrade_v1_regional_to_zoned_id(&format!("{region}/{uuid}")).unwrap();
        prop_assert_eq!(upgraded, format!("{region}-1/{uuid}"));
    }

    /// Upgrading an already zoned state changes nothing
    #[test]
    fn test_lb_upgrade_is_idempotent(region in arb_region(), uuid in arb_uuid(), name in "[a-z-]{1,16}") {
        let mut state = state_with_id(&format!("{region}/{uuid}"));
        state.insert("name".to_string(), json!(name));

        let once = lb_upgrade_v1_state(state).unwrap();
        let twice = lb_upgrade_v1_state(once.clone()).unwrap();
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(&once["name"], &json!(name));
    }

    /// A bare uuid carries no locality to upgrade from
    #[test]
    fn test_lb_upgrade_rejects_bare_uuid(uuid in arb_uuid()) {
        prop_assert!(lb_upgrade_v1_state(state_with_id(&uuid)).is_err());
    }

    /// The provider-level upgrade runs the same migration from version 0
    #[test]
    fn test_upgrade_state_from_v0(region in arb_region(), uuid in arb_uuid()) {
        let raw = json!({"id": format!("{region}/{uuid}"), "type": "LB-S"});
        let upgraded = upgrade_state(&LoadBalancer, 0, raw).unwrap();
        prop_assert_eq!(&upgraded["id"], &json!(format!("{region}-1/{uuid}")));
        prop_assert_eq!(&upgraded["type"], &json!("LB-S"));
    }

    /// Null, empty strings and empty lists compare equal
    #[test]
    fn test_empty_values_compare_equal(pick_a in 0usize..3, pick_b in 0usize..3) {
        let empties = [Value::Null, json!(""), json!([])];
        let attr = Attribute::optional(ValueType::String);
        prop_assert!(attr.values_equal(Some(&empties[pick_a]), Some(&empties[pick_b])));
        prop_assert!(attr.values_equal(None, Some(&empties[pick_b])));
    }

    /// A set value never equals an empty one
    #[test]
    fn test_set_value_differs_from_empty(s in "[a-z]{1,10}") {
        let attr = Attribute::optional(ValueType::String);
        prop_assert!(!attr.values_equal(Some(&json!(s)), None));
        prop_assert!(attr.values_equal(Some(&json!(s)), Some(&json!(s))));
    }
}
