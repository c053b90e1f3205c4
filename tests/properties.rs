//! Property tests for the decoder and matcher.

use pol_parser::*;
use proptest::prelude::*;
use proptest::sample::Index;

fn data_strategy() -> impl Strategy<Value = (PolicyValueType, PolicyData)> {
    prop_oneof![
        "[ -~]{0,80}".prop_map(|s| (PolicyValueType::String, PolicyData::String(s))),
        "[\u{a0}-\u{3ff}]{1,20}".prop_map(|s| (PolicyValueType::String, PolicyData::String(s))),
        any::<u32>().prop_map(|v| (PolicyValueType::Dword, PolicyData::Dword(v))),
    ]
}

fn entry_strategy(scope: PolicyScope) -> impl Strategy<Value = PolicyEntry> {
    (
        "Software(\\\\[A-Za-z0-9 _.-]{1,16}){1,4}",
        "[A-Za-z0-9_.*]{1,32}",
        data_strategy(),
    )
        .prop_map(move |(registry_key, value_name, (value_type, data))| PolicyEntry {
            registry_key,
            value_name,
            value_type,
            data,
            scope,
        })
}

fn entries_strategy() -> impl Strategy<Value = Vec<PolicyEntry>> {
    prop::collection::vec(entry_strategy(PolicyScope::Machine), 1..16)
}

fn definition(name: &str, key: &str, value_name: &str) -> AdmxPolicyDefinition {
    AdmxPolicyDefinition {
        admx_file: "vendor.admx".to_string(),
        name: name.to_string(),
        display_name_ref: String::new(),
        class: Some(PolicyClass::Machine),
        registry_key: Some(key.to_string()),
        registry_value_name: Some(value_name.to_string()),
    }
}

proptest! {
    #[test]
    fn prop_encoded_entries_decode_unchanged(entries in entries_strategy()) {
        let bytes = encode_entries(&entries).unwrap();
        let decoded = decode(&bytes, PolicyScope::Machine).unwrap();
        prop_assert_eq!(decoded, entries);
    }

    #[test]
    fn prop_truncation_yields_prefix(entries in entries_strategy(), cut in any::<Index>()) {
        let bytes = encode_entries(&entries).unwrap();
        let full = decode(&bytes, PolicyScope::Machine).unwrap();

        let k = cut.index(bytes.len() + 1);
        let partial = decode_lossy(&bytes[..k], PolicyScope::Machine);

        prop_assert!(partial.len() <= full.len());
        prop_assert_eq!(&full[..partial.len()], &partial[..]);
    }

    #[test]
    fn prop_wrong_signature_rejected(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        prop_assume!(!bytes.starts_with(b"PReg"));

        let err = decode(&bytes, PolicyScope::User).unwrap_err();
        prop_assert!(err.is_format_error());
        prop_assert!(decode_lossy(&bytes, PolicyScope::User).is_empty());
    }

    #[test]
    fn prop_garbage_after_header_never_panics(body in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut bytes = PolHeader::default().to_bytes().to_vec();
        bytes.extend_from_slice(&body);

        let decoded = decode_lossy(&bytes, PolicyScope::Machine);
        prop_assert!(decoded.iter().all(PolicyEntry::is_usable));
    }

    #[test]
    fn prop_dedup_of_repeated_runs_is_stable(entries in entries_strategy()) {
        let definitions: Vec<AdmxPolicyDefinition> = entries
            .iter()
            .take(4)
            .enumerate()
            .map(|(i, e)| definition(&format!("Policy{}", i), &e.registry_key, &e.value_name))
            .collect();
        let matcher = PolicyMatcher::new(&entries);

        let once = dedup_matches(matcher.match_definitions(&definitions, None));
        let mut twice = matcher.match_definitions(&definitions, None);
        twice.extend(matcher.match_definitions(&definitions, None));

        prop_assert!(!once.is_empty());
        prop_assert_eq!(dedup_matches(twice), once.clone());
        prop_assert_eq!(dedup_matches(once.clone()), once);
    }

    #[test]
    fn prop_name_match_wins_over_registry(entries in entries_strategy()) {
        let first = &entries[0];
        let policy = definition(&first.value_name, &first.registry_key, &first.value_name);
        let settings = [ConfiguredSetting {
            name: first.value_name.clone(),
            state: "Enabled".to_string(),
            category: None,
            scope: PolicyScope::Machine,
        }];

        let found = PolicyMatcher::new(&entries)
            .with_settings(&settings)
            .match_policy(&policy, None);

        prop_assert!(!found.is_empty());
        prop_assert!(found.iter().all(|m| m.strategy == MatchStrategy::DirectName));
    }
}
