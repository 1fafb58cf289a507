//! Property-based tests (proptest) for the structural invariants:
//! encoding round trips, distribution totals, and parser round trips over
//! generated models.

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use declaro::{
    parse_model, parser::to_declare_string, plan_distribution, EncodingTable, GeneratorConfig,
};

proptest! {
    /// decode(encode(x)) = x for every identifier ever encoded.
    #[test]
    fn prop_encoding_round_trip(raw in "[A-Za-z][A-Za-z0-9_: ]{0,30}") {
        let mut table = EncodingTable::new();
        let token = table.encode(&raw);
        prop_assert_eq!(table.decode(&token), raw.as_str());
    }

    /// Encoding is stable: the same input maps to the same token.
    #[test]
    fn prop_encoding_is_deterministic(raw in "[A-Z][A-Za-z0-9_]{0,20}") {
        let mut table = EncodingTable::new();
        let first = table.encode(&raw);
        let second = table.encode(&raw);
        prop_assert_eq!(first, second);
    }

    /// Distinct unsafe identifiers never collide in the table.
    #[test]
    fn prop_encoding_is_injective(
        left in "[A-Z][a-z]{1,10}",
        right in "[A-Z][a-z]{1,10}",
    ) {
        prop_assume!(left != right);
        let mut table = EncodingTable::new();
        let lt = table.encode(&left);
        let rt = table.encode(&right);
        prop_assert_ne!(lt, rt);
    }

    /// The planned histogram always preserves the requested trace count and
    /// stays within the configured length bounds.
    #[test]
    fn prop_distribution_preserves_total(
        min in 1u32..20,
        span in 0u32..10,
        total in 0u32..200,
        seed in any::<u64>(),
    ) {
        let config = GeneratorConfig::new(total, min, min + span);
        let mut rng = StdRng::seed_from_u64(seed);
        let histogram = plan_distribution(&config, total, &mut rng);
        prop_assert_eq!(histogram.values().sum::<u32>(), total);
        for length in histogram.keys() {
            prop_assert!((min..=min + span).contains(length));
        }
    }

    /// Parsing, serialising via raw lines, and re-parsing is lossless for
    /// well-formed models.
    #[test]
    fn prop_parse_round_trip(
        names in proptest::collection::vec("[a-z][a-z0-9_]{0,8}", 1..5),
        card in 1u32..5,
    ) {
        let mut text = String::new();
        for name in &names {
            text.push_str(&format!("activity {name}\n"));
        }
        text.push_str(&format!("Existence{card}[{}]\n", names[0]));
        if names.len() > 1 {
            text.push_str(&format!("Response[{}, {}]\n", names[0], names[1]));
        }
        let first = parse_model(&text);
        let second = parse_model(&to_declare_string(&first));
        prop_assert_eq!(first, second);
    }

    /// Template indexes stay dense in declaration order whatever the mix of
    /// valid and invalid lines.
    #[test]
    fn prop_template_indexes_dense(valid in 1usize..6, junk in 0usize..4) {
        let mut text = String::from("activity a\nactivity b\n");
        for i in 0..valid {
            if i % 2 == 0 {
                text.push_str("Existence[a]\n");
            } else {
                text.push_str("Response[a, b]\n");
            }
        }
        for _ in 0..junk {
            text.push_str("Sometime[a, b]\n"); // unknown template, skipped
        }
        let model = parse_model(&text);
        prop_assert_eq!(model.templates.len(), valid);
        for (i, t) in model.templates.iter().enumerate() {
            prop_assert_eq!(t.index, i);
        }
    }
}
