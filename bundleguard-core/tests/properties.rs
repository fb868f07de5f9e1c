mod common;

use bundleguard_core::{
    AppBundle, BundleModule, ModuleEntry, NameBlacklist, ResourceMapping, ResourceTable,
    ResourcesObfuscator, WhitelistMatcher,
};
use common::{app_table, entry, file, res_type, text};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};

const PROPTEST_CASES: u32 = 64;
const MAX_ENTRIES: usize = 40;

fn names_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-z][a-z0-9_]{0,8}", 1..MAX_ENTRIES)
}

fn bundle_of(drawables: &BTreeSet<String>, strings: &BTreeSet<String>) -> AppBundle {
    let drawable_entries = drawables
        .iter()
        .enumerate()
        .map(|(i, name)| entry(i as u32, name, vec![file(&format!("res/drawable/{}.png", name))]))
        .collect();
    let string_entries = strings
        .iter()
        .enumerate()
        .map(|(i, name)| entry(i as u32, name, vec![text(name, "")]))
        .collect();
    let table = app_table(vec![
        res_type(1, "drawable", drawable_entries),
        res_type(2, "string", string_entries),
    ]);
    let entries = drawables
        .iter()
        .map(|name| ModuleEntry::bytes(format!("res/drawable/{}.png", name), name.as_bytes().to_vec()))
        .collect();
    AppBundle {
        modules: vec![BundleModule {
            name: "base".to_string(),
            table: Some(table),
            entries,
        }],
        ..AppBundle::default()
    }
}

fn obfuscate(bundle: AppBundle, prior: ResourceMapping) -> (AppBundle, ResourceMapping) {
    let whitelist = WhitelistMatcher::empty();
    let blacklist = NameBlacklist::empty();
    let mut obfuscator = ResourcesObfuscator::new(&whitelist, &blacklist, prior);
    let bundle = obfuscator.obfuscate(bundle).expect("obfuscate");
    (bundle, obfuscator.into_mapping())
}

fn table_of(bundle: &AppBundle) -> &ResourceTable {
    bundle.modules[0].table.as_ref().expect("table")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    #[test]
    fn test_obfuscation_is_deterministic(drawables in names_strategy(), strings in names_strategy()) {
        let (first, first_mapping) = obfuscate(bundle_of(&drawables, &strings), ResourceMapping::new());
        let (second, second_mapping) = obfuscate(bundle_of(&drawables, &strings), ResourceMapping::new());
        prop_assert_eq!(first, second);
        prop_assert_eq!(first_mapping, second_mapping);
    }

    #[test]
    fn test_names_and_paths_stay_unique(drawables in names_strategy(), strings in names_strategy()) {
        let (bundle, _) = obfuscate(bundle_of(&drawables, &strings), ResourceMapping::new());
        let table = table_of(&bundle);

        for res_type in &table.packages[0].types {
            let names: HashSet<_> = res_type.entries.iter().map(|e| e.name.as_str()).collect();
            prop_assert_eq!(names.len(), res_type.entries.len());
        }

        let paths: HashSet<_> = bundle.modules[0].entries.iter().map(|e| e.path.as_str()).collect();
        prop_assert_eq!(paths.len(), drawables.len());
        for reference in table.file_references() {
            prop_assert!(paths.contains(reference), "dangling reference {}", reference);
        }
    }

    #[test]
    fn test_prior_mapping_reproduces_output(drawables in names_strategy(), strings in names_strategy()) {
        let (first, mapping) = obfuscate(bundle_of(&drawables, &strings), ResourceMapping::new());
        let (second, _) = obfuscate(bundle_of(&drawables, &strings), mapping);
        prop_assert_eq!(first, second);
    }
}
