use fim_fs::{NormalizedPath, Scanner, hash_folder};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;

fn build(root: &std::path::Path, files: &[(String, String)]) {
    fs::create_dir_all(root).unwrap();
    for (name, content) in files {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_normalization_invariants(s in "\\PC*") {
        let path = NormalizedPath::new(&s);
        let as_str = path.as_str();

        prop_assert!(!as_str.contains('\\'));
        prop_assert!(as_str == "/" || !as_str.ends_with('/'));

        let roundtripped = NormalizedPath::new(path.to_native());
        prop_assert_eq!(path, roundtripped);
    }

    #[test]
    fn test_folder_fingerprint_ignores_creation_order(
        files in prop::collection::btree_map("[a-e]{1,3}\\.txt", "[a-z]{0,12}", 1..12)
    ) {
        let files: BTreeMap<String, String> = files
            .into_iter()
            .chain([("nested/fixed.txt".to_string(), "fixed".to_string())])
            .collect();
        let forward: Vec<_> = files.clone().into_iter().collect();
        let mut backward = forward.clone();
        backward.reverse();

        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        build(&a.path().join("root"), &forward);
        build(&b.path().join("root"), &backward);

        prop_assert_eq!(hash_folder(&a.path().join("root")), hash_folder(&b.path().join("root")));
    }

    #[test]
    fn test_scan_root_matches_hash_folder(
        files in prop::collection::btree_map("[a-z]{1,6}\\.dat", "[a-z0-9]{0,64}", 0..10)
    ) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        let files: Vec<_> = files.into_iter().collect();
        build(&root, &files);

        let snapshot = Scanner::default().scan(&root).unwrap();
        prop_assert_eq!(snapshot.len(), files.len());
        prop_assert_eq!(snapshot.root_fingerprint, hash_folder(&root));
    }
}
