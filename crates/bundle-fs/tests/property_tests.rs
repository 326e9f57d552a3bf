use bundle_fs::{NormalizedPath, normalize_lexically};
use proptest::prelude::*;
use std::path::{Component, Path};

proptest! {
    #[test]
    fn test_normalized_path_has_no_backslashes(s in "\\PC*") {
        let path = NormalizedPath::new(&s);
        prop_assert!(!path.as_str().contains('\\'));

        // Normalizing twice changes nothing
        let again = NormalizedPath::new(path.as_str());
        prop_assert_eq!(path, again);
    }

    #[test]
    fn test_lexical_normalization_is_idempotent(parts in prop::collection::vec("(\\.\\.|\\.|[a-z]{1,4})", 0..8)) {
        let joined = parts.join("/");
        let once = normalize_lexically(Path::new(&joined));
        let twice = normalize_lexically(&once);
        prop_assert_eq!(&once, &twice);

        // No `.` survives, and `..` only appears as a leading run
        let mut seen_normal = false;
        for component in once.components() {
            match component {
                Component::CurDir => prop_assert!(false, "cur dir survived in {:?}", once),
                Component::ParentDir => prop_assert!(!seen_normal, "inner .. survived in {:?}", once),
                Component::Normal(_) => seen_normal = true,
                _ => {}
            }
        }
    }
}
