//! Invariants of base-path joining

use peephole::proxy::url_resolver::join_url_path;
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,8}"
}

fn path(leading: bool, trailing: bool) -> impl Strategy<Value = (String, Vec<String>)> {
    prop::collection::vec(segment(), 0..4).prop_map(move |segments| {
        let mut joined = segments.join("/");
        if leading {
            joined.insert(0, '/');
        }
        if trailing && !joined.ends_with('/') {
            joined.push('/');
        }
        (joined, segments)
    })
}

proptest! {
    #[test]
    fn seam_has_exactly_one_slash(
        (base, base_segments) in any::<(bool, bool)>().prop_flat_map(|(l, t)| path(l, t)),
        (tail, tail_segments) in any::<bool>().prop_flat_map(|l| path(l, false)),
    ) {
        let joined = join_url_path(&base, &tail);
        prop_assert!(!joined.contains("//"), "{} + {} = {}", base, tail, joined);

        let segments: Vec<&str> = joined.split('/').filter(|s| !s.is_empty()).collect();
        let expected: Vec<&str> = base_segments
            .iter()
            .chain(tail_segments.iter())
            .map(String::as_str)
            .collect();
        prop_assert_eq!(segments, expected);
    }

    #[test]
    fn absolute_tail_on_root_is_unchanged(tail in "(/[a-z0-9]{1,8}){1,4}") {
        prop_assert_eq!(join_url_path("/", &tail), tail.clone());
        prop_assert_eq!(join_url_path("", &tail), tail);
    }
}
