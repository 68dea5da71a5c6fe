//! Wire-path normalization for the virtual-root file system.

/// Splits a slash-delimited path, drops empty segments and collapses
/// each adjacent `<segment, "..">` pair. The pass is pairwise-local and
/// left-to-right; a trailing unmatched `..` is dropped.
pub fn split_and_clean(path: &str) -> Vec<String> {
    let toks: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let mut cleaned = Vec::with_capacity(toks.len());
    let mut i = 0;
    while i + 1 < toks.len() {
        if toks[i + 1] == ".." {
            i += 2;
            continue;
        }
        cleaned.push(toks[i].to_string());
        i += 1;
    }

    if let Some(last) = toks.last() {
        // A segment consumed by a pair is always "..", so the value
        // check doubles as a consumed check.
        if *last != ".." {
            cleaned.push((*last).to_string());
        }
    }

    cleaned
}

/// Canonical form of a wire path. Keeps the bare `..` for the caller,
/// preserves whether the path was absolute, and never returns empty.
pub fn clean(path: &str) -> String {
    if path == ".." {
        return path.to_string();
    }

    let joined = split_and_clean(path).join("/");
    if path.starts_with('/') {
        return format!("/{}", joined);
    }
    if joined.is_empty() {
        return String::from("/");
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain() {
        assert_eq!(split_and_clean("/root/test/third"), ["root", "test", "third"]);
    }

    #[test]
    fn split_trailing_dotdot() {
        assert_eq!(split_and_clean("/root/test/third/.."), ["root", "test"]);
    }

    #[test]
    fn split_inner_dotdot() {
        assert_eq!(split_and_clean("/root/../third"), ["third"]);
    }

    #[test]
    fn split_two_dotdots() {
        assert_eq!(
            split_and_clean("/root/test/../third/forth/.."),
            ["root", "third"]
        );
    }

    #[test]
    fn clean_matches_expected_table() {
        assert_eq!(clean("/root/test/third"), "/root/test/third");
        assert_eq!(clean("/root/test/third/.."), "/root/test");
        assert_eq!(clean("/root/../third"), "/third");
        assert_eq!(clean("/root/test/../third/forth/.."), "/root/third");
        assert_eq!(clean("root/test/../third/forth/.."), "root/third");
        assert_eq!(clean("root/test/third"), "root/test/third");
    }

    #[test]
    fn clean_keeps_bare_dotdot() {
        assert_eq!(clean(".."), "..");
    }

    #[test]
    fn clean_of_emptied_paths_is_root() {
        assert_eq!(clean("/a/.."), "/");
        assert_eq!(clean("/"), "/");
    }

    #[test]
    fn clean_is_idempotent() {
        for input in [
            "/root/test/third",
            "/root/test/third/..",
            "/root/../third",
            "/root/test/../third/forth/..",
            "root/test/../third/forth/..",
            "root/test/third",
            "..",
            "/",
            "/a/..",
        ] {
            let once = clean(input);
            assert_eq!(clean(&once), once, "clean not idempotent for {:?}", input);
        }
    }
}
