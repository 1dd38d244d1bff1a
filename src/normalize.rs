use url::Url;

use crate::error::NormalizeError;

const DEFAULT_SCHEME: &str = "http";

/// Canonicalize a URL before it is fetched and stored.
///
/// Scheme and host are lowercased, duplicate slashes, default ports and dot
/// segments are dropped, query pairs are sorted by key and an empty query
/// separator is removed. A bare root path is dropped; other trailing slashes
/// are kept. A URL without a scheme is treated as `http`.
pub fn normalize(raw: &str) -> Result<String, NormalizeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("{DEFAULT_SCHEME}://{rest}")
    } else {
        format!("{DEFAULT_SCHEME}://{trimmed}")
    };
    // Before parsing, so that dot segments are resolved on the collapsed path
    let candidate = collapse_path_slashes(&candidate);

    let parse_error = |source| NormalizeError::Parse {
        url: trimmed.to_string(),
        source,
    };

    let mut url = Url::parse(&candidate).map_err(parse_error)?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(NormalizeError::UnsupportedScheme(other.to_string())),
    }

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Err(NormalizeError::MissingHost(trimmed.to_string())),
    };
    if let Some(stripped) = host.strip_suffix('.').filter(|h| !h.is_empty()) {
        url.set_host(Some(stripped)).map_err(parse_error)?;
    }

    match url.query() {
        Some("") => url.set_query(None),
        Some(_) => sort_query(&mut url),
        None => {}
    }

    let mut normalized = url.to_string();
    // The url crate always serializes an empty path as "/"
    if url.path() == "/" && url.query().is_none() && url.fragment().is_none() {
        normalized.pop();
    }
    Ok(normalized)
}

/// Replace runs of `/` in the path of `candidate` with a single slash.
fn collapse_path_slashes(candidate: &str) -> String {
    let Some(scheme_end) = candidate.find("://") else {
        return candidate.to_string();
    };
    let authority_start = scheme_end + 3;
    let Some(path_start) = candidate[authority_start..]
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .map(|i| authority_start + i)
    else {
        return candidate.to_string();
    };
    let path_end = candidate[path_start..]
        .find(|c: char| matches!(c, '?' | '#'))
        .map_or(candidate.len(), |i| path_start + i);

    let mut out = String::with_capacity(candidate.len());
    out.push_str(&candidate[..path_start]);
    let mut previous_slash = false;
    for c in candidate[path_start..path_end].chars() {
        if c == '/' && previous_slash {
            continue;
        }
        previous_slash = c == '/';
        out.push(c);
    }
    out.push_str(&candidate[path_end..]);
    out
}

/// Sort query pairs by key; pairs sharing a key keep their relative order.
fn sort_query(url: &mut Url) {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    url.query_pairs_mut().clear().extend_pairs(pairs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_scheme_and_host() {
        assert_eq!(
            normalize("HTTPS://Example.COM/Path").unwrap(),
            "https://example.com/Path"
        );
    }

    #[test]
    fn test_root_trailing_slash_removed() {
        assert_eq!(normalize("https://example.com/").unwrap(), "https://example.com");
        assert_eq!(normalize("https://example.com").unwrap(), "https://example.com");
    }

    #[test]
    fn test_path_trailing_slash_kept() {
        assert_eq!(
            normalize("https://example.com/docs/").unwrap(),
            "https://example.com/docs/"
        );
    }

    #[test]
    fn test_duplicate_slashes_collapsed() {
        assert_eq!(
            normalize("https://example.com//a//b").unwrap(),
            "https://example.com/a/b"
        );
        assert_eq!(
            normalize("http://localhost:80///x///y/z/../././index.html?b=y&a=x#t=20").unwrap(),
            "http://localhost/x/y/index.html?a=x&b=y#t=20"
        );
        // Slashes in the query and fragment are not part of the path
        assert_eq!(
            normalize("https://example.com/r?next=//a//b#//c").unwrap(),
            "https://example.com/r?next=%2F%2Fa%2F%2Fb#//c"
        );
    }

    #[test]
    fn test_query_pairs_sorted_by_key() {
        assert_eq!(
            normalize("https://example.com/s?q=rust&page=2&a=1&a=0").unwrap(),
            "https://example.com/s?a=1&a=0&page=2&q=rust"
        );
    }

    #[test]
    fn test_missing_scheme_defaults_to_http() {
        assert_eq!(
            normalize("example.com/path").unwrap(),
            "http://example.com/path"
        );
        assert_eq!(normalize("//example.com").unwrap(), "http://example.com");
    }

    #[test]
    fn test_default_port_and_dot_segments() {
        assert_eq!(
            normalize("http://example.com:80/a/./b/../c").unwrap(),
            "http://example.com/a/c"
        );
        assert_eq!(
            normalize("https://example.com:443").unwrap(),
            "https://example.com"
        );
        assert_eq!(
            normalize("https://example.com:8443/x").unwrap(),
            "https://example.com:8443/x"
        );
    }

    #[test]
    fn test_empty_query_removed_but_real_query_kept() {
        assert_eq!(
            normalize("https://example.com/search?").unwrap(),
            "https://example.com/search"
        );
        assert_eq!(
            normalize("https://example.com/?q=rust").unwrap(),
            "https://example.com/?q=rust"
        );
    }

    #[test]
    fn test_trailing_dot_in_host_removed() {
        assert_eq!(
            normalize("https://example.com./x").unwrap(),
            "https://example.com/x"
        );
    }

    #[test]
    fn test_fragment_kept() {
        assert_eq!(
            normalize("https://example.com/page#section").unwrap(),
            "https://example.com/page#section"
        );
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        assert_eq!(normalize("  https://example.com \n").unwrap(), "https://example.com");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(normalize("   "), Err(NormalizeError::Empty)));
        assert!(matches!(
            normalize("ftp://example.com/file"),
            Err(NormalizeError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
        assert!(matches!(
            normalize("http://"),
            Err(NormalizeError::Parse { .. })
        ));
        assert!(matches!(
            normalize("http://exa mple.com"),
            Err(NormalizeError::Parse { .. })
        ));
    }
}
