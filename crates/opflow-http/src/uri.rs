//! Request URI splitting
//!
//! Splits a raw URI into path and `&`-separated query parameters. All
//! slices borrow the input; no percent-decoding is performed.

/// One `name=value` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UriParam<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// A URI split into path, raw query string and parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUri<'a> {
    pub path: &'a str,
    pub query: &'a str,
    pub params: Vec<UriParam<'a>>,
}

impl<'a> ParsedUri<'a> {
    /// Look up a parameter by name
    pub fn param(&self, name: &str) -> Option<&'a str> {
        self.params.iter().find(|p| p.name == name).map(|p| p.value)
    }

    /// Integer parameter: base-10 digits only, no sign
    ///
    /// Missing, empty or non-numeric values yield the default.
    pub fn param_int(&self, name: &str, default: i32) -> i32 {
        match self.param(name) {
            Some(v) if !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()) => {
                v.parse().unwrap_or(default)
            }
            _ => default,
        }
    }
}

/// Split a URI on the first `?`; empty-name parameters are dropped
pub fn parse_uri(uri: &str) -> ParsedUri<'_> {
    let Some((path, query)) = uri.split_once('?') else {
        return ParsedUri {
            path: uri,
            query: "",
            params: Vec::new(),
        };
    };

    let params = query
        .split('&')
        .map(|token| match token.split_once('=') {
            Some((name, value)) => UriParam { name, value },
            None => UriParam {
                name: token,
                value: "",
            },
        })
        .filter(|p| !p.name.is_empty())
        .collect();

    ParsedUri {
        path,
        query,
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_query() {
        let parsed = parse_uri("/a/b");
        assert_eq!(parsed.path, "/a/b");
        assert_eq!(parsed.query, "");
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn test_params_in_order() {
        let parsed = parse_uri("/t?x=1&y=2&x=3");
        assert_eq!(parsed.path, "/t");
        assert_eq!(parsed.query, "x=1&y=2&x=3");
        let names: Vec<_> = parsed.params.iter().map(|p| p.name).collect();
        assert_eq!(names, ["x", "y", "x"]);
        // First occurrence wins on lookup
        assert_eq!(parsed.param("x"), Some("1"));
    }

    #[test]
    fn test_valueless_and_empty_name_params() {
        let parsed = parse_uri("/t?flag&=dropped&n=");
        assert_eq!(parsed.params.len(), 2);
        assert_eq!(parsed.params[0], UriParam { name: "flag", value: "" });
        assert_eq!(parsed.params[1], UriParam { name: "n", value: "" });
    }

    #[test]
    fn test_path_idempotent() {
        let parsed = parse_uri("/x/y?a=1");
        let again = parse_uri(parsed.path);
        assert_eq!(again.path, "/x/y");
        assert!(again.params.is_empty());
    }

    #[test]
    fn test_param_int() {
        let parsed = parse_uri("/t?size=12&bad=7x&neg=-3&empty=");
        assert_eq!(parsed.param_int("size", 3), 12);
        assert_eq!(parsed.param_int("bad", 3), 3);
        assert_eq!(parsed.param_int("neg", 3), 3);
        assert_eq!(parsed.param_int("empty", 3), 3);
        assert_eq!(parsed.param_int("missing", 5), 5);
    }

    #[test]
    fn test_no_decoding() {
        let parsed = parse_uri("/p%20q?n=%41");
        assert_eq!(parsed.path, "/p%20q");
        assert_eq!(parsed.param("n"), Some("%41"));
    }
}
