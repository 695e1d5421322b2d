//! Request URL construction.

use crate::error::{DispatchError, DispatchResult};
use restsync_core::{QueryParams, ResourceId, ResourceKind, Verb};
use serde_json::Value;

/// Placeholder of a nested controller, e.g. `/posts/:id/comments`.
const ID_PLACEHOLDER: &str = "/:id";

/// Inputs of [`build_url`].
#[derive(Debug, Clone, Copy)]
pub struct UrlParts<'a> {
    /// Name of the resource, for error reporting.
    pub resource: &'a str,
    /// Base URL, possibly empty.
    pub base_url: &'a str,
    /// Controller path.
    pub controller: &'a str,
    /// Verb of the request.
    pub verb: Verb,
    /// Kind of the resource.
    pub kind: ResourceKind,
    /// Target record.
    pub id: Option<&'a ResourceId>,
    /// Query parameters; only sent for read verbs.
    pub query: Option<&'a QueryParams>,
}

fn is_nested(controller: &str) -> bool {
    controller.contains("/:id/")
}

/// Builds the URL of a request.
///
/// Member verbs on collections get `/{id}` appended. A nested controller
/// has its first `/:id` replaced by the ID instead, for every verb.
pub fn build_url(parts: UrlParts<'_>) -> DispatchResult<String> {
    let nested = is_nested(parts.controller);
    let needs_id = nested
        || (parts.kind == ResourceKind::Plural
            && matches!(parts.verb, Verb::Show | Verb::Update | Verb::Destroy));

    let tail = if needs_id {
        let id = parts.id.ok_or_else(|| DispatchError::MissingId {
            resource: parts.resource.to_string(),
            verb: parts.verb,
        })?;
        format!("/{}", urlencoding::encode(&id.to_string()))
    } else {
        String::new()
    };

    let mut url = if nested {
        format!("{}{}", parts.base_url, parts.controller).replacen(ID_PLACEHOLDER, &tail, 1)
    } else {
        format!("{}{}{}", parts.base_url, parts.controller, tail)
    };

    if parts.verb.is_read() {
        if let Some(query) = parts.query {
            let query = query_string(query);
            if !query.is_empty() {
                url.push('?');
                url.push_str(&query);
            }
        }
    }

    Ok(url)
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Encodes query parameters as `key=value` pairs joined by `&`.
///
/// Arrays become repeated `key[]=value` pairs and `null` values are
/// skipped. Values are percent-encoded; keys are used as given.
pub fn query_string(query: &QueryParams) -> String {
    let mut pairs = Vec::new();
    for (key, value) in query {
        match value {
            Value::Array(items) => {
                for item in items.iter().filter_map(query_value) {
                    pairs.push(format!("{key}[]={}", urlencoding::encode(&item)));
                }
            }
            other => {
                if let Some(item) = query_value(other) {
                    pairs.push(format!("{key}={}", urlencoding::encode(&item)));
                }
            }
        }
    }
    pairs.join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parts<'a>(controller: &'a str, verb: Verb, id: Option<&'a ResourceId>) -> UrlParts<'a> {
        UrlParts {
            resource: "Posts",
            base_url: "http://api",
            controller,
            verb,
            kind: ResourceKind::Plural,
            id,
            query: None,
        }
    }

    fn query(value: Value) -> QueryParams {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn collection_urls() {
        let id = ResourceId::Int(4);
        assert_eq!(build_url(parts("/posts", Verb::Index, None)).unwrap(), "http://api/posts");
        assert_eq!(build_url(parts("/posts", Verb::Create, None)).unwrap(), "http://api/posts");
        for verb in [Verb::Show, Verb::Update, Verb::Destroy] {
            assert_eq!(
                build_url(parts("/posts", verb, Some(&id))).unwrap(),
                "http://api/posts/4"
            );
        }
    }

    #[test]
    fn member_verbs_require_an_id() {
        let err = build_url(parts("/posts", Verb::Show, None)).unwrap_err();
        assert!(matches!(err, DispatchError::MissingId { verb: Verb::Show, .. }));
    }

    #[test]
    fn singular_urls_have_no_id() {
        let mut p = parts("/user", Verb::Update, None);
        p.kind = ResourceKind::Singular;
        assert_eq!(build_url(p).unwrap(), "http://api/user");
    }

    #[test]
    fn nested_controller_substitutes_id() {
        let id = ResourceId::Int(7);
        assert_eq!(
            build_url(parts("/posts/:id/comments", Verb::Index, Some(&id))).unwrap(),
            "http://api/posts/7/comments"
        );
        assert!(build_url(parts("/posts/:id/comments", Verb::Create, None)).is_err());
    }

    #[test]
    fn query_only_for_reads() {
        let q = query(json!({"page": 2, "q": "a b"}));
        let mut p = parts("/posts", Verb::Index, None);
        p.query = Some(&q);
        assert_eq!(build_url(p).unwrap(), "http://api/posts?page=2&q=a%20b");

        let mut p = parts("/posts", Verb::Create, None);
        p.query = Some(&q);
        assert_eq!(build_url(p).unwrap(), "http://api/posts");
    }

    #[test]
    fn query_arrays_and_nulls() {
        let q = query(json!({"tags": ["a", "b&c"], "skip": null, "flag": true}));
        assert_eq!(query_string(&q), "tags[]=a&tags[]=b%26c&flag=true");
        assert_eq!(query_string(&QueryParams::new()), "");
    }
}
