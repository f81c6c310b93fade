use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered string-keyed bag of custom user or company data.
pub type TraitBag = serde_json::Map<String, Value>;

/// Top-level keys owned by the adaptor; forwarded options never override them.
pub const RESERVED_KEYS: [&str; 5] = [
    "organization_id",
    "_partner",
    "disable_location_watch",
    "user",
    "company",
];

/// The long-lived configuration object the Ramen widget reads on every
/// `go()`. Created once per adaptor and merged into, never replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsObject {
    pub organization_id: String,
    #[serde(rename = "_partner")]
    pub partner: String,
    pub disable_location_watch: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<TraitBag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<TraitBag>,
    /// `timestamp` and any other forwarded top-level options.
    #[serde(flatten)]
    pub extra: TraitBag,
}

impl SettingsObject {
    pub fn new(
        organization_id: impl Into<String>,
        partner: impl Into<String>,
        disable_location_watch: bool,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            partner: partner.into(),
            disable_location_watch,
            user: None,
            company: None,
            extra: TraitBag::new(),
        }
    }

    pub fn user_field(&self, key: &str) -> Option<&Value> {
        self.user.as_ref().and_then(|u| u.get(key))
    }

    pub fn user_str(&self, key: &str) -> Option<&str> {
        self.user_field(key).and_then(Value::as_str)
    }

    pub fn company_field(&self, key: &str) -> Option<&Value> {
        self.company.as_ref().and_then(|c| c.get(key))
    }

    /// Look up a forwarded top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Whether the identity invariant holds: non-empty user id and email.
    pub fn has_identity(&self) -> bool {
        let present = |key| self.user_str(key).is_some_and(|s| !s.is_empty());
        present("id") && present("email")
    }
}

/// Canonical form used for case- and separator-insensitive key matching:
/// `createdAt`, `created_at` and `Created At` all become `createdat`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find a value by logical key. An exact match wins over a normalized one.
pub fn lookup<'a>(bag: &'a TraitBag, key: &str) -> Option<&'a Value> {
    if let Some(value) = bag.get(key) {
        return Some(value);
    }
    let wanted = normalize_key(key);
    bag.iter()
        .find(|(k, _)| normalize_key(k) == wanted)
        .map(|(_, v)| v)
}

/// Remove every spelling of a logical key, returning the value [`lookup`]
/// would have returned. Remaining keys keep their order.
pub fn take(bag: &mut TraitBag, key: &str) -> Option<Value> {
    let taken = lookup(bag, key).cloned()?;
    let wanted = normalize_key(key);
    bag.retain(|k, _| normalize_key(k) != wanted);
    Some(taken)
}

/// Non-empty textual form of an identity-like value. Numbers are accepted
/// since hosts commonly send numeric ids.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Loose address check: something, `@`, a domain containing a dot.
pub fn is_email(candidate: &str) -> bool {
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(value: Value) -> TraitBag {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("createdAt"), "createdat");
        assert_eq!(normalize_key("created_at"), "createdat");
        assert_eq!(normalize_key("Created At"), "createdat");
    }

    #[test]
    fn test_lookup_prefers_exact() {
        let traits = bag(json!({"Email": "upper@x.io", "email": "lower@x.io"}));
        assert_eq!(lookup(&traits, "email").unwrap(), "lower@x.io");
        assert_eq!(lookup(&traits, "EMAIL").unwrap(), "upper@x.io");
        assert!(lookup(&traits, "name").is_none());
    }

    #[test]
    fn test_take_removes_all_variants_and_keeps_order() {
        let mut traits = bag(json!({
            "a": 1,
            "created": "x",
            "b": 2,
            "createdAt": "y",
            "created_at": "z",
            "c": 3
        }));
        assert_eq!(take(&mut traits, "created_at").unwrap(), "z");
        assert!(take(&mut traits, "created").is_none());
        let keys: Vec<_> = traits.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("abc")).unwrap(), "abc");
        assert_eq!(value_to_string(&json!(19)).unwrap(), "19");
        assert!(value_to_string(&json!("  ")).is_none());
        assert!(value_to_string(&json!(null)).is_none());
        assert!(value_to_string(&json!({"a": 1})).is_none());
    }

    #[test]
    fn test_is_email() {
        assert!(is_email("ryan@ramen.is"));
        assert!(!is_email("id"));
        assert!(!is_email("@ramen.is"));
        assert!(!is_email("ryan@localhost"));
    }

    #[test]
    fn test_settings_serde_shape() {
        let mut settings = SettingsObject::new("6389149", "segment.com", true);
        settings.extra.insert("environment".into(), json!("staging"));
        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["organization_id"], "6389149");
        assert_eq!(value["_partner"], "segment.com");
        assert_eq!(value["disable_location_watch"], true);
        assert_eq!(value["environment"], "staging");
        assert!(value.get("user").is_none());

        let parsed: SettingsObject = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_has_identity() {
        let mut settings = SettingsObject::new("1", "segment.com", true);
        assert!(!settings.has_identity());
        settings.user = Some(bag(json!({"id": "u1", "email": "a@b.co"})));
        assert!(settings.has_identity());
    }
}
