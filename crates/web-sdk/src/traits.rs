//! Trait extraction and field redaction.
//!
//! Structured slots (`email`, `name`, creation time, company fields) are
//! pulled out of a raw trait bag and removed from it, so a datum never
//! appears both as a structured field and as a generic custom trait.

use serde_json::Value;
use tracing::debug;

use ramen_core::types::{lookup, take, TraitBag};

use crate::dates::{normalize_bag, parse_instant, round_seconds};
use crate::events::GroupEvent;

/// User-level fields promoted into `user.*`.
pub const USER_PROMOTED: [&str; 2] = ["email", "name"];

/// Company-level fields promoted into `company.*`.
pub const COMPANY_PROMOTED: [&str; 5] = ["name", "url", "id", "value", "labels"];

/// Spellings of the creation timestamp. Lookups are case- and
/// separator-insensitive, so `createdAt` and `CreatedAt` are covered too.
pub const CREATED_VARIANTS: [&str; 2] = ["created", "created_at"];

/// Structured company data destined for `SettingsObject.company`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyInfo {
    pub id: Option<Value>,
    pub name: Option<Value>,
    pub url: Option<Value>,
    pub value: Option<Value>,
    pub labels: Option<Value>,
    /// Epoch seconds, rounded.
    pub created_at: Option<i64>,
    pub traits: TraitBag,
}

impl CompanyInfo {
    /// Flatten into the bag shape the widget reads.
    pub fn into_bag(self) -> TraitBag {
        let mut bag = TraitBag::new();
        let promoted = [
            ("id", self.id),
            ("name", self.name),
            ("url", self.url),
            ("value", self.value),
            ("labels", self.labels),
        ];
        for (key, value) in promoted {
            if let Some(value) = value {
                bag.insert(key.to_string(), value);
            }
        }
        if let Some(created_at) = self.created_at {
            bag.insert("created_at".to_string(), Value::from(created_at));
        }
        if !self.traits.is_empty() {
            bag.insert("traits".to_string(), Value::Object(self.traits));
        }
        bag
    }
}

/// Output of [`extract`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedTraits {
    /// Remaining custom traits, date-normalized.
    pub user_traits: TraitBag,
    /// User creation time in epoch seconds, rounded.
    pub created_at: Option<i64>,
    pub company: Option<CompanyInfo>,
}

/// Remove every spelling of each key.
pub fn redact(bag: &mut TraitBag, keys: &[&str]) {
    for key in keys {
        take(bag, key);
    }
}

/// Remove all creation-time spellings, returning the canonical value in
/// epoch seconds (rounded) when one of them parsed.
pub fn redact_created(bag: &mut TraitBag) -> Option<i64> {
    let found: Vec<Value> = CREATED_VARIANTS
        .iter()
        .filter_map(|key| take(bag, key))
        .collect();
    found.iter().find_map(parse_instant).map(round_seconds)
}

/// One-way default-fill: copy entries from `defaults` whose key is absent
/// in `target`. Existing entries are never overwritten.
pub fn fill_defaults(target: &mut TraitBag, defaults: &TraitBag) {
    for (key, value) in defaults {
        if lookup(target, key).is_none() {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Split a company bag into its distinguished fields and leftover traits.
pub fn extract_company(mut company: TraitBag) -> CompanyInfo {
    let created_at = redact_created(&mut company);
    CompanyInfo {
        id: take_present(&mut company, "id"),
        name: take_present(&mut company, "name"),
        url: take_present(&mut company, "url"),
        value: take_present(&mut company, "value"),
        labels: take_present(&mut company, "labels"),
        created_at,
        traits: normalize_bag(&company),
    }
}

/// Pull structured fields out of an identify trait bag.
///
/// `group_defaults` (the current group's traits) fill gaps in a per-call
/// company object; they never create a company on their own.
pub fn extract(traits: &TraitBag, group_defaults: Option<&TraitBag>) -> ExtractedTraits {
    let mut bag = traits.clone();
    redact(&mut bag, &USER_PROMOTED);
    let created_at = redact_created(&mut bag);

    let company = match take(&mut bag, "company") {
        Some(Value::Object(mut company)) => {
            if let Some(defaults) = group_defaults {
                fill_defaults(&mut company, defaults);
            }
            Some(extract_company(company))
        }
        Some(Value::Null) | None => None,
        Some(other) => {
            debug!(kind = json_kind(&other), "discarding non-object company trait");
            None
        }
    };

    ExtractedTraits {
        user_traits: normalize_bag(&bag),
        created_at,
        company,
    }
}

/// Company state from a group call. Properties are published flat and
/// as-is, except creation time, which is canonicalized into a rounded
/// `created_at`. The group id fills `id` when the properties carry none.
pub fn company_from_group(event: &GroupEvent) -> TraitBag {
    let created_at = event.created().map(round_seconds);
    let mut company = event.properties().clone();
    redact(&mut company, &CREATED_VARIANTS);
    if let Some(created_at) = created_at {
        company.insert("created_at".to_string(), Value::from(created_at));
    }
    if lookup(&company, "id").is_none() {
        if let Some(group_id) = event.group_id.as_deref().filter(|id| !id.is_empty()) {
            company.insert("id".to_string(), Value::from(group_id));
        }
    }
    company
}

fn take_present(bag: &mut TraitBag, key: &str) -> Option<Value> {
    take(bag, key).filter(|v| !v.is_null())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
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
    fn test_extract_redacts_user_fields() {
        let traits = bag(json!({
            "email": "email@example.com",
            "name": "ryan+segment@ramen.is",
            "age": 32,
            "createdAt": "2009-02-13T23:31:30.000Z",
            "first_purchase_at": "2009-02-13T23:31:31.000Z"
        }));
        let extracted = extract(&traits, None);

        assert!(extracted.user_traits.get("email").is_none());
        assert!(extracted.user_traits.get("name").is_none());
        assert!(extracted.user_traits.get("createdAt").is_none());
        assert_eq!(extracted.user_traits["age"], 32);
        assert_eq!(extracted.user_traits["first_purchase_at"], 1_234_567_891);
        assert_eq!(extracted.created_at, Some(1_234_567_890));
        assert!(extracted.company.is_none());
    }

    #[test]
    fn test_created_variants_all_removed() {
        let mut traits = bag(json!({
            "created": 1234567890,
            "createdAt": "2001-01-01T00:00:00Z",
            "Created_At": "2001-01-01T00:00:00Z",
            "plan": "pro"
        }));
        assert_eq!(redact_created(&mut traits), Some(1_234_567_890));
        assert_eq!(traits.len(), 1);
        assert_eq!(traits["plan"], "pro");
    }

    #[test]
    fn test_creation_rounds_not_floors() {
        let traits = bag(json!({
            "email": "a@b.co",
            "created_at": "2009-02-13T23:31:30.600Z",
            "renewed_at": "2009-02-13T23:31:30.600Z"
        }));
        let extracted = extract(&traits, None);
        assert_eq!(extracted.created_at, Some(1_234_567_891));
        assert_eq!(extracted.user_traits["renewed_at"], 1_234_567_890);
    }

    #[test]
    fn test_company_extraction() {
        let traits = bag(json!({
            "email": "email@example.com",
            "company": {
                "name": "Pied Piper, Inc.",
                "url": "http://piedpiper.com",
                "id": "987",
                "createdAt": "2009-02-13T23:31:30.000Z",
                "is_friend": true,
                "used_coupon_at": 1234567890
            }
        }));
        let extracted = extract(&traits, None);
        assert!(extracted.user_traits.get("company").is_none());

        let company = extracted.company.unwrap();
        assert_eq!(company.name.unwrap(), "Pied Piper, Inc.");
        assert_eq!(company.url.unwrap(), "http://piedpiper.com");
        assert_eq!(company.id.unwrap(), "987");
        assert_eq!(company.created_at, Some(1_234_567_890));
        assert_eq!(company.traits["is_friend"], true);
        assert_eq!(company.traits["used_coupon_at"], 1_234_567_890);
        for key in COMPANY_PROMOTED.iter().chain(&["createdAt"]) {
            assert!(company.traits.get(*key).is_none(), "{key}");
        }
    }

    #[test]
    fn test_malformed_company_discarded() {
        let traits = bag(json!({"email": "a@b.co", "company": "Pied Piper", "plan": "pro"}));
        let extracted = extract(&traits, None);
        assert!(extracted.company.is_none());
        assert!(extracted.user_traits.get("company").is_none());
        assert_eq!(extracted.user_traits["plan"], "pro");
    }

    #[test]
    fn test_company_default_fill_never_overwrites() {
        let traits = bag(json!({"company": {"name": "Hooli", "size": 10}}));
        let defaults = bag(json!({"id": "g-1", "name": "Pied Piper", "industry": "compression"}));
        let company = extract(&traits, Some(&defaults)).company.unwrap();

        assert_eq!(company.name.unwrap(), "Hooli");
        assert_eq!(company.id.unwrap(), "g-1");
        assert_eq!(company.traits["size"], 10);
        assert_eq!(company.traits["industry"], "compression");
    }

    #[test]
    fn test_defaults_alone_do_not_create_company() {
        let traits = bag(json!({"email": "a@b.co"}));
        let defaults = bag(json!({"id": "g-1"}));
        assert!(extract(&traits, Some(&defaults)).company.is_none());
    }

    #[test]
    fn test_company_from_group() {
        let group = GroupEvent::new(
            Some("id"),
            bag(json!({
                "createdAt": "2009-02-13T23:31:30.600Z",
                "name": "Pied Piper",
                "url": "http://piedpiper.com",
                "employees": 6,
                "renewed_at": "2009-02-13T23:31:30.600Z"
            })),
        );
        let company = company_from_group(&group);

        assert_eq!(company["id"], "id");
        assert_eq!(company["name"], "Pied Piper");
        assert_eq!(company["url"], "http://piedpiper.com");
        assert_eq!(company["created_at"], 1_234_567_891);
        assert_eq!(company["employees"], 6);
        assert_eq!(company["renewed_at"], "2009-02-13T23:31:30.600Z");
        assert!(company.get("createdAt").is_none());
        assert!(company.get("traits").is_none());
    }

    #[test]
    fn test_group_id_does_not_override_explicit_id() {
        let group = GroupEvent::new(Some("group-id"), bag(json!({"id": "explicit"})));
        assert_eq!(company_from_group(&group)["id"], "explicit");

        let anonymous = GroupEvent::new(None, bag(json!({"plan": "pro"})));
        assert_eq!(Value::Object(company_from_group(&anonymous)), json!({"plan": "pro"}));
    }

    #[test]
    fn test_into_bag_omits_empty_slots() {
        let company = CompanyInfo {
            id: Some(json!("1")),
            ..Default::default()
        };
        let bag = company.into_bag();
        assert_eq!(bag.len(), 1);
        assert_eq!(bag["id"], "1");
    }
}
