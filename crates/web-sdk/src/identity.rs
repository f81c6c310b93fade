//! Identity context and resolution.
//!
//! The host records every identify and group call into an
//! [`IdentityContext`]; the resolver reads it to fill in identity for calls
//! that carry none of their own (page, track, group).

use serde_json::Value;

use ramen_core::types::{lookup, TraitBag};

use crate::events::{email_in, name_in, GroupEvent, IdentifyEvent};

#[derive(Debug, Clone, Default)]
struct EntityState {
    id: Option<String>,
    traits: TraitBag,
}

impl EntityState {
    /// A different non-empty id starts a fresh entity; traits then merge
    /// over whatever is stored.
    fn record(&mut self, id: Option<&str>, traits: &TraitBag) {
        if let Some(id) = id.filter(|id| !id.trim().is_empty()) {
            if self.id.as_deref() != Some(id) {
                self.traits.clear();
            }
            self.id = Some(id.to_string());
        }
        for (key, value) in traits {
            self.traits.insert(key.clone(), value.clone());
        }
    }
}

/// Last-known user and group, written by identify and group calls.
#[derive(Debug, Clone, Default)]
pub struct IdentityContext {
    user: EntityState,
    group: EntityState,
}

impl IdentityContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_identify(&mut self, event: &IdentifyEvent) {
        self.user.record(event.user_id.as_deref(), &event.traits);
    }

    pub fn record_group(&mut self, event: &GroupEvent) {
        self.group.record(event.group_id.as_deref(), &event.traits);
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.id.as_deref()
    }

    pub fn user_traits(&self) -> &TraitBag {
        &self.user.traits
    }

    pub fn email(&self) -> Option<String> {
        email_in(&self.user.traits)
    }

    pub fn name(&self) -> Option<String> {
        name_in(&self.user.traits)
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group.id.as_deref()
    }

    /// Current group's traits with its id folded in, or `None` when no
    /// group call has been seen.
    pub fn group_traits(&self) -> Option<TraitBag> {
        if self.group.id.is_none() && self.group.traits.is_empty() {
            return None;
        }
        let mut traits = self.group.traits.clone();
        if let Some(id) = self.group.id.as_deref() {
            if lookup(&traits, "id").is_none() {
                traits.insert("id".to_string(), Value::from(id));
            }
        }
        Some(traits)
    }

    /// Forget both user and group.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Identity fields every published settings object carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl ResolvedIdentity {
    /// `{ id, name, email }` layer of the user object.
    pub fn to_bag(&self) -> TraitBag {
        let mut bag = TraitBag::new();
        bag.insert("id".to_string(), Value::from(self.id.as_str()));
        bag.insert("name".to_string(), Value::from(self.name.as_str()));
        bag.insert("email".to_string(), Value::from(self.email.as_str()));
        bag
    }
}

/// Resolve identity for one call, preferring the event's own fields over
/// the context. `None` means no email is known and the call must be skipped.
pub fn resolve(event: Option<&IdentifyEvent>, ctx: &IdentityContext) -> Option<ResolvedIdentity> {
    let email = event
        .and_then(IdentifyEvent::email)
        .or_else(|| ctx.email())
        .filter(|email| !email.trim().is_empty())?;

    let id = event
        .and_then(IdentifyEvent::uid)
        .or_else(|| ctx.user_id().map(str::to_string))
        .unwrap_or_else(|| email.clone());

    let name = event
        .and_then(IdentifyEvent::name)
        .or_else(|| ctx.name())
        .unwrap_or_else(|| email.clone());

    Some(ResolvedIdentity { id, email, name })
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
    fn test_resolve_requires_email() {
        let ctx = IdentityContext::new();
        let event = IdentifyEvent::new(Some("id"), TraitBag::new());
        assert!(resolve(Some(&event), &ctx).is_none());
        assert!(resolve(None, &ctx).is_none());
    }

    #[test]
    fn test_name_falls_back_to_email() {
        let ctx = IdentityContext::new();
        let event = IdentifyEvent::new(Some("id"), bag(json!({"email": "email@example.com"})));
        let identity = resolve(Some(&event), &ctx).unwrap();
        assert_eq!(identity.id, "id");
        assert_eq!(identity.email, "email@example.com");
        assert_eq!(identity.name, "email@example.com");
    }

    #[test]
    fn test_resolve_from_context() {
        let mut ctx = IdentityContext::new();
        ctx.record_identify(&IdentifyEvent::new(
            Some("12345"),
            bag(json!({"email": "ryan@ramen.is", "name": "Ryan"})),
        ));
        let identity = resolve(None, &ctx).unwrap();
        assert_eq!(identity.id, "12345");
        assert_eq!(identity.email, "ryan@ramen.is");
        assert_eq!(identity.name, "Ryan");
    }

    #[test]
    fn test_event_fields_win_over_context() {
        let mut ctx = IdentityContext::new();
        ctx.record_identify(&IdentifyEvent::new(
            Some("old"),
            bag(json!({"email": "old@ramen.is"})),
        ));
        let event = IdentifyEvent::new(Some("new"), bag(json!({"email": "new@ramen.is"})));
        let identity = resolve(Some(&event), &ctx).unwrap();
        assert_eq!(identity.id, "new");
        assert_eq!(identity.email, "new@ramen.is");
    }

    #[test]
    fn test_id_falls_back_to_email() {
        let ctx = IdentityContext::new();
        let event = IdentifyEvent::new(None, bag(json!({"email": "anon@ramen.is"})));
        assert_eq!(resolve(Some(&event), &ctx).unwrap().id, "anon@ramen.is");
    }

    #[test]
    fn test_record_identify_merges_for_same_user() {
        let mut ctx = IdentityContext::new();
        ctx.record_identify(&IdentifyEvent::new(
            Some("u1"),
            bag(json!({"email": "a@b.co", "plan": "free"})),
        ));
        ctx.record_identify(&IdentifyEvent::new(None, bag(json!({"plan": "pro"}))));
        assert_eq!(ctx.user_id(), Some("u1"));
        assert_eq!(ctx.email().unwrap(), "a@b.co");
        assert_eq!(ctx.user_traits()["plan"], "pro");
    }

    #[test]
    fn test_record_identify_resets_on_new_user() {
        let mut ctx = IdentityContext::new();
        ctx.record_identify(&IdentifyEvent::new(Some("u1"), bag(json!({"email": "a@b.co"}))));
        ctx.record_identify(&IdentifyEvent::new(Some("u2"), TraitBag::new()));
        assert_eq!(ctx.user_id(), Some("u2"));
        assert!(ctx.email().is_none());
    }

    #[test]
    fn test_group_traits_include_id() {
        let mut ctx = IdentityContext::new();
        assert!(ctx.group_traits().is_none());

        ctx.record_group(&GroupEvent::new(Some("g-1"), bag(json!({"plan": "enterprise"}))));
        let traits = ctx.group_traits().unwrap();
        assert_eq!(traits["id"], "g-1");
        assert_eq!(traits["plan"], "enterprise");
        assert_eq!(ctx.group_id(), Some("g-1"));

        ctx.reset();
        assert!(ctx.group_traits().is_none());
        assert!(ctx.user_id().is_none());
    }
}
