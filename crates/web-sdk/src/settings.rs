//! Settings merger — assembles a partial settings object from resolved
//! identity, extracted traits and per-destination options, then merges it
//! into the long-lived [`SettingsObject`].
//!
//! User precedence, lowest to highest:
//!
//! 1. resolved identity (`id`, `name`, `email`, `created_at`)
//! 2. generic user traits (`traits`)
//! 3. per-destination user options (`options.user`)
//!
//! Per-destination top-level options sit below everything the adaptor
//! assembles: they never override a reserved key.
//!
//! Identity resolved from the context rather than the call only fills user
//! fields that are still missing.

use serde_json::Value;
use tracing::debug;

use ramen_core::types::{take, SettingsObject, TraitBag, RESERVED_KEYS};

use crate::identity::ResolvedIdentity;

/// Option key renamed to `timestamp` on publish.
pub const AUTH_HASH_TIMESTAMP: &str = "auth_hash_timestamp";

/// How the company slot changes on this call.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CompanyUpdate {
    /// Leave the stored company as it is.
    #[default]
    Keep,
    /// Overlay fields onto the stored company.
    Merge(TraitBag),
    /// Discard the stored company. Group calls are authoritative.
    Replace(TraitBag),
}

/// How resolved identity lands on the stored user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityMerge {
    /// The call carries identity; its fields win.
    #[default]
    Overwrite,
    /// Identity came from the context; stored fields are kept.
    FillMissing,
}

/// Everything one call contributes to the settings object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSettings {
    pub user: TraitBag,
    /// Written only where the stored user has no such key.
    pub user_defaults: TraitBag,
    pub company: CompanyUpdate,
    pub top_level: TraitBag,
    /// Keys set by user options; they are dropped from `user.traits`.
    pub shadowed_traits: Vec<String>,
}

/// Inputs to [`assemble`].
#[derive(Debug, Clone)]
pub struct SettingsInput<'a> {
    pub identity: &'a ResolvedIdentity,
    pub identity_merge: IdentityMerge,
    pub created_at: Option<i64>,
    pub user_traits: TraitBag,
    /// The destination's options object, `user` sub-object included.
    pub options: TraitBag,
    pub company: CompanyUpdate,
}

/// Fold sources left to right; later layers win on key collision.
pub fn fold_layers<I>(layers: I) -> TraitBag
where
    I: IntoIterator<Item = TraitBag>,
{
    layers.into_iter().fold(TraitBag::new(), |mut acc, layer| {
        acc.extend(layer);
        acc
    })
}

/// Build the partial settings object for one call.
pub fn assemble(input: SettingsInput<'_>) -> PartialSettings {
    let SettingsInput {
        identity,
        identity_merge,
        created_at,
        mut user_traits,
        mut options,
        company,
    } = input;

    let user_options = match take(&mut options, "user") {
        Some(Value::Object(user)) => user,
        _ => TraitBag::new(),
    };
    let shadowed_traits: Vec<String> = user_options.keys().cloned().collect();
    user_traits.retain(|key, _| !user_options.contains_key(key));

    let mut identity_layer = identity.to_bag();
    if let Some(created_at) = created_at {
        identity_layer.insert("created_at".to_string(), Value::from(created_at));
    }
    let mut traits_layer = TraitBag::new();
    if !user_traits.is_empty() {
        traits_layer.insert("traits".to_string(), Value::Object(user_traits));
    }

    let (user, user_defaults) = match identity_merge {
        IdentityMerge::Overwrite => (
            fold_layers([identity_layer, traits_layer, user_options]),
            TraitBag::new(),
        ),
        IdentityMerge::FillMissing => (fold_layers([traits_layer, user_options]), identity_layer),
    };
    let top_level = forwarded_options(options);

    PartialSettings {
        user,
        user_defaults,
        company,
        top_level,
        shadowed_traits,
    }
}

/// Top-level options with the auth-hash rename applied and reserved keys
/// dropped.
fn forwarded_options(mut options: TraitBag) -> TraitBag {
    if let Some(timestamp) = take(&mut options, AUTH_HASH_TIMESTAMP) {
        if !timestamp.is_null() {
            options.insert("timestamp".to_string(), timestamp);
        }
    }
    options.retain(|key, _| {
        let reserved = RESERVED_KEYS.contains(&key.as_str());
        if reserved {
            debug!(key = %key, "ignoring option that shadows a reserved settings key");
        }
        !reserved
    });
    options
}

/// Overlay `fresh` onto `stored`. A `traits` object merges one level deeper
/// so traits from earlier calls survive.
fn merge_entity(stored: &mut TraitBag, fresh: TraitBag) {
    for (key, value) in fresh {
        let unmerged = match (stored.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) if key == "traits" => {
                existing.extend(incoming);
                None
            }
            (_, value) => Some(value),
        };
        if let Some(value) = unmerged {
            stored.insert(key, value);
        }
    }
}

/// Merge `partial` over a copy of `current`. Fresh values win; keys only
/// `current` defines survive untouched.
pub fn merge(current: &SettingsObject, partial: PartialSettings) -> SettingsObject {
    let mut next = current.clone();

    let user = next.user.get_or_insert_with(TraitBag::new);
    merge_entity(user, partial.user);
    if let Some(Value::Object(traits)) = user.get_mut("traits") {
        traits.retain(|key, _| !partial.shadowed_traits.contains(key));
    }
    for (key, value) in partial.user_defaults {
        if !user.contains_key(&key) {
            user.insert(key, value);
        }
    }

    match partial.company {
        CompanyUpdate::Keep => {}
        CompanyUpdate::Merge(company) => {
            merge_entity(next.company.get_or_insert_with(TraitBag::new), company);
        }
        CompanyUpdate::Replace(company) => next.company = Some(company),
    }

    next.extra.extend(partial.top_level);
    next
}
