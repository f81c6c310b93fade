//! Ramen adaptor — keeps the widget's `ramenSettings` object in sync with
//! analytics calls and triggers `Ramen.go()` after every merge.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};
use uuid::Uuid;

use ramen_core::config::RamenConfig;
use ramen_core::types::{SettingsObject, TraitBag};
use ramen_core::widget::{detached_widget, Widget};

use super::{Destination, DispatchOutcome, SkipReason};
use crate::events::{EventKind, GroupEvent, IdentifyEvent, PageEvent, TrackEvent};
use crate::identity::{resolve, IdentityContext, ResolvedIdentity};
use crate::settings::{assemble, merge, CompanyUpdate, IdentityMerge, SettingsInput};
use crate::traits::{company_from_group, extract};

/// Ramen destination. Owns the settings object for its whole lifetime.
pub struct RamenAdaptor {
    config: RamenConfig,
    settings: SettingsObject,
    published: bool,
    widget: Arc<dyn Widget>,
}

impl RamenAdaptor {
    pub fn new(config: RamenConfig) -> Self {
        let settings = Self::default_settings(&config);
        Self {
            config,
            settings,
            published: false,
            widget: detached_widget(),
        }
    }

    /// Attach the widget runtime the settings are published to.
    pub fn with_widget(mut self, widget: Arc<dyn Widget>) -> Self {
        self.widget = widget;
        self
    }

    pub fn config(&self) -> &RamenConfig {
        &self.config
    }

    /// Current settings, published or not.
    pub fn settings(&self) -> &SettingsObject {
        &self.settings
    }

    /// Whether any call has published settings to the widget yet.
    pub fn is_published(&self) -> bool {
        self.published
    }

    fn default_settings(config: &RamenConfig) -> SettingsObject {
        SettingsObject::new(
            config.organization_id.clone(),
            config.partner.clone(),
            config.disable_location_watch,
        )
    }

    fn skip(&self, kind: EventKind, message_id: Uuid, reason: SkipReason) -> DispatchOutcome {
        debug!(
            kind = kind.as_str(),
            message_id = %message_id,
            reason = %reason,
            "ramen call skipped"
        );
        DispatchOutcome::Skipped(reason)
    }

    /// Guard shared by calls that take identity from the context alone.
    fn resolve_from_context(
        &self,
        kind: EventKind,
        message_id: Uuid,
        ctx: &IdentityContext,
    ) -> Result<ResolvedIdentity, DispatchOutcome> {
        if !self.loaded() {
            return Err(self.skip(kind, message_id, SkipReason::WidgetUnavailable));
        }
        resolve(None, ctx).ok_or_else(|| self.skip(kind, message_id, SkipReason::MissingIdentity))
    }

    /// Merge, publish, then `go()`.
    fn apply(&mut self, kind: EventKind, message_id: Uuid, input: SettingsInput<'_>) {
        let partial = assemble(input);
        let mut next = merge(&self.settings, partial);
        next.organization_id.clone_from(&self.config.organization_id);
        self.settings = next;
        self.published = true;

        self.widget.publish(&self.settings);
        self.widget.go();

        info!(
            kind = kind.as_str(),
            message_id = %message_id,
            organization_id = %self.settings.organization_id,
            has_company = self.settings.company.is_some(),
            "ramen settings published"
        );
    }
}

/// Input for calls without identity of their own. Context identity only
/// fills user fields an earlier call left unset.
fn identity_only(
    identity: &ResolvedIdentity,
    options: TraitBag,
    company: CompanyUpdate,
) -> SettingsInput<'_> {
    SettingsInput {
        identity,
        identity_merge: IdentityMerge::FillMissing,
        created_at: None,
        user_traits: TraitBag::new(),
        options,
        company,
    }
}

impl Destination for RamenAdaptor {
    fn name(&self) -> &str {
        &self.config.integration_name
    }

    fn validate_config(&self) -> Result<()> {
        self.config.validate()?;
        Ok(())
    }

    fn initialize(&mut self) {
        self.settings = Self::default_settings(&self.config);
        self.published = false;
    }

    fn loaded(&self) -> bool {
        self.widget.is_loaded()
    }

    fn identify(&mut self, event: &IdentifyEvent, ctx: &IdentityContext) -> DispatchOutcome {
        let message_id = event.envelope.message_id;
        if !self.loaded() {
            return self.skip(EventKind::Identify, message_id, SkipReason::WidgetUnavailable);
        }
        let Some(identity) = resolve(Some(event), ctx) else {
            return self.skip(EventKind::Identify, message_id, SkipReason::MissingIdentity);
        };

        let group_defaults = ctx.group_traits();
        let extracted = extract(&event.traits, group_defaults.as_ref());
        let company = extracted
            .company
            .map_or(CompanyUpdate::Keep, |company| CompanyUpdate::Merge(company.into_bag()));

        let input = SettingsInput {
            identity: &identity,
            identity_merge: IdentityMerge::Overwrite,
            created_at: extracted.created_at,
            user_traits: extracted.user_traits,
            options: event.options(&self.config.integration_name),
            company,
        };
        self.apply(EventKind::Identify, message_id, input);
        DispatchOutcome::Dispatched
    }

    fn group(&mut self, event: &GroupEvent, ctx: &IdentityContext) -> DispatchOutcome {
        let message_id = event.envelope.message_id;
        if !self.loaded() {
            return self.skip(EventKind::Group, message_id, SkipReason::WidgetUnavailable);
        }
        if !self.published {
            return self.skip(EventKind::Group, message_id, SkipReason::NotIdentified);
        }
        let identity = match self.resolve_from_context(EventKind::Group, message_id, ctx) {
            Ok(identity) => identity,
            Err(outcome) => return outcome,
        };

        let company = CompanyUpdate::Replace(company_from_group(event));
        let options = event.envelope.options(&self.config.integration_name);
        self.apply(
            EventKind::Group,
            message_id,
            identity_only(&identity, options, company),
        );
        DispatchOutcome::Dispatched
    }

    fn page(&mut self, event: &PageEvent, ctx: &IdentityContext) -> DispatchOutcome {
        let message_id = event.envelope.message_id;
        let identity = match self.resolve_from_context(EventKind::Page, message_id, ctx) {
            Ok(identity) => identity,
            Err(outcome) => return outcome,
        };

        let options = event.envelope.options(&self.config.integration_name);
        self.apply(
            EventKind::Page,
            message_id,
            identity_only(&identity, options, CompanyUpdate::Keep),
        );
        DispatchOutcome::Dispatched
    }

    fn track(&mut self, event: &TrackEvent, ctx: &IdentityContext) -> DispatchOutcome {
        let message_id = event.envelope.message_id;
        let identity = match self.resolve_from_context(EventKind::Track, message_id, ctx) {
            Ok(identity) => identity,
            Err(outcome) => return outcome,
        };

        let options = event.envelope.options(&self.config.integration_name);
        self.apply(
            EventKind::Track,
            message_id,
            identity_only(&identity, options, CompanyUpdate::Keep),
        );
        self.widget.track_named(&event.event);
        debug!(message_id = %message_id, event = %event.event, "ramen named event reported");
        DispatchOutcome::Dispatched
    }
}
