//! Authorization evaluator.
//!
//! Runs under the read lock and decides one [`Authorization`] tuple,
//! recording the deciding branch of every store lookup in the audit trail.

use std::collections::BTreeSet;

use soma_msg::{AuditTrail, Authorization, Category, SubjectKind};
use tracing::{debug, warn};

use super::data::CacheData;
use super::grants::Scope;
use super::scope::{self, Target};

/// Well-known id of the omnipotence permission, used when the cache holds
/// no permission of that name.
pub const OMNIPOTENCE_ID: &str = "00000000-0000-0000-0000-000000000000";

pub const AUTHORIZE_KEY: &str = "permCache/authorize";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Permit,
    Deny,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Permit => "permit",
            Self::Deny => "deny",
        }
    }
}

/// Verdict plus the audit fields written while reaching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub audit: AuditTrail,
}

impl Decision {
    #[must_use]
    pub fn is_permitted(&self) -> bool {
        self.verdict == Verdict::Permit
    }
}

struct Evaluation<'a> {
    data: &'a CacheData,
    audit: AuditTrail,
}

impl Evaluation<'_> {
    fn finish(mut self, verdict: Verdict, reason: &str) -> Decision {
        self.audit.record(AUTHORIZE_KEY, reason);
        Decision {
            verdict,
            audit: self.audit,
        }
    }

    fn assess(
        &mut self,
        scope: Scope,
        subject: (SubjectKind, &str),
        category: Category,
        object: Option<&str>,
        permission_id: &str,
        any: bool,
    ) -> bool {
        let outcome = self.data.grants().store(scope).assess(
            subject.0.as_str(),
            subject.1,
            category,
            object,
            permission_id,
            any,
        );
        self.audit.record(scope.audit_key(), outcome.as_str());
        outcome.is_granted()
    }

    /// Looks for a grant of any candidate permission on the target, then on
    /// its fallback object.
    fn assess_candidates(
        &mut self,
        subject: (SubjectKind, &str),
        category: Category,
        candidates: &BTreeSet<String>,
        target: &Target,
        any: bool,
    ) -> bool {
        let objects = [target.object.as_deref(), target.fallback.as_deref()];
        for permission_id in candidates {
            for (idx, object) in objects.iter().enumerate() {
                // The fallback is only consulted when it names an object.
                if idx > 0 && object.is_none() {
                    continue;
                }
                if self.assess(target.scope, subject, category, *object, permission_id, any) {
                    return true;
                }
            }
        }
        false
    }
}

/// Decides whether `auth.subject` may perform `auth.section`/`auth.action`.
#[must_use]
pub fn evaluate(data: &CacheData, auth: &Authorization) -> Decision {
    let mut eval = Evaluation {
        data,
        audit: AuditTrail::default(),
    };

    let kind = SubjectKind::from_user_name(&auth.subject);
    let Some(subject) = data.users().get_by_name(&auth.subject) else {
        debug!(subject = %auth.subject, "unknown subject");
        return eval.finish(Verdict::Deny, "UnknownSubject");
    };
    if subject.kind != kind {
        return eval.finish(Verdict::Deny, "InvalidSubjectType");
    }
    let who = (kind, subject.id.as_str());

    let omnipotence = data
        .permissions()
        .get_id_by_name(Category::Omnipotence, Category::Omnipotence.as_str())
        .unwrap_or(OMNIPOTENCE_ID);
    if eval.assess(Scope::Global, who, Category::Omnipotence, None, omnipotence, false) {
        debug!(subject = %auth.subject, "omnipotence granted");
        return eval.finish(Verdict::Permit, "OmnipotenceGranted");
    }

    let Some(section) = data.sections().get_section_by_name(auth.section.as_str()) else {
        return eval.finish(Verdict::Deny, "UnknownSection");
    };
    let Some(action) = data
        .sections()
        .get_action_by_name(&section.id, auth.action.as_str())
    else {
        return eval.finish(Verdict::Deny, "UnknownAction");
    };
    let category = section.category;

    let Some(system) = data
        .permissions()
        .get_id_by_name(Category::System, category.as_str())
    else {
        warn!(
            category = %category,
            "system permission missing for category, denying request"
        );
        return eval.finish(Verdict::Deny, "MissingSystemPermission");
    };
    if eval.assess(Scope::Global, who, Category::System, None, system, false) {
        debug!(subject = %auth.subject, category = %category, "system permission granted");
        return eval.finish(Verdict::Permit, "SystemPermissionGranted");
    }

    let candidates: BTreeSet<String> = data
        .permissions()
        .get_section_permission_ids(&section.id)
        .into_iter()
        .chain(
            data.permissions()
                .get_action_permission_ids(&section.id, &action.id),
        )
        .collect();
    if candidates.is_empty() {
        return eval.finish(Verdict::Deny, "NoMappedPermission");
    }

    let any = auth.action.is_collection_read();
    let target = scope::resolve(data, auth.section, &auth.objects);

    if eval.assess_candidates(who, category, &candidates, &target, any) {
        return eval.finish(Verdict::Permit, "SubjectGranted");
    }

    if !kind.inherits_team_rights() {
        return eval.finish(Verdict::Deny, "NoTeamInheritance");
    }
    let Some(team_id) = subject.team_id.as_deref() else {
        return eval.finish(Verdict::Deny, "NoTeam");
    };
    if eval.assess_candidates((SubjectKind::Team, team_id), category, &candidates, &target, any) {
        return eval.finish(Verdict::Permit, "TeamGranted");
    }

    eval.finish(Verdict::Deny, "NoGrant")
}
