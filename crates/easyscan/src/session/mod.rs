//! Per-browser session state for the request workflow.
//!
//! The state is owned by a [`SessionStore`]. Handlers load it at the start
//! of a request, modify their copy, and save it back before responding.

pub mod store;

use serde::Serialize;

use crate::identity::UserInfo;
use crate::workflow::CitationForm;

pub use store::{MemorySessionStore, SessionStore};

/// Item being requested. The barcode decides whether the visitor sees the
/// request flow or the informational page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemInfo {
    pub title: String,
    pub callnumber: String,
    pub barcode: String,
    pub volume_year: String,
    pub article_chapter_title: String,
    pub page_range: String,
}

impl ItemInfo {
    pub fn has_barcode(&self) -> bool {
        !self.barcode.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuthzInfo {
    pub authorized: bool,
}

/// Typed session contents. Absent keys are `None`; `Default` is a brand
/// new session.
///
/// Authorization and the patron identity change together: [`grant`] sets
/// both, [`revoke`] clears the flag. A revoked session keeps the user info
/// so the final confirmation page can show where the email went.
///
/// [`grant`]: SessionState::grant
/// [`revoke`]: SessionState::revoke
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub item_info: Option<ItemInfo>,
    authz_info: Option<AuthzInfo>,
    user_info: Option<UserInfo>,
    /// Unset until a login attempt has been evaluated.
    pub login_error: Option<bool>,
    /// Last rejected form submission, replayed when the form is shown again.
    pub form_data: Option<CitationForm>,
    /// Id of the record created by the last successful submission.
    pub submitted: Option<i64>,
}

impl SessionState {
    /// Fills in the keys the request page relies on, leaving existing
    /// values alone.
    pub fn initialize(&mut self) {
        self.item_info.get_or_insert_with(ItemInfo::default);
        self.authz_info.get_or_insert_with(AuthzInfo::default);
        self.login_error.get_or_insert(false);
    }

    pub fn item(&self) -> Option<&ItemInfo> {
        self.item_info.as_ref()
    }

    pub fn barcode(&self) -> Option<&str> {
        self.item_info
            .as_ref()
            .map(|item| item.barcode.as_str())
            .filter(|barcode| !barcode.is_empty())
    }

    pub fn is_authorized(&self) -> bool {
        self.authz_info.is_some_and(|authz| authz.authorized)
    }

    /// Patron identity, only while authorized.
    pub fn user(&self) -> Option<&UserInfo> {
        if self.is_authorized() {
            self.user_info.as_ref()
        } else {
            None
        }
    }

    /// Patron identity regardless of the authorization flag.
    pub fn last_user(&self) -> Option<&UserInfo> {
        self.user_info.as_ref()
    }

    pub fn grant(&mut self, user: UserInfo) {
        self.authz_info = Some(AuthzInfo { authorized: true });
        self.user_info = Some(user);
    }

    pub fn revoke(&mut self) {
        self.authz_info = Some(AuthzInfo { authorized: false });
    }
}
