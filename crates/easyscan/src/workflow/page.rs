//! Handler results. Rendering is the host application's job; pages carry
//! only the data their templates need.

use serde::Serialize;

use super::form::{CitationForm, FormError};
use crate::session::ItemInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelpContact {
    pub email: String,
    pub phone: String,
}

/// Item summary shown above the login prompt and the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    pub title: String,
    pub callnumber: String,
    pub barcode: String,
    pub volume_year: String,
    pub login_error: bool,
}

impl ItemSummary {
    pub(crate) fn new(item: &ItemInfo, login_error: bool) -> Self {
        Self {
            title: item.title.clone(),
            callnumber: item.callnumber.clone(),
            barcode: item.barcode.clone(),
            volume_year: item.volume_year.clone(),
            login_error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestFormPage {
    pub item: ItemSummary,
    pub patron_name: String,
    pub logout_url: String,
    pub form: CitationForm,
    pub errors: Vec<FormError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationPage {
    pub title: String,
    pub callnumber: String,
    pub barcode: String,
    pub chap_vol_title: String,
    pub page_range: String,
    pub volume_year: String,
    pub email: String,
    pub request_id: Option<i64>,
    pub help: HelpContact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum Page {
    Info { help: HelpContact },
    Login { item: ItemSummary },
    RequestForm(RequestFormPage),
    Confirmation(ConfirmationPage),
    /// The request could not be stored; nothing was sent.
    SubmissionFailed { help: HelpContact },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum Response {
    Render(Page),
    Redirect(String),
}

impl Response {
    pub fn redirect(target: impl Into<String>) -> Self {
        Response::Redirect(target.into())
    }

    pub fn page(&self) -> Option<&Page> {
        match self {
            Response::Render(page) => Some(page),
            Response::Redirect(_) => None,
        }
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Response::Redirect(target) => Some(target),
            Response::Render(_) => None,
        }
    }
}
