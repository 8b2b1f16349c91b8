//! The scan request workflow.
//!
//! Handlers are framework-agnostic: each takes a [`RequestContext`], reads
//! the session fresh from the store, writes it back before returning, and
//! yields a [`Response`] for the host application to turn into HTTP.

pub mod context;
pub mod error;
pub mod form;
pub mod page;

use std::sync::Arc;

use chrono::Local;
use reqwest::Url;

use crate::config::{Config, EmailConfig, IdentityConfig, SsoConfig};
use crate::db::{request_repo, Database};
use crate::identity::{IdentityAssertion, IdentityEvaluator};
use crate::lookup::{is_bib_id, TitleLookup, TitleSource};
use crate::notify::{confirmation_message, Mailer, SendmailMailer};
use crate::record::{ItemFields, NewScanRequest, PatronFields, ScanRequestRecord};
use crate::sanitize::{redact_barcode, short_session_id};
use crate::session::{MemorySessionStore, SessionState, SessionStore};
use crate::transfer::Dispatcher;

pub use context::RequestContext;
pub use error::WorkflowError;
pub use form::{CitationForm, FormError};
pub use page::{ConfirmationPage, HelpContact, ItemSummary, Page, RequestFormPage, Response};

pub const INFO_PATH: &str = "/easyscan/info/";
pub const REQUEST_PATH: &str = "/easyscan/request/";
pub const CONFIRMATION_PATH: &str = "/easyscan/confirmation/";
pub const LOGIN_PATH: &str = "/easyscan/login/";
pub const LOGOUT_PATH: &str = "/easyscan/logout/";

/// Where a session stands in the request flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    /// No session.
    Anonymous,
    /// Session without an item barcode.
    ItemPending,
    ItemIdentifiedUnauthenticated,
    ItemIdentifiedAuthenticated,
    /// A record was created and the patron is still signed in.
    Submitted,
    /// A record was created and sign-off has happened.
    Confirmed,
}

impl WorkflowState {
    pub fn of(session: Option<&SessionState>) -> Self {
        let Some(state) = session else {
            return WorkflowState::Anonymous;
        };
        if state.barcode().is_none() {
            return WorkflowState::ItemPending;
        }
        match (state.submitted.is_some(), state.is_authorized()) {
            (true, true) => WorkflowState::Submitted,
            (true, false) => WorkflowState::Confirmed,
            (false, true) => WorkflowState::ItemIdentifiedAuthenticated,
            (false, false) => WorkflowState::ItemIdentifiedUnauthenticated,
        }
    }
}

/// Collaborators the workflow talks to.
pub struct WorkflowServices {
    pub sessions: Arc<dyn SessionStore>,
    pub titles: Arc<dyn TitleSource>,
    pub db: Database,
    pub dispatcher: Arc<Dispatcher>,
    pub mailer: Arc<dyn Mailer>,
}

impl WorkflowServices {
    /// Production collaborators built from configuration.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let db = Database::open(&config.database.resolved_path())?;
        let dispatcher = Dispatcher::from_config(config, db.clone());

        Ok(Self {
            sessions: Arc::new(MemorySessionStore::from_config(&config.session)),
            titles: Arc::new(TitleLookup::new(&config.lookup)?),
            db,
            dispatcher: Arc::new(dispatcher),
            mailer: Arc::new(SendmailMailer::new(&config.email.sendmail_path)),
        })
    }
}

pub struct Workflow {
    debug: bool,
    identity: IdentityConfig,
    email: EmailConfig,
    sso: SsoConfig,
    logout_root: Url,
    evaluator: IdentityEvaluator,
    services: WorkflowServices,
}

impl Workflow {
    pub fn new(config: &Config, services: WorkflowServices) -> Result<Self, WorkflowError> {
        let logout_root =
            Url::parse(&config.sso.logout_url_root).map_err(|e| WorkflowError::InvalidUrl {
                url: config.sso.logout_url_root.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            debug: config.debug,
            identity: config.identity.clone(),
            email: config.email.clone(),
            sso: config.sso.clone(),
            logout_root,
            evaluator: IdentityEvaluator::from_config(&config.identity),
            services,
        })
    }

    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let services = WorkflowServices::from_config(config)?;
        Ok(Self::new(config, services)?)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.services.dispatcher
    }

    pub fn state(&self, session_id: &str) -> WorkflowState {
        WorkflowState::of(self.services.sessions.load(session_id).as_ref())
    }

    fn help(&self) -> HelpContact {
        HelpContact {
            email: self.email.help_email.clone(),
            phone: self.email.help_phone.clone(),
        }
    }

    /// Development conveniences apply only to debug mode on a loopback host.
    fn local_debug(&self, ctx: &RequestContext) -> bool {
        self.debug && ctx.is_local()
    }

    fn sso_logout_url(&self, return_to: &str) -> String {
        let mut url = self.logout_root.clone();
        url.query_pairs_mut().append_pair("return", return_to);
        url.to_string()
    }

    fn https_redirect(&self, ctx: &RequestContext) -> Option<String> {
        if ctx.secure || ctx.is_local() {
            return None;
        }
        Some(format!("https://{}{}", ctx.host, ctx.full_path))
    }

    pub fn info(&self) -> Response {
        Response::Render(Page::Info { help: self.help() })
    }

    /// Request page. Shows the login prompt or the citation form for the
    /// item named by the query or carried in the session.
    #[tracing::instrument(skip_all, fields(session = %short_session_id(&ctx.session_id)))]
    pub async fn request_get(&self, ctx: &RequestContext) -> Response {
        if let Some(target) = self.https_redirect(ctx) {
            tracing::debug!("Redirecting to https");
            return Response::Redirect(target);
        }

        let mut state = self
            .services
            .sessions
            .load(&ctx.session_id)
            .unwrap_or_default();

        if ctx.query_param("barcode").is_empty()
            && ctx.query_param("bibnum").is_empty()
            && state.barcode().is_none()
        {
            tracing::info!("Request page reached without an item; showing info page");
            return Response::redirect(INFO_PATH);
        }

        let title = self.resolve_title(ctx, &state).await;
        state.initialize();
        if let Some(item) = state.item_info.as_mut() {
            for (key, slot) in [
                ("callnumber", &mut item.callnumber),
                ("barcode", &mut item.barcode),
                ("volume_year", &mut item.volume_year),
            ] {
                let value = ctx.query_param(key);
                if !value.is_empty() {
                    *slot = value.to_string();
                }
            }
            item.title = title;
        }
        self.services.sessions.save(&ctx.session_id, state.clone());

        let Some(item) = state.item().filter(|item| item.has_barcode()) else {
            return Response::redirect(INFO_PATH);
        };
        let summary = ItemSummary::new(item, state.login_error.unwrap_or(false));

        match state.user() {
            None => Response::Render(Page::Login { item: summary }),
            Some(user) => {
                let form = state.form_data.clone().unwrap_or_default();
                let errors = if state.form_data.is_some() {
                    form.errors()
                } else {
                    Vec::new()
                };
                Response::Render(Page::RequestForm(RequestFormPage {
                    item: summary,
                    patron_name: user.name().to_string(),
                    logout_url: LOGOUT_PATH.to_string(),
                    form,
                    errors,
                }))
            }
        }
    }

    /// Title from the query, then the session, then the catalog when a
    /// bibliographic id is given. Lookup failures yield an empty title.
    async fn resolve_title(&self, ctx: &RequestContext, state: &SessionState) -> String {
        let usable = |t: &str| !t.is_empty() && t != "null";

        let from_query = ctx.query_param("title");
        if usable(from_query) {
            return from_query.to_string();
        }
        if let Some(item) = state.item().filter(|item| usable(&item.title)) {
            return item.title.clone();
        }

        let bibnum = ctx.query_param("bibnum");
        if !is_bib_id(bibnum) {
            return String::new();
        }
        match self.services.titles.title(bibnum).await {
            Ok(title) => title,
            Err(e) => {
                tracing::warn!(bibnum, error = %e, "Title lookup failed; using empty title");
                String::new()
            }
        }
    }

    /// Citation form submission. A valid form from an authorized session
    /// creates the record, ships it, and emails the patron.
    #[tracing::instrument(skip_all, fields(session = %short_session_id(&ctx.session_id)))]
    pub async fn request_post(&self, ctx: &RequestContext, form: CitationForm) -> Response {
        let Some(mut state) = self.services.sessions.load(&ctx.session_id) else {
            tracing::info!("Form posted without a session");
            return Response::redirect(INFO_PATH);
        };
        if state.barcode().is_none() {
            return Response::redirect(INFO_PATH);
        }
        let Some(user) = state.user().cloned() else {
            tracing::info!("Form posted by an unauthorized session");
            return Response::redirect(REQUEST_PATH);
        };

        if let Err(e) = form.validate() {
            tracing::debug!(error = %e, "Posted form invalid");
            state.form_data = Some(form);
            self.services.sessions.save(&ctx.session_id, state);
            return Response::redirect(REQUEST_PATH);
        }

        let Some(item_info) = state.item_info.as_mut() else {
            return Response::redirect(INFO_PATH);
        };
        item_info.article_chapter_title = form.article_chapter_title.trim().to_string();
        item_info.page_range = form.page_range.trim().to_string();
        let item = ItemFields {
            title: item_info.title.clone(),
            barcode: item_info.barcode.clone(),
            callnumber: item_info.callnumber.clone(),
            volume_year: item_info.volume_year.clone(),
            chapter_title: item_info.article_chapter_title.clone(),
            page_range: item_info.page_range.clone(),
            source_url: ctx
                .referrer
                .clone()
                .unwrap_or_else(|| "not_in_request_meta".to_string()),
        };
        state.form_data = None;

        let record = match self.create_record(NewScanRequest::new(item, PatronFields::from(&user))) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create scan request");
                self.services.sessions.save(&ctx.session_id, state);
                return Response::Render(Page::SubmissionFailed { help: self.help() });
            }
        };
        tracing::info!(
            request_id = record.id(),
            patron = %redact_barcode(user.patron_barcode()),
            "Scan request created"
        );

        state.submitted = Some(record.id());
        self.services.sessions.save(&ctx.session_id, state);

        // The record stays whatever happens to the transfer.
        if let Err(e) = self.services.dispatcher.dispatch(&record).await {
            tracing::error!(
                request_id = record.id(),
                error = %e,
                "Transfer failed; record kept for operator resend"
            );
        }

        if let Err(e) = self
            .services
            .mailer
            .send(&confirmation_message(&record, &self.email))
            .await
        {
            tracing::warn!(request_id = record.id(), error = %e, "Confirmation email not sent");
        }

        Response::redirect(CONFIRMATION_PATH)
    }

    fn create_record(&self, request: NewScanRequest) -> Result<ScanRequestRecord, WorkflowError> {
        let prepared = request.prepare(Local::now())?;
        Ok(request_repo::insert(&self.services.db, prepared)?)
    }

    /// Login button. Sends the patron to the identity provider, forcing a
    /// fresh authentication.
    pub fn login_post(&self) -> Response {
        Response::redirect(self.sso.login_url.clone())
    }

    /// Return from the identity provider. Evaluates the asserted identity
    /// and sends the patron back to the request page.
    #[tracing::instrument(skip_all, fields(session = %short_session_id(&ctx.session_id)))]
    pub fn login_callback(&self, ctx: &RequestContext) -> Response {
        let mut state = self
            .services
            .sessions
            .load(&ctx.session_id)
            .unwrap_or_default();
        state.initialize();

        let assertion =
            IdentityAssertion::extract(&ctx.headers, &self.identity, self.local_debug(ctx));
        match self.evaluator.authorize(&assertion) {
            Some(user) => {
                tracing::info!("Identity accepted");
                state.grant(user);
                state.login_error = Some(false);
            }
            None => {
                tracing::info!("Identity rejected");
                state.revoke();
                state.login_error = Some(true);
            }
        }
        self.services.sessions.save(&ctx.session_id, state);

        Response::Redirect(ctx.absolute_url(REQUEST_PATH))
    }

    /// Confirmation page, visited twice. The first visit, still authorized,
    /// drops authorization and signs the patron out at the identity
    /// provider, which returns here. The second visit renders the
    /// confirmation and ends the session.
    #[tracing::instrument(skip_all, fields(session = %short_session_id(&ctx.session_id)))]
    pub fn confirmation(&self, ctx: &RequestContext) -> Response {
        let state = self
            .services
            .sessions
            .load(&ctx.session_id)
            .filter(|state| state.item().is_some());
        let Some(mut state) = state else {
            return Response::Redirect(ctx.absolute_url(INFO_PATH));
        };

        if state.is_authorized() {
            state.revoke();
            self.services.sessions.save(&ctx.session_id, state);
            if self.local_debug(ctx) {
                return Response::redirect(CONFIRMATION_PATH);
            }
            return Response::Redirect(
                self.sso_logout_url(&ctx.absolute_url(CONFIRMATION_PATH)),
            );
        }

        let item = state.item_info.clone().unwrap_or_default();
        let page = ConfirmationPage {
            title: item.title,
            callnumber: item.callnumber,
            barcode: item.barcode,
            chap_vol_title: item.article_chapter_title,
            page_range: item.page_range,
            volume_year: item.volume_year,
            email: state
                .last_user()
                .map(|user| user.email().to_string())
                .unwrap_or_default(),
            request_id: state.submitted,
            help: self.help(),
        };
        self.services.sessions.remove(&ctx.session_id);
        tracing::info!(request_id = ?page.request_id, "Confirmation shown; session ended");
        Response::Render(Page::Confirmation(page))
    }

    /// Ends the session and signs out at the identity provider, returning
    /// to the request page.
    #[tracing::instrument(skip_all, fields(session = %short_session_id(&ctx.session_id)))]
    pub fn logout(&self, ctx: &RequestContext) -> Response {
        self.services.sessions.remove(&ctx.session_id);
        let target = ctx.absolute_url(REQUEST_PATH);
        if self.local_debug(ctx) {
            return Response::Redirect(target);
        }
        Response::Redirect(self.sso_logout_url(&target))
    }
}
