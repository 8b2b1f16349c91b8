//! End-to-end tests of the request workflow against recording fakes.

mod common;

use common::{AssertionHeaders, TestHarness, HOST, REMOTE_COUNT_DIR, REMOTE_DATA_DIR};
use serde_json::json;

use easyscan::db::request_repo;
use easyscan::db::transfer_repo::{self, TransferOutcome};
use easyscan::workflow::{
    CitationForm, Page, Response, WorkflowState, CONFIRMATION_PATH, INFO_PATH, REQUEST_PATH,
};

fn form(chapter: &str, pages: &str) -> CitationForm {
    CitationForm {
        article_chapter_title: chapter.to_string(),
        page_range: pages.to_string(),
    }
}

fn redirect(response: &Response) -> &str {
    response
        .redirect_target()
        .unwrap_or_else(|| panic!("expected redirect, got {response:?}"))
}

// ============================================================================
// Arrival and item identification
// ============================================================================

#[tokio::test]
async fn test_arrival_without_item_shows_info() {
    let h = TestHarness::new();
    let response = h.workflow.request_get(&h.ctx("s1")).await;
    assert_eq!(redirect(&response), INFO_PATH);
    assert_eq!(h.workflow.state("s1"), WorkflowState::Anonymous);
}

#[tokio::test]
async fn test_empty_barcode_shows_info_not_form() {
    let h = TestHarness::new();
    h.titles.insert("b1234567", "Looked Up");

    let ctx = h
        .ctx("s1")
        .with_query("barcode", "")
        .with_query("bibnum", "b1234567");
    let response = h.workflow.request_get(&ctx).await;

    assert_eq!(redirect(&response), INFO_PATH);
    assert_eq!(h.workflow.state("s1"), WorkflowState::ItemPending);
}

#[tokio::test]
async fn test_plain_http_is_redirected_to_https() {
    let h = TestHarness::new();
    let ctx = h
        .ctx("s1")
        .with_secure(false)
        .with_full_path("/easyscan/request/?barcode=B1")
        .with_query("barcode", "B1");

    let response = h.workflow.request_get(&ctx).await;

    assert_eq!(
        redirect(&response),
        format!("https://{}/easyscan/request/?barcode=B1", HOST)
    );
    assert!(h.session("s1").is_none());
}

#[tokio::test]
async fn test_plain_http_allowed_on_local_host() {
    let h = TestHarness::new();
    let ctx = easyscan::RequestContext::new("s1", "127.0.0.1:8000").with_query("barcode", "B1");
    let response = h.workflow.request_get(&ctx).await;
    assert!(matches!(response.page(), Some(Page::Login { .. })));
}

#[tokio::test]
async fn test_unauthenticated_arrival_shows_login() {
    let h = TestHarness::new();
    let ctx = h
        .ctx("s1")
        .with_query("barcode", "B1")
        .with_query("title", "Foo")
        .with_query("callnumber", "QA76 .F6")
        .with_query("volume_year", "v.2 2001");

    let response = h.workflow.request_get(&ctx).await;

    match response.page() {
        Some(Page::Login { item }) => {
            assert_eq!(item.barcode, "B1");
            assert_eq!(item.title, "Foo");
            assert_eq!(item.callnumber, "QA76 .F6");
            assert_eq!(item.volume_year, "v.2 2001");
            assert!(!item.login_error);
        }
        other => panic!("expected login page, got {other:?}"),
    }
    assert_eq!(
        h.workflow.state("s1"),
        WorkflowState::ItemIdentifiedUnauthenticated
    );
}

#[tokio::test]
async fn test_session_item_carries_over_and_new_query_updates_it() {
    let h = TestHarness::new();
    h.workflow
        .request_get(&h.ctx("s1").with_query("barcode", "B1").with_query("title", "Foo"))
        .await;

    // Revisit without parameters: item comes from the session.
    let response = h.workflow.request_get(&h.ctx("s1")).await;
    match response.page() {
        Some(Page::Login { item }) => {
            assert_eq!(item.barcode, "B1");
            assert_eq!(item.title, "Foo");
        }
        other => panic!("expected login page, got {other:?}"),
    }

    h.workflow
        .request_get(&h.ctx("s1").with_query("barcode", "B2").with_query("title", "Bar"))
        .await;
    let state = h.session("s1").unwrap();
    assert_eq!(state.barcode(), Some("B2"));
    assert_eq!(state.item().unwrap().title, "Bar");
}

// ============================================================================
// Title lookup
// ============================================================================

#[tokio::test]
async fn test_title_looked_up_by_bibnum() {
    let h = TestHarness::new();
    h.titles.insert("b1234567", "Zen and the Art");

    let ctx = h
        .ctx("s1")
        .with_query("barcode", "B1")
        .with_query("title", "null")
        .with_query("bibnum", "b1234567");
    h.workflow.request_get(&ctx).await;

    assert_eq!(h.titles.calls(), vec!["b1234567".to_string()]);
    assert_eq!(h.session("s1").unwrap().item().unwrap().title, "Zen and the Art");
}

#[tokio::test]
async fn test_failed_title_lookup_yields_empty_title() {
    let h = TestHarness::new();
    let ctx = h
        .ctx("s1")
        .with_query("barcode", "B1")
        .with_query("bibnum", "b7654321");

    let response = h.workflow.request_get(&ctx).await;

    assert!(matches!(response.page(), Some(Page::Login { .. })));
    assert_eq!(h.titles.calls().len(), 1);
    assert_eq!(h.session("s1").unwrap().item().unwrap().title, "");
}

#[tokio::test]
async fn test_no_lookup_for_short_bibnum_or_known_title() {
    let h = TestHarness::new();
    h.workflow
        .request_get(&h.ctx("s1").with_query("barcode", "B1").with_query("bibnum", "b123"))
        .await;
    h.workflow
        .request_get(
            &h.ctx("s2")
                .with_query("barcode", "B1")
                .with_query("title", "Given")
                .with_query("bibnum", "b1234567"),
        )
        .await;
    assert!(h.titles.calls().is_empty());
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_valid_login_shows_form() {
    let h = TestHarness::new();
    let response = h.sign_in_with_item("s1", "B1").await;

    match response.page() {
        Some(Page::RequestForm(page)) => {
            assert_eq!(page.patron_name, "Jane Doe");
            assert_eq!(page.item.barcode, "B1");
            assert!(page.errors.is_empty());
            assert!(!page.item.login_error);
        }
        other => panic!("expected form, got {other:?}"),
    }
    assert_eq!(
        h.workflow.state("s1"),
        WorkflowState::ItemIdentifiedAuthenticated
    );
    let state = h.session("s1").unwrap();
    assert_eq!(state.user().unwrap().email(), "jdoe@inst.edu");
}

#[tokio::test]
async fn test_login_callback_redirects_to_request_page() {
    let h = TestHarness::new();
    let mut ctx = h.ctx("s1");
    ctx.headers = AssertionHeaders::valid().build();
    let response = h.workflow.login_callback(&ctx);
    assert_eq!(redirect(&response), format!("https://{}{}", HOST, REQUEST_PATH));
}

#[tokio::test]
async fn test_rejected_login_shows_error_on_login_page() {
    let h = TestHarness::new();
    h.workflow
        .request_get(&h.ctx("s1").with_query("barcode", "B1"))
        .await;

    let mut ctx = h.ctx("s1");
    ctx.headers = AssertionHeaders::valid()
        .with("eppn", "jdoe@other.edu")
        .build();
    h.workflow.login_callback(&ctx);

    let response = h.workflow.request_get(&h.ctx("s1")).await;
    match response.page() {
        Some(Page::Login { item }) => assert!(item.login_error),
        other => panic!("expected login page, got {other:?}"),
    }
    assert!(!h.session("s1").unwrap().is_authorized());
}

#[tokio::test]
async fn test_missing_attribute_rejects_login() {
    let h = TestHarness::new();
    for attribute in ["givenName", "sn", "mail", "patronBarcode", "isMemberOf"] {
        let session = format!("s-{attribute}");
        let mut ctx = h.ctx(&session);
        ctx.headers = AssertionHeaders::valid().without(attribute).build();
        h.workflow.login_callback(&ctx);
        assert!(
            !h.session(&session).unwrap().is_authorized(),
            "{attribute} missing should reject"
        );
    }
}

#[tokio::test]
async fn test_login_post_goes_to_sso() {
    let h = TestHarness::new();
    assert_eq!(redirect(&h.workflow.login_post()), "https://sso.inst.edu/login");
}

#[tokio::test]
async fn test_test_assertion_only_on_local_debug_host() {
    let assertion = json!({
        "eppn": "dev@inst.edu",
        "firstname": "Dev",
        "lastname": "User",
        "email": "dev@inst.edu",
        "patron_barcode": "999",
        "member_of": "ERES_OK"
    });
    let h = TestHarness::with_config(|b| b.debug(true).test_assertion(assertion));

    let local = easyscan::RequestContext::new("local", "127.0.0.1:8000");
    h.workflow.login_callback(&local);
    assert_eq!(h.session("local").unwrap().user().unwrap().name(), "Dev User");

    h.workflow.login_callback(&h.ctx("public"));
    assert!(!h.session("public").unwrap().is_authorized());
}

// ============================================================================
// Submission
// ============================================================================

#[tokio::test]
async fn test_invalid_form_is_kept_and_redisplayed() {
    let h = TestHarness::new();
    h.sign_in_with_item("s1", "B1").await;

    let response = h.workflow.request_post(&h.ctx("s1"), form("Ch. 1", "")).await;
    assert_eq!(redirect(&response), REQUEST_PATH);
    assert_eq!(request_repo::recent(&h.db, 10).unwrap().len(), 0);

    let response = h.workflow.request_get(&h.ctx("s1")).await;
    match response.page() {
        Some(Page::RequestForm(page)) => {
            assert_eq!(page.form.article_chapter_title, "Ch. 1");
            assert_eq!(page.errors.len(), 1);
            assert_eq!(page.errors[0].field, "page_range");
        }
        other => panic!("expected form, got {other:?}"),
    }
}

#[tokio::test]
async fn test_post_without_session_redirects_to_info() {
    let h = TestHarness::new();
    let response = h.workflow.request_post(&h.ctx("nobody"), form("", "1-2")).await;
    assert_eq!(redirect(&response), INFO_PATH);
    assert!(h.transport.puts().is_empty());
}

#[tokio::test]
async fn test_post_without_authorization_returns_to_request_page() {
    let h = TestHarness::new();
    h.workflow
        .request_get(&h.ctx("s1").with_query("barcode", "B1"))
        .await;
    let response = h.workflow.request_post(&h.ctx("s1"), form("", "1-2")).await;
    assert_eq!(redirect(&response), REQUEST_PATH);
    assert_eq!(request_repo::recent(&h.db, 10).unwrap().len(), 0);
}

#[tokio::test]
async fn test_full_request_flow() {
    let h = TestHarness::new();
    h.sign_in_with_item("s1", "B1").await;

    let ctx = h.ctx("s1").with_referrer("https://catalog.inst.edu/record=b1234567");
    let response = h.workflow.request_post(&ctx, form("Bar", "5-10")).await;
    assert_eq!(redirect(&response), CONFIRMATION_PATH);
    assert_eq!(h.workflow.state("s1"), WorkflowState::Submitted);

    // Record
    let records = request_repo::recent(&h.db, 10).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.item().barcode, "B1");
    assert_eq!(record.item().title, "Foo");
    assert_eq!(record.item().chapter_title, "Bar");
    assert_eq!(record.item().page_range, "5-10");
    assert_eq!(record.item().source_url, "https://catalog.inst.edu/record=b1234567");
    assert_eq!(record.patron().name(), "Jane Doe");
    assert_eq!(record.patron().email(), "jdoe@inst.edu");
    assert!(record
        .export_line()
        .ends_with("\"eml, jdoe@inst.edu -- artcl-chptr-ttl, Bar -- pg-rng, 5-10\""));

    // Transfer: data first, then count, then staging emptied
    let puts = h.transport.puts();
    assert_eq!(puts.len(), 2);
    assert!(puts[0].file_name.ends_with(".dat"));
    assert_eq!(puts[0].remote_dir, REMOTE_DATA_DIR);
    assert_eq!(puts[0].content, format!("{}\n", record.export_line()));
    assert!(puts[1].file_name.ends_with(".cnt"));
    assert_eq!(puts[1].remote_dir, REMOTE_COUNT_DIR);
    assert_eq!(puts[1].content, "1\n");
    assert!(h.staged_files().is_empty());
    assert_eq!(h.transport.sessions(), (1, 1));

    let attempts = transfer_repo::attempts_for(&h.db, record.id()).unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, TransferOutcome::Sent);

    // Email
    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "jdoe@inst.edu");
    assert!(sent[0]
        .body
        .contains(&format!("reference easyscan request #{}.", record.id())));

    // First confirmation visit signs out through SSO and comes back
    let response = h.workflow.confirmation(&h.ctx("s1"));
    let target = redirect(&response);
    assert!(target.starts_with("https://sso.inst.edu/logout?return="));
    assert!(target.contains("library.inst.edu%2Feasyscan%2Fconfirmation%2F"));
    assert_eq!(h.workflow.state("s1"), WorkflowState::Confirmed);

    // Second visit renders the confirmation and ends the session
    let response = h.workflow.confirmation(&h.ctx("s1"));
    match response.page() {
        Some(Page::Confirmation(page)) => {
            assert_eq!(page.barcode, "B1");
            assert_eq!(page.chap_vol_title, "Bar");
            assert_eq!(page.page_range, "5-10");
            assert_eq!(page.email, "jdoe@inst.edu");
            assert_eq!(page.request_id, Some(record.id()));
            assert_eq!(page.help.email, "help@inst.edu");
        }
        other => panic!("expected confirmation, got {other:?}"),
    }
    assert!(h.session("s1").is_none());

    // A third visit has nothing to confirm
    let response = h.workflow.confirmation(&h.ctx("s1"));
    assert_eq!(redirect(&response), format!("https://{}{}", HOST, INFO_PATH));
}

#[tokio::test]
async fn test_duplicate_submission_creates_second_record() {
    let h = TestHarness::new();
    h.sign_in_with_item("s1", "B1").await;

    h.workflow.request_post(&h.ctx("s1"), form("", "1-2")).await;
    h.workflow.request_post(&h.ctx("s1"), form("", "3-4")).await;

    assert_eq!(request_repo::recent(&h.db, 10).unwrap().len(), 2);
    assert_eq!(h.transport.puts().len(), 4);
    assert!(h.staged_files().is_empty());
}

#[tokio::test]
async fn test_transfer_failure_keeps_record_and_staged_pair() {
    let h = TestHarness::new();
    h.transport.fail_open(true);
    h.sign_in_with_item("s1", "B1").await;

    let response = h.workflow.request_post(&h.ctx("s1"), form("", "1-2")).await;

    assert_eq!(redirect(&response), CONFIRMATION_PATH);
    let records = request_repo::recent(&h.db, 10).unwrap();
    assert_eq!(records.len(), 1);

    let staged = h.staged_files();
    assert_eq!(staged.len(), 2);
    assert!(staged.iter().any(|f| f.ends_with(".dat")));
    assert!(staged.iter().any(|f| f.ends_with(".cnt")));

    let attempts = transfer_repo::attempts_for(&h.db, records[0].id()).unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].outcome, TransferOutcome::Failed);
    assert!(attempts[0].detail.as_deref().unwrap().contains("connection refused"));

    assert_eq!(h.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_dirty_staging_blocks_transfer_but_not_record() {
    let h = TestHarness::new();
    std::fs::write(h.staging_dir.join("leftover.dat"), "old\n").unwrap();
    h.sign_in_with_item("s1", "B1").await;

    let response = h.workflow.request_post(&h.ctx("s1"), form("", "1-2")).await;

    assert_eq!(redirect(&response), CONFIRMATION_PATH);
    assert_eq!(request_repo::recent(&h.db, 10).unwrap().len(), 1);
    assert!(h.transport.puts().is_empty());
    assert_eq!(h.staged_files(), vec!["leftover.dat".to_string()]);
}

#[tokio::test]
async fn test_mail_failure_does_not_affect_response() {
    let h = TestHarness::new();
    h.mailer.fail(true);
    h.sign_in_with_item("s1", "B1").await;

    let response = h.workflow.request_post(&h.ctx("s1"), form("", "1-2")).await;

    assert_eq!(redirect(&response), CONFIRMATION_PATH);
    assert_eq!(h.transport.puts().len(), 2);
    assert!(h.mailer.sent().is_empty());
}

// ============================================================================
// Confirmation and logout
// ============================================================================

#[tokio::test]
async fn test_confirmation_without_session_redirects_to_info() {
    let h = TestHarness::new();
    let response = h.workflow.confirmation(&h.ctx("nobody"));
    assert_eq!(redirect(&response), format!("https://{}{}", HOST, INFO_PATH));
}

#[tokio::test]
async fn test_confirmation_on_local_debug_host_skips_sso() {
    let h = TestHarness::with_config(|b| b.debug(true));
    let local = |id: &str| {
        let mut ctx = easyscan::RequestContext::new(id, "127.0.0.1");
        ctx.headers = AssertionHeaders::valid().build();
        ctx
    };
    h.workflow
        .request_get(&local("s1").with_query("barcode", "B1"))
        .await;
    h.workflow.login_callback(&local("s1"));
    h.workflow.request_post(&local("s1"), form("", "1-2")).await;

    let response = h.workflow.confirmation(&local("s1"));
    assert_eq!(redirect(&response), CONFIRMATION_PATH);
    let response = h.workflow.confirmation(&local("s1"));
    assert!(matches!(response.page(), Some(Page::Confirmation(_))));
}

#[tokio::test]
async fn test_logout_clears_session_and_signs_out() {
    let h = TestHarness::new();
    h.sign_in_with_item("s1", "B1").await;

    let response = h.workflow.logout(&h.ctx("s1"));

    let target = redirect(&response);
    assert!(target.starts_with("https://sso.inst.edu/logout?return="));
    assert!(target.contains("%2Feasyscan%2Frequest%2F"));
    assert!(h.session("s1").is_none());
    assert_eq!(h.workflow.state("s1"), WorkflowState::Anonymous);
}

#[tokio::test]
async fn test_info_page_has_help_contacts() {
    let h = TestHarness::new();
    match h.workflow.info().page() {
        Some(Page::Info { help }) => {
            assert_eq!(help.email, "help@inst.edu");
            assert_eq!(help.phone, "555-0100");
        }
        other => panic!("expected info page, got {other:?}"),
    }
}
