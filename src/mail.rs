use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::export::DocumentRenderer;
use crate::model::InvoiceDraft;
use crate::render::RenderModel;

pub const RELAY_PATH: &str = "/api/send-invoice-email";
const GENERIC_FAILURE: &str = "Failed to send email";

/// JSON body accepted by the relay.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MailRequest {
    pub to_email: String,
    pub subject: String,
    pub body: String,
    pub pdf_base64: String,
    pub filename: String,
}

impl MailRequest {
    pub fn compose(draft: &InvoiceDraft, recipient: &str, pdf_base64: String) -> Self {
        let subject = format!("Invoice {} from {}", draft.invoice_number, draft.brand_name);
        let body = format!(
            "Dear {client},\n\nPlease find attached invoice {number}.\n\nTotal Amount: {total}\nDue Date: {due}\n\nThank you for your business!\n\nBest regards,\n{brand}",
            client = draft.client_name,
            number = draft.invoice_number,
            total = draft.money(draft.total()),
            due = draft.due_date.format("%Y-%m-%d"),
            brand = draft.brand_name,
        );
        MailRequest {
            to_email: recipient.trim().to_string(),
            subject,
            body,
            pdf_base64,
            filename: draft.pdf_filename(),
        }
    }
}

pub trait MailRelay {
    fn send(&self, request: &MailRequest) -> Result<()>;
}

/// Message to show for a rejected request: the relay's `detail`, if it sent one.
pub fn relay_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .filter(|detail| !detail.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

#[derive(Debug, Clone)]
pub struct HttpMailRelay {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpMailRelay {
    pub fn new(backend_url: &str) -> Self {
        HttpMailRelay {
            client: reqwest::blocking::Client::new(),
            endpoint: format!("{}{}", backend_url.trim_end_matches('/'), RELAY_PATH),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl MailRelay for HttpMailRelay {
    fn send(&self, request: &MailRequest) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .map_err(|e| {
                warn!(endpoint = %self.endpoint, error = %e, "mail relay unreachable");
                Error::Mail(GENERIC_FAILURE.to_string())
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        warn!(%status, %body, "mail relay rejected the request");
        Err(Error::Mail(relay_error_message(&body)))
    }
}

/// Clears the in-flight flag however the dispatch ends.
#[derive(Debug)]
pub struct SendingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Render, encode and send, one invoice at a time.
#[derive(Debug)]
pub struct Dispatcher<R, M> {
    renderer: R,
    relay: M,
    sending: AtomicBool,
}

impl<R: DocumentRenderer, M: MailRelay> Dispatcher<R, M> {
    pub fn new(renderer: R, relay: M) -> Self {
        Dispatcher {
            renderer,
            relay,
            sending: AtomicBool::new(false),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    pub fn try_begin(&self) -> Result<SendingGuard<'_>> {
        self.sending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SendInProgress)?;
        Ok(SendingGuard { flag: &self.sending })
    }

    pub fn dispatch(&self, draft: &InvoiceDraft, recipient: &str) -> Result<MailRequest> {
        if recipient.trim().is_empty() {
            return Err(Error::MissingRecipient);
        }
        let _guard = self.try_begin()?;

        let document = self.renderer.render(&RenderModel::from_draft(draft))?;
        let request = MailRequest::compose(draft, recipient, document.to_base64());
        self.relay.send(&request)?;

        info!(to = %request.to_email, number = %draft.invoice_number, "invoice emailed");
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::RenderedDocument;
    use crate::model::LineItem;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::cell::{Cell, RefCell};

    struct FakeRenderer {
        calls: Cell<usize>,
        fail: bool,
    }

    impl FakeRenderer {
        fn ok() -> Self {
            FakeRenderer { calls: Cell::new(0), fail: false }
        }
    }

    impl DocumentRenderer for FakeRenderer {
        fn render(&self, model: &RenderModel) -> Result<RenderedDocument> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(Error::Render("boom".into()));
            }
            Ok(RenderedDocument { filename: model.filename.clone(), bytes: b"%PDF".to_vec() })
        }
    }

    #[derive(Default)]
    struct FakeRelay {
        sent: RefCell<Vec<MailRequest>>,
        reject_with: Option<String>,
    }

    impl MailRelay for FakeRelay {
        fn send(&self, request: &MailRequest) -> Result<()> {
            if let Some(body) = &self.reject_with {
                return Err(Error::Mail(relay_error_message(body)));
            }
            self.sent.borrow_mut().push(request.clone());
            Ok(())
        }
    }

    fn draft() -> InvoiceDraft {
        let mut d = InvoiceDraft::new(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap());
        d.brand_name = "Acme".into();
        d.client_name = "Globex".into();
        d.invoice_number = "INV-100".into();
        d.due_date = NaiveDate::from_ymd_opt(2024, 7, 31).unwrap();
        d.items = vec![
            LineItem { quantity: 2.0, unit_price: 50.0, ..LineItem::default() },
            LineItem { quantity: 1.0, unit_price: 25.0, ..LineItem::default() },
        ];
        d.tax_rate = 10.0;
        d.discount = 5.0;
        d.shipping = 10.0;
        d
    }

    #[test]
    fn compose_fills_subject_body_and_filename() {
        let req = MailRequest::compose(&draft(), " ap@globex.test ", "JVBERg==".into());
        assert_eq!(req.to_email, "ap@globex.test");
        assert_eq!(req.subject, "Invoice INV-100 from Acme");
        assert_eq!(
            req.body,
            "Dear Globex,\n\nPlease find attached invoice INV-100.\n\nTotal Amount: $142.50\nDue Date: 2024-07-31\n\nThank you for your business!\n\nBest regards,\nAcme"
        );
        assert_eq!(req.filename, "INV-100.pdf");

        let json = serde_json::to_value(&req).unwrap();
        for key in ["to_email", "subject", "body", "pdf_base64", "filename"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn relay_detail_is_surfaced() {
        assert_eq!(relay_error_message(r#"{"detail":"Email credentials not configured"}"#), "Email credentials not configured");
        assert_eq!(relay_error_message(r#"{"detail":[{"msg":"field required"}]}"#), GENERIC_FAILURE);
        assert_eq!(relay_error_message("<html>502</html>"), GENERIC_FAILURE);
        assert_eq!(relay_error_message(""), GENERIC_FAILURE);
    }

    #[test]
    fn endpoint_is_joined_without_double_slash() {
        assert_eq!(HttpMailRelay::new("http://localhost:8001/").endpoint(), "http://localhost:8001/api/send-invoice-email");
    }

    #[test]
    fn dispatch_renders_encodes_and_sends() {
        let dispatcher = Dispatcher::new(FakeRenderer::ok(), FakeRelay::default());
        let req = dispatcher.dispatch(&draft(), "ap@globex.test").unwrap();

        assert_eq!(req.pdf_base64, "JVBERg==");
        assert_eq!(dispatcher.relay.sent.borrow().len(), 1);
        assert!(!dispatcher.is_sending());
    }

    #[test]
    fn empty_recipient_stops_before_rendering() {
        let dispatcher = Dispatcher::new(FakeRenderer::ok(), FakeRelay::default());
        assert!(matches!(dispatcher.dispatch(&draft(), "   "), Err(Error::MissingRecipient)));
        assert_eq!(dispatcher.renderer().calls.get(), 0);
    }

    #[test]
    fn second_send_is_refused_while_one_is_in_flight() {
        let dispatcher = Dispatcher::new(FakeRenderer::ok(), FakeRelay::default());
        let guard = dispatcher.try_begin().unwrap();
        assert!(dispatcher.is_sending());
        assert!(matches!(dispatcher.dispatch(&draft(), "a@b.test"), Err(Error::SendInProgress)));
        assert_eq!(dispatcher.renderer().calls.get(), 0);

        drop(guard);
        assert!(dispatcher.dispatch(&draft(), "a@b.test").is_ok());
    }

    #[test]
    fn failures_release_the_guard() {
        let failing_render = Dispatcher::new(FakeRenderer { calls: Cell::new(0), fail: true }, FakeRelay::default());
        assert!(matches!(failing_render.dispatch(&draft(), "a@b.test"), Err(Error::Render(_))));
        assert!(!failing_render.is_sending());
        assert!(failing_render.relay.sent.borrow().is_empty());

        let relay = FakeRelay { reject_with: Some(r#"{"detail":"Failed to send email: auth"}"#.into()), ..FakeRelay::default() };
        let rejecting = Dispatcher::new(FakeRenderer::ok(), relay);
        match rejecting.dispatch(&draft(), "a@b.test") {
            Err(Error::Mail(msg)) => assert_eq!(msg, "Failed to send email: auth"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!rejecting.is_sending());
    }
}
