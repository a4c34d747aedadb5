//! Form state: the single owner of the draft being edited.
//!
//! Every mutation builds the next `InvoiceDraft` value and swaps it in. The
//! value it replaced is kept on a bounded undo stack.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::model::{Client, Currency, InvoiceDraft, InvoiceRecord, LineItem};

const UNDO_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    BrandName,
    BrandEmail,
    BrandPhone,
    BrandAddress,
    ClientName,
    ClientEmail,
    ClientPhone,
    ClientAddress,
    InvoiceNumber,
    Notes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberField {
    TaxRate,
    Discount,
    Shipping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTextField {
    Name,
    Description,
}

fn leading_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid number pattern")
    })
}

/// Lenient numeric input: the leading number of `raw` (`"12abc"` reads as 12).
/// No number, a non-finite one or zero becomes `fallback`.
pub fn parse_or(raw: &str, fallback: f64) -> f64 {
    leading_number_re()
        .find(raw.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v != 0.0)
        .unwrap_or(fallback)
}

pub fn parse_quantity(raw: &str) -> f64 {
    parse_or(raw, 1.0)
}

pub fn parse_amount(raw: &str) -> f64 {
    parse_or(raw, 0.0)
}

#[derive(Debug)]
pub struct DraftController {
    current: InvoiceDraft,
    history: Vec<InvoiceDraft>,
}

impl DraftController {
    pub fn new(draft: InvoiceDraft) -> Self {
        DraftController {
            current: draft.normalized(),
            history: Vec::new(),
        }
    }

    pub fn draft(&self) -> &InvoiceDraft {
        &self.current
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Steps back to the draft before the last effective mutation.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(previous) => {
                self.current = previous;
                true
            }
            None => false,
        }
    }

    fn commit(&mut self, next: InvoiceDraft) {
        if next == self.current {
            return;
        }
        let previous = std::mem::replace(&mut self.current, next);
        self.history.push(previous);
        if self.history.len() > UNDO_LIMIT {
            self.history.remove(0);
        }
    }

    fn update(&mut self, f: impl FnOnce(&mut InvoiceDraft)) {
        let mut next = self.current.clone();
        f(&mut next);
        self.commit(next);
    }

    pub fn set_text(&mut self, field: TextField, value: impl Into<String>) {
        let value = value.into();
        self.update(|d| {
            let slot = match field {
                TextField::BrandName => &mut d.brand_name,
                TextField::BrandEmail => &mut d.brand_email,
                TextField::BrandPhone => &mut d.brand_phone,
                TextField::BrandAddress => &mut d.brand_address,
                TextField::ClientName => &mut d.client_name,
                TextField::ClientEmail => &mut d.client_email,
                TextField::ClientPhone => &mut d.client_phone,
                TextField::ClientAddress => &mut d.client_address,
                TextField::InvoiceNumber => &mut d.invoice_number,
                TextField::Notes => &mut d.notes,
            };
            *slot = value;
        });
    }

    pub fn set_number(&mut self, field: NumberField, raw: &str) {
        let value = parse_amount(raw);
        self.update(|d| match field {
            NumberField::TaxRate => d.tax_rate = value,
            NumberField::Discount => d.discount = value,
            NumberField::Shipping => d.shipping = value,
        });
    }

    pub fn set_currency(&mut self, currency: Currency) {
        self.update(|d| d.currency = currency);
    }

    pub fn set_invoice_date(&mut self, date: NaiveDate) {
        self.update(|d| d.invoice_date = date);
    }

    pub fn set_due_date(&mut self, date: NaiveDate) {
        self.update(|d| d.due_date = date);
    }

    pub fn set_logo(&mut self, data_url: String) {
        self.update(|d| d.brand_logo = data_url);
    }

    pub fn clear_logo(&mut self) {
        self.update(|d| d.brand_logo.clear());
    }

    pub fn add_item(&mut self) {
        self.update(|d| d.items.push(LineItem::default()));
    }

    /// Removes the item at `index`. The last remaining item is never removed.
    pub fn remove_item(&mut self, index: usize) -> bool {
        if self.current.items.len() <= 1 || index >= self.current.items.len() {
            debug!(index, items = self.current.items.len(), "item removal ignored");
            return false;
        }
        self.update(|d| {
            d.items.remove(index);
        });
        true
    }

    pub fn set_item_text(&mut self, index: usize, field: ItemTextField, value: impl Into<String>) {
        let value = value.into();
        self.update_item(index, |item| match field {
            ItemTextField::Name => item.name = value,
            ItemTextField::Description => item.description = value,
        });
    }

    pub fn set_item_quantity(&mut self, index: usize, raw: &str) {
        let quantity = parse_quantity(raw);
        self.update_item(index, |item| item.quantity = quantity);
    }

    pub fn set_item_unit_price(&mut self, index: usize, raw: &str) {
        let unit_price = parse_amount(raw);
        self.update_item(index, |item| item.unit_price = unit_price);
    }

    fn update_item(&mut self, index: usize, f: impl FnOnce(&mut LineItem)) {
        if index >= self.current.items.len() {
            debug!(index, "item index out of range");
            return;
        }
        self.update(|d| f(&mut d.items[index]));
    }

    /// Copies a saved client's fields into the bill-to block.
    pub fn apply_client(&mut self, client: &Client) {
        self.update(|d| {
            d.client_name = client.name.clone();
            d.client_email = client.email.clone();
            d.client_phone = client.phone.clone();
            d.client_address = client.address.clone();
        });
    }

    /// Replaces the whole draft with a saved invoice.
    pub fn load_record(&mut self, record: &InvoiceRecord) {
        self.commit(record.draft.clone().normalized());
    }

    /// Starts over with a fresh draft.
    pub fn replace(&mut self, draft: InvoiceDraft) {
        self.commit(draft.normalized());
    }
}
