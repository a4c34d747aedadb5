use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Days between the issue date and the due date of a fresh draft.
pub const DEFAULT_PAYMENT_TERM_DAYS: u64 = 30;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Inr,
    Jpy,
    Cad,
    Aud,
}

impl Currency {
    pub const ALL: [Currency; 7] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Inr,
        Currency::Jpy,
        Currency::Cad,
        Currency::Aud,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Inr => "INR",
            Currency::Jpy => "JPY",
            Currency::Cad => "CAD",
            Currency::Aud => "AUD",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
            Currency::Inr => "₹",
            Currency::Jpy => "¥",
            Currency::Cad => "C$",
            Currency::Aud => "A$",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Currency::Usd => "US Dollar",
            Currency::Eur => "Euro",
            Currency::Gbp => "British Pound",
            Currency::Inr => "Indian Rupee",
            Currency::Jpy => "Japanese Yen",
            Currency::Cad => "Canadian Dollar",
            Currency::Aud => "Australian Dollar",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) {}", self.code(), self.symbol(), self.name())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Currency::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| format!("unsupported currency code: {}", code))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub unit_price: f64,
}

fn default_quantity() -> f64 {
    1.0
}

impl Default for LineItem {
    fn default() -> Self {
        LineItem {
            name: String::new(),
            description: String::new(),
            quantity: default_quantity(),
            unit_price: 0.0,
        }
    }
}

impl LineItem {
    pub fn amount(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

// Missing fields in stored records fall back to the fresh-draft default.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceDraft {
    pub brand_name: String,
    pub brand_email: String,
    pub brand_phone: String,
    pub brand_address: String,
    /// Data URL (`data:image/png;base64,...`), empty when no logo is set.
    pub brand_logo: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: String,
    pub client_address: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub due_date: NaiveDate,
    pub items: Vec<LineItem>,
    pub tax_rate: f64,
    pub discount: f64,
    pub shipping: f64,
    pub currency: Currency,
    pub notes: String,
}

impl Default for InvoiceDraft {
    fn default() -> Self {
        InvoiceDraft::new(Utc::now())
    }
}

impl InvoiceDraft {
    /// Fresh draft for a new session started at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        let invoice_date = now.date_naive();
        let due_date = invoice_date
            .checked_add_days(Days::new(DEFAULT_PAYMENT_TERM_DAYS))
            .unwrap_or(invoice_date);

        InvoiceDraft {
            brand_name: String::new(),
            brand_email: String::new(),
            brand_phone: String::new(),
            brand_address: String::new(),
            brand_logo: String::new(),
            client_name: String::new(),
            client_email: String::new(),
            client_phone: String::new(),
            client_address: String::new(),
            invoice_number: format!("INV-{}", now.timestamp_millis()),
            invoice_date,
            due_date,
            items: vec![LineItem::default()],
            tax_rate: 0.0,
            discount: 0.0,
            shipping: 0.0,
            currency: Currency::default(),
            notes: String::new(),
        }
    }

    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(LineItem::amount).sum()
    }

    pub fn tax(&self) -> f64 {
        self.subtotal() * self.tax_rate / 100.0
    }

    pub fn total(&self) -> f64 {
        self.subtotal() + self.tax() - self.discount + self.shipping
    }

    pub fn symbol(&self) -> &'static str {
        self.currency.symbol()
    }

    pub fn money(&self, amount: f64) -> String {
        format_money(self.symbol(), amount)
    }

    /// `<invoice number>.pdf`
    pub fn pdf_filename(&self) -> String {
        format!("{}.pdf", self.invoice_number)
    }

    /// Restores the at-least-one-item invariant on drafts read from storage.
    pub fn normalized(mut self) -> Self {
        if self.items.is_empty() {
            self.items.push(LineItem::default());
        }
        self
    }
}

/// Saved client snapshot. Not linked to any draft after it is copied in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Client {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}

impl Client {
    pub fn from_draft(id: i64, draft: &InvoiceDraft) -> Self {
        Client {
            id,
            name: draft.client_name.clone(),
            email: draft.client_email.clone(),
            phone: draft.client_phone.clone(),
            address: draft.client_address.clone(),
        }
    }
}

/// Saved invoice: the whole draft plus what was computed when it was saved.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    pub id: i64,
    #[serde(flatten)]
    pub draft: InvoiceDraft,
    pub total: f64,
    pub saved_at: DateTime<Utc>,
}

impl InvoiceRecord {
    pub fn snapshot(id: i64, draft: &InvoiceDraft, saved_at: DateTime<Utc>) -> Self {
        InvoiceRecord {
            id,
            draft: draft.clone(),
            total: draft.total(),
            saved_at,
        }
    }
}

pub fn format_money(symbol: &str, amount: f64) -> String {
    format!("{}{:.2}", symbol, amount)
}
