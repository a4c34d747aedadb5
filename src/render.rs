use serde::Serialize;

use crate::logo::{self, LogoImage};
use crate::model::InvoiceDraft;

const HEADER_BRAND_FALLBACK: &str = "Your Brand";
const BRAND_FALLBACK: &str = "Brand Name";
const CLIENT_FALLBACK: &str = "Client Name";
const EMPTY_CELL: &str = "-";

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PartyBlock {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MetaStrip {
    pub invoice_number: String,
    pub invoice_date: String,
    pub due_date: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ItemRow {
    pub name: String,
    pub description: String,
    pub quantity: String,
    pub price: String,
    pub amount: String,
    pub shaded: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TotalLine {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Totals {
    pub subtotal: String,
    pub tax: Option<TotalLine>,
    pub discount: Option<TotalLine>,
    pub shipping: Option<TotalLine>,
    pub total: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RenderModel {
    pub header_brand: String,
    pub brand: PartyBlock,
    pub client: PartyBlock,
    pub meta: MetaStrip,
    pub rows: Vec<ItemRow>,
    pub totals: Totals,
    pub notes: Option<String>,
    #[serde(skip)]
    pub logo: Option<LogoImage>,
    pub filename: String,
}

fn or_fallback(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Shortest decimal form: `2`, `1.5`, `0.25`.
pub fn format_quantity(quantity: f64) -> String {
    format!("{}", quantity)
}

impl RenderModel {
    pub fn from_draft(draft: &InvoiceDraft) -> Self {
        let rows = draft
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| ItemRow {
                name: or_fallback(&item.name, EMPTY_CELL),
                description: or_fallback(&item.description, EMPTY_CELL),
                quantity: format_quantity(item.quantity),
                price: draft.money(item.unit_price),
                amount: draft.money(item.amount()),
                // Header is row 0; every even body row gets the band.
                shaded: (i + 1) % 2 == 0,
            })
            .collect();

        let tax = (draft.tax_rate > 0.0).then(|| TotalLine {
            label: format!("Tax ({}%):", format_quantity(draft.tax_rate)),
            value: draft.money(draft.tax()),
        });
        let discount = (draft.discount > 0.0).then(|| TotalLine {
            label: "Discount:".to_string(),
            value: format!("-{}", draft.money(draft.discount)),
        });
        let shipping = (draft.shipping > 0.0).then(|| TotalLine {
            label: "Shipping:".to_string(),
            value: draft.money(draft.shipping),
        });

        RenderModel {
            header_brand: or_fallback(&draft.brand_name, HEADER_BRAND_FALLBACK),
            brand: PartyBlock {
                name: or_fallback(&draft.brand_name, BRAND_FALLBACK),
                email: draft.brand_email.clone(),
                phone: draft.brand_phone.clone(),
                address: draft.brand_address.clone(),
            },
            client: PartyBlock {
                name: or_fallback(&draft.client_name, CLIENT_FALLBACK),
                email: draft.client_email.clone(),
                phone: draft.client_phone.clone(),
                address: draft.client_address.clone(),
            },
            meta: MetaStrip {
                invoice_number: draft.invoice_number.clone(),
                invoice_date: draft.invoice_date.format("%Y-%m-%d").to_string(),
                due_date: draft.due_date.format("%Y-%m-%d").to_string(),
            },
            rows,
            totals: Totals {
                subtotal: draft.money(draft.subtotal()),
                tax,
                discount,
                shipping,
                total: draft.money(draft.total()),
            },
            notes: (!draft.notes.trim().is_empty()).then(|| draft.notes.clone()),
            logo: logo::decode_data_url(&draft.brand_logo),
            filename: draft.pdf_filename(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Currency, LineItem};
    use chrono::{TimeZone, Utc};

    fn draft() -> InvoiceDraft {
        let mut d = InvoiceDraft::new(Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap());
        d.invoice_number = "INV-42".into();
        d
    }

    #[test]
    fn blank_draft_uses_placeholders() {
        let model = RenderModel::from_draft(&draft());
        assert_eq!(model.header_brand, "Your Brand");
        assert_eq!(model.brand.name, "Brand Name");
        assert_eq!(model.client.name, "Client Name");
        assert_eq!(model.rows.len(), 1);
        assert_eq!(model.rows[0].name, "-");
        assert_eq!(model.rows[0].description, "-");
        assert_eq!(model.rows[0].quantity, "1");
        assert_eq!(model.filename, "INV-42.pdf");
        assert!(model.notes.is_none());
        assert!(model.logo.is_none());
    }

    #[test]
    fn zero_adjustments_are_hidden() {
        let model = RenderModel::from_draft(&draft());
        assert_eq!(model.totals.subtotal, "$0.00");
        assert!(model.totals.tax.is_none());
        assert!(model.totals.discount.is_none());
        assert!(model.totals.shipping.is_none());
        assert_eq!(model.totals.total, "$0.00");
    }

    #[test]
    fn worked_example_breakdown() {
        let mut d = draft();
        d.items = vec![
            LineItem { name: "Widget".into(), description: "Blue".into(), quantity: 2.0, unit_price: 50.0 },
            LineItem { name: "Gadget".into(), description: String::new(), quantity: 1.0, unit_price: 25.0 },
        ];
        d.tax_rate = 10.0;
        d.discount = 5.0;
        d.shipping = 10.0;
        d.notes = "Thanks!".into();

        let model = RenderModel::from_draft(&d);
        assert_eq!(model.rows[0].price, "$50.00");
        assert_eq!(model.rows[0].amount, "$100.00");
        assert_eq!(model.rows[1].description, "-");
        assert_eq!(model.totals.subtotal, "$125.00");

        let tax = model.totals.tax.unwrap();
        assert_eq!((tax.label.as_str(), tax.value.as_str()), ("Tax (10%):", "$12.50"));
        assert_eq!(model.totals.discount.unwrap().value, "-$5.00");
        assert_eq!(model.totals.shipping.unwrap().value, "$10.00");
        assert_eq!(model.totals.total, "$142.50");
        assert_eq!(model.notes.as_deref(), Some("Thanks!"));
    }

    #[test]
    fn every_second_row_is_shaded() {
        let mut d = draft();
        d.items = vec![LineItem::default(); 4];
        let shaded: Vec<_> = RenderModel::from_draft(&d).rows.iter().map(|r| r.shaded).collect();
        assert_eq!(shaded, [false, true, false, true]);
    }

    #[test]
    fn fractional_values_keep_their_precision_in_labels() {
        let mut d = draft();
        d.currency = Currency::Eur;
        d.tax_rate = 8.875;
        d.items[0].quantity = 1.5;
        d.items[0].unit_price = 10.0;

        let model = RenderModel::from_draft(&d);
        assert_eq!(model.rows[0].quantity, "1.5");
        assert_eq!(model.rows[0].amount, "€15.00");
        assert_eq!(model.totals.tax.unwrap().label, "Tax (8.875%):");
    }
}
