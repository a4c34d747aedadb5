use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};

use crate::model::{Client, InvoiceRecord};
use crate::render::RenderModel;

const MUTED: Color = Color::Rgb { r: 102, g: 102, b: 102 };
const ACCENT: Color = Color::Rgb { r: 66, g: 153, b: 225 };

fn right(text: impl ToString) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

fn party_lines(title: &str, block: &crate::render::PartyBlock) -> String {
    let mut lines = vec![title.to_string(), block.name.clone()];
    lines.extend(
        [&block.email, &block.phone, &block.address]
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .cloned(),
    );
    lines.join("\n")
}

/// Header, parties and metadata of the preview.
pub fn summary_table(model: &RenderModel) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new(&model.header_brand).add_attribute(Attribute::Bold),
        Cell::new("INVOICE").add_attribute(Attribute::Bold).fg(ACCENT),
    ]);
    table.add_row(vec![
        Cell::new(party_lines("From:", &model.brand)),
        Cell::new(party_lines("Bill To:", &model.client)),
    ]);
    table.add_row(vec![
        Cell::new(format!("Invoice Number\n{}", model.meta.invoice_number)),
        Cell::new(format!("Invoice Date: {}\nDue Date: {}", model.meta.invoice_date, model.meta.due_date)),
    ]);
    table
}

/// Line items followed by the totals breakdown.
pub fn items_table(model: &RenderModel) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("#"),
        Cell::new("Item"),
        Cell::new("Description"),
        Cell::new("Qty"),
        right("Price"),
        right("Amount"),
    ]);

    for (i, row) in model.rows.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&row.name),
            Cell::new(&row.description).fg(MUTED),
            Cell::new(&row.quantity).set_alignment(CellAlignment::Center),
            right(&row.price),
            right(&row.amount),
        ]);
    }

    let mut totals = vec![("Subtotal:".to_string(), model.totals.subtotal.clone())];
    for line in [&model.totals.tax, &model.totals.discount, &model.totals.shipping]
        .into_iter()
        .flatten()
    {
        totals.push((line.label.clone(), line.value.clone()));
    }
    for (label, value) in totals {
        table.add_row(vec![
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            right(label).fg(MUTED),
            right(value),
        ]);
    }
    table.add_row(vec![
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        right("Total:").add_attribute(Attribute::Bold),
        right(&model.totals.total).add_attribute(Attribute::Bold),
    ]);
    table
}

/// Complete preview text: summary, items, notes.
pub fn render_preview(model: &RenderModel) -> String {
    let mut out = format!("{}\n{}", summary_table(model), items_table(model));
    if let Some(notes) = &model.notes {
        out.push_str(&format!("\nNotes:\n{}", notes));
    }
    out
}

pub fn clients_table(clients: &[Client]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Email", "Phone", "Address"]);
    for c in clients {
        table.add_row(vec![
            Cell::new(c.id),
            Cell::new(&c.name).add_attribute(Attribute::Bold),
            Cell::new(&c.email),
            Cell::new(&c.phone),
            Cell::new(&c.address),
        ]);
    }
    table
}

pub fn history_table(records: &[InvoiceRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("ID"),
        Cell::new("Number"),
        Cell::new("Client"),
        Cell::new("Due"),
        right("Total"),
        Cell::new("Saved"),
    ]);
    for r in records {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(&r.draft.invoice_number).add_attribute(Attribute::Bold),
            Cell::new(&r.draft.client_name),
            Cell::new(r.draft.due_date.format("%Y-%m-%d")),
            right(r.draft.money(r.total)),
            Cell::new(r.saved_at.format("%Y-%m-%d %H:%M")).fg(MUTED),
        ]);
    }
    table
}
