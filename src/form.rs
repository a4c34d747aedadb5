use inquire::{Confirm, DateSelect, InquireError, Select, Text};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::error;

use crate::draft::{DraftController, ItemTextField, NumberField, TextField};
use crate::error::Error;
use crate::export::DocumentRenderer;
use crate::logo;
use crate::mail::{Dispatcher, MailRelay};
use crate::model::{Client, Currency, InvoiceRecord};
use crate::preview;
use crate::render::RenderModel;
use crate::store::{KeyValueStore, Persistence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Preview,
    EditBrand,
    Logo,
    EditClient,
    LoadClient,
    SaveClient,
    DeleteClient,
    EditDetails,
    AddItem,
    EditItem,
    RemoveItem,
    Adjustments,
    SaveInvoice,
    LoadInvoice,
    DeleteInvoice,
    Download,
    Print,
    Email,
    Undo,
    Quit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Preview => "👀 Preview",
            Action::EditBrand => "🏢 Edit Brand Details",
            Action::Logo => "🖼️  Brand Logo",
            Action::EditClient => "👤 Edit Client Details",
            Action::LoadClient => "📇 Load Saved Client",
            Action::SaveClient => "💾 Save Client",
            Action::DeleteClient => "🗑️  Delete Saved Client",
            Action::EditDetails => "📅 Invoice Number, Dates & Currency",
            Action::AddItem => "➕ Add Item",
            Action::EditItem => "✏️  Edit Item",
            Action::RemoveItem => "➖ Remove Item",
            Action::Adjustments => "💲 Tax, Discount, Shipping & Notes",
            Action::SaveInvoice => "💾 Save Invoice",
            Action::LoadInvoice => "📂 Load Invoice From History",
            Action::DeleteInvoice => "🗑️  Delete Invoice From History",
            Action::Download => "⬇️  Download PDF",
            Action::Print => "🖨️  Print PDF",
            Action::Email => "✉️  Email PDF",
            Action::Undo => "↩️  Undo",
            Action::Quit => "🚪 Quit",
        };
        f.write_str(label)
    }
}

struct ClientChoice(Client);

impl fmt::Display for ClientChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)?;
        if !self.0.email.is_empty() {
            write!(f, " <{}>", self.0.email)?;
        }
        Ok(())
    }
}

struct RecordChoice(InvoiceRecord);

impl fmt::Display for RecordChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.0.draft;
        write!(
            f,
            "{} | {} | {} | saved {}",
            d.invoice_number,
            if d.client_name.is_empty() { "-" } else { &d.client_name },
            d.money(self.0.total),
            self.0.saved_at.format("%Y-%m-%d %H:%M")
        )
    }
}

struct ItemChoice {
    index: usize,
    label: String,
}

impl fmt::Display for ItemChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// What the user should read for a failed action.
pub fn user_message(err: &Error) -> String {
    match err {
        Error::Render(_) => "Error generating PDF".to_string(),
        Error::Mail(msg) => msg.clone(),
        other => other.to_string(),
    }
}

fn report(err: &Error) {
    error!(error = %err, "action failed");
    println!("❌ {}", user_message(err));
}

/// `\n` typed at a prompt becomes a real line break.
fn unescape_newlines(input: &str) -> String {
    input.replace("\\n", "\n")
}

fn escape_newlines(value: &str) -> String {
    value.replace('\n', "\\n")
}

/// Cancelled prompts (Esc) give `None`; the menu simply comes back.
fn ask<T>(answer: Result<T, InquireError>) -> Option<T> {
    match answer {
        Ok(v) => Some(v),
        Err(InquireError::OperationCanceled) => None,
        Err(InquireError::OperationInterrupted) => std::process::exit(0),
        Err(e) => {
            println!("❌ Prompt failed: {}", e);
            None
        }
    }
}

fn ask_text(message: &str, current: &str) -> Option<String> {
    ask(Text::new(message).with_initial_value(&escape_newlines(current)).prompt()).map(|s| unescape_newlines(&s))
}

// Helper: Open file and reveal in Finder/Explorer
fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg("-R").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(format!("/select,{}", path.to_string_lossy())).spawn().ok();

    #[cfg(target_os = "linux")]
    if let Some(parent) = path.parent() {
        Command::new("xdg-open").arg(parent).spawn().ok();
    }
}

pub struct Form<S, R, M> {
    controller: DraftController,
    persistence: Persistence<S>,
    dispatcher: Dispatcher<R, M>,
    output_dir: PathBuf,
}

impl<S: KeyValueStore, R: DocumentRenderer, M: MailRelay> Form<S, R, M> {
    pub fn new(
        controller: DraftController,
        persistence: Persistence<S>,
        dispatcher: Dispatcher<R, M>,
        output_dir: PathBuf,
    ) -> Self {
        Form {
            controller,
            persistence,
            dispatcher,
            output_dir,
        }
    }

    fn menu(&self) -> Vec<Action> {
        let draft = self.controller.draft();
        let mut actions = vec![Action::Preview, Action::EditBrand, Action::Logo, Action::EditClient, Action::LoadClient];
        if !draft.client_name.trim().is_empty() {
            actions.push(Action::SaveClient);
        }
        actions.extend([Action::DeleteClient, Action::EditDetails, Action::AddItem, Action::EditItem]);
        if draft.items.len() > 1 {
            actions.push(Action::RemoveItem);
        }
        actions.extend([
            Action::Adjustments,
            Action::SaveInvoice,
            Action::LoadInvoice,
            Action::DeleteInvoice,
            Action::Download,
            Action::Print,
            Action::Email,
        ]);
        if self.controller.can_undo() {
            actions.push(Action::Undo);
        }
        actions.push(Action::Quit);
        actions
    }

    fn status_line(&self) -> String {
        let d = self.controller.draft();
        format!(
            "🧾 {} | {} | {} item(s) | Total {}",
            d.invoice_number,
            if d.client_name.is_empty() { "no client" } else { &d.client_name },
            d.items.len(),
            d.money(d.total())
        )
    }

    pub fn run(&mut self) {
        println!("\n--- Brand Invoice Generator ---");
        println!("💡 Tip: Use '\\n' for new lines in addresses and notes.");
        loop {
            println!("\n{}", self.status_line());
            let Some(action) = ask(Select::new("What next?", self.menu()).with_page_size(12).prompt()) else {
                continue;
            };
            let outcome = match action {
                Action::Preview => {
                    self.preview();
                    Ok(())
                }
                Action::EditBrand => {
                    self.edit_brand();
                    Ok(())
                }
                Action::Logo => self.edit_logo(),
                Action::EditClient => {
                    self.edit_client();
                    Ok(())
                }
                Action::LoadClient => self.load_client(),
                Action::SaveClient => self.save_client(),
                Action::DeleteClient => self.delete_client(),
                Action::EditDetails => {
                    self.edit_details();
                    Ok(())
                }
                Action::AddItem => {
                    self.controller.add_item();
                    let index = self.controller.draft().items.len() - 1;
                    self.edit_item_at(index);
                    Ok(())
                }
                Action::EditItem => {
                    if let Some(index) = self.pick_item("Edit which item?") {
                        self.edit_item_at(index);
                    }
                    Ok(())
                }
                Action::RemoveItem => {
                    if let Some(index) = self.pick_item("Remove which item?") {
                        if self.controller.remove_item(index) {
                            println!("✅ Item removed.");
                        }
                    }
                    Ok(())
                }
                Action::Adjustments => {
                    self.edit_adjustments();
                    Ok(())
                }
                Action::SaveInvoice => self.save_invoice(),
                Action::LoadInvoice => self.load_invoice(),
                Action::DeleteInvoice => self.delete_invoice(),
                Action::Download => self.download().map(|path| open_and_reveal(&path)),
                Action::Print => self.print(),
                Action::Email => self.email(),
                Action::Undo => {
                    if self.controller.undo() {
                        println!("↩️  Last change undone.");
                    }
                    Ok(())
                }
                Action::Quit => {
                    let leave = ask(Confirm::new("Leave the form? Unsaved changes are lost.").with_default(false).prompt());
                    if leave == Some(true) {
                        return;
                    }
                    Ok(())
                }
            };
            if let Err(e) = outcome {
                report(&e);
            }
        }
    }

    fn preview(&self) {
        println!("{}", preview::render_preview(&RenderModel::from_draft(self.controller.draft())));
    }

    fn edit_text_fields(&mut self, fields: &[(TextField, &str)]) {
        for (field, label) in fields {
            let current = {
                let d = self.controller.draft();
                match field {
                    TextField::BrandName => d.brand_name.clone(),
                    TextField::BrandEmail => d.brand_email.clone(),
                    TextField::BrandPhone => d.brand_phone.clone(),
                    TextField::BrandAddress => d.brand_address.clone(),
                    TextField::ClientName => d.client_name.clone(),
                    TextField::ClientEmail => d.client_email.clone(),
                    TextField::ClientPhone => d.client_phone.clone(),
                    TextField::ClientAddress => d.client_address.clone(),
                    TextField::InvoiceNumber => d.invoice_number.clone(),
                    TextField::Notes => d.notes.clone(),
                }
            };
            match ask_text(label, &current) {
                Some(value) => self.controller.set_text(*field, value),
                None => return,
            }
        }
    }

    fn edit_brand(&mut self) {
        println!("\n--- Brand Details ---");
        self.edit_text_fields(&[
            (TextField::BrandName, "Brand Name *:"),
            (TextField::BrandEmail, "Email:"),
            (TextField::BrandPhone, "Phone:"),
            (TextField::BrandAddress, "Address:"),
        ]);
    }

    fn edit_client(&mut self) {
        println!("\n--- Client Details ---");
        self.edit_text_fields(&[
            (TextField::ClientName, "Client Name *:"),
            (TextField::ClientEmail, "Email:"),
            (TextField::ClientPhone, "Phone:"),
            (TextField::ClientAddress, "Address:"),
        ]);
    }

    fn edit_logo(&mut self) -> crate::error::Result<()> {
        if !self.controller.draft().brand_logo.is_empty() {
            let remove = ask(Confirm::new("Remove the current logo?").with_default(false).prompt());
            if remove == Some(true) {
                self.controller.clear_logo();
                println!("✅ Logo removed.");
                return Ok(());
            }
        }

        println!("📂 Opening file picker...");
        let picked = rfd::FileDialog::new()
            .set_title("Select Brand Logo")
            .add_filter("Images", &["png", "jpg", "jpeg", "gif", "svg", "webp"])
            .pick_file();

        let path = match picked {
            Some(path) => path,
            None => {
                println!("❌ No file selected. Falling back to manual input.");
                match ask(Text::new("Logo file path (leave empty to skip):").prompt()) {
                    Some(p) if !p.trim().is_empty() => PathBuf::from(p.trim()),
                    _ => return Ok(()),
                }
            }
        };

        let data_url = logo::load_logo_file(&path)?;
        self.controller.set_logo(data_url);
        println!("✅ Logo loaded from {}", path.display());
        Ok(())
    }

    fn load_client(&mut self) -> crate::error::Result<()> {
        let clients = self.persistence.list_clients()?;
        if clients.is_empty() {
            println!("No saved clients yet.");
            return Ok(());
        }
        let options = clients.into_iter().map(ClientChoice).collect();
        if let Some(ClientChoice(client)) = ask(Select::new("Load which client?", options).prompt()) {
            self.controller.apply_client(&client);
            println!("✅ Client loaded!");
        }
        Ok(())
    }

    fn save_client(&mut self) -> crate::error::Result<()> {
        let client = self.persistence.save_client(self.controller.draft())?;
        println!("✅ Client saved successfully! (id {})", client.id);
        Ok(())
    }

    fn delete_client(&mut self) -> crate::error::Result<()> {
        let clients = self.persistence.list_clients()?;
        if clients.is_empty() {
            println!("No saved clients yet.");
            return Ok(());
        }
        let options = clients.into_iter().map(ClientChoice).collect();
        if let Some(ClientChoice(client)) = ask(Select::new("Delete which client?", options).prompt()) {
            let sure = ask(Confirm::new(&format!("Delete {}?", client.name)).with_default(false).prompt());
            if sure == Some(true) && self.persistence.delete_client(client.id)? {
                println!("✅ Client deleted!");
            }
        }
        Ok(())
    }

    fn edit_details(&mut self) {
        println!("\n--- Invoice Details ---");
        self.edit_text_fields(&[(TextField::InvoiceNumber, "Invoice Number:")]);

        let d = self.controller.draft();
        let (issue, due, currency) = (d.invoice_date, d.due_date, d.currency);

        let Some(issue) = ask(DateSelect::new("Invoice Date:").with_default(issue).prompt()) else {
            return;
        };
        self.controller.set_invoice_date(issue);

        let Some(due) = ask(DateSelect::new("Due Date:").with_default(due).prompt()) else {
            return;
        };
        self.controller.set_due_date(due);

        let start = Currency::ALL.iter().position(|c| *c == currency).unwrap_or(0);
        if let Some(currency) = ask(Select::new("Currency:", Currency::ALL.to_vec()).with_starting_cursor(start).prompt()) {
            self.controller.set_currency(currency);
        }
    }

    fn pick_item(&self, message: &str) -> Option<usize> {
        let d = self.controller.draft();
        let options: Vec<ItemChoice> = d
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| ItemChoice {
                index,
                label: format!(
                    "{}. {} ({} × {})",
                    index + 1,
                    if item.name.is_empty() { "-" } else { &item.name },
                    item.quantity,
                    d.money(item.unit_price)
                ),
            })
            .collect();
        ask(Select::new(message, options).prompt()).map(|c| c.index)
    }

    fn edit_item_at(&mut self, index: usize) {
        let Some(item) = self.controller.draft().items.get(index).cloned() else {
            return;
        };
        println!("\n--- Item {} ---", index + 1);

        let Some(name) = ask_text("Item Name:", &item.name) else { return };
        self.controller.set_item_text(index, ItemTextField::Name, name);

        let Some(description) = ask_text("Description:", &item.description) else { return };
        self.controller.set_item_text(index, ItemTextField::Description, description);

        let Some(quantity) = ask(Text::new("Quantity:").with_initial_value(&item.quantity.to_string()).prompt()) else {
            return;
        };
        self.controller.set_item_quantity(index, &quantity);

        let Some(price) = ask(Text::new("Unit Price:").with_initial_value(&item.unit_price.to_string()).prompt()) else {
            return;
        };
        self.controller.set_item_unit_price(index, &price);

        let item = &self.controller.draft().items[index];
        println!("✅ Amount: {}", self.controller.draft().money(item.amount()));
    }

    fn edit_adjustments(&mut self) {
        println!("\n--- Adjustments ---");
        let d = self.controller.draft();
        let fields = [
            (NumberField::TaxRate, "Tax Rate (%):", d.tax_rate),
            (NumberField::Discount, "Discount (flat):", d.discount),
            (NumberField::Shipping, "Shipping (flat):", d.shipping),
        ];
        for (field, label, current) in fields {
            let Some(raw) = ask(Text::new(label).with_initial_value(&current.to_string()).prompt()) else {
                return;
            };
            self.controller.set_number(field, &raw);
        }
        self.edit_text_fields(&[(TextField::Notes, "Notes:")]);
    }

    fn save_invoice(&mut self) -> crate::error::Result<()> {
        let record = self.persistence.save_invoice(self.controller.draft())?;
        println!("✅ Invoice saved! (id {}, total {})", record.id, record.draft.money(record.total));
        Ok(())
    }

    fn load_invoice(&mut self) -> crate::error::Result<()> {
        let history = self.persistence.list_invoices()?;
        if history.is_empty() {
            println!("No saved invoices yet.");
            return Ok(());
        }
        let options = history.into_iter().map(RecordChoice).collect();
        if let Some(RecordChoice(record)) = ask(Select::new("Load which invoice?", options).with_page_size(10).prompt()) {
            self.controller.load_record(&record);
            println!("✅ Invoice loaded!");
        }
        Ok(())
    }

    fn delete_invoice(&mut self) -> crate::error::Result<()> {
        let history = self.persistence.list_invoices()?;
        if history.is_empty() {
            println!("No saved invoices yet.");
            return Ok(());
        }
        let options = history.into_iter().map(RecordChoice).collect();
        if let Some(RecordChoice(record)) = ask(Select::new("Delete which invoice?", options).with_page_size(10).prompt()) {
            let sure = ask(
                Confirm::new(&format!("Delete {}?", record.draft.invoice_number))
                    .with_default(false)
                    .prompt(),
            );
            if sure == Some(true) && self.persistence.delete_invoice(record.id)? {
                println!("✅ Invoice deleted!");
            }
        }
        Ok(())
    }

    fn download(&self) -> crate::error::Result<PathBuf> {
        println!("\n🔨 Compiling PDF...");
        let document = self.dispatcher.renderer().render(&RenderModel::from_draft(self.controller.draft()))?;
        let path = document.save_to(&self.output_dir)?;
        println!("✅ Invoice downloaded: {}", path.display());
        Ok(path)
    }

    fn print(&self) -> crate::error::Result<()> {
        println!("\n🔨 Compiling PDF...");
        let document = self.dispatcher.renderer().render(&RenderModel::from_draft(self.controller.draft()))?;
        document.print()?;
        println!("✅ Sent to printer.");
        Ok(())
    }

    fn email(&self) -> crate::error::Result<()> {
        let suggested = self.controller.draft().client_email.clone();
        let Some(recipient) = ask(Text::new("Recipient Email:").with_initial_value(&suggested).prompt()) else {
            return Ok(());
        };
        println!("📤 Sending...");
        self.dispatcher.dispatch(self.controller.draft(), &recipient)?;
        println!("✅ Invoice sent successfully!");
        Ok(())
    }
}
