pub mod credit_note;
pub mod invoice;
pub mod line_item;
pub mod outbox;
pub mod payment;
pub mod product;
pub mod quotation;
pub mod recurring;
pub mod settings;

pub use credit_note::{CreateCreditNote, CreditNote, ListCreditNotesFilter, UpdateCreditNote};
pub use invoice::{CreateInvoice, Invoice, ListInvoicesFilter, UpdateInvoice};
pub use line_item::{CreateLineItem, LineItem, LineItemParent, UpdateLineItem};
pub use outbox::{OutboxEvent, OutboxStatus};
pub use payment::{CreatePayment, Payment};
pub use product::{CreateProduct, ListProductsFilter, Product, UpdateProduct};
pub use quotation::{CreateQuotation, ListQuotationsFilter, Quotation, UpdateQuotation};
pub use recurring::{
    CreateRecurringTemplate, CreateTemplateItem, ListTemplatesFilter, RecurringTemplate,
    TemplateItem, UpdateRecurringTemplate,
};
pub use settings::{InvoiceSettings, UpdateInvoiceSettings};
