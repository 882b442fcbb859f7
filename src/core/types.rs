use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::DocumentTotals;
use super::line_item::LineItem;
use super::money::Money;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

entity_id!(
    /// The issuing company; every record is scoped to one.
    CompanyId
);
entity_id!(CustomerId);
entity_id!(InvoiceId);
entity_id!(QuoteId);
entity_id!(PaymentId);

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Editable, not yet issued.
    Draft,
    /// Issued, awaiting payment.
    Open,
    /// Some but not all of the total is covered by matched payments.
    PartialPaid,
    /// Fully covered.
    Paid,
    /// Past its due date (set by the caller, not by reconciliation).
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Open => "OPEN",
            Self::PartialPaid => "PARTIAL_PAID",
            Self::Paid => "PAID",
            Self::Overdue => "OVERDUE",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "OPEN" => Some(Self::Open),
            "PARTIAL_PAID" => Some(Self::PartialPaid),
            "PAID" => Some(Self::Paid),
            "OVERDUE" => Some(Self::Overdue),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Awaiting (more) money: OPEN, PARTIAL_PAID or OVERDUE.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open | Self::PartialPaid | Self::Overdue)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }
}

/// Quote status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Declined,
    Expired,
    Cancelled,
    Converted,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Sent => "SENT",
            Self::Accepted => "ACCEPTED",
            Self::Declined => "DECLINED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
            Self::Converted => "CONVERTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "SENT" => Some(Self::Sent),
            "ACCEPTED" => Some(Self::Accepted),
            "DECLINED" => Some(Self::Declined),
            "EXPIRED" => Some(Self::Expired),
            "CANCELLED" => Some(Self::Cancelled),
            "CONVERTED" => Some(Self::Converted),
            _ => None,
        }
    }
}

/// How certain a payment-to-invoice match is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    /// Exact payment-reference match.
    High,
    /// Unique open invoice with the same total, due within the date window.
    Medium,
    /// Unique open invoice with the same total, any due date.
    Low,
    /// Unmatched and left for human triage, or assigned by hand.
    Manual,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Manual => "MANUAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            "MANUAL" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Kind of numbered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Invoice,
    Quote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub company_id: CompanyId,
    pub name: String,
    /// Days between document date and payment due date.
    pub payment_terms_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub company_id: CompanyId,
    pub customer_id: CustomerId,
    /// Unique per company.
    pub number: String,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub vat_amount: Money,
    pub total: Money,
    /// Sum of all matched payments; maintained by reconciliation.
    pub paid_amount: Money,
    /// Structured reference printed on the payment slip, echoed back by the bank.
    pub payment_reference: Option<String>,
    pub reminder_level: u8,
    pub discount_code: Option<String>,
    pub discount_amount: Money,
    /// Quote this invoice was converted from.
    pub quote_id: Option<QuoteId>,
    /// Optimistic concurrency counter, bumped by the store on every update.
    pub version: u64,
}

impl Invoice {
    pub fn totals(&self) -> DocumentTotals {
        DocumentTotals {
            subtotal: self.subtotal,
            vat_amount: self.vat_amount,
            discount_amount: self.discount_amount,
            total: self.total,
        }
    }

    /// Amount still owed; never negative.
    pub fn outstanding(&self) -> Money {
        if self.paid_amount >= self.total {
            Money::ZERO
        } else {
            self.total - self.paid_amount
        }
    }

    pub(crate) fn set_totals(&mut self, totals: DocumentTotals) {
        self.subtotal = totals.subtotal;
        self.vat_amount = totals.vat_amount;
        self.discount_amount = totals.discount_amount;
        self.total = totals.total;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub company_id: CompanyId,
    pub customer_id: CustomerId,
    pub number: String,
    pub date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub status: QuoteStatus,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub vat_amount: Money,
    pub total: Money,
    pub discount_code: Option<String>,
    pub discount_amount: Money,
    /// Opaque token handed to the customer for online acceptance.
    pub acceptance_token: String,
    pub accepted_at: Option<DateTime<Utc>>,
    pub accepted_by: Option<String>,
    /// Invoice created when the quote was converted.
    pub invoice_id: Option<InvoiceId>,
}

impl Quote {
    pub fn totals(&self) -> DocumentTotals {
        DocumentTotals {
            subtotal: self.subtotal,
            vat_amount: self.vat_amount,
            discount_amount: self.discount_amount,
            total: self.total,
        }
    }

    pub(crate) fn set_totals(&mut self, totals: DocumentTotals) {
        self.subtotal = totals.subtotal;
        self.vat_amount = totals.vat_amount;
        self.discount_amount = totals.discount_amount;
        self.total = totals.total;
    }
}

/// A normalized incoming bank payment, as produced by a statement parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub amount: Money,
    pub value_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    /// Original source line, kept for audit and debugging only.
    pub raw: Option<String>,
}

impl PaymentRecord {
    pub fn new(amount: Money, value_date: NaiveDate) -> Self {
        Self {
            amount,
            value_date,
            reference: None,
            description: None,
            raw: None,
        }
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}

/// A persisted payment and its match state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub company_id: CompanyId,
    /// Set once matched; `None` while awaiting triage.
    pub invoice_id: Option<InvoiceId>,
    pub amount: Money,
    pub value_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub confidence: Confidence,
    pub is_matched: bool,
    /// Tag grouping payments imported together.
    pub import_batch: Option<String>,
    pub raw: Option<String>,
}

impl Payment {
    /// An unmatched payment created from a bank record.
    pub fn from_record(company_id: CompanyId, record: PaymentRecord) -> Self {
        Self {
            id: PaymentId::new(),
            company_id,
            invoice_id: None,
            amount: record.amount,
            value_date: record.value_date,
            reference: record.reference,
            description: record.description,
            confidence: Confidence::Manual,
            is_matched: false,
            import_batch: None,
            raw: record.raw,
        }
    }

    /// Whether this payment currently counts towards `invoice`.
    pub fn counts_towards(&self, invoice: InvoiceId) -> bool {
        self.is_matched && self.invoice_id == Some(invoice)
    }
}
