//! Field schema registry for the `clients` table.
//!
//! The single source of truth for which columns the create, update and import
//! paths may touch. Nothing outside this module spells a column name.

/// Table holding client records.
pub const CLIENTS_TABLE: &str = "clients";

/// Identifier column. Omitted from inserts when the caller does not supply one.
pub const ID_COLUMN: &str = "id";

/// Storage type of a structured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// `NUMERIC(18,2)` amounts: premiums, fees, totals, commissions.
    Decimal,
    /// `DATE` values: policy period bounds.
    Date,
}

macro_rules! structured_fields {
    ($($variant:ident => $column:literal : $kind:ident),+ $(,)?) => {
        /// A structured (non-document) column of a client record.
        ///
        /// Declaration order is registry order; `Ord` follows it, so maps keyed
        /// by `Field` iterate in column order.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum Field {
            $($variant),+
        }

        impl Field {
            /// Every structured field, in registry order.
            pub const ALL: &'static [Field] = &[$(Field::$variant),+];

            /// Column name in the `clients` table.
            pub fn column(self) -> &'static str {
                match self {
                    $(Field::$variant => $column),+
                }
            }

            pub fn kind(self) -> FieldKind {
                match self {
                    $(Field::$variant => FieldKind::$kind),+
                }
            }
        }
    };
}

structured_fields! {
    CeilaoIbFileNo => "ceilao_ib_file_no": Text,
    VehicleNumber => "vehicle_number": Text,
    MainClass => "main_class": Text,
    Insurer => "insurer": Text,
    IntroducerCode => "introducer_code": Text,
    CustomerType => "customer_type": Text,
    Product => "product": Text,
    Policy => "policy_": Text,
    InsuranceProvider => "insurance_provider": Text,
    Branch => "branch": Text,
    ClientName => "client_name": Text,
    Street1 => "street1": Text,
    Street2 => "street2": Text,
    City => "city": Text,
    District => "district": Text,
    Province => "province": Text,
    Telephone => "telephone": Text,
    MobileNo => "mobile_no": Text,
    ContactPerson => "contact_person": Text,
    Email => "email": Text,
    SocialMedia => "social_media": Text,
    NicProof => "nic_proof": Text,
    DobProof => "dob_proof": Text,
    BusinessRegistration => "business_registration": Text,
    SvatProof => "svat_proof": Text,
    VatProof => "vat_proof": Text,
    PolicyType => "policy_type": Text,
    PolicyNo => "policy_no": Text,
    PolicyPeriodFrom => "policy_period_from": Date,
    PolicyPeriodTo => "policy_period_to": Date,
    Coverage => "coverage": Text,
    SumInsured => "sum_insured": Decimal,
    BasicPremium => "basic_premium": Decimal,
    SrccPremium => "srcc_premium": Decimal,
    TcPremium => "tc_premium": Decimal,
    NetPremium => "net_premium": Decimal,
    StampDuty => "stamp_duty": Decimal,
    AdminFees => "admin_fees": Decimal,
    RoadSafetyFee => "road_safety_fee": Decimal,
    PolicyFee => "policy_fee": Decimal,
    VatFee => "vat_fee": Decimal,
    TotalInvoice => "total_invoice": Decimal,
    CommissionType => "commission_type": Text,
    CommissionBasic => "commission_basic": Decimal,
    CommissionSrcc => "commission_srcc": Decimal,
    CommissionTc => "commission_tc": Decimal,
    SalesRepId => "sales_rep_id": Text,
    // Extracted text paired with each document slot
    PolicyholderText => "policyholder_text": Text,
    ProposalFormText => "proposal_form_text": Text,
    QuotationText => "quotation_text": Text,
    CrCopyText => "cr_copy_text": Text,
    ScheduleText => "schedule_text": Text,
    InvoiceText => "invoice_text": Text,
    PaymentReceiptText => "payment_receipt_text": Text,
    NicBrText => "nic_br_text": Text,
}

/// Fields that must be present to create a client, by any path.
pub const REQUIRED_FIELDS: [Field; 5] = [
    Field::CustomerType,
    Field::Product,
    Field::InsuranceProvider,
    Field::ClientName,
    Field::MobileNo,
];

impl Field {
    /// Looks up a field by its column name. The identifier and document-URL
    /// columns are not structured fields and return `None`.
    pub fn from_column(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.column() == name)
    }

    /// Human-readable name used in validation messages (`mobile_no` -> `mobile no`).
    pub fn label(self) -> String {
        self.column().replace('_', " ")
    }

    pub fn is_required(self) -> bool {
        REQUIRED_FIELDS.contains(&self)
    }
}

/// One of the eight fixed document categories attached to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentSlot {
    Policyholder,
    ProposalForm,
    Quotation,
    CrCopy,
    Schedule,
    Invoice,
    PaymentReceipt,
    NicBr,
}

impl DocumentSlot {
    /// All slots, in registry order.
    pub const ALL: [DocumentSlot; 8] = [
        DocumentSlot::Policyholder,
        DocumentSlot::ProposalForm,
        DocumentSlot::Quotation,
        DocumentSlot::CrCopy,
        DocumentSlot::Schedule,
        DocumentSlot::Invoice,
        DocumentSlot::PaymentReceipt,
        DocumentSlot::NicBr,
    ];

    /// URL column; also the multipart field name the document is uploaded under.
    pub fn doc_column(self) -> &'static str {
        match self {
            DocumentSlot::Policyholder => "policyholder_doc_url",
            DocumentSlot::ProposalForm => "proposal_form_doc_url",
            DocumentSlot::Quotation => "quotation_doc_url",
            DocumentSlot::CrCopy => "cr_copy_doc_url",
            DocumentSlot::Schedule => "schedule_doc_url",
            DocumentSlot::Invoice => "invoice_doc_url",
            DocumentSlot::PaymentReceipt => "payment_receipt_doc_url",
            DocumentSlot::NicBr => "nic_br_doc_url",
        }
    }

    /// Structured field holding the text extracted from this slot's document.
    pub fn text_field(self) -> Field {
        match self {
            DocumentSlot::Policyholder => Field::PolicyholderText,
            DocumentSlot::ProposalForm => Field::ProposalFormText,
            DocumentSlot::Quotation => Field::QuotationText,
            DocumentSlot::CrCopy => Field::CrCopyText,
            DocumentSlot::Schedule => Field::ScheduleText,
            DocumentSlot::Invoice => Field::InvoiceText,
            DocumentSlot::PaymentReceipt => Field::PaymentReceiptText,
            DocumentSlot::NicBr => Field::NicBrText,
        }
    }

    pub fn from_doc_column(name: &str) -> Option<DocumentSlot> {
        DocumentSlot::ALL
            .iter()
            .copied()
            .find(|slot| slot.doc_column() == name)
    }
}

/// The `(document column, text field)` pairs, in registry order.
pub fn document_pairs() -> impl Iterator<Item = (&'static str, Field)> {
    DocumentSlot::ALL
        .into_iter()
        .map(|slot| (slot.doc_column(), slot.text_field()))
}

/// Every column name the registry knows about, in table order: id, the
/// structured fields, then the document URLs.
pub fn all_columns() -> Vec<&'static str> {
    std::iter::once(ID_COLUMN)
        .chain(Field::ALL.iter().map(|f| f.column()))
        .chain(DocumentSlot::ALL.iter().map(|s| s.doc_column()))
        .collect()
}
