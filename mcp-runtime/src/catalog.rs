//! Document types exposed as typed tools. Each row expands into one tool per
//! supported action, named `{slug}_{action}`.

use crate::tool::{Category, RecordAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Date,
    /// Child table rows.
    Lines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateField {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Overrides the generic "'field' is required" text.
    pub message: Option<&'static str>,
}

const fn text(name: &'static str) -> CreateField {
    CreateField {
        name,
        kind: FieldKind::Text,
        message: None,
    }
}

const fn number(name: &'static str) -> CreateField {
    CreateField {
        name,
        kind: FieldKind::Number,
        message: None,
    }
}

const fn date(name: &'static str) -> CreateField {
    CreateField {
        name,
        kind: FieldKind::Date,
        message: None,
    }
}

const fn lines(name: &'static str, message: &'static str) -> CreateField {
    CreateField {
        name,
        kind: FieldKind::Lines,
        message: Some(message),
    }
}

/// Masters can be created and edited but are never submitted.
pub const MASTER: &[RecordAction] = &[
    RecordAction::List,
    RecordAction::Get,
    RecordAction::Create,
    RecordAction::Update,
];

/// Submittable documents. Deleting drafts goes through `doc_delete`.
pub const TRANSACTION: &[RecordAction] = &[
    RecordAction::List,
    RecordAction::Get,
    RecordAction::Create,
    RecordAction::Update,
    RecordAction::Submit,
    RecordAction::Cancel,
];

pub const READ_ONLY: &[RecordAction] = &[RecordAction::List, RecordAction::Get];

#[derive(Debug, Clone, Copy)]
pub struct DoctypeEntry {
    pub doctype: &'static str,
    pub slug: &'static str,
    pub category: Category,
    pub actions: &'static [RecordAction],
    /// Default projection for list calls.
    pub list_fields: &'static [&'static str],
    pub create_fields: &'static [CreateField],
}

const ITEMS: CreateField = lines("items", "'items' must contain at least one line");

pub const DOCTYPES: &[DoctypeEntry] = &[
    DoctypeEntry {
        doctype: "Customer",
        slug: "customer",
        category: Category::Sales,
        actions: MASTER,
        list_fields: &["name", "customer_name", "customer_group", "territory"],
        create_fields: &[text("customer_name")],
    },
    DoctypeEntry {
        doctype: "Quotation",
        slug: "quotation",
        category: Category::Sales,
        actions: TRANSACTION,
        list_fields: &["name", "party_name", "status", "transaction_date", "grand_total"],
        create_fields: &[text("party_name"), ITEMS],
    },
    DoctypeEntry {
        doctype: "Sales Order",
        slug: "sales_order",
        category: Category::Sales,
        actions: TRANSACTION,
        list_fields: &["name", "customer", "status", "transaction_date", "delivery_date", "grand_total"],
        create_fields: &[text("customer"), date("delivery_date"), ITEMS],
    },
    DoctypeEntry {
        doctype: "Sales Invoice",
        slug: "sales_invoice",
        category: Category::Sales,
        actions: TRANSACTION,
        list_fields: &["name", "customer", "status", "posting_date", "due_date", "grand_total", "outstanding_amount"],
        create_fields: &[text("customer"), ITEMS],
    },
    DoctypeEntry {
        doctype: "Supplier",
        slug: "supplier",
        category: Category::Purchasing,
        actions: MASTER,
        list_fields: &["name", "supplier_name", "supplier_group", "country"],
        create_fields: &[text("supplier_name")],
    },
    DoctypeEntry {
        doctype: "Purchase Order",
        slug: "purchase_order",
        category: Category::Purchasing,
        actions: TRANSACTION,
        list_fields: &["name", "supplier", "status", "transaction_date", "schedule_date", "grand_total"],
        create_fields: &[text("supplier"), date("schedule_date"), ITEMS],
    },
    DoctypeEntry {
        doctype: "Purchase Invoice",
        slug: "purchase_invoice",
        category: Category::Purchasing,
        actions: TRANSACTION,
        list_fields: &["name", "supplier", "status", "posting_date", "due_date", "grand_total", "outstanding_amount"],
        create_fields: &[text("supplier"), ITEMS],
    },
    DoctypeEntry {
        doctype: "Item",
        slug: "item",
        category: Category::Inventory,
        actions: MASTER,
        list_fields: &["name", "item_name", "item_group", "stock_uom", "is_stock_item"],
        create_fields: &[text("item_code"), text("item_group")],
    },
    DoctypeEntry {
        doctype: "Stock Entry",
        slug: "stock_entry",
        category: Category::Inventory,
        actions: TRANSACTION,
        list_fields: &["name", "stock_entry_type", "posting_date", "total_outgoing_value"],
        create_fields: &[text("stock_entry_type"), ITEMS],
    },
    DoctypeEntry {
        doctype: "Account",
        slug: "account",
        category: Category::Accounting,
        actions: READ_ONLY,
        list_fields: &["name", "account_name", "root_type", "parent_account", "is_group"],
        create_fields: &[],
    },
    DoctypeEntry {
        doctype: "Journal Entry",
        slug: "journal_entry",
        category: Category::Accounting,
        actions: TRANSACTION,
        list_fields: &["name", "voucher_type", "posting_date", "total_debit", "total_credit"],
        create_fields: &[
            date("posting_date"),
            lines("accounts", "'accounts' must contain at least one debit and one credit row"),
        ],
    },
    DoctypeEntry {
        doctype: "Payment Entry",
        slug: "payment_entry",
        category: Category::Accounting,
        actions: TRANSACTION,
        list_fields: &["name", "payment_type", "party_type", "party", "posting_date", "paid_amount"],
        create_fields: &[
            text("payment_type"),
            text("party_type"),
            text("party"),
            number("paid_amount"),
        ],
    },
    DoctypeEntry {
        doctype: "Employee",
        slug: "employee",
        category: Category::HumanResources,
        actions: MASTER,
        list_fields: &["name", "employee_name", "department", "designation", "status"],
        create_fields: &[
            text("first_name"),
            text("gender"),
            date("date_of_birth"),
            date("date_of_joining"),
        ],
    },
    DoctypeEntry {
        doctype: "Leave Application",
        slug: "leave_application",
        category: Category::HumanResources,
        actions: TRANSACTION,
        list_fields: &["name", "employee", "leave_type", "from_date", "to_date", "status"],
        create_fields: &[
            text("employee"),
            text("leave_type"),
            date("from_date"),
            date("to_date"),
        ],
    },
    DoctypeEntry {
        doctype: "Project",
        slug: "project",
        category: Category::Project,
        actions: MASTER,
        list_fields: &["name", "project_name", "status", "percent_complete", "expected_end_date"],
        create_fields: &[text("project_name")],
    },
    DoctypeEntry {
        doctype: "Task",
        slug: "task",
        category: Category::Project,
        actions: MASTER,
        list_fields: &["name", "subject", "project", "status", "priority", "exp_end_date"],
        create_fields: &[text("subject")],
    },
    DoctypeEntry {
        doctype: "Work Order",
        slug: "work_order",
        category: Category::Manufacturing,
        actions: TRANSACTION,
        list_fields: &["name", "production_item", "bom_no", "qty", "produced_qty", "status"],
        create_fields: &[text("production_item"), text("bom_no"), number("qty")],
    },
    DoctypeEntry {
        doctype: "Delivery Note",
        slug: "delivery_note",
        category: Category::Delivery,
        actions: TRANSACTION,
        list_fields: &["name", "customer", "status", "posting_date", "grand_total"],
        create_fields: &[text("customer"), ITEMS],
    },
    DoctypeEntry {
        doctype: "Lead",
        slug: "lead",
        category: Category::CustomerRelationship,
        actions: MASTER,
        list_fields: &["name", "lead_name", "company_name", "status", "source"],
        create_fields: &[text("first_name")],
    },
    DoctypeEntry {
        doctype: "Opportunity",
        slug: "opportunity",
        category: Category::CustomerRelationship,
        actions: MASTER,
        list_fields: &["name", "opportunity_from", "party_name", "status", "opportunity_amount"],
        create_fields: &[text("opportunity_from"), text("party_name")],
    },
    DoctypeEntry {
        doctype: "Asset",
        slug: "asset",
        category: Category::Assets,
        actions: READ_ONLY,
        list_fields: &["name", "asset_name", "asset_category", "location", "status", "gross_purchase_amount"],
        create_fields: &[],
    },
    DoctypeEntry {
        doctype: "Company",
        slug: "company",
        category: Category::Setup,
        actions: READ_ONLY,
        list_fields: &["name", "company_name", "default_currency", "country"],
        create_fields: &[],
    },
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn slugs_and_doctypes_are_unique() {
        let slugs: HashSet<_> = DOCTYPES.iter().map(|d| d.slug).collect();
        let doctypes: HashSet<_> = DOCTYPES.iter().map(|d| d.doctype).collect();
        assert_eq!(slugs.len(), DOCTYPES.len());
        assert_eq!(doctypes.len(), DOCTYPES.len());
    }

    #[test]
    fn creatable_doctypes_declare_required_fields() {
        for entry in DOCTYPES {
            let creatable = entry.actions.contains(&RecordAction::Create);
            assert_eq!(creatable, !entry.create_fields.is_empty(), "{}", entry.doctype);
            assert!(entry.list_fields.contains(&"name"), "{}", entry.doctype);
        }
    }

    #[test]
    fn every_domain_category_has_a_doctype() {
        for category in Category::ALL {
            if matches!(category, Category::Analytics | Category::Generic) {
                continue;
            }
            assert!(
                DOCTYPES.iter().any(|d| d.category == category),
                "{category} has no doctype"
            );
        }
    }
}
