//! Schema registry: static table and index definitions
//!
//! Pure declarative data, defined once at build time and never mutated.
//! Both the brand-new-store creation path and the "create only what's
//! missing" migration logic consume this single source of truth.

/// Structural version of the store.
///
/// History:
/// - v1: full offline-first table set (including regions)
/// - v2: adds `countries` and `cities`
/// - v3: adds `cost_templates` and `supplier_categories`
pub const SCHEMA_VERSION: u32 = 3;

/// Record fields stamped by older sync wrappers that the reconciled store
/// no longer carries. Dropped silently during `update` merges.
pub const DEPRECATED_FIELDS: &[&str] =
    &["sync_status", "syncStatus", "local_updated", "isOfflineDraft"];

/// Closed set of table identifiers.
///
/// Callers can only name tables that exist in the registry, which removes
/// the "unknown table string" class of runtime errors from the CRUD surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Employees,
    Tours,
    Itineraries,
    Orders,
    Members,
    TourAddons,
    Customers,
    Payments,
    Quotes,
    QuoteItems,
    Todos,
    Visas,
    Suppliers,
    Regions,
    CalendarEvents,
    Countries,
    Cities,
    CostTemplates,
    SupplierCategories,
}

/// Secondary index definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSchema {
    pub name: &'static str,
    pub key_path: &'static str,
    pub unique: bool,
}

/// Table definition: primary-key field, key allocation mode, indexes.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub table: Table,
    pub key_path: &'static str,
    pub auto_increment: bool,
    /// Structural version at which this table first appears.
    pub since: u32,
    pub indexes: &'static [IndexSchema],
}

const fn idx(name: &'static str, unique: bool) -> IndexSchema {
    IndexSchema { name, key_path: name, unique }
}

/// Indexes shared by every business table.
const STAMPS: [IndexSchema; 2] = [idx("created_at", false), idx("updated_at", false)];

macro_rules! indexes {
    ($($name:literal $(unique $u:literal)?),* $(,)?) => {
        &[
            $(IndexSchema {
                name: $name,
                key_path: $name,
                unique: false $(|| $u)?,
            },)*
            STAMPS[0],
            STAMPS[1],
        ]
    };
}

/// The full registry, in `Table` declaration order.
pub static REGISTRY: [TableSchema; 19] = [
    TableSchema {
        table: Table::Employees,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["employee_number" unique true, "email" unique true, "is_active"],
    },
    TableSchema {
        table: Table::Tours,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["code" unique true, "status", "start_date", "is_active"],
    },
    TableSchema {
        table: Table::Itineraries,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["code" unique true, "tour_id", "status"],
    },
    TableSchema {
        table: Table::Orders,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["code" unique true, "tour_id", "customer_id", "status", "payment_status"],
    },
    TableSchema {
        table: Table::Members,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["order_id", "tour_id", "name", "passport_number"],
    },
    TableSchema {
        table: Table::TourAddons,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["tour_id", "name", "is_active"],
    },
    TableSchema {
        table: Table::Customers,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["code" unique true, "phone", "email", "is_vip"],
    },
    TableSchema {
        table: Table::Payments,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["code" unique true, "order_id", "customer_id", "status", "payment_date"],
    },
    TableSchema {
        table: Table::Quotes,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["code" unique true, "customer_id", "status", "start_date"],
    },
    TableSchema {
        table: Table::QuoteItems,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["quote_id", "category_id", "type"],
    },
    TableSchema {
        table: Table::Todos,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["creator", "assignee", "status", "priority", "due_date"],
    },
    TableSchema {
        table: Table::Visas,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["code" unique true, "tour_id", "customer_id", "status"],
    },
    TableSchema {
        table: Table::Suppliers,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["code" unique true, "name", "type", "is_active"],
    },
    TableSchema {
        table: Table::Regions,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["country_id", "name", "display_order"],
    },
    TableSchema {
        table: Table::CalendarEvents,
        key_path: "id",
        auto_increment: false,
        since: 1,
        indexes: indexes!["user_id", "event_type", "start_date", "end_date"],
    },
    TableSchema {
        table: Table::Countries,
        key_path: "id",
        auto_increment: false,
        since: 2,
        indexes: indexes!["code" unique true, "name", "display_order"],
    },
    TableSchema {
        table: Table::Cities,
        key_path: "id",
        auto_increment: false,
        since: 2,
        indexes: indexes!["country_id", "region_id", "name", "airport_code"],
    },
    TableSchema {
        table: Table::CostTemplates,
        key_path: "id",
        auto_increment: false,
        since: 3,
        indexes: indexes!["supplier_id", "city_id", "category", "season"],
    },
    TableSchema {
        table: Table::SupplierCategories,
        key_path: "id",
        auto_increment: false,
        since: 3,
        indexes: indexes!["name", "display_order"],
    },
];

impl Table {
    /// All tables, in registry order.
    pub const ALL: [Table; 19] = [
        Table::Employees,
        Table::Tours,
        Table::Itineraries,
        Table::Orders,
        Table::Members,
        Table::TourAddons,
        Table::Customers,
        Table::Payments,
        Table::Quotes,
        Table::QuoteItems,
        Table::Todos,
        Table::Visas,
        Table::Suppliers,
        Table::Regions,
        Table::CalendarEvents,
        Table::Countries,
        Table::Cities,
        Table::CostTemplates,
        Table::SupplierCategories,
    ];

    /// Stable on-disk / wire name. Renaming a table is a breaking change
    /// requiring an explicit migration step, never an implicit rename.
    pub fn name(self) -> &'static str {
        match self {
            Table::Employees => "employees",
            Table::Tours => "tours",
            Table::Itineraries => "itineraries",
            Table::Orders => "orders",
            Table::Members => "members",
            Table::TourAddons => "tour_addons",
            Table::Customers => "customers",
            Table::Payments => "payments",
            Table::Quotes => "quotes",
            Table::QuoteItems => "quote_items",
            Table::Todos => "todos",
            Table::Visas => "visas",
            Table::Suppliers => "suppliers",
            Table::Regions => "regions",
            Table::CalendarEvents => "calendar_events",
            Table::Countries => "countries",
            Table::Cities => "cities",
            Table::CostTemplates => "cost_templates",
            Table::SupplierCategories => "supplier_categories",
        }
    }

    /// Reverse lookup, used by import to match incoming table names.
    pub fn parse(name: &str) -> Option<Table> {
        Table::ALL.iter().copied().find(|t| t.name() == name)
    }

    pub fn schema(self) -> &'static TableSchema {
        &REGISTRY[self as usize]
    }

    pub fn since(self) -> u32 {
        self.schema().since
    }
}

impl TableSchema {
    /// Look up a declared secondary index by name.
    pub fn index(&self, name: &str) -> Option<&'static IndexSchema> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// Tables first introduced at version `version`.
pub fn tables_introduced_at(version: u32) -> impl Iterator<Item = Table> {
    Table::ALL.into_iter().filter(move |t| t.since() == version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_order_matches_enum_discriminants() {
        for (i, table) in Table::ALL.iter().enumerate() {
            assert_eq!(REGISTRY[i].table, *table);
            assert_eq!(table.schema().table, *table);
        }
    }

    #[test]
    fn every_table_round_trips_through_its_name() {
        for table in Table::ALL {
            assert_eq!(Table::parse(table.name()), Some(table));
        }
        assert_eq!(Table::parse("no_such_table"), None);
    }

    #[test]
    fn version_history_is_monotone_and_complete() {
        for table in Table::ALL {
            assert!(table.since() >= 1 && table.since() <= SCHEMA_VERSION);
        }
        assert_eq!(
            tables_introduced_at(2).collect::<Vec<_>>(),
            vec![Table::Countries, Table::Cities]
        );
        assert_eq!(
            tables_introduced_at(3).collect::<Vec<_>>(),
            vec![Table::CostTemplates, Table::SupplierCategories]
        );
    }

    #[test]
    fn business_tables_index_their_timestamps() {
        for table in Table::ALL {
            let schema = table.schema();
            assert!(schema.index("created_at").is_some(), "{}", table.name());
            assert!(schema.index("updated_at").is_some(), "{}", table.name());
        }
    }

    #[test]
    fn unique_flags_survive_in_the_registry() {
        let code = Table::Tours.schema().index("code").unwrap();
        assert!(code.unique);
        let status = Table::Tours.schema().index("status").unwrap();
        assert!(!status.unique);
    }
}
