//! Table schema definitions for the game and save-game store

use super::types::*;

// =============================================================================
// Settings
// =============================================================================

pub static SETTINGS: TableSchema = TableSchema {
    name: "settings",
    owner: TableOwner::Settings,
    columns: &[Column::required("current_language", ColumnType::Integer)],
    indexes: &[],
};

// =============================================================================
// Catalog tables (filled from game packages)
// =============================================================================

pub static TEXT: TableSchema = TableSchema {
    name: "text",
    owner: TableOwner::Catalog,
    columns: &[
        Column::primary("id_uniq", ColumnType::Integer),
        Column::required("language", ColumnType::Integer),
        Column::required("page", ColumnType::Integer),
        Column::required("id", ColumnType::Integer),
        Column::required("text", ColumnType::Text),
    ],
    indexes: &[
        Index::on("idx_text_language_page", &["language", "page"]),
        Index::on("idx_text_language_page_id", &["language", "page", "id"]),
        Index::on("idx_text_id", &["id"]),
        Index::on("idx_text_language_id", &["language", "id"]),
    ],
};

pub static WARE: TableSchema = TableSchema {
    name: "ware",
    owner: TableOwner::Catalog,
    columns: &[
        Column::primary("id", ColumnType::Text),
        Column::required("name", ColumnType::Text),
        Column::required("group_of", ColumnType::Text),
        Column::required("transport", ColumnType::Text),
        Column::required("volume", ColumnType::Integer),
        Column::required("price_min", ColumnType::Integer),
        Column::required("price_avg", ColumnType::Integer),
        Column::required("price_max", ColumnType::Integer),
        Column::required("component_macro", ColumnType::Text),
        Column::required("text", ColumnType::Text),
    ],
    indexes: &[Index::on("idx_ware_component_macro", &["component_macro"])],
};

pub static FACTION: TableSchema = TableSchema {
    name: "faction",
    owner: TableOwner::Catalog,
    columns: &[
        Column::primary("id", ColumnType::Text),
        Column::required("name", ColumnType::Text),
        Column::required("shortname", ColumnType::Text),
        Column::required("prefixname", ColumnType::Text),
    ],
    indexes: &[],
};

pub static CLUSTER_SECTOR_NAME: TableSchema = TableSchema {
    name: "cluster_sector_name",
    owner: TableOwner::Catalog,
    columns: &[
        Column::primary("macro", ColumnType::Text),
        Column::required("name", ColumnType::Text),
    ],
    indexes: &[],
};

pub static STORAGE: TableSchema = TableSchema {
    name: "storage",
    owner: TableOwner::Catalog,
    columns: &[
        Column::primary("id", ColumnType::Integer),
        Column::required("macro", ColumnType::Text),
        Column::required("transport", ColumnType::Text),
        Column::required("capacity", ColumnType::Integer),
    ],
    indexes: &[
        Index::on("idx_storage_transport", &["transport"]),
        Index::unique("idx_storage_macro_transport", &["macro", "transport"]),
    ],
};

pub static SHIP_STORAGE: TableSchema = TableSchema {
    name: "ship_storage",
    owner: TableOwner::Catalog,
    columns: &[
        Column::primary("id", ColumnType::Integer),
        Column::required("ship_macro", ColumnType::Text),
        Column::required("storage_macro", ColumnType::Text),
    ],
    indexes: &[
        Index::on("idx_ship_storage_ship_macro", &["ship_macro"]),
        Index::unique("idx_ship_storage_pair", &["ship_macro", "storage_macro"]),
    ],
};

pub static SHIP_TYPE: TableSchema = TableSchema {
    name: "ship_type",
    owner: TableOwner::Catalog,
    columns: &[
        Column::primary("macro", ColumnType::Text),
        Column::required("type", ColumnType::Text),
    ],
    indexes: &[],
};

// =============================================================================
// Save-game tables (replaced on every import)
// =============================================================================

pub static COMPONENT: TableSchema = TableSchema {
    name: "component",
    owner: TableOwner::SaveGame,
    columns: &[
        Column::primary("id", ColumnType::Integer),
        Column::required("type", ColumnType::Text),
        Column::required("class", ColumnType::Text),
        Column::required("macro", ColumnType::Text),
        Column::required("owner", ColumnType::Text),
        Column::required("sector", ColumnType::Text),
        Column::required("name", ColumnType::Text),
        Column::required("nameindex", ColumnType::Text),
        Column::required("code", ColumnType::Text),
    ],
    indexes: &[
        Index::on("idx_component_type", &["type"]),
        Index::on("idx_component_type_owner", &["type", "owner"]),
        Index::on("idx_component_type_owner_id", &["type", "owner", "id"]),
    ],
};

pub static TRADE: TableSchema = TableSchema {
    name: "trade",
    owner: TableOwner::SaveGame,
    columns: &[
        Column::primary("id", ColumnType::Integer),
        Column::required("seller", ColumnType::Integer),
        Column::required("buyer", ColumnType::Integer),
        Column::required("ware", ColumnType::Text),
        Column::required("price", ColumnType::Integer),
        Column::required("volume", ColumnType::Integer),
        Column::required("time", ColumnType::Integer),
        Column::generated("trade_sum", ColumnType::Integer, "price * volume"),
    ],
    indexes: &[
        Index::on("idx_trade_seller_time", &["seller", "time"]),
        Index::on("idx_trade_buyer_time", &["buyer", "time"]),
        Index::on("idx_trade_ware", &["ware"]),
        Index::on("idx_trade_seller_time_ware", &["seller", "time", "ware"]),
        Index::on("idx_trade_buyer_time_ware", &["buyer", "time", "ware"]),
    ],
};

pub static GATE: TableSchema = TableSchema {
    name: "gate",
    owner: TableOwner::SaveGame,
    columns: &[
        Column::primary("id", ColumnType::Integer),
        Column::required("gate_id", ColumnType::Integer),
        Column::required("code", ColumnType::Text),
        Column::required("sector", ColumnType::Text),
        Column::required("connection", ColumnType::Integer),
        Column::required("connected", ColumnType::Integer),
    ],
    indexes: &[
        Index::on("idx_gate_id", &["gate_id"]),
        Index::on("idx_gate_sector", &["sector"]),
        Index::on("idx_gate_connection", &["connection"]),
        Index::on("idx_gate_connected", &["connected"]),
    ],
};

pub static SUPERHIGHWAY: TableSchema = TableSchema {
    name: "superhighway",
    owner: TableOwner::SaveGame,
    columns: &[
        Column::primary("id", ColumnType::Integer),
        Column::required("macro", ColumnType::Text),
        Column::required("entrygate", ColumnType::Integer),
        Column::required("sector_from", ColumnType::Text),
        Column::required("exitgate", ColumnType::Integer),
        Column::required("sector_to", ColumnType::Text),
    ],
    indexes: &[
        Index::on("idx_superhighway_entrygate", &["entrygate"]),
        Index::on("idx_superhighway_exitgate", &["exitgate"]),
        Index::on("idx_superhighway_sector_from", &["sector_from"]),
        Index::on("idx_superhighway_sector_to", &["sector_to"]),
    ],
};

pub static SUBORDINATE: TableSchema = TableSchema {
    name: "subordinate",
    owner: TableOwner::SaveGame,
    columns: &[
        Column::primary("id", ColumnType::Integer),
        Column::required("commander_id", ColumnType::Integer),
        Column::required("subordinate_id", ColumnType::Integer),
        Column::required("assignment", ColumnType::Text),
    ],
    indexes: &[
        Index::on("idx_subordinate_commander_id", &["commander_id"]),
        Index::on("idx_subordinate_child_id", &["subordinate_id"]),
        Index::on("idx_subordinate_assignment", &["assignment"]),
    ],
};

/// All tables, in creation order
pub static ALL_TABLES: &[&TableSchema] = &[
    &SETTINGS,
    &TEXT,
    &WARE,
    &FACTION,
    &CLUSTER_SECTOR_NAME,
    &STORAGE,
    &SHIP_STORAGE,
    &SHIP_TYPE,
    &COMPONENT,
    &TRADE,
    &GATE,
    &SUPERHIGHWAY,
    &SUBORDINATE,
];

/// Get a table by name
pub fn get_table(name: &str) -> Option<&'static TableSchema> {
    ALL_TABLES.iter().find(|t| t.name == name).copied()
}

/// Tables filled by one kind of load
pub fn tables_owned_by(owner: TableOwner) -> Vec<&'static TableSchema> {
    ALL_TABLES
        .iter()
        .filter(|t| t.owner == owner)
        .copied()
        .collect()
}
