/// Column data type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Column definition
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub col_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    /// Expression of a stored generated column
    pub generated: Option<&'static str>,
}

impl Column {
    /// Create an optional (nullable) column
    pub const fn new(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: true,
            primary_key: false,
            generated: None,
        }
    }

    /// Create a required (non-nullable) column
    pub const fn required(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: false,
            primary_key: false,
            generated: None,
        }
    }

    /// Create the primary key column
    pub const fn primary(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: true,
            primary_key: true,
            generated: None,
        }
    }

    /// Create a column computed from others and stored with the row
    pub const fn generated(name: &'static str, col_type: ColumnType, expr: &'static str) -> Self {
        Self {
            name,
            col_type,
            nullable: true,
            primary_key: false,
            generated: Some(expr),
        }
    }

    /// Whether inserts supply a value for this column
    pub fn is_insertable(&self) -> bool {
        self.generated.is_none()
    }
}

/// Index definition
#[derive(Debug, Clone)]
pub struct Index {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
}

impl Index {
    /// Create a non-unique index
    pub const fn on(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            columns,
            unique: false,
        }
    }

    /// Create a unique index
    pub const fn unique(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            columns,
            unique: true,
        }
    }
}

/// Which load fills a table, and therefore which load clears it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOwner {
    Settings,
    /// Game catalogs (texts, wares, factions, storages...)
    Catalog,
    /// The imported save game
    SaveGame,
}

/// Table schema definition
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: &'static str,
    pub owner: TableOwner,
    pub columns: &'static [Column],
    pub indexes: &'static [Index],
}

impl TableSchema {
    /// Names of the columns inserts write, in declaration order
    pub fn insert_columns(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.is_insertable())
            .map(|c| c.name)
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// View definition; `select` is the body after `AS`
#[derive(Debug, Clone)]
pub struct ViewSchema {
    pub name: &'static str,
    pub select: &'static str,
}
