use crate::schema::{TableSchema, ViewSchema};

/// Generate CREATE TABLE SQL for a table schema
pub fn generate_create_table(schema: &TableSchema) -> String {
    generate_create_table_as(schema, schema.name)
}

/// Generate CREATE TABLE SQL for a table schema under another name
pub fn generate_create_table_as(schema: &TableSchema, name: &str) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", name);
    let mut columns = Vec::new();

    for col in schema.columns {
        let sql_type = col.col_type.sql();

        if let Some(expr) = col.generated {
            columns.push(format!(
                "    {} {} GENERATED ALWAYS AS ({}) STORED",
                col.name, sql_type, expr
            ));
            continue;
        }

        let pk = if col.primary_key { " PRIMARY KEY" } else { "" };
        let null_constraint = if !col.nullable { " NOT NULL" } else { "" };

        columns.push(format!(
            "    {} {}{}{}",
            col.name, sql_type, pk, null_constraint
        ));
    }

    sql.push_str(&columns.join(",\n"));
    sql.push_str("\n)");

    sql
}

/// Generate CREATE INDEX statements for a table schema
pub fn generate_indexes(schema: &TableSchema) -> Vec<String> {
    schema
        .indexes
        .iter()
        .map(|index| {
            let unique = if index.unique { "UNIQUE " } else { "" };
            format!(
                "CREATE {}INDEX IF NOT EXISTS {} ON {}({})",
                unique,
                index.name,
                schema.name,
                index.columns.join(", ")
            )
        })
        .collect()
}

/// Generate CREATE VIEW SQL
pub fn generate_create_view(view: &ViewSchema) -> String {
    format!("CREATE VIEW IF NOT EXISTS {} AS\n{}", view.name, view.select)
}

/// Generate DROP VIEW SQL
pub fn generate_drop_view(view: &ViewSchema) -> String {
    format!("DROP VIEW IF EXISTS {}", view.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tables::{STORAGE, TRADE, WARE};
    use crate::schema::views::LANG;

    #[test]
    fn test_generate_create_table() {
        let sql = generate_create_table(&WARE);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS ware"));
        assert!(sql.contains("id TEXT PRIMARY KEY"));
        assert!(sql.contains("price_avg INTEGER NOT NULL"));
    }

    #[test]
    fn test_generated_column() {
        let sql = generate_create_table(&TRADE);
        assert!(sql.contains("trade_sum INTEGER GENERATED ALWAYS AS (price * volume) STORED"));
    }

    #[test]
    fn test_generate_indexes() {
        let indexes = generate_indexes(&STORAGE);
        assert!(indexes
            .iter()
            .any(|i| i == "CREATE UNIQUE INDEX IF NOT EXISTS idx_storage_macro_transport ON storage(macro, transport)"));
        assert!(indexes.iter().any(|i| i.contains("idx_storage_transport")));
    }

    #[test]
    fn test_generate_view() {
        let sql = generate_create_view(&LANG);
        assert!(sql.starts_with("CREATE VIEW IF NOT EXISTS lang AS"));
        assert_eq!(generate_drop_view(&LANG), "DROP VIEW IF EXISTS lang");
    }
}
