//! Schema qualification of introspected DDL
//!
//! The disposable engine knows nothing about the target schema, so every
//! table reference it reports is rewritten to `"<schema>"."<table>"`. Index
//! names are qualified on `DROP INDEX` only, since PostgreSQL creates an index
//! in its table's schema and rejects a qualified name in `CREATE INDEX`.

use std::sync::OnceLock;

use regex::{Captures, Regex};

struct Rules {
    table_statement: Regex,
    references: Regex,
    create_index: Regex,
    drop_index: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        table_statement: Regex::new(
            r#"^(CREATE TABLE(?: IF NOT EXISTS)?|ALTER TABLE(?: IF EXISTS)?|DROP TABLE(?: IF EXISTS)?)\s+"([^"]+)""#,
        )
        .expect("table statement regex is valid"),
        references: Regex::new(r#"REFERENCES\s+"([^"]+)""#).expect("references regex is valid"),
        create_index: Regex::new(
            r#"^(CREATE (?:UNIQUE )?INDEX(?: IF NOT EXISTS)?\s+"[^"]+"\s+ON)\s+"([^"]+)""#,
        )
        .expect("create index regex is valid"),
        drop_index: Regex::new(r#"^(DROP INDEX(?: IF EXISTS)?)\s+"([^"]+)""#)
            .expect("drop index regex is valid"),
    })
}

fn qualified(qualifier: &str, name: &str) -> String {
    format!("\"{}\".\"{}\"", qualifier, name)
}

/// Replace every table reference in one statement
///
/// `rename` receives the bare table name and returns the text written in its
/// place, quotes included. Index, constraint and column names are left alone.
pub fn rename_tables(statement: &str, rename: &dyn Fn(&str) -> String) -> String {
    let rules = rules();
    let statement = statement.trim();

    let statement = rules.table_statement.replace(statement, |caps: &Captures| {
        format!("{} {}", &caps[1], rename(&caps[2]))
    });
    let statement = rules.create_index.replace(&statement, |caps: &Captures| {
        format!("{} {}", &caps[1], rename(&caps[2]))
    });
    let statement = rules.references.replace_all(&statement, |caps: &Captures| {
        format!("REFERENCES {}", rename(&caps[1]))
    });

    statement.into_owned()
}

/// Qualify every table reference in one statement
pub fn qualify_statement(statement: &str, qualifier: &str) -> String {
    let statement = rename_tables(statement, &|table| qualified(qualifier, table));
    rules()
        .drop_index
        .replace(&statement, |caps: &Captures| {
            format!("{} {}", &caps[1], qualified(qualifier, &caps[2]))
        })
        .into_owned()
}

/// Qualify a list of statements
pub fn qualify_all(statements: &[String], qualifier: &str) -> Vec<String> {
    statements
        .iter()
        .map(|statement| qualify_statement(statement, qualifier))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_table_and_references() {
        let sql = "CREATE TABLE \"fills_0a1b2c3d\" (\n    \"id\" SERIAL NOT NULL,\n    CONSTRAINT \"fk_fills_0a1b2c3d_batch_0a1b2c3d\" FOREIGN KEY (\"batch_0a1b2c3d_id\") REFERENCES \"batch_0a1b2c3d\" (\"id\") ON DELETE CASCADE\n)";
        let out = qualify_statement(sql, "events");

        assert!(out.starts_with("CREATE TABLE \"events\".\"fills_0a1b2c3d\" ("));
        assert!(out.contains("REFERENCES \"events\".\"batch_0a1b2c3d\" (\"id\")"));
        // Constraint and column names stay unqualified
        assert!(out.contains("CONSTRAINT \"fk_fills_0a1b2c3d_batch_0a1b2c3d\" FOREIGN KEY (\"batch_0a1b2c3d_id\")"));
    }

    #[test]
    fn test_indexes() {
        assert_eq!(
            qualify_statement("CREATE INDEX \"idx_a_b\" ON \"a\" (\"b\")", "events"),
            "CREATE INDEX \"idx_a_b\" ON \"events\".\"a\" (\"b\")"
        );
        assert_eq!(
            qualify_statement("DROP INDEX \"idx_a_b\"", "events"),
            "DROP INDEX \"events\".\"idx_a_b\""
        );
    }

    #[test]
    fn test_drop_and_alter() {
        assert_eq!(qualify_statement("DROP TABLE \"a\"", "s"), "DROP TABLE \"s\".\"a\"");
        assert_eq!(
            qualify_statement("DROP TABLE IF EXISTS \"a\"", "s"),
            "DROP TABLE IF EXISTS \"s\".\"a\""
        );
        assert_eq!(
            qualify_statement("ALTER TABLE \"a\" ADD COLUMN \"x\" integer", "s"),
            "ALTER TABLE \"s\".\"a\" ADD COLUMN \"x\" integer"
        );
    }

    #[test]
    fn test_rename_leaves_other_identifiers() {
        let sql = "CREATE TABLE \"t_legs\" (\"t_legs\" integer, CONSTRAINT \"fk_legs_order\" FOREIGN KEY (\"order_id\") REFERENCES \"t_order\" (\"id\"))";
        let out = rename_tables(sql, &|table| format!("\"{}\"", table.trim_start_matches("t_")));

        assert_eq!(
            out,
            "CREATE TABLE \"legs\" (\"t_legs\" integer, CONSTRAINT \"fk_legs_order\" FOREIGN KEY (\"order_id\") REFERENCES \"order\" (\"id\"))"
        );
        assert_eq!(
            rename_tables("CREATE INDEX \"idx_t_legs\" ON \"t_legs\" (\"order_id\")", &|table| format!("\"{}\"", &table[2..])),
            "CREATE INDEX \"idx_t_legs\" ON \"legs\" (\"order_id\")"
        );
    }

    #[test]
    fn test_unrelated_statements_are_untouched() {
        let sql = "SELECT 1";
        assert_eq!(qualify_statement(sql, "s"), sql);
    }
}
