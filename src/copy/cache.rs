use std::collections::HashMap;

/// Schema-qualified table name, the identity of a table across databases
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableKey {
    pub schema: Option<String>,
    pub name: String,
}

/// Name and owning table of a source field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub table_id: i32,
}

/// Lookups memoized for the lifetime of one copy run.
///
/// Queries in one collection tree reference the same handful of tables and fields over
/// and over; every entry here saves a round trip per query per target. The cache is owned
/// by the run and dropped with it.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    tables: HashMap<i32, TableKey>,
    fields: HashMap<i32, FieldInfo>,
    target_tables: HashMap<(i32, TableKey), i32>,
    target_fields: HashMap<(i32, String), i32>,
    hits: usize,
    misses: usize,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&mut self, table_id: i32) -> Option<TableKey> {
        let found = self.tables.get(&table_id).cloned();
        self.record(found.is_some());
        found
    }

    pub fn put_table(&mut self, table_id: i32, key: TableKey) {
        self.tables.insert(table_id, key);
    }

    pub fn field(&mut self, field_id: i32) -> Option<FieldInfo> {
        let found = self.fields.get(&field_id).cloned();
        self.record(found.is_some());
        found
    }

    pub fn put_field(&mut self, field_id: i32, info: FieldInfo) {
        self.fields.insert(field_id, info);
    }

    /// Id of the table named `key` in database `target`
    pub fn target_table(&mut self, target: i32, key: &TableKey) -> Option<i32> {
        let found = self.target_tables.get(&(target, key.clone())).copied();
        self.record(found.is_some());
        found
    }

    pub fn put_target_table(&mut self, target: i32, key: TableKey, table_id: i32) {
        self.target_tables.insert((target, key), table_id);
    }

    /// Id of the field named `name` on target table `table_id`
    pub fn target_field(&mut self, table_id: i32, name: &str) -> Option<i32> {
        let found = self.target_fields.get(&(table_id, name.to_string())).copied();
        self.record(found.is_some());
        found
    }

    pub fn put_target_field(&mut self, table_id: i32, name: String, field_id: i32) {
        self.target_fields.insert((table_id, name), field_id);
    }

    /// (hits, misses) since the run started
    pub fn stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    fn record(&mut self, hit: bool) {
        if hit {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> TableKey {
        TableKey {
            schema: Some("public".to_string()),
            name: "orders".to_string(),
        }
    }

    #[test]
    fn test_target_tables_are_scoped_by_database() {
        let mut cache = ReferenceCache::new();
        cache.put_target_table(2, orders(), 20);
        cache.put_target_table(3, orders(), 30);

        assert_eq!(cache.target_table(2, &orders()), Some(20));
        assert_eq!(cache.target_table(3, &orders()), Some(30));
        assert_eq!(cache.target_table(4, &orders()), None);
        assert_eq!(cache.stats(), (2, 1));
    }

    #[test]
    fn test_fields_by_source_id_and_name() {
        let mut cache = ReferenceCache::new();
        assert!(cache.field(7).is_none());
        cache.put_field(
            7,
            FieldInfo {
                name: "total".to_string(),
                table_id: 1,
            },
        );
        cache.put_target_field(20, "total".to_string(), 70);

        assert_eq!(cache.field(7).map(|f| f.table_id), Some(1));
        assert_eq!(cache.target_field(20, "total"), Some(70));
        assert_eq!(cache.target_field(20, "subtotal"), None);
    }
}
