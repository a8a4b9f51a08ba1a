use serde::Serialize;

/// Conjunction of equality / substring predicates with bound parameters.
///
/// Field names are validated by `DbService` before the clause is rendered;
/// values are always sent as query parameters.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<String>,
    fields: Vec<String>,
    bindings: Vec<(String, serde_json::Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `field = value`
    pub fn eq(mut self, field: &str, value: impl Serialize) -> Self {
        let param = self.next_param();
        self.clauses.push(format!("{} = ${}", field, param));
        self.push(field, param, value);
        self
    }

    /// Case-sensitive substring match
    pub fn contains(mut self, field: &str, value: &str) -> Self {
        let param = self.next_param();
        self.clauses
            .push(format!("string::contains({}, ${})", field, param));
        self.push(field, param, value);
        self
    }

    /// `eq` when the value is present
    pub fn eq_opt<V: Serialize>(self, field: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.eq(field, value),
            None => self,
        }
    }

    /// `contains` when the value is present
    pub fn contains_opt(self, field: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.contains(field, value),
            None => self,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Renders ` WHERE a AND b`, or an empty string for no predicates
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn bindings(&self) -> &[(String, serde_json::Value)] {
        &self.bindings
    }

    fn next_param(&self) -> String {
        format!("p{}", self.bindings.len())
    }

    fn push(&mut self, field: &str, param: String, value: impl Serialize) {
        self.fields.push(field.to_string());
        // Plain data types always serialize to JSON; anything else is a programming error
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.bindings.push((param, value));
    }
}

/// Offset/limit window applied after filtering.
///
/// SurrealDB only accepts `LIMIT`/`START` values that fit in 32 bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

impl Page {
    pub fn new(offset: Option<u32>, limit: Option<u32>) -> Self {
        Self { offset, limit }
    }

    pub fn render(&self) -> String {
        let mut sql = String::new();
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" START {}", offset));
        }
        sql
    }
}
