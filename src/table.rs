#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Number(f64),
}

impl Value {
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::String(text) => Self::Text(text.clone()),
            serde_json::Value::Number(number) => {
                number.as_f64().map(Self::Number).unwrap_or(Self::Null)
            }
            serde_json::Value::Bool(flag) => Self::Text(flag.to_string()),
            other => Self::Text(other.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            Self::Text(text) => text.trim().parse::<f64>().ok(),
            Self::Null => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Self::Number(number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Numeric,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn text(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::Text,
        }
    }

    pub fn numeric(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::Numeric,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnKind::Numeric
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len(), "row width must match schema");
        self.rows.push(row);
    }

    #[cfg(test)]
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let index = self.column_index(name)?;
        self.rows.get(row).map(|values| &values[index])
    }

    /// Sets `name` to `value` on every row, appending the column if absent.
    pub fn stamp_column(&mut self, column: Column, value: Value) {
        match self.column_index(&column.name) {
            Some(index) => {
                self.columns[index].kind = column.kind;
                for row in &mut self.rows {
                    row[index] = value.clone();
                }
            }
            None => {
                self.columns.push(column);
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
    }

    /// Numeric view of a column; nulls and unparseable text read as NaN.
    pub fn numeric_values(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row[index].as_f64().unwrap_or(f64::NAN))
                .collect(),
        )
    }

    pub fn set_numeric_values(&mut self, name: &str, values: &[f64]) -> bool {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        self.columns[index].kind = ColumnKind::Numeric;
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[index] = Value::Number(*value);
        }
        true
    }

    pub fn max_of(&self, name: &str) -> Option<f64> {
        self.numeric_values(name)?
            .into_iter()
            .filter(|value| !value.is_nan())
            .reduce(f64::max)
    }

    /// Replaces NaN and null cells of numeric columns with 0, returning how many changed.
    pub fn fill_missing_numeric(&mut self) -> usize {
        let numeric = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, column)| column.is_numeric())
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        let mut replaced = 0;
        for row in &mut self.rows {
            for index in &numeric {
                let missing = match &row[*index] {
                    Value::Null => true,
                    Value::Number(number) => number.is_nan(),
                    Value::Text(_) => false,
                };
                if missing {
                    row[*index] = Value::Number(0.0);
                    replaced += 1;
                }
            }
        }
        replaced
    }

    pub fn select(&self, names: &[&str]) -> Table {
        let indices = names
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect::<Vec<_>>();
        Table {
            columns: indices.iter().map(|index| self.columns[*index].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|index| row[*index].clone()).collect())
                .collect(),
        }
    }
}
