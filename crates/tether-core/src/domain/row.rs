//! ResultRow - 型の分からないクエリ結果を JSON に載せるための表現
//!
//! 列の型は事前に分からないので、各セルは `Null` か `Text` のどちらかとして扱う。
//! NULL は JSON の `null`、空文字列は `""` としてシリアライズされる。

use serde::ser::{Serialize, SerializeMap, Serializer};

/// 1 セル分の値
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Cell {
    #[default]
    Null,
    Text(String),
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Null => None,
            Cell::Text(s) => Some(s),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map_or(Cell::Null, Cell::Text)
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// 列名 → セル の順序付きマッピング
///
/// 列の順序はクエリのメタデータが報告した順序のまま保持し、
/// JSON オブジェクトのキー順にもそのまま反映される。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    cells: Vec<(String, Cell)>,
}

impl ResultRow {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            cells: Vec::with_capacity(n),
        }
    }

    /// 同じ列名が既にあれば、位置はそのままで値だけ後の方で上書きする
    pub fn push(&mut self, column: impl Into<String>, cell: Cell) {
        let column = column.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = cell,
            None => self.cells.push((column, cell)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, cell) in &self.cells {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_serializes_in_column_order() {
        let mut row = ResultRow::with_capacity(3);
        row.push("zeta", Cell::Text("1".to_string()));
        row.push("alpha", Cell::Text("".to_string()));
        row.push("mid", Cell::Null);

        let s = serde_json::to_string(&row).unwrap();
        assert_eq!(s, r#"{"zeta":"1","alpha":"","mid":null}"#);
    }

    #[test]
    fn null_and_empty_are_distinct() {
        assert!(Cell::from(None).is_null());
        assert_eq!(Cell::from(Some(String::new())).as_text(), Some(""));
    }

    #[test]
    fn repeated_column_keeps_first_position_and_last_value() {
        let mut row = ResultRow::default();
        row.push("id", Cell::Text("1".to_string()));
        row.push("name", Cell::Null);
        row.push("id", Cell::Text("2".to_string()));

        assert_eq!(row.len(), 2);
        let s = serde_json::to_string(&row).unwrap();
        assert_eq!(s, r#"{"id":"2","name":null}"#);
    }

    #[test]
    fn lookup_by_column_name() {
        let mut row = ResultRow::default();
        row.push("id", Cell::Text("9".to_string()));
        assert_eq!(row.get("id").and_then(Cell::as_text), Some("9"));
        assert!(row.get("missing").is_none());
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id"]);
    }
}
