/// Output rows of a scan
use serde::Serialize;
use std::fmt;

/// One cell value; its variant matches the column type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            Cell::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(_) => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(v) => write!(f, "{}", v),
        }
    }
}

/// One cell slot per schema column; `None` when unselected or absent
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Row {
    cells: Vec<Option<Cell>>,
}

impl Row {
    pub fn new(width: usize) -> Self {
        Self {
            cells: vec![None; width],
        }
    }

    pub fn from_cells(cells: Vec<Option<Cell>>) -> Self {
        Self { cells }
    }

    pub fn set(&mut self, column: usize, cell: Cell) {
        if let Some(slot) = self.cells.get_mut(column) {
            *slot = Some(cell);
        }
    }

    pub fn get(&self, column: usize) -> Option<&Cell> {
        self.cells.get(column).and_then(Option::as_ref)
    }

    pub fn text(&self, column: usize) -> Option<&str> {
        self.get(column).and_then(Cell::as_text)
    }

    pub fn number(&self, column: usize) -> Option<f64> {
        self.get(column).and_then(Cell::as_number)
    }

    pub fn cells(&self) -> &[Option<Cell>] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
