use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::nav::grid::IMPASSABLE;
use crate::util::round_up;

/// Character to cost table used when reading a text map.
#[derive(Clone, Debug, PartialEq)]
pub struct AliasTable {
    costs: BTreeMap<char, u8>,
}

impl Default for AliasTable {
    fn default() -> Self {
        let mut costs = BTreeMap::new();
        costs.insert('.', 1);
        costs.insert(',', 2);
        costs.insert('~', 5);
        costs.insert('#', IMPASSABLE);
        costs.insert('X', IMPASSABLE);
        for d in 1..=9u8 {
            costs.insert((b'0' + d) as char, d);
        }
        Self { costs }
    }
}

impl AliasTable {
    /// Loads a JSON object such as `{"#": 255, ".": 1}` on top of the defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading aliases {}", path.display()))?;
        let raw: BTreeMap<String, u8> =
            serde_json::from_str(&text).with_context(|| format!("parsing aliases {}", path.display()))?;
        let mut table = Self::default();
        for (key, cost) in raw {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    table.costs.insert(c, cost);
                }
                _ => bail!("alias key {:?} must be a single character", key),
            }
        }
        Ok(table)
    }

    pub fn cost(&self, c: char) -> Option<u8> {
        self.costs.get(&c).copied()
    }
}

/// Row-major cost grid read from text.
#[derive(Clone, Debug, PartialEq)]
pub struct TextMap {
    pub width: i32,
    pub height: i32,
    pub cost: Vec<u8>,
}

pub fn load(path: &Path, aliases: &AliasTable, cluster_width: i32, cluster_height: i32) -> Result<TextMap> {
    let text = fs::read_to_string(path).with_context(|| format!("reading map {}", path.display()))?;
    let map = parse(&text, aliases, cluster_width, cluster_height)
        .with_context(|| format!("parsing map {}", path.display()))?;
    log::info!("map: loaded {} as {}x{}", path.display(), map.width, map.height);
    Ok(map)
}

/// One row per line, top row first. Lines starting with `;` are comments.
/// Short rows and the area up to the next cluster multiple are filled with
/// impassable cells.
pub fn parse(text: &str, aliases: &AliasTable, cluster_width: i32, cluster_height: i32) -> Result<TextMap> {
    let mut rows: Vec<Vec<u8>> = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.starts_with(';') || line.is_empty() {
            continue;
        }
        let mut row = Vec::with_capacity(line.len());
        for (col, ch) in line.chars().enumerate() {
            match aliases.cost(ch) {
                Some(c) => row.push(c),
                None => bail!("unknown map character {:?} at line {}, column {}", ch, line_no + 1, col + 1),
            }
        }
        rows.push(row);
    }
    if rows.is_empty() {
        bail!("map has no rows");
    }

    let raw_width = rows.iter().map(Vec::len).max().unwrap_or(0) as i32;
    let raw_height = rows.len() as i32;
    let width = round_up(raw_width, cluster_width);
    let height = round_up(raw_height, cluster_height);
    let mut cost = vec![IMPASSABLE; (width * height) as usize];
    for (y, row) in rows.iter().enumerate() {
        let start = y * width as usize;
        cost[start..start + row.len()].copy_from_slice(row);
    }
    if width != raw_width || height != raw_height {
        log::debug!("map: padded {}x{} to {}x{}", raw_width, raw_height, width, height);
    }
    Ok(TextMap { width, height, cost })
}
