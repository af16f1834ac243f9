use anyhow::{bail, Context, Result};

use crate::nav::models::{Cell, Rect};

/// Parses `x,y`.
pub fn parse_cell(s: &str) -> Result<Cell> {
    let parts = parse_ints(s)?;
    if parts.len() != 2 {
        bail!("expected x,y, got {:?}", s);
    }
    Ok(Cell::new(parts[0], parts[1]))
}

/// Parses `x,y,w,h`.
pub fn parse_rect(s: &str) -> Result<Rect> {
    let parts = parse_ints(s)?;
    if parts.len() != 4 {
        bail!("expected x,y,width,height, got {:?}", s);
    }
    Ok(Rect::new(parts[0], parts[1], parts[2], parts[3]))
}

fn parse_ints(s: &str) -> Result<Vec<i32>> {
    s.split(',')
        .map(|p| p.trim().parse::<i32>().with_context(|| format!("bad integer {:?} in {:?}", p, s)))
        .collect()
}

/// Rounds `n` up to a multiple of `step`.
pub fn round_up(n: i32, step: i32) -> i32 {
    if step <= 0 {
        return n;
    }
    (n + step - 1) / step * step
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cell_and_rect() {
        assert_eq!(parse_cell(" 3, 4").unwrap(), Cell::new(3, 4));
        assert!(parse_cell("3").is_err());
        assert!(parse_cell("a,b").is_err());
        assert_eq!(parse_rect("0,0,8,4").unwrap(), Rect::new(0, 0, 8, 4));
        assert!(parse_rect("0,0,8").is_err());
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(10, 8), 16);
        assert_eq!(round_up(16, 8), 16);
        assert_eq!(round_up(1, 1), 1);
    }
}
