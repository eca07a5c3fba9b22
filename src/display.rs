/// Lay out `items` in columns, filling each column top to bottom, sized to
/// the terminal width (`COLUMNS`, 80 when unset).
pub fn grid<S: AsRef<str>>(items: &[S]) -> String {
    let width = std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse::<usize>().ok())
        .filter(|w| *w > 0)
        .unwrap_or(80);
    grid_with_width(items, width)
}

pub fn grid_with_width<S: AsRef<str>>(items: &[S], width: usize) -> String {
    if items.is_empty() {
        return String::new();
    }

    let cell = items
        .iter()
        .map(|s| s.as_ref().chars().count())
        .max()
        .unwrap_or(0)
        + 2;
    let columns = (width / cell).max(1);
    let rows = items.len().div_ceil(columns);

    let mut out = String::new();
    for row in 0..rows {
        let mut line = String::new();
        for col in 0..columns {
            if let Some(item) = items.get(col * rows + row) {
                line.push_str(&format!("{:<cell$}", item.as_ref(), cell = cell));
            }
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

pub fn print_grid<S: AsRef<str>>(title: &str, items: &[S]) {
    println!("{}:", title);
    print!("{}", grid(items));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_major_layout() {
        let items = ["a", "b", "c", "d", "e"];
        // cell width 3, 9 columns fit in 9 chars -> 3 columns, 2 rows
        let out = grid_with_width(&items, 9);
        assert_eq!(out, "a  c  e\nb  d\n");
    }

    #[test]
    fn test_narrow_terminal_single_column() {
        let out = grid_with_width(&["lock system", "sleep system"], 5);
        assert_eq!(out, "lock system\nsleep system\n");
    }

    #[test]
    fn test_empty() {
        assert_eq!(grid_with_width::<&str>(&[], 80), "");
    }
}
