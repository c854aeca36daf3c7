//! Terminal cursor helpers for composing ANSI sequences.

const CSI: &str = "\x1b[";

/// Move the cursor to an absolute 1-based `row` and `column`.
pub fn move_to(row: u16, column: u16) -> String {
    format!("{CSI}{row};{column}H")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_position_is_well_formed() {
        assert_eq!(move_to(3, 5), "\x1b[3;5H");
    }
}
