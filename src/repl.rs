// Line-oriented read-eval-print loop.
//
// Generic over the input and output streams so tests can drive a whole
// session in memory. The prompt is written before every read, on the same
// line as the first line of whatever the command prints.

use std::io::{BufRead, Write};

use crate::btree::Table;
use crate::error::{DbError, Result};
use crate::node::{
    COMMON_NODE_HEADER_SIZE, LEAF_NODE_CELL_SIZE, LEAF_NODE_HEADER_SIZE, LEAF_NODE_MAX_CELLS,
    LEAF_NODE_SPACE_FOR_CELLS,
};
use crate::row::ROW_SIZE;
use crate::vm::{self, ExecuteResult};

/// Run the REPL until `.exit` or end of input, then flush the database.
/// Returns an error only for fatal conditions; per-statement diagnostics are
/// printed and the loop continues.
pub fn run<R: BufRead, W: Write>(table: &mut Table, input: &mut R, output: &mut W) -> Result<()> {
    let mut line = String::new();
    loop {
        write!(output, "db > ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            // End of input closes the session like `.exit`.
            break;
        }
        let trimmed = line.trim();

        if trimmed.starts_with('.') {
            match trimmed {
                ".exit" => break,
                ".btree" => {
                    writeln!(output, "Tree:")?;
                    table.print_tree(output)?;
                }
                ".constants" => print_constants(output)?,
                _ => writeln!(output, "Unrecognized command '{trimmed}'.")?,
            }
            continue;
        }

        let statement = match vm::prepare_statement(trimmed) {
            Ok(statement) => statement,
            Err(e) => {
                writeln!(output, "{e}")?;
                continue;
            }
        };

        match vm::execute_statement(table, &statement) {
            Ok(ExecuteResult::Done) => writeln!(output, "Executed.")?,
            Ok(ExecuteResult::Rows(rows)) => {
                for row in &rows {
                    writeln!(output, "{row}")?;
                }
                writeln!(output, "Executed.")?;
            }
            Err(e @ DbError::DuplicateKey) => writeln!(output, "{e}")?,
            Err(e) => return Err(e),
        }
    }

    table.close()
}

fn print_constants<W: Write>(output: &mut W) -> std::io::Result<()> {
    writeln!(output, "Constants:")?;
    writeln!(output, "ROW_SIZE: {ROW_SIZE}")?;
    writeln!(output, "COMMON_NODE_HEADER_SIZE: {COMMON_NODE_HEADER_SIZE}")?;
    writeln!(output, "LEAF_NODE_HEADER_SIZE: {LEAF_NODE_HEADER_SIZE}")?;
    writeln!(output, "LEAF_NODE_CELL_SIZE: {LEAF_NODE_CELL_SIZE}")?;
    writeln!(output, "LEAF_NODE_SPACE_FOR_CELLS: {LEAF_NODE_SPACE_FOR_CELLS}")?;
    writeln!(output, "LEAF_NODE_MAX_CELLS: {LEAF_NODE_MAX_CELLS}")?;
    Ok(())
}
