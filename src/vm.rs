// Statement preparation and execution.
//
// The grammar is a single line of whitespace-separated tokens; the first
// token picks the statement. Validation happens here, before the tree is
// touched, and each failure maps to one user-visible diagnostic line.

use thiserror::Error;

use crate::btree::Table;
use crate::error::Result;
use crate::row::{Row, EMAIL_MAX, USERNAME_MAX};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Row),
    Select,
}

/// Why a line could not be turned into a statement. The display strings are
/// the exact diagnostics the REPL prints.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PrepareError {
    #[error("Unrecognized keyword at start of '{0}'.")]
    UnrecognizedKeyword(String),

    #[error("Syntax error. Could not parse statement.")]
    Syntax,

    #[error("ID must be positive.")]
    NegativeId,

    #[error("String is too long.")]
    StringTooLong,
}

/// Outcome of executing a statement.
#[derive(Debug, PartialEq, Eq)]
pub enum ExecuteResult {
    Rows(Vec<Row>),
    Done,
}

pub fn prepare_statement(input: &str) -> std::result::Result<Statement, PrepareError> {
    let mut tokens = input.split_whitespace();
    match tokens.next() {
        Some("insert") => prepare_insert(tokens),
        Some("select") => Ok(Statement::Select),
        _ => Err(PrepareError::UnrecognizedKeyword(input.to_string())),
    }
}

fn prepare_insert<'a>(
    mut tokens: impl Iterator<Item = &'a str>,
) -> std::result::Result<Statement, PrepareError> {
    let (id, username, email) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(id), Some(username), Some(email)) => (id, username, email),
        _ => return Err(PrepareError::Syntax),
    };
    if tokens.next().is_some() {
        return Err(PrepareError::Syntax);
    }

    // Parse the id wide so a leading minus sign is a sign error, not a
    // parse error; the sign check outranks the length checks.
    let id: i64 = id.parse().map_err(|_| PrepareError::Syntax)?;
    if id < 0 {
        return Err(PrepareError::NegativeId);
    }
    let id = u32::try_from(id).map_err(|_| PrepareError::Syntax)?;

    if username.len() > USERNAME_MAX || email.len() > EMAIL_MAX {
        return Err(PrepareError::StringTooLong);
    }

    Ok(Statement::Insert(Row {
        id,
        username: username.to_string(),
        email: email.to_string(),
    }))
}

pub fn execute_statement(table: &mut Table, statement: &Statement) -> Result<ExecuteResult> {
    match statement {
        Statement::Insert(row) => {
            table.insert(row.id, row)?;
            Ok(ExecuteResult::Done)
        }
        Statement::Select => Ok(ExecuteResult::Rows(table.select_all()?)),
    }
}
