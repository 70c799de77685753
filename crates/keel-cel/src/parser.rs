// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Parser for the supported CEL subset.
//!
//! ```text
//! expr     := and ("||" and)*
//! and      := relation ("&&" relation)*
//! relation := unary (relop unary)*        relop: == != < <= > >= in
//! unary    := ("!" | "-")* member
//! member   := primary ("." ident "(" args ")")*
//! primary  := ident | int | string | true | false | "[" args "]" | "(" expr ")"
//! ```

use winnow::ascii::multispace0;
use winnow::combinator::{alt, fail};
use winnow::error::{ContextError, StrContext};
use winnow::prelude::*;
use winnow::token::{any, literal, one_of, take_while};

use crate::ast::{CompareOp, Expr, Literal, LogicalOp};
use crate::error::CelError;

/// Deepest nesting of groups, lists, calls, unary operators and operator
/// chains an expression may have. Checking and evaluation recurse over the
/// tree, so this also bounds their stack use.
pub const MAX_NESTING: usize = 64;

const NESTED_TOO_DEEP: &str = "expression nested too deeply";

pub struct ExprParser;

impl ExprParser {
	pub fn parse(source: &str) -> Result<Expr, CelError> {
		parse_program.parse(source.trim()).map_err(|e| {
			let too_deep = e
				.inner()
				.context()
				.any(|c| matches!(c, StrContext::Label(label) if *label == NESTED_TOO_DEEP));
			if too_deep {
				return CelError::Compile(NESTED_TOO_DEEP.to_string());
			}
			CelError::Compile(format!(
				"syntax error at offset {} in '{}'",
				e.offset(),
				source.trim()
			))
		})
	}
}

#[derive(Debug, Clone, Copy)]
enum Relation {
	Compare(CompareOp),
	In,
}

fn parse_program(input: &mut &str) -> Result<Expr, ContextError> {
	let expr = parse_or(input, 0)?;
	ws(input)?;
	Ok(expr)
}

fn ws(input: &mut &str) -> Result<(), ContextError> {
	multispace0.void().parse_next(input)
}

/// Steps one level deeper, failing once [`MAX_NESTING`] is reached.
fn deeper(input: &mut &str, depth: usize) -> Result<usize, ContextError> {
	if depth >= MAX_NESTING {
		return fail::<_, usize, _>
			.context(StrContext::Label(NESTED_TOO_DEEP))
			.parse_next(input);
	}
	Ok(depth + 1)
}

fn is_ident_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '_'
}

/// Consumes `kw` if it is followed by something that cannot continue an
/// identifier.
fn keyword(input: &mut &str, kw: &str) -> bool {
	match input.strip_prefix(kw) {
		Some(rest) if !rest.starts_with(is_ident_char) => {
			*input = rest;
			true
		}
		_ => false,
	}
}

fn parse_or(input: &mut &str, mut depth: usize) -> Result<Expr, ContextError> {
	let mut result = parse_and(input, depth)?;

	loop {
		let checkpoint = *input;
		ws(input)?;
		if !input.starts_with("||") {
			*input = checkpoint;
			break;
		}
		let _: &str = "||".parse_next(input)?;
		depth = deeper(input, depth)?;
		let right = parse_and(input, depth)?;
		result = Expr::Logical {
			op: LogicalOp::Or,
			left: Box::new(result),
			right: Box::new(right),
		};
	}

	Ok(result)
}

fn parse_and(input: &mut &str, mut depth: usize) -> Result<Expr, ContextError> {
	let mut result = parse_relation(input, depth)?;

	loop {
		let checkpoint = *input;
		ws(input)?;
		if !input.starts_with("&&") {
			*input = checkpoint;
			break;
		}
		let _: &str = "&&".parse_next(input)?;
		depth = deeper(input, depth)?;
		let right = parse_relation(input, depth)?;
		result = Expr::Logical {
			op: LogicalOp::And,
			left: Box::new(result),
			right: Box::new(right),
		};
	}

	Ok(result)
}

fn parse_relation(input: &mut &str, mut depth: usize) -> Result<Expr, ContextError> {
	let mut result = parse_unary(input, depth)?;

	loop {
		let checkpoint = *input;
		ws(input)?;
		let Some(relation) = parse_relop(input) else {
			*input = checkpoint;
			break;
		};
		depth = deeper(input, depth)?;
		let right = parse_unary(input, depth)?;
		result = match relation {
			Relation::Compare(op) => Expr::Compare {
				op,
				left: Box::new(result),
				right: Box::new(right),
			},
			Relation::In => Expr::In {
				needle: Box::new(result),
				haystack: Box::new(right),
			},
		};
	}

	Ok(result)
}

fn parse_relop(input: &mut &str) -> Option<Relation> {
	let symbol: Result<CompareOp, ContextError> = alt((
		"==".value(CompareOp::Eq),
		"!=".value(CompareOp::Ne),
		"<=".value(CompareOp::Le),
		">=".value(CompareOp::Ge),
		"<".value(CompareOp::Lt),
		">".value(CompareOp::Gt),
	))
	.parse_next(input);

	match symbol {
		Ok(op) => Some(Relation::Compare(op)),
		Err(_) if keyword(input, "in") => Some(Relation::In),
		Err(_) => None,
	}
}

fn parse_unary(input: &mut &str, depth: usize) -> Result<Expr, ContextError> {
	ws(input)?;
	if input.starts_with('!') && !input.starts_with("!=") {
		let _ = '!'.parse_next(input)?;
		let depth = deeper(input, depth)?;
		let operand = parse_unary(input, depth)?;
		return Ok(Expr::Not(Box::new(operand)));
	}
	if input.starts_with('-') {
		let _ = '-'.parse_next(input)?;
		let depth = deeper(input, depth)?;
		let operand = parse_unary(input, depth)?;
		return Ok(Expr::Negate(Box::new(operand)));
	}
	parse_member(input, depth)
}

fn parse_member(input: &mut &str, mut depth: usize) -> Result<Expr, ContextError> {
	let mut result = parse_primary(input, depth)?;

	loop {
		let checkpoint = *input;
		ws(input)?;
		if !input.starts_with('.') {
			*input = checkpoint;
			break;
		}
		let _ = '.'.parse_next(input)?;
		ws(input)?;
		let method = parse_ident(input)?;
		ws(input)?;
		let _ = '('.parse_next(input)?;
		depth = deeper(input, depth)?;
		let args = parse_args(input, ')', depth)?;
		result = Expr::Call {
			receiver: Box::new(result),
			method,
			args,
		};
	}

	Ok(result)
}

fn parse_primary(input: &mut &str, depth: usize) -> Result<Expr, ContextError> {
	ws(input)?;

	if input.starts_with('(') {
		let _ = '('.parse_next(input)?;
		let depth = deeper(input, depth)?;
		let expr = parse_or(input, depth)?;
		ws(input)?;
		let _ = ')'.parse_next(input)?;
		return Ok(expr);
	}

	if input.starts_with('[') {
		let _ = '['.parse_next(input)?;
		let depth = deeper(input, depth)?;
		let items = parse_args(input, ']', depth)?;
		return Ok(Expr::List(items));
	}

	if input.starts_with(['"', '\'']) {
		return parse_string(input).map(|s| Expr::Literal(Literal::String(s)));
	}

	if input.starts_with(|c: char| c.is_ascii_digit()) {
		return parse_int(input).map(|i| Expr::Literal(Literal::Int(i)));
	}

	if keyword(input, "true") {
		return Ok(Expr::Literal(Literal::Bool(true)));
	}
	if keyword(input, "false") {
		return Ok(Expr::Literal(Literal::Bool(false)));
	}

	parse_ident(input).map(Expr::Ident)
}

/// Comma separated expressions up to `close`. The opening delimiter has
/// already been consumed.
fn parse_args(
	input: &mut &str,
	close: char,
	depth: usize,
) -> Result<Vec<Expr>, ContextError> {
	let mut items = Vec::new();
	ws(input)?;
	if input.starts_with(close) {
		let _: &str = literal(close).parse_next(input)?;
		return Ok(items);
	}

	loop {
		items.push(parse_or(input, depth)?);
		ws(input)?;
		if input.starts_with(',') {
			let _ = ','.parse_next(input)?;
			continue;
		}
		let _: &str = literal(close).parse_next(input)?;
		return Ok(items);
	}
}

fn parse_ident(input: &mut &str) -> Result<String, ContextError> {
	if !input.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
		return Err(ContextError::new());
	}
	let ident: &str = take_while(1.., is_ident_char).parse_next(input)?;
	Ok(ident.to_string())
}

fn parse_int(input: &mut &str) -> Result<i64, ContextError> {
	take_while(1.., |c: char| c.is_ascii_digit())
		.try_map(|digits: &str| digits.parse::<i64>())
		.parse_next(input)
}

fn parse_string(input: &mut &str) -> Result<String, ContextError> {
	let quote: char = one_of(['"', '\'']).parse_next(input)?;
	let mut value = String::new();

	loop {
		let c: char = any.parse_next(input)?;
		match c {
			c if c == quote => return Ok(value),
			'\\' => {
				let escaped: char = any.parse_next(input)?;
				value.push(match escaped {
					'n' => '\n',
					't' => '\t',
					'r' => '\r',
					other => other,
				});
			}
			c => value.push(c),
		}
	}
}
