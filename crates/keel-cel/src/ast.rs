// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
	Bool(bool),
	Int(i64),
	String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
}

impl fmt::Display for CompareOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			CompareOp::Eq => "==",
			CompareOp::Ne => "!=",
			CompareOp::Lt => "<",
			CompareOp::Le => "<=",
			CompareOp::Gt => ">",
			CompareOp::Ge => ">=",
		};
		f.write_str(s)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
	And,
	Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
	Literal(Literal),
	Ident(String),
	List(Vec<Expr>),
	Not(Box<Expr>),
	Negate(Box<Expr>),
	Logical {
		op: LogicalOp,
		left: Box<Expr>,
		right: Box<Expr>,
	},
	Compare {
		op: CompareOp,
		left: Box<Expr>,
		right: Box<Expr>,
	},
	In {
		needle: Box<Expr>,
		haystack: Box<Expr>,
	},
	Call {
		receiver: Box<Expr>,
		method: String,
		args: Vec<Expr>,
	},
}
