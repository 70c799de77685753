// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Command-line CEL parameters, written `name=type:value`.

use keel_cel::{CelError, ExpressionParams, ParamName, ParamSchema, ParamType, ParamValue};

/// Every known parameter with its declared type.
pub fn default_schema() -> ParamSchema {
	ParamName::all()
		.iter()
		.map(|name| (*name, name.expected_type()))
		.collect()
}

fn parse_type(raw: &str) -> Result<ParamType, CelError> {
	match raw {
		"string" => Ok(ParamType::String),
		"bool" => Ok(ParamType::Bool),
		"int" => Ok(ParamType::Integer),
		other => Err(CelError::Compile(format!(
			"unknown parameter type '{other}', expected string, bool or int"
		))),
	}
}

/// Parses one `name=type:value` argument.
pub fn parse_param(arg: &str) -> Result<(ParamName, ParamValue), CelError> {
	let (name, typed) = arg
		.split_once('=')
		.ok_or_else(|| CelError::Compile(format!("expected name=type:value, got '{arg}'")))?;
	let (ty, value) = typed
		.split_once(':')
		.ok_or_else(|| CelError::Compile(format!("expected type:value after '{name}='")))?;
	let name: ParamName = name.trim().parse()?;
	let value = ParamValue::parse_as(parse_type(ty.trim())?, value)?;
	Ok((name, value))
}

pub fn parse_params<'a>(args: impl IntoIterator<Item = &'a str>) -> Result<ExpressionParams, CelError> {
	let mut params = ExpressionParams::new();
	for arg in args {
		let (name, value) = parse_param(arg)?;
		params.insert(name, value)?;
	}
	Ok(params)
}
