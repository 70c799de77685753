// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The parameter vocabulary expressions may reference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CelError;

/// Closed set of parameter names, spelled as they appear in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ParamName {
	#[serde(rename = "appName")]
	AppName,
	#[serde(rename = "projectName")]
	ProjectName,
	#[serde(rename = "envName")]
	EnvName,
	#[serde(rename = "clusterName")]
	ClusterName,
	#[serde(rename = "cdPipelineName")]
	CdPipelineName,
	#[serde(rename = "isProdEnv")]
	IsProdEnv,
	#[serde(rename = "chartRefId")]
	ChartRefId,
	#[serde(rename = "appId")]
	AppId,
	#[serde(rename = "envId")]
	EnvId,
	#[serde(rename = "clusterId")]
	ClusterId,
}

impl ParamName {
	pub fn all() -> &'static [ParamName] {
		&[
			ParamName::AppName,
			ParamName::ProjectName,
			ParamName::EnvName,
			ParamName::ClusterName,
			ParamName::CdPipelineName,
			ParamName::IsProdEnv,
			ParamName::ChartRefId,
			ParamName::AppId,
			ParamName::EnvId,
			ParamName::ClusterId,
		]
	}

	pub fn as_str(self) -> &'static str {
		match self {
			ParamName::AppName => "appName",
			ParamName::ProjectName => "projectName",
			ParamName::EnvName => "envName",
			ParamName::ClusterName => "clusterName",
			ParamName::CdPipelineName => "cdPipelineName",
			ParamName::IsProdEnv => "isProdEnv",
			ParamName::ChartRefId => "chartRefId",
			ParamName::AppId => "appId",
			ParamName::EnvId => "envId",
			ParamName::ClusterId => "clusterId",
		}
	}

	/// Case-sensitive lookup by identifier.
	pub fn from_identifier(ident: &str) -> Option<ParamName> {
		Self::all().iter().copied().find(|p| p.as_str() == ident)
	}

	/// The type a parameter is expected to carry.
	pub fn expected_type(self) -> ParamType {
		match self {
			ParamName::IsProdEnv => ParamType::Bool,
			ParamName::ChartRefId | ParamName::AppId | ParamName::EnvId | ParamName::ClusterId => {
				ParamType::Integer
			}
			_ => ParamType::String,
		}
	}
}

impl fmt::Display for ParamName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for ParamName {
	type Err = CelError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_identifier(s)
			.ok_or_else(|| CelError::Compile(format!("unknown parameter '{s}'")))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
	String,
	Bool,
	Integer,
}

impl fmt::Display for ParamType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			ParamType::String => "string",
			ParamType::Bool => "bool",
			ParamType::Integer => "int",
		};
		write!(f, "{s}")
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
	Bool(bool),
	Integer(i64),
	String(String),
}

impl ParamValue {
	pub fn param_type(&self) -> ParamType {
		match self {
			ParamValue::Bool(_) => ParamType::Bool,
			ParamValue::Integer(_) => ParamType::Integer,
			ParamValue::String(_) => ParamType::String,
		}
	}

	/// Parses `raw` as a value of type `ty`.
	pub fn parse_as(ty: ParamType, raw: &str) -> Result<Self, CelError> {
		match ty {
			ParamType::String => Ok(ParamValue::String(raw.to_string())),
			ParamType::Bool => raw
				.parse()
				.map(ParamValue::Bool)
				.map_err(|_| CelError::Compile(format!("invalid bool value '{raw}'"))),
			ParamType::Integer => raw
				.parse()
				.map(ParamValue::Integer)
				.map_err(|_| CelError::Compile(format!("invalid int value '{raw}'"))),
		}
	}
}

/// The declared types of a parameter set, used at compile time.
pub type ParamSchema = BTreeMap<ParamName, ParamType>;

/// Renders a schema as a stable string, used as part of the program cache key.
pub fn schema_fingerprint(schema: &ParamSchema) -> String {
	schema
		.iter()
		.map(|(name, ty)| format!("{name}:{ty}"))
		.collect::<Vec<_>>()
		.join(",")
}

/// A typed, request-scoped set of parameter values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpressionParams {
	values: BTreeMap<ParamName, ParamValue>,
}

impl ExpressionParams {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a value; the value's type must match the parameter's.
	pub fn insert(&mut self, name: ParamName, value: ParamValue) -> Result<(), CelError> {
		if value.param_type() != name.expected_type() {
			return Err(CelError::Compile(format!(
				"parameter {name} expects {}, got {}",
				name.expected_type(),
				value.param_type()
			)));
		}
		self.values.insert(name, value);
		Ok(())
	}

	pub fn with_string(mut self, name: ParamName, value: impl Into<String>) -> Result<Self, CelError> {
		self.insert(name, ParamValue::String(value.into()))?;
		Ok(self)
	}

	pub fn with_bool(mut self, name: ParamName, value: bool) -> Result<Self, CelError> {
		self.insert(name, ParamValue::Bool(value))?;
		Ok(self)
	}

	pub fn with_int(mut self, name: ParamName, value: i64) -> Result<Self, CelError> {
		self.insert(name, ParamValue::Integer(value))?;
		Ok(self)
	}

	pub fn get(&self, name: ParamName) -> Option<&ParamValue> {
		self.values.get(&name)
	}

	pub fn schema(&self) -> ParamSchema {
		self.values
			.iter()
			.map(|(name, value)| (*name, value.param_type()))
			.collect()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identifiers_are_case_sensitive() {
		assert_eq!(ParamName::from_identifier("isProdEnv"), Some(ParamName::IsProdEnv));
		assert_eq!(ParamName::from_identifier("IsProdEnv"), None);
	}

	#[test]
	fn insert_rejects_wrong_type() {
		let mut params = ExpressionParams::new();
		let err = params
			.insert(ParamName::IsProdEnv, ParamValue::String("yes".into()))
			.unwrap_err();
		assert!(matches!(err, CelError::Compile(_)));
		assert!(params.is_empty());
	}

	#[test]
	fn fingerprint_is_order_independent() {
		let a = ExpressionParams::new()
			.with_bool(ParamName::IsProdEnv, true)
			.unwrap()
			.with_string(ParamName::AppName, "x")
			.unwrap();
		let b = ExpressionParams::new()
			.with_string(ParamName::AppName, "y")
			.unwrap()
			.with_bool(ParamName::IsProdEnv, false)
			.unwrap();
		assert_eq!(schema_fingerprint(&a.schema()), schema_fingerprint(&b.schema()));
		assert_eq!(schema_fingerprint(&a.schema()), "appName:string,isProdEnv:bool");
	}

	#[test]
	fn parse_values() {
		assert_eq!(
			ParamValue::parse_as(ParamType::Integer, "15").unwrap(),
			ParamValue::Integer(15)
		);
		assert_eq!(
			ParamValue::parse_as(ParamType::Bool, "true").unwrap(),
			ParamValue::Bool(true)
		);
		assert!(ParamValue::parse_as(ParamType::Bool, "yes").is_err());
	}
}
