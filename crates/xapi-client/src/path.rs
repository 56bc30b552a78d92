// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Addressing of nodes in the xAPI tree.
//!
//! A path is written the way the device documentation writes it, with `/` (or `.`) between
//! segments: `Status/Network/1/IPv4/Address`. Numeric segments address items of a list node by
//! their `id` attribute, everything else is an object key.

use std::fmt;

use serde_json::Value;

/// Top level namespace of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Status,
    Configuration,
    Event,
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(String),
    Index(u32),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{key}"),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    pub fn new(path: &str) -> Self {
        let segments = path
            .split(['/', '.'])
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .enumerate()
            .map(|(position, segment)| match segment.parse::<u32>() {
                Ok(index) if position > 0 => Segment::Index(index),
                // `Config` is the short name device documentation uses for the configuration tree
                _ if position == 0 && segment.eq_ignore_ascii_case("config") => {
                    Segment::Key("Configuration".to_string())
                }
                _ => Segment::Key(segment.to_string()),
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn namespace(&self) -> Option<Namespace> {
        match self.segments.first()? {
            Segment::Key(root) => match root.as_str() {
                "Status" => Some(Namespace::Status),
                "Configuration" => Some(Namespace::Configuration),
                "Event" => Some(Namespace::Event),
                "Command" => Some(Namespace::Command),
                _ => None,
            },
            Segment::Index(_) => None,
        }
    }

    /// True when `other` equals this path or lies below it.
    pub fn contains(&self, other: &Path) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Path segments as the JSON array used by `xGet`, `xSet` and `xFeedback/Subscribe`.
    pub fn to_params(&self) -> Value {
        Value::Array(
            self.segments
                .iter()
                .map(|segment| match segment {
                    Segment::Key(key) => Value::String(key.clone()),
                    Segment::Index(index) => Value::from(*index),
                })
                .collect(),
        )
    }

    /// The method name for invoking this path as a command, e.g. `xCommand/HttpClient/Post`.
    pub fn command_method(&self) -> String {
        let mut method = String::from("xCommand");
        for segment in self.segments.iter().skip(1) {
            method.push('/');
            method.push_str(&segment.to_string());
        }
        method
    }

    /// Walks `root` along this path.
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |node, segment| lookup_segment(node, segment))
    }
}

pub(crate) fn lookup_segment<'a>(node: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (node, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Array(items), Segment::Index(index)) => items.iter().find(|item| has_id(item, *index)),
        // a list node holding a single item may be reported as that item
        (Value::Object(_), Segment::Index(index)) if has_id(node, *index) => Some(node),
        _ => None,
    }
}

pub(crate) fn has_id(item: &Value, index: u32) -> bool {
    match item.get("id") {
        Some(Value::String(id)) => id.parse::<u32>().ok() == Some(index),
        Some(Value::Number(id)) => id.as_u64() == Some(u64::from(index)),
        _ => false,
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            if position > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Path::new(path)
    }
}
