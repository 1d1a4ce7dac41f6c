//! Payload of expression trees.
//!
//! Branches hold a [`Predicate::Junction`] combining their children with `$and` / `$or`;
//! leaves hold a [`Predicate::Operand`] comparing a subject to a value. On the wire both are
//! plain objects:
//!
//! ```json
//! { "operator": "$and" }
//! { "subject": "age", "operator": "$gt", "value": 10 }
//! ```
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIs, EnumString};

/// Boolean combinator of a junction node.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIs,
)]
pub enum JunctionOperator {
    #[default]
    #[serde(rename = "$and")]
    #[strum(serialize = "$and")]
    And,
    #[serde(rename = "$or")]
    #[strum(serialize = "$or")]
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumIs)]
#[serde(untagged)]
pub enum Predicate {
    /// Leaf comparison, e.g. `age $gt 10`. The comparison operator is opaque to the tree.
    Operand {
        subject: String,
        #[serde(alias = "op")]
        operator: String,
        value: serde_json::Value,
    },
    /// Branch combinator.
    Junction { operator: JunctionOperator },
}

impl Predicate {
    pub fn operand(
        subject: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Predicate::Operand {
            subject: subject.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    pub fn junction(operator: JunctionOperator) -> Self {
        Predicate::Junction { operator }
    }

    pub fn and() -> Self {
        Self::junction(JunctionOperator::And)
    }

    pub fn or() -> Self {
        Self::junction(JunctionOperator::Or)
    }

    pub fn junction_operator(&self) -> Option<JunctionOperator> {
        match self {
            Predicate::Junction { operator } => Some(*operator),
            Predicate::Operand { .. } => None,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Operand {
                subject,
                operator,
                value,
            } => write!(f, "{} {} {}", subject, operator, value),
            Predicate::Junction { operator } => write!(f, "{}", operator),
        }
    }
}
