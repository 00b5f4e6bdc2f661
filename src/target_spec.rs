//! `target_spec := ident (":" ident)?`, parsed by a small hand-rolled
//! function rather than a CLI-parsing crate.

use crate::error::TargetSpecError;

/// A parsed `project:target` or bare `target` reference.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TargetSpec {
    pub project: Option<String>,
    pub target: String,
}

impl TargetSpec {
    pub fn parse(input: &str) -> Result<Self, TargetSpecError> {
        let mut parts = input.split(':');

        let first = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(TargetSpecError::Empty)?;

        match parts.next() {
            None => Ok(TargetSpec {
                project: None,
                target: first.to_string(),
            }),
            Some(second) => {
                if second.is_empty() {
                    return Err(TargetSpecError::EmptyComponent(input.to_string()));
                }
                if parts.next().is_some() {
                    return Err(TargetSpecError::TooManyComponents(input.to_string()));
                }
                Ok(TargetSpec {
                    project: Some(first.to_string()),
                    target: second.to_string(),
                })
            }
        }
    }
}
