//! Depth-first walks over [`Value`].
//!
//! Extraction and substitution visit nodes in the same order: sequence
//! items front to back, keyed entries in insertion order. Substitution
//! consumes verified handles in that order, so handle `i` lands where
//! encryptable item `i` was found.

use std::collections::VecDeque;

use cofhe_sdk_core::SealingKeyPair;
use cofhe_sdk_permits::Permission;

use crate::error::{PipelineError, Result};
use crate::value::{EncryptableItem, Plaintext, Value, VerifiedHandle};

/// Default bound on nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Traversal settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkConfig {
    pub max_depth: usize,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl WalkConfig {
    fn enter(&self, depth: usize) -> Result<usize> {
        if depth >= self.max_depth {
            return Err(PipelineError::MaxDepthExceeded {
                limit: self.max_depth,
            });
        }
        Ok(depth + 1)
    }
}

/// Collect every encryptable leaf, in traversal order.
pub fn extract_encryptables(value: &Value, config: &WalkConfig) -> Result<Vec<EncryptableItem>> {
    let mut items = Vec::new();
    collect(value, 0, config, &mut items)?;
    Ok(items)
}

fn collect(
    value: &Value,
    depth: usize,
    config: &WalkConfig,
    items: &mut Vec<EncryptableItem>,
) -> Result<()> {
    match value {
        Value::Encryptable(item) => items.push(item.clone()),
        Value::Sequence(children) => {
            let depth = config.enter(depth)?;
            for child in children {
                collect(child, depth, config, items)?;
            }
        }
        Value::Keyed(entries) => {
            let depth = config.enter(depth)?;
            for (_, child) in entries {
                collect(child, depth, config, items)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// True if the value holds a permission marker anywhere.
pub fn contains_permission_marker(value: &Value, config: &WalkConfig) -> Result<bool> {
    fn visit(value: &Value, depth: usize, config: &WalkConfig) -> Result<bool> {
        match value {
            Value::PermissionMarker => Ok(true),
            Value::Sequence(children) => {
                let depth = config.enter(depth)?;
                for child in children {
                    if visit(child, depth, config)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Value::Keyed(entries) => {
                let depth = config.enter(depth)?;
                for (_, child) in entries {
                    if visit(child, depth, config)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }
    visit(value, 0, config)
}

struct Substitution<'a> {
    handles: VecDeque<VerifiedHandle>,
    received: usize,
    visited: usize,
    permission: Option<&'a Permission>,
    config: &'a WalkConfig,
}

impl Substitution<'_> {
    fn walk(&mut self, value: &Value, depth: usize) -> Result<Value> {
        Ok(match value {
            Value::Encryptable(_) => {
                self.visited += 1;
                match self.handles.pop_front() {
                    Some(handle) => Value::Handle(handle),
                    None => {
                        return Err(PipelineError::EncryptableCountMismatch {
                            expected: self.visited,
                            received: self.received,
                        })
                    }
                }
            }
            Value::PermissionMarker => match self.permission {
                Some(permission) => Value::Permission(Box::new(permission.clone())),
                None => return Err(PipelineError::MissingPermission),
            },
            Value::Sequence(children) => {
                let depth = self.config.enter(depth)?;
                Value::Sequence(
                    children
                        .iter()
                        .map(|child| self.walk(child, depth))
                        .collect::<Result<_>>()?,
                )
            }
            Value::Keyed(entries) => {
                let depth = self.config.enter(depth)?;
                let mut out = Vec::with_capacity(entries.len());
                for (key, child) in entries {
                    out.push((key.clone(), self.walk(child, depth)?));
                }
                Value::Keyed(out)
            }
            other => other.clone(),
        })
    }
}

/// Replace encryptable leaves with `handles`, in order, and permission
/// markers with `permission`.
///
/// Every handle must be consumed by exactly one encryptable leaf. Any
/// surplus or shortfall is `EncryptableCountMismatch`.
pub fn replace_encryptables_and_inject_permission(
    value: &Value,
    handles: Vec<VerifiedHandle>,
    permission: Option<&Permission>,
    config: &WalkConfig,
) -> Result<Value> {
    let received = handles.len();
    let mut substitution = Substitution {
        handles: handles.into(),
        received,
        visited: 0,
        permission,
        config,
    };
    let out = substitution.walk(value, 0)?;

    if !substitution.handles.is_empty() {
        return Err(PipelineError::EncryptableCountMismatch {
            expected: substitution.visited,
            received,
        });
    }
    Ok(out)
}

/// Replace every sealed leaf with its plaintext, unsealed with `pair`.
///
/// A bare sealed item is unsealed directly. Other leaves pass through.
pub fn unseal_value(value: &Value, pair: &SealingKeyPair, config: &WalkConfig) -> Result<Value> {
    fn walk(value: &Value, pair: &SealingKeyPair, depth: usize, config: &WalkConfig) -> Result<Value> {
        Ok(match value {
            Value::Sealed(item) => {
                let raw = pair.unseal(item.data.as_bytes())?;
                Value::Unsealed(Plaintext::from_uint(item.utype, raw))
            }
            Value::Sequence(children) => {
                let depth = config.enter(depth)?;
                Value::Sequence(
                    children
                        .iter()
                        .map(|child| walk(child, pair, depth, config))
                        .collect::<Result<_>>()?,
                )
            }
            Value::Keyed(entries) => {
                let depth = config.enter(depth)?;
                let mut out = Vec::with_capacity(entries.len());
                for (key, child) in entries {
                    out.push((key.clone(), walk(child, pair, depth, config)?));
                }
                Value::Keyed(out)
            }
            other => other.clone(),
        })
    }
    walk(value, pair, 0, config)
}
