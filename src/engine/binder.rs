//! Argument binding
//!
//! Maps caller-supplied positional and named arguments onto a task's formal
//! parameters and converts them to the declared types.

use crate::engine::node::{TaskArgument, TaskNode, Value};
use crate::error::{ArgumentError, ArgumentResult};

/// Bind `args` to the parameters of `node`, returning one value per parameter
pub fn bind_arguments(node: &TaskNode, args: &[TaskArgument]) -> ArgumentResult<Vec<Value>> {
    let task = node.name().to_string();

    // Ordering is checked before anything is bound
    let mut seen_named = false;
    for (position, arg) in args.iter().enumerate() {
        match arg.name {
            Some(_) => seen_named = true,
            None if seen_named => {
                return Err(ArgumentError::Order {
                    task,
                    position: position + 1,
                })
            }
            None => {}
        }
    }

    let binding = |reason: String| ArgumentError::Binding {
        task: task.clone(),
        reason,
    };

    // (raw value, caller position) per parameter
    let mut bound: Vec<Option<(&str, usize)>> = vec![None; node.params.len()];

    for (position, arg) in args.iter().enumerate() {
        let index = match &arg.name {
            None => {
                if position >= node.params.len() {
                    return Err(binding(format!(
                        "too many arguments: position {} exceeds the {} declared parameter(s)",
                        position + 1,
                        node.params.len()
                    )));
                }
                position
            }
            Some(name) => node
                .params
                .iter()
                .position(|p| p.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    binding(format!(
                        "unknown argument '{}' at position {}",
                        name,
                        position + 1
                    ))
                })?,
        };

        if bound[index].is_some() {
            return Err(binding(format!(
                "argument '{}' is supplied more than once (position {})",
                node.params[index].name,
                position + 1
            )));
        }
        bound[index] = Some((arg.value.as_str(), position + 1));
    }

    node.params
        .iter()
        .zip(bound)
        .map(|(param, slot)| match slot {
            Some((raw, position)) => {
                param
                    .kind
                    .convert(raw)
                    .map_err(|reason| ArgumentError::Conversion {
                        task: task.clone(),
                        parameter: param.name.clone(),
                        position,
                        reason,
                    })
            }
            None => param.default.clone().ok_or_else(|| {
                binding(format!("missing value for required parameter '{}'", param.name))
            }),
        })
        .collect()
}
