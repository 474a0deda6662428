use serde_json::Value;

use super::functions::Builtin;
use super::parser::{CompareOp, Condition, Expr, Node, Operand, Path};
use super::value::{as_number, format_value, is_truthy};
use super::{Context, Diagnostic, RenderEnv, Rendered};

/// Loop bindings, innermost last.
type Scope<'t, 'a> = Vec<(&'t str, &'a Value)>;

struct Renderer<'a, 'e> {
    context: &'a Context,
    env: &'e RenderEnv<'e>,
    diagnostics: Vec<Diagnostic>,
}

pub(crate) fn render(nodes: &[Node], context: &Context, env: &RenderEnv<'_>) -> Rendered {
    let mut renderer = Renderer {
        context,
        env,
        diagnostics: Vec::new(),
    };
    let mut output = String::new();
    renderer.nodes(nodes, &mut output, &mut Vec::new());
    Rendered {
        output,
        diagnostics: renderer.diagnostics,
    }
}

fn step<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

impl<'a> Renderer<'a, '_> {
    fn resolve(&self, path: &Path, scope: &Scope<'_, 'a>) -> Option<&'a Value> {
        let (first, rest) = path.segments.split_first()?;
        let root = scope
            .iter()
            .rev()
            .find(|(name, _)| *name == first)
            .map(|(_, value)| *value)
            .or_else(|| self.context.get(first))?;
        rest.iter().try_fold(root, |value, segment| step(value, segment))
    }

    fn operand(&self, operand: &Operand, scope: &Scope<'_, 'a>) -> Value {
        match operand {
            Operand::Literal(value) => value.clone(),
            Operand::Path(path) => self.resolve(path, scope).cloned().unwrap_or(Value::Null),
        }
    }

    fn condition(&self, condition: &Condition, scope: &Scope<'_, 'a>) -> bool {
        match condition {
            Condition::Truthy(operand) => is_truthy(&self.operand(operand, scope)),
            Condition::Compare { left, op, right } => {
                let left = self.operand(left, scope);
                let right = self.operand(right, scope);
                match op {
                    CompareOp::Eq => format_value(&left) == format_value(&right),
                    CompareOp::Ne => format_value(&left) != format_value(&right),
                    CompareOp::Gt | CompareOp::Lt => {
                        match (as_number(&left), as_number(&right)) {
                            (Some(l), Some(r)) if *op == CompareOp::Gt => l > r,
                            (Some(l), Some(r)) => l < r,
                            _ => false,
                        }
                    }
                }
            }
        }
    }

    fn output(&mut self, expr: &Expr, source: &str, out: &mut String, scope: &Scope<'_, 'a>) {
        match expr {
            Expr::Path(path) => match self.resolve(path, scope) {
                Some(value) => out.push_str(&format_value(value)),
                None => {
                    self.diagnostics.push(Diagnostic::ResolutionGap {
                        path: path.raw.trim().to_string(),
                    });
                    out.push_str(source);
                }
            },
            Expr::Call { name, args } => {
                let Some(builtin) = Builtin::from_name(name) else {
                    self.diagnostics
                        .push(Diagnostic::UnknownFunction { name: name.clone() });
                    out.push_str(source);
                    return;
                };
                let args: Vec<Value> = args.iter().map(|a| self.operand(a, scope)).collect();
                match builtin.call(&args, self.env) {
                    Ok(value) => out.push_str(&format_value(&value)),
                    Err(err) => {
                        self.diagnostics.push(Diagnostic::FunctionFailed {
                            name: name.clone(),
                            reason: err.to_string(),
                        });
                        out.push_str(source);
                    }
                }
            }
        }
    }

    fn malformed(&mut self, reason: impl Into<String>) {
        self.diagnostics.push(Diagnostic::MalformedBlock {
            reason: reason.into(),
        });
    }

    fn nodes<'t>(&mut self, nodes: &'t [Node], out: &mut String, scope: &mut Scope<'t, 'a>) {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output { expr, source } => self.output(expr, source, out, scope),
                Node::Malformed(reason) => self.malformed(reason.as_str()),
                Node::If { closed: false, .. } => self.malformed("unclosed `if` block"),
                Node::For { closed: false, .. } => self.malformed("unclosed `for` block"),
                Node::If {
                    condition: Err(reason),
                    ..
                }
                | Node::For {
                    header: Err(reason),
                    ..
                } => self.malformed(reason.as_str()),
                Node::If {
                    condition: Ok(condition),
                    body,
                    ..
                } => {
                    if self.condition(condition, scope) {
                        self.nodes(body, out, scope);
                    }
                }
                Node::For {
                    header: Ok(header),
                    body,
                    ..
                } => {
                    let items: Vec<&'a Value> = match self.resolve(&header.source, scope) {
                        Some(Value::Array(items)) => items.iter().collect(),
                        Some(Value::Object(map)) => map.values().collect(),
                        Some(Value::Null) => Vec::new(),
                        Some(other) => {
                            self.malformed(format!(
                                "cannot iterate over `{}` ({other})",
                                header.source.raw
                            ));
                            Vec::new()
                        }
                        None => {
                            self.diagnostics.push(Diagnostic::ResolutionGap {
                                path: header.source.raw.clone(),
                            });
                            Vec::new()
                        }
                    };
                    for item in items {
                        scope.push((header.binding.as_str(), item));
                        self.nodes(body, out, scope);
                        scope.pop();
                    }
                }
            }
        }
    }
}
