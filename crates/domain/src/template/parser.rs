use serde_json::Value;

/// A dot-separated lookup such as `sensor.reading.value` or `items.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Path {
    pub(crate) raw: String,
    pub(crate) segments: Vec<String>,
}

impl Path {
    fn parse(text: &str) -> Self {
        Self {
            raw: text.to_string(),
            segments: text.split('.').map(|s| s.trim().to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operand {
    Literal(Value),
    Path(Path),
}

impl Operand {
    fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some(inner) = unquote(text) {
            return Self::Literal(Value::String(inner.to_string()));
        }
        match text {
            "true" => return Self::Literal(Value::Bool(true)),
            "false" => return Self::Literal(Value::Bool(false)),
            "null" => return Self::Literal(Value::Null),
            _ => {}
        }
        if let Ok(int) = text.parse::<i64>() {
            return Self::Literal(Value::from(int));
        }
        if let Some(number) = text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            return Self::Literal(Value::Number(number));
        }
        Self::Path(Path::parse(text))
    }
}

fn unquote(text: &str) -> Option<&str> {
    let first = text.chars().next()?;
    if text.len() >= 2 && (first == '"' || first == '\'') && text.ends_with(first) {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Condition {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    Truthy(Operand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expr {
    Path(Path),
    Call { name: String, args: Vec<Operand> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Loop {
    pub(crate) binding: String,
    pub(crate) source: Path,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Text(String),
    Output {
        expr: Expr,
        source: String,
    },
    If {
        condition: Result<Condition, String>,
        body: Vec<Node>,
        closed: bool,
    },
    For {
        header: Result<Loop, String>,
        body: Vec<Node>,
        closed: bool,
    },
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Text(&'a str),
    Output { inner: &'a str, source: &'a str },
    Tag { inner: &'a str },
}

fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = source;
    while !rest.is_empty() {
        let output = rest.find("{{");
        let tag = rest.find("{%");
        let (start, is_tag) = match (output, tag) {
            (None, None) => {
                tokens.push(Token::Text(rest));
                break;
            }
            (Some(o), Some(t)) if t < o => (t, true),
            (Some(o), _) => (o, false),
            (None, Some(t)) => (t, true),
        };
        let close = if is_tag { "%}" } else { "}}" };
        let body_start = start + 2;
        let Some(len) = rest[body_start..].find(close) else {
            // Only the opening delimiter is literal; later blocks still count.
            tokens.push(Token::Text(&rest[..body_start]));
            rest = &rest[body_start..];
            continue;
        };
        if start > 0 {
            tokens.push(Token::Text(&rest[..start]));
        }
        let end = body_start + len + close.len();
        let inner = &rest[body_start..body_start + len];
        tokens.push(if is_tag {
            Token::Tag { inner }
        } else {
            Token::Output {
                inner,
                source: &rest[start..end],
            }
        });
        rest = &rest[end..];
    }
    tokens
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    If,
    For,
}

/// Deepest `if`/`for` nesting the parser descends into.
pub(crate) const MAX_NESTING: usize = 64;

struct Parser<'a> {
    tokens: std::vec::IntoIter<Token<'a>>,
    depth: usize,
}

impl Parser<'_> {
    /// Parse the body of a block that was just opened, one level deeper.
    fn nested(&mut self, open: Block) -> Option<(Vec<Node>, bool)> {
        if self.depth >= MAX_NESTING {
            self.skip_block();
            return None;
        }
        self.depth += 1;
        let parsed = self.block(Some(open));
        self.depth -= 1;
        Some(parsed)
    }

    /// Consume tokens up to the end tag balancing the block just opened.
    fn skip_block(&mut self) {
        let mut open = 1_usize;
        for token in self.tokens.by_ref() {
            let Token::Tag { inner } = token else {
                continue;
            };
            match inner.split_whitespace().next() {
                Some("if" | "for") => open += 1,
                Some("endif" | "endfor") => {
                    open -= 1;
                    if open == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Returns the parsed nodes and whether the expected end tag was found.
    fn block(&mut self, open: Option<Block>) -> (Vec<Node>, bool) {
        let mut nodes = Vec::new();
        while let Some(token) = self.tokens.next() {
            match token {
                Token::Text(text) => nodes.push(Node::Text(text.to_string())),
                Token::Output { inner, source } => {
                    if inner.trim().is_empty() {
                        nodes.push(Node::Text(source.to_string()));
                    } else {
                        nodes.push(Node::Output {
                            expr: parse_expr(inner),
                            source: source.to_string(),
                        });
                    }
                }
                Token::Tag { inner } => {
                    let inner = inner.trim();
                    let (keyword, rest) = inner
                        .split_once(char::is_whitespace)
                        .unwrap_or((inner, ""));
                    match keyword {
                        "if" => match self.nested(Block::If) {
                            Some((body, closed)) => nodes.push(Node::If {
                                condition: parse_condition(rest),
                                body,
                                closed,
                            }),
                            None => nodes.push(too_deep()),
                        },
                        "for" => match self.nested(Block::For) {
                            Some((body, closed)) => nodes.push(Node::For {
                                header: parse_loop(rest),
                                body,
                                closed,
                            }),
                            None => nodes.push(too_deep()),
                        },
                        "endif" if open == Some(Block::If) => return (nodes, true),
                        "endfor" if open == Some(Block::For) => return (nodes, true),
                        "endif" | "endfor" => {
                            nodes.push(Node::Malformed(format!("unexpected `{keyword}`")));
                        }
                        _ => nodes.push(Node::Malformed(format!("unknown tag `{inner}`"))),
                    }
                }
            }
        }
        (nodes, open.is_none())
    }
}

fn too_deep() -> Node {
    Node::Malformed(format!("blocks nested deeper than {MAX_NESTING} levels"))
}

pub(crate) fn parse(source: &str) -> Vec<Node> {
    let mut parser = Parser {
        tokens: tokenize(source).into_iter(),
        depth: 0,
    };
    parser.block(None).0
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_expr(inner: &str) -> Expr {
    let text = inner.trim();
    if let Some(open) = text.find('(') {
        let name = text[..open].trim();
        if is_identifier(name) && text.ends_with(')') {
            let args = split_args(&text[open + 1..text.len() - 1])
                .into_iter()
                .map(Operand::parse)
                .collect();
            return Expr::Call {
                name: name.to_string(),
                args,
            };
        }
    }
    Expr::Path(Path::parse(text))
}

/// Split on commas that are not inside a quoted string.
fn split_args(text: &str) -> Vec<&str> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut args = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                args.push(text[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    args.push(text[start..].trim());
    args
}

fn parse_condition(text: &str) -> Result<Condition, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("`if` without a condition".to_string());
    }
    for (symbol, op) in [
        (" == ", CompareOp::Eq),
        (" != ", CompareOp::Ne),
        (" > ", CompareOp::Gt),
        (" < ", CompareOp::Lt),
    ] {
        if let Some((left, right)) = text.split_once(symbol) {
            let (left, right) = (left.trim(), right.trim());
            if left.is_empty() || right.is_empty() {
                return Err(format!("incomplete comparison `{text}`"));
            }
            return Ok(Condition::Compare {
                left: Operand::parse(left),
                op,
                right: Operand::parse(right),
            });
        }
    }
    Ok(Condition::Truthy(Operand::parse(text)))
}

fn parse_loop(text: &str) -> Result<Loop, String> {
    match text.split_whitespace().collect::<Vec<_>>().as_slice() {
        [binding, "in", source] if is_identifier(binding) => Ok(Loop {
            binding: (*binding).to_string(),
            source: Path::parse(source),
        }),
        _ => Err(format!("expected `for <name> in <path>`, got `for {}`", text.trim())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_tokenize_text_outputs_and_tags() {
        let tokens = tokenize("a{{ b }}c{% if d %}e");
        assert_eq!(
            tokens,
            vec![
                Token::Text("a"),
                Token::Output {
                    inner: " b ",
                    source: "{{ b }}"
                },
                Token::Text("c"),
                Token::Tag { inner: " if d " },
                Token::Text("e"),
            ]
        );
    }

    #[test]
    fn should_keep_tokenizing_after_unterminated_output() {
        let tokens = tokenize("a{{ b {% if c %}d{% endif %}");
        assert_eq!(
            tokens,
            vec![
                Token::Text("a{{"),
                Token::Text(" b "),
                Token::Tag { inner: " if c " },
                Token::Text("d"),
                Token::Tag { inner: " endif " },
            ]
        );
    }

    #[test]
    fn should_stop_descending_at_max_nesting() {
        let source = format!(
            "{}x{}",
            "{% if a %}".repeat(MAX_NESTING + 2),
            "{% endif %}".repeat(MAX_NESTING + 2)
        );
        let mut nodes = parse(&source);
        let mut depth = 0;
        while let [Node::If { body, closed, .. }] = nodes.as_slice() {
            assert!(closed);
            nodes = body.clone();
            depth += 1;
        }
        assert_eq!(depth, MAX_NESTING);
        assert!(matches!(nodes.as_slice(), [Node::Malformed(_)]));
    }

    #[test]
    fn should_parse_literals_and_paths_as_operands() {
        assert_eq!(Operand::parse("'on'"), Operand::Literal(Value::from("on")));
        assert_eq!(Operand::parse("\"x\""), Operand::Literal(Value::from("x")));
        assert_eq!(Operand::parse("25"), Operand::Literal(Value::from(25)));
        assert_eq!(Operand::parse("2.5"), Operand::Literal(Value::from(2.5)));
        assert_eq!(Operand::parse("null"), Operand::Literal(Value::Null));
        assert!(matches!(Operand::parse("a.b"), Operand::Path(p) if p.segments == ["a", "b"]));
        assert!(matches!(Operand::parse("nan"), Operand::Path(_)));
    }

    #[test]
    fn should_parse_function_call_with_arguments() {
        let expr = parse_expr(" round(x.y, 2) ");
        let Expr::Call { name, args } = expr else {
            panic!("expected a call");
        };
        assert_eq!(name, "round");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn should_parse_call_without_arguments() {
        assert_eq!(
            parse_expr("now()"),
            Expr::Call {
                name: "now".to_string(),
                args: Vec::new()
            }
        );
    }

    #[test]
    fn should_pick_first_operator_in_fixed_order() {
        let condition = parse_condition("a == b > c").unwrap();
        assert!(matches!(condition, Condition::Compare { op: CompareOp::Eq, .. }));
    }

    #[test]
    fn should_reject_malformed_loop_header() {
        assert!(parse_loop("x of items").is_err());
        assert!(parse_loop("1x in items").is_err());
        assert!(parse_loop("x in items").is_ok());
    }

    #[test]
    fn should_nest_blocks() {
        let nodes = parse("{% for a in b %}{% if a %}x{% endif %}{% endfor %}");
        let [Node::For { body, closed, .. }] = nodes.as_slice() else {
            panic!("expected a single loop");
        };
        assert!(*closed);
        assert!(matches!(body.as_slice(), [Node::If { closed: true, .. }]));
    }

    #[test]
    fn should_mark_mismatched_end_tag_as_malformed() {
        let nodes = parse("{% if a %}{% endfor %}{% endif %}");
        let [Node::If { body, closed, .. }] = nodes.as_slice() else {
            panic!("expected a single if");
        };
        assert!(*closed);
        assert!(matches!(body.as_slice(), [Node::Malformed(_)]));
    }
}
