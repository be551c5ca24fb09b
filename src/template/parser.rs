//! Template parser
//!
//! Grammar:
//!
//! ```text
//! template    := node*
//! node        := literal | placeholder | conditional
//! placeholder := '{' name '}'
//! conditional := '%{?' name ',' node* '|' node* '}'
//! ```
//!
//! Inside a conditional branch `|` and `}` end the branch; everywhere else
//! they are literal text.

use super::fields::{Condition, Field};
use crate::error::TemplateError;

/// Parsed template node
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Literal text
    Literal(String),
    /// Known placeholder
    Field(Field),
    /// Placeholder with an unrecognized name; renders empty
    Unknown(String),
    /// Conditional with both branches
    Conditional {
        /// Condition
        condition: Condition,
        /// Rendered when the condition holds
        then: Vec<Node>,
        /// Rendered otherwise
        otherwise: Vec<Node>,
    },
}

/// Parse a template string into nodes
pub fn parse(source: &str) -> Result<Vec<Node>, TemplateError> {
    let mut parser = Parser { src: source, pos: 0 };
    let (nodes, _) = parser.sequence(&[])?;
    Ok(nodes)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Parse nodes until one of `terminators` appears at this nesting level
    ///
    /// The terminator is consumed and returned; `None` means end of input.
    fn sequence(&mut self, terminators: &[char]) -> Result<(Vec<Node>, Option<char>), TemplateError> {
        let mut nodes = Vec::new();
        let mut literal = String::new();

        while let Some(c) = self.peek() {
            if terminators.contains(&c) {
                self.pos += c.len_utf8();
                flush(&mut literal, &mut nodes);
                return Ok((nodes, Some(c)));
            }
            if self.rest().starts_with("%{?") {
                flush(&mut literal, &mut nodes);
                nodes.push(self.conditional()?);
            } else if c == '{' {
                flush(&mut literal, &mut nodes);
                nodes.push(self.placeholder()?);
            } else {
                literal.push(c);
                self.pos += c.len_utf8();
            }
        }

        flush(&mut literal, &mut nodes);
        Ok((nodes, None))
    }

    fn placeholder(&mut self) -> Result<Node, TemplateError> {
        let start = self.pos;
        let body = &self.src[start + 1..];
        let end = match body.find(['{', '}']) {
            Some(i) if body[i..].starts_with('}') => i,
            _ => return Err(TemplateError::UnclosedPlaceholder { position: start }),
        };
        let name = body[..end].trim();
        if name.is_empty() {
            return Err(TemplateError::EmptyPlaceholder { position: start });
        }
        self.pos = start + 1 + end + 1;
        Ok(match Field::from_name(name) {
            Some(field) => Node::Field(field),
            None => Node::Unknown(name.to_string()),
        })
    }

    fn conditional(&mut self) -> Result<Node, TemplateError> {
        let start = self.pos;
        self.pos += "%{?".len();

        let rest = self.rest();
        let sep = rest.find([',', '|', '}']);
        let name = match sep {
            Some(i) if rest[i..].starts_with(',') => {
                let name = rest[..i].trim().to_string();
                self.pos += i + 1;
                name
            }
            Some(_) => return Err(TemplateError::MissingConditionSeparator { position: start }),
            None => return Err(TemplateError::UnclosedConditional { position: start }),
        };
        if name.is_empty() {
            return Err(TemplateError::EmptyCondition { position: start });
        }
        let condition = Condition::from_name(&name).ok_or(TemplateError::UnknownCondition {
            name: name.clone(),
            position: start,
        })?;

        let (then, term) = self.sequence(&['|', '}'])?;
        match term {
            Some('|') => {}
            Some(_) => return Err(TemplateError::MissingBranchSeparator { position: start }),
            None => return Err(TemplateError::UnclosedConditional { position: start }),
        }
        let (otherwise, term) = self.sequence(&['}'])?;
        if term.is_none() {
            return Err(TemplateError::UnclosedConditional { position: start });
        }

        Ok(Node::Conditional {
            condition,
            then,
            otherwise,
        })
    }
}

fn flush(literal: &mut String, nodes: &mut Vec<Node>) {
    if !literal.is_empty() {
        nodes.push(Node::Literal(std::mem::take(literal)));
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::BoolField;

    #[test]
    fn literals_and_placeholders() {
        let nodes = parse("{artist} - {tracktitle}.{ext}").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Field(Field::Artist),
                Node::Literal(" - ".into()),
                Node::Field(Field::TrackTitle),
                Node::Literal(".".into()),
                Node::Field(Field::Ext),
            ]
        );
    }

    #[test]
    fn unknown_placeholder_is_kept_as_unknown() {
        let nodes = parse("{genre}/{track}").unwrap();
        assert_eq!(nodes[0], Node::Unknown("genre".into()));
    }

    #[test]
    fn conditional_with_empty_false_branch() {
        let nodes = parse("%{?is_multidisc,Disc {media_number}/|}{track}").unwrap();
        assert_eq!(
            nodes[0],
            Node::Conditional {
                condition: Condition::Flag(BoolField::IsMultidisc),
                then: vec![
                    Node::Literal("Disc ".into()),
                    Node::Field(Field::MediaNumber),
                    Node::Literal("/".into()),
                ],
                otherwise: vec![],
            }
        );
        assert_eq!(nodes[1], Node::Field(Field::Track));
    }

    #[test]
    fn conditionals_nest() {
        let nodes = parse("%{?is_multidisc,%{?explicit,E|C}|S}").unwrap();
        let Node::Conditional { then, otherwise, .. } = &nodes[0] else {
            panic!("expected conditional");
        };
        assert!(matches!(
            then[0],
            Node::Conditional {
                condition: Condition::Flag(BoolField::Explicit),
                ..
            }
        ));
        assert_eq!(otherwise, &vec![Node::Literal("S".into())]);
    }

    #[test]
    fn placeholder_fields_parse_as_conditions() {
        let nodes = parse("%{?composer,Classical/|Soundtracks/}{track}").unwrap();
        assert_eq!(
            nodes[0],
            Node::Conditional {
                condition: Condition::Field(Field::Composer),
                then: vec![Node::Literal("Classical/".into())],
                otherwise: vec![Node::Literal("Soundtracks/".into())],
            }
        );
        assert!(parse("%{?artist_featuring,a|b}").is_ok());
        assert!(parse("%{?producer,a|b}").is_ok());
    }

    #[test]
    fn pipe_and_brace_are_literal_at_top_level() {
        let nodes = parse("a|b}c").unwrap();
        assert_eq!(nodes, vec![Node::Literal("a|b}c".into())]);
    }

    #[test]
    fn malformed_templates_report_positions() {
        assert_eq!(
            parse("ab{artist").unwrap_err(),
            TemplateError::UnclosedPlaceholder { position: 2 }
        );
        assert_eq!(
            parse("{}").unwrap_err(),
            TemplateError::EmptyPlaceholder { position: 0 }
        );
        assert_eq!(
            parse("x%{?is_multidisc").unwrap_err(),
            TemplateError::UnclosedConditional { position: 1 }
        );
        assert_eq!(
            parse("%{?is_multidisc|a}").unwrap_err(),
            TemplateError::MissingConditionSeparator { position: 0 }
        );
        assert_eq!(
            parse("%{?is_multidisc,a}").unwrap_err(),
            TemplateError::MissingBranchSeparator { position: 0 }
        );
        assert_eq!(
            parse("%{?is_multidisc,a|b").unwrap_err(),
            TemplateError::UnclosedConditional { position: 0 }
        );
        assert_eq!(
            parse("%{? ,a|b}").unwrap_err(),
            TemplateError::EmptyCondition { position: 0 }
        );
        assert_eq!(
            parse("%{?is_vinyl,a|b}").unwrap_err(),
            TemplateError::UnknownCondition {
                name: "is_vinyl".into(),
                position: 0
            }
        );
    }

    #[test]
    fn placeholder_errors_inside_branches_propagate() {
        assert_eq!(
            parse("%{?explicit,{x{y}|z}").unwrap_err(),
            TemplateError::UnclosedPlaceholder { position: 12 }
        );
    }

    #[test]
    fn unicode_literals_are_preserved() {
        let nodes = parse("Björk – {album}").unwrap();
        assert_eq!(nodes[0], Node::Literal("Björk – ".into()));
    }
}
