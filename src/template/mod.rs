//! Template tokenizer and AST.
//!
//! A template is SQL text interleaved with tokens:
//!
//! | token            | node                                         |
//! |------------------|----------------------------------------------|
//! | `#{expr, k=v}`   | [`Node::Param`], one placeholder             |
//! | `${expr}`        | [`Node::Raw`], value substituted verbatim    |
//! | `@{name, ...}`   | [`Node::Rule`], dispatched to a named rule   |
//! | `:expr` `&expr`  | [`Node::Named`], one placeholder             |
//! | `?` / `?N`       | [`Node::Position`], reads `arg{N-1}`         |
//!
//! Quoted strings, comments and dollar-quoted blocks are never scanned for tokens;
//! a token preceded by `\` is literal text. Parsing happens once: every error a
//! template can have is reported by [`Template::parse`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

mod param;
mod scanner;

pub use param::ParamSpec;
pub(crate) use param::split_clause;

use scanner::{
    State, after_nth_comma, find_closing_brace, is_block_comment_end, is_block_comment_start,
    is_line_comment_start, is_name_start, matches_tag, scan_digits, scan_name, split_top_level,
    token_open, try_start_dollar_quote,
};

use crate::arg::ArgTyping;
use crate::error::SqlTemplateError;
use crate::expr::Expr;
use crate::results::ResultKind;
use crate::rules::parse_descriptor;

/// One element of a parsed template.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal SQL, including any quoted strings and comments.
    Text(String),
    /// `#{...}`
    Param(ParamSpec),
    /// `:name` or `&name`
    Named(ParamSpec),
    /// `?`, reading `arg{index}` from the context.
    Position { index: usize, param: ParamSpec },
    /// `${...}`
    Raw { source: String, expr: Expr },
    /// `@{...}`
    Rule(RuleNode),
}

/// A `@{name, first, rest}` invocation.
///
/// Whether `first` is an activation expression depends on the rule, so both readings
/// are kept: [`RuleNode::value`] is everything after the name, [`RuleNode::rest`] is
/// everything after the activation expression. Expression and `#{}` readings of the
/// fields are parsed along with the template; built-in rules only use those.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleNode {
    pub name: String,
    value: Option<String>,
    first: Option<String>,
    rest: Option<String>,
    value_template: Option<Template>,
    rest_template: Option<Template>,
    active_expr: Option<Expr>,
    value_target: Option<RuleTarget>,
    rest_target: Option<RuleTarget>,
    param: Option<ParamSpec>,
}

/// A rule value that names one expression: `:ids`, `&ids`, `#{ids, ...}`, or the
/// bare expression text.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleTarget {
    pub source: String,
    pub expr: Expr,
    pub typing: ArgTyping,
}

impl RuleNode {
    /// Everything after the rule name, trimmed.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The first field after the name (the activation expression for gated rules).
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.first.as_deref()
    }

    /// Everything after the first field.
    #[must_use]
    pub fn rest(&self) -> Option<&str> {
        self.rest.as_deref()
    }

    #[must_use]
    pub fn value_template(&self) -> Option<&Template> {
        self.value_template.as_ref()
    }

    #[must_use]
    pub fn rest_template(&self) -> Option<&Template> {
        self.rest_template.as_ref()
    }

    /// The first field parsed as an expression, when it is one.
    #[must_use]
    pub fn active_expr(&self) -> Option<&Expr> {
        self.active_expr.as_ref()
    }

    /// The value parsed as a `#{}` payload, when it is one.
    #[must_use]
    pub fn param(&self) -> Option<&ParamSpec> {
        self.param.as_ref()
    }

    /// Value and its parsed form, read the way a rule with or without activation sees it.
    #[must_use]
    pub fn payload(&self, uses_activation: bool) -> (Option<&str>, Option<&Template>) {
        if uses_activation {
            (self.rest(), self.rest_template())
        } else {
            (self.value(), self.value_template())
        }
    }

    /// The payload read as a single expression.
    #[must_use]
    pub fn target(&self, uses_activation: bool) -> Option<&RuleTarget> {
        if uses_activation {
            self.rest_target.as_ref()
        } else {
            self.value_target.as_ref()
        }
    }
}

/// How the parser reads the payload of a built-in rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltinForm {
    /// `if`, `ifand`, `ifor`, `ifset`: activation expression, then a body.
    Gated,
    /// `ifin`: activation expression, then one target expression.
    GatedTarget,
    /// `in`, `eval`, `md5`: one target expression.
    Target,
    /// `bind`: a name, then an expression.
    Bind,
    /// `arg`, `parameter`: a `#{}` payload.
    Param,
    /// `resultSet`, `resultUpdate`, `defaultResult`.
    Result(Option<ResultKind>),
    Other,
}

impl BuiltinForm {
    fn of(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "if" | "ifand" | "ifor" | "ifset" => BuiltinForm::Gated,
            "ifin" => BuiltinForm::GatedTarget,
            "in" | "eval" | "md5" => BuiltinForm::Target,
            "bind" => BuiltinForm::Bind,
            "arg" | "parameter" => BuiltinForm::Param,
            "resultset" => BuiltinForm::Result(Some(ResultKind::ResultSet)),
            "resultupdate" => BuiltinForm::Result(Some(ResultKind::UpdateCount)),
            "defaultresult" => BuiltinForm::Result(None),
            _ => BuiltinForm::Other,
        }
    }

    fn gated(self) -> bool {
        matches!(self, BuiltinForm::Gated | BuiltinForm::GatedTarget)
    }
}

fn rule_target(
    text: Option<&str>,
    body: Option<&Template>,
) -> Option<Result<RuleTarget, SqlTemplateError>> {
    let text = text?;
    if let Some(target) = body.and_then(param_target) {
        return Some(Ok(target));
    }
    Some(Expr::parse(text).map(|expr| RuleTarget {
        source: text.trim().to_string(),
        expr,
        typing: ArgTyping::input(),
    }))
}

// a body made of exactly one parameter token, give or take whitespace
fn param_target(body: &Template) -> Option<RuleTarget> {
    let mut found = None;
    for node in body.nodes() {
        match node {
            Node::Text(text) if text.trim().is_empty() => {}
            Node::Param(spec) | Node::Named(spec) | Node::Position { param: spec, .. }
                if found.is_none() =>
            {
                found = Some(spec);
            }
            _ => return None,
        }
    }
    let spec = found?;
    Some(RuleTarget {
        source: spec.source.clone()?,
        expr: spec.expr.clone()?,
        typing: spec.typing.clone(),
    })
}

/// A parsed, immutable template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse template text.
    ///
    /// # Errors
    ///
    /// Returns `SqlTemplateError::TemplateSyntax` for unterminated tokens, blank rule
    /// names, malformed `#{}` options, and expressions that do not parse.
    pub fn parse(source: &str) -> Result<Template, SqlTemplateError> {
        let mut parser = TemplateParser { positions: 0 };
        parser.parse(source)
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// True when the template is plain SQL with no tokens.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.nodes.iter().all(|node| matches!(node, Node::Text(_)))
    }

    /// Rule nodes at any depth, in template order.
    #[must_use]
    pub fn rules(&self) -> Vec<&RuleNode> {
        let mut out = Vec::new();
        collect_rules(&self.nodes, &mut out);
        out
    }
}

fn collect_rules<'a>(nodes: &'a [Node], out: &mut Vec<&'a RuleNode>) {
    for node in nodes {
        if let Node::Rule(rule) = node {
            out.push(rule);
            if let Some(template) = rule.value_template() {
                collect_rules(template.nodes(), out);
            }
        }
    }
}

struct TemplateParser {
    // next index handed to a bare `?`
    positions: usize,
}

impl TemplateParser {
    fn parse(&mut self, source: &str) -> Result<Template, SqlTemplateError> {
        let bytes = source.as_bytes();
        let mut nodes = Vec::new();
        let mut state = State::Normal;
        let mut pending = 0;
        let mut idx = 0;

        let flush = |nodes: &mut Vec<Node>, from: usize, to: usize| {
            if to > from {
                match nodes.last_mut() {
                    Some(Node::Text(text)) => text.push_str(&source[from..to]),
                    _ => nodes.push(Node::Text(source[from..to].to_string())),
                }
            }
        };

        while idx < bytes.len() {
            let b = bytes[idx];
            match state {
                State::Normal => {
                    if let Some(sigil) = token_open(bytes, idx) {
                        let body_start = idx + 2;
                        let close = find_closing_brace(bytes, body_start).ok_or_else(|| {
                            SqlTemplateError::syntax(
                                source,
                                format!("unterminated `{}{{` at offset {idx}", sigil as char),
                            )
                        })?;
                        flush(&mut nodes, pending, idx);
                        let body = &source[body_start..close];
                        nodes.push(self.token(sigil, body, source)?);
                        idx = close + 1;
                        pending = idx;
                        continue;
                    }
                    match b {
                        b'\\' if is_escapable(bytes, idx + 1) => {
                            flush(&mut nodes, pending, idx);
                            // keep the escaped character (and sigil brace) as text
                            pending = idx + 1;
                            idx += 2;
                            continue;
                        }
                        b'\'' => state = State::SingleQuoted,
                        b'"' => state = State::DoubleQuoted,
                        _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                        _ if is_block_comment_start(bytes, idx) => {
                            state = State::BlockComment(1);
                            idx += 1;
                        }
                        b'$' => {
                            if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                                state = State::DollarQuoted(tag);
                                idx = advance;
                            }
                        }
                        b':' if bytes.get(idx + 1) == Some(&b':') => {
                            // `::type` cast
                            idx += 2;
                            continue;
                        }
                        b':' | b'&' if bytes.get(idx + 1).is_some_and(|n| is_name_start(*n)) => {
                            let end = scan_name(bytes, idx + 1);
                            flush(&mut nodes, pending, idx);
                            let name = &source[idx + 1..end];
                            nodes.push(Node::Named(ParamSpec::for_expr(name, source)?));
                            idx = end;
                            pending = idx;
                            continue;
                        }
                        b'?' => {
                            flush(&mut nodes, pending, idx);
                            let (index, end) = match scan_digits(bytes, idx + 1) {
                                Some((end, digits)) => {
                                    let n = digits.parse::<usize>().unwrap_or(0);
                                    if n == 0 {
                                        return Err(SqlTemplateError::syntax(
                                            source,
                                            "positional parameters are numbered from 1",
                                        ));
                                    }
                                    (n - 1, end)
                                }
                                None => {
                                    let n = self.positions;
                                    self.positions += 1;
                                    (n, idx + 1)
                                }
                            };
                            let param = ParamSpec::for_expr(&format!("arg{index}"), source)?;
                            nodes.push(Node::Position { index, param });
                            idx = end;
                            pending = idx;
                            continue;
                        }
                        _ => {}
                    }
                }
                State::SingleQuoted => {
                    if b == b'\'' {
                        if bytes.get(idx + 1) == Some(&b'\'') {
                            idx += 1; // skip escaped quote
                        } else {
                            state = State::Normal;
                        }
                    }
                }
                State::DoubleQuoted => {
                    if b == b'"' {
                        if bytes.get(idx + 1) == Some(&b'"') {
                            idx += 1; // skip escaped quote
                        } else {
                            state = State::Normal;
                        }
                    }
                }
                State::LineComment => {
                    if b == b'\n' {
                        state = State::Normal;
                    }
                }
                State::BlockComment(depth) => {
                    if is_block_comment_start(bytes, idx) {
                        state = State::BlockComment(depth + 1);
                        idx += 1;
                    } else if is_block_comment_end(bytes, idx) {
                        if depth == 1 {
                            state = State::Normal;
                        } else {
                            state = State::BlockComment(depth - 1);
                        }
                        idx += 1;
                    }
                }
                State::DollarQuoted(ref tag) => {
                    if b == b'$' && matches_tag(bytes, idx, tag) {
                        let tag_len = tag.len();
                        state = State::Normal;
                        idx += tag_len + 1;
                    }
                }
            }
            idx += 1;
        }

        flush(&mut nodes, pending, bytes.len());
        Ok(Template {
            source: source.to_string(),
            nodes,
        })
    }

    fn token(&mut self, sigil: u8, body: &str, source: &str) -> Result<Node, SqlTemplateError> {
        match sigil {
            b'#' => Ok(Node::Param(ParamSpec::parse(body, source)?)),
            b'$' => {
                let text = body.trim();
                if text.is_empty() {
                    return Err(SqlTemplateError::syntax(source, "`${}` has an empty expression"));
                }
                let expr =
                    Expr::parse(text).map_err(|e| SqlTemplateError::syntax(source, e.to_string()))?;
                Ok(Node::Raw {
                    source: text.to_string(),
                    expr,
                })
            }
            _ => self.rule(body, source).map(Node::Rule),
        }
    }

    fn rule(&mut self, body: &str, source: &str) -> Result<RuleNode, SqlTemplateError> {
        let fields = split_top_level(body);
        let name = fields.first().map_or("", |f| f.trim());
        if name.is_empty() {
            return Err(SqlTemplateError::syntax(source, "rule with a blank name"));
        }

        let tail = |n: usize| {
            after_nth_comma(body, n)
                .map(|offset| body[offset..].trim())
                .filter(|s| !s.is_empty())
        };
        let value = tail(1);
        let rest = tail(2);
        let first = fields.get(1).map(|f| f.trim()).filter(|s| !s.is_empty());

        let before = self.positions;
        let value_template = value.map(|v| self.parse(v)).transpose()?;
        let after = self.positions;

        // `rest` is a suffix of `value`; number its `?`s as they were numbered there
        self.positions = before;
        if let Some(first) = first {
            self.parse(first)?;
        }
        let rest_template = rest.map(|r| self.parse(r)).transpose()?;
        self.positions = after;

        let form = BuiltinForm::of(name);
        let invalid = |field: &str, err: SqlTemplateError| {
            SqlTemplateError::syntax(source, format!("`@{{{name}}}` {field}: {err}"))
        };

        let active_expr = match first.map(Expr::parse) {
            Some(Ok(expr)) => Some(expr),
            Some(Err(err)) if form.gated() => return Err(invalid("activation", err)),
            None if form.gated() => {
                return Err(SqlTemplateError::syntax(
                    source,
                    format!("`@{{{name}}}` needs an activation expression"),
                ));
            }
            _ => None,
        };

        let value_target = match rule_target(value, value_template.as_ref()) {
            Some(Ok(target)) => Some(target),
            Some(Err(err)) if form == BuiltinForm::Target => return Err(invalid("expression", err)),
            _ => None,
        };
        let rest_target = match rule_target(rest, rest_template.as_ref()) {
            Some(Ok(target)) => Some(target),
            Some(Err(err)) if matches!(form, BuiltinForm::GatedTarget | BuiltinForm::Bind) => {
                return Err(invalid("expression", err));
            }
            _ => None,
        };
        if form == BuiltinForm::Bind && (first.is_none() || rest.is_none()) {
            return Err(SqlTemplateError::syntax(
                source,
                "bind needs a name and an expression: @{bind, name, expr}",
            ));
        }

        let param = match value.map(|v| ParamSpec::parse(v, source)) {
            Some(Ok(spec)) => Some(spec),
            Some(Err(err)) if form == BuiltinForm::Param => return Err(err),
            None if form == BuiltinForm::Param => {
                return Err(SqlTemplateError::syntax(
                    source,
                    format!("`@{{{name}}}` has no expression"),
                ));
            }
            _ => None,
        };

        if let BuiltinForm::Result(kind) = form {
            parse_descriptor(kind.unwrap_or(ResultKind::ResultSet), value.unwrap_or_default())
                .map_err(|err| invalid("options", err))?;
        }

        Ok(RuleNode {
            name: name.to_string(),
            value: value.map(str::to_string),
            first: first.map(str::to_string),
            rest: rest.map(str::to_string),
            value_template,
            rest_template,
            active_expr,
            value_target,
            rest_target,
            param,
        })
    }
}

fn is_escapable(bytes: &[u8], idx: usize) -> bool {
    token_open(bytes, idx).is_some() || matches!(bytes.get(idx), Some(b':' | b'&' | b'?'))
}

/// Parsed templates keyed by their text. Each distinct text is parsed at most once.
#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<String, Arc<Template>>>,
}

impl TemplateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached template for `source`, parsing it on first use.
    ///
    /// # Errors
    ///
    /// Returns the parse error; failed parses are not cached.
    pub fn get_or_parse(&self, source: &str) -> Result<Arc<Template>, SqlTemplateError> {
        {
            let entries = match self.entries.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(template) = entries.get(source) {
                return Ok(Arc::clone(template));
            }
        }

        let parsed = Arc::new(Template::parse(source)?);
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = entries
            .entry(source.to_string())
            .or_insert_with(|| Arc::clone(&parsed));
        Ok(Arc::clone(entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.entries.write() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(template: &Template) -> Vec<String> {
        template
            .nodes()
            .iter()
            .map(|node| match node {
                Node::Text(t) => format!("T({t})"),
                Node::Param(p) => format!("P({})", p.source.as_deref().unwrap_or("")),
                Node::Named(p) => format!("N({})", p.source.as_deref().unwrap_or("")),
                Node::Position { index, .. } => format!("?{index}"),
                Node::Raw { source, .. } => format!("R({source})"),
                Node::Rule(rule) => format!("@({})", rule.name),
            })
            .collect()
    }

    #[test]
    fn tokenizes_each_form() {
        let t = Template::parse("select * from ${table} where a = #{a} and b = :b and c = ? and d = &d").unwrap();
        assert_eq!(
            texts(&t),
            vec![
                "T(select * from )",
                "R(table)",
                "T( where a = )",
                "P(a)",
                "T( and b = )",
                "N(b)",
                "T( and c = )",
                "?0",
                "T( and d = )",
                "N(d)",
            ]
        );
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select ':x', \"#{y}\" -- :z ?\n/* @{and, q} */ from t where a = :a";
        let t = Template::parse(sql).unwrap();
        assert_eq!(
            texts(&t),
            vec![
                "T(select ':x', \"#{y}\" -- :z ?\n/* @{and, q} */ from t where a = )",
                "N(a)",
            ]
        );
    }

    #[test]
    fn casts_and_escapes_are_text() {
        let t = Template::parse("select a::int, \\#{b}, \\:c from t").unwrap();
        assert!(t.is_static());
        assert_eq!(texts(&t), vec!["T(select a::int, #{b}, :c from t)"]);
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let t = Template::parse("$fn$ select :a $fn$ where b = :b").unwrap();
        assert_eq!(texts(&t), vec!["T($fn$ select :a $fn$ where b = )", "N(b)"]);
    }

    #[test]
    fn numbered_positions() {
        let t = Template::parse("a = ?2 and b = ?1 and c = ?").unwrap();
        let positions: Vec<usize> = t
            .nodes()
            .iter()
            .filter_map(|n| match n {
                Node::Position { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(positions, vec![1, 0, 0]);
        assert!(Template::parse("a = ?0").is_err());
    }

    #[test]
    fn rule_fields_and_nesting() {
        let t = Template::parse("where 1=1 @{ifand, ids != null, id in @{in, :ids}}").unwrap();
        let rules = t.rules();
        assert_eq!(rules.len(), 2);
        let outer = rules[0];
        assert_eq!(outer.name, "ifand");
        assert_eq!(outer.first(), Some("ids != null"));
        assert_eq!(outer.rest(), Some("id in @{in, :ids}"));
        assert_eq!(outer.value(), Some("ids != null, id in @{in, :ids}"));
        assert_eq!(rules[1].name, "in");
        assert_eq!(rules[1].value(), Some(":ids"));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(Template::parse("select #{a").is_err());
        assert!(Template::parse("select ${ }").is_err());
        assert!(Template::parse("select @{ , x}").is_err());
        assert!(Template::parse("select @{and, a = #{b}").is_err());
        assert!(Template::parse("select @{and, a = #{b, mode=sideways}}").is_err());
        assert!(Template::parse("select #{a +}").is_err());
        assert!(Template::parse("select @{if, a +, x}").is_err());
        assert!(Template::parse("select @{eval, a +}").is_err());
        assert!(Template::parse("select @{arg, x, mode=sideways}").is_err());
        assert!(Template::parse("select @{bind, y, a +}").is_err());
    }

    #[test]
    fn rule_payloads_are_parsed_up_front() {
        let t = Template::parse("@{ifin, ids != null, #{ids, jdbcType=INTEGER}} @{arg, n, name=count}")
            .unwrap();
        let rules = t.rules();
        let ifin = rules[0];
        assert!(ifin.active_expr().is_some());
        let target = ifin.target(true).unwrap();
        assert_eq!(target.source, "ids");
        assert_eq!(target.typing.driver_type, Some(crate::types::DriverType::Integer));

        let arg = rules[1];
        let param = arg.param().unwrap();
        assert_eq!(param.source.as_deref(), Some("n"));
        assert_eq!(param.typing.name.as_deref(), Some("count"));

        // rules outside the built-in vocabulary keep whatever reading parses
        let custom = Template::parse("@{tenant, a = #{x}}").unwrap();
        assert!(custom.rules()[0].target(false).is_none());
    }

    #[test]
    fn cache_parses_once() {
        let cache = TemplateCache::new();
        let a = cache.get_or_parse("select :a").unwrap();
        let b = cache.get_or_parse("select :a").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert!(cache.get_or_parse("select #{").is_err());
        assert_eq!(cache.len(), 1);
    }
}
