//! Recursive-descent SPARQL 1.1 query/update parser.
//!
//! Follows `spargebra`'s shape: a hand-written recursive-descent parser
//! rather than a PEG/grammar-generator crate. Coverage is pragmatic rather
//! than grammar-complete: RDF collections (`( )`) and full blank-node
//! property lists inside `[ ]` are not supported; BGP, OPTIONAL, UNION,
//! MINUS, FILTER, BIND, property paths, GRAPH, solution modifiers,
//! INSERT/DELETE DATA, DELETE/INSERT WHERE, LOAD, and CLEAR are all
//! supported.

use crate::error::{ParseError, Position, MAX_PARSE_DEPTH, MAX_QUERY_BYTES};
use crate::expression::{AggregateExpression, Expression, Function};
use crate::lexer::{Lexer, SpannedToken, Token};
use crate::path::{NegatedPathItem, PropertyPath};
use crate::pattern::{ConstructTemplate, GraphPattern, OrderComparator, PathPattern, Query, TriplePattern};
use crate::update::{GraphUpdate, UpdateOperation};
use crate::variable::{TermOrVariable, Variable};
use rdfkit_model::Term;
use rustc_hash::FxHashMap;
use std::rc::Rc;

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub fn parse_query(text: &str) -> Result<Query, ParseError> {
    let mut parser = Parser::new(text)?;
    let query = parser.parse_query_body()?;
    parser.expect_eof()?;
    Ok(query)
}

pub fn parse_update(text: &str) -> Result<GraphUpdate, ParseError> {
    let mut parser = Parser::new(text)?;
    let update = parser.parse_update_body()?;
    parser.expect_eof()?;
    Ok(update)
}

struct Parser<'a> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    prefixes: FxHashMap<String, String>,
    base: Option<String>,
    depth: u32,
    blank_counter: u32,
    _source: &'a str,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Self, ParseError> {
        if text.len() > MAX_QUERY_BYTES {
            return Err(ParseError::new(
                Position { line: 1, column: 1 },
                format!("query text exceeds the {MAX_QUERY_BYTES}-byte limit"),
            ));
        }
        let mut lexer = Lexer::new(text);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            let is_eof = tok.token == Token::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(Parser { tokens, pos: 0, prefixes: FxHashMap::default(), base: None, depth: 0, blank_counter: 0, _source: text })
    }

    // --- token plumbing -----------------------------------------------------

    fn cur(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn cur_position(&self) -> Position {
        self.tokens[self.pos].position
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.cur_position(), message.into())
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            return Err(self.err("parser recursion depth exceeded"));
        }
        Ok(())
    }

    fn exit(&mut self) {
        self.depth -= 1;
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        if *self.cur() == Token::Eof {
            Ok(())
        } else {
            Err(self.err(format!("unexpected trailing input: {:?}", self.cur())))
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ParseError> {
        if *self.cur() == Token::Punct(c) {
            self.bump();
            Ok(())
        } else {
            Err(self.err(format!("expected '{c}', found {:?}", self.cur())))
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if *self.cur() == Token::Punct(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_ident_ci(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.ident_is(keyword) {
            self.bump();
            Ok(())
        } else {
            Err(self.err(format!("expected keyword {keyword:?}, found {:?} (likely cause: misspelled or misplaced keyword)", self.cur())))
        }
    }

    fn ident_is(&self, keyword: &str) -> bool {
        matches!(self.cur(), Token::Ident(s) if s.eq_ignore_ascii_case(keyword))
    }

    fn eat_ident_ci(&mut self, keyword: &str) -> bool {
        if self.ident_is(keyword) {
            self.bump();
            true
        } else {
            false
        }
    }

    // --- prologue -------------------------------------------------------------

    fn parse_prologue(&mut self) -> Result<(), ParseError> {
        loop {
            if self.eat_ident_ci("BASE") {
                let iri = self.expect_iri_literal()?;
                self.base = Some(iri);
            } else if self.eat_ident_ci("PREFIX") {
                let prefix = match self.bump() {
                    Token::PrefixNs(p) => p,
                    other => return Err(self.err(format!("expected prefix name (e.g. `ex:`), found {other:?}"))),
                };
                let iri = self.expect_iri_literal()?;
                self.prefixes.insert(prefix, iri);
            } else {
                break;
            }
        }
        Ok(())
    }

    fn expect_iri_literal(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Token::Iri(iri) => Ok(self.resolve_iri(iri)),
            other => Err(self.err(format!("expected an IRIREF, found {other:?}"))),
        }
    }

    fn resolve_iri(&self, iri: String) -> String {
        if iri.contains("://") || self.base.is_none() {
            iri
        } else {
            format!("{}{}", self.base.as_deref().unwrap_or(""), iri)
        }
    }

    fn resolve_prefixed(&self, prefix: &str, local: &str) -> Result<String, ParseError> {
        let ns = self
            .prefixes
            .get(prefix)
            .ok_or_else(|| self.err(format!("undefined prefix {prefix:?} (likely cause: missing PREFIX declaration)")))?;
        Ok(format!("{ns}{local}"))
    }

    // --- top-level dispatch -----------------------------------------------------

    fn parse_query_body(&mut self) -> Result<Query, ParseError> {
        self.parse_prologue()?;
        if self.eat_ident_ci("SELECT") {
            self.parse_select_query()
        } else if self.eat_ident_ci("ASK") {
            self.parse_ask_query()
        } else if self.eat_ident_ci("CONSTRUCT") {
            self.parse_construct_query()
        } else if self.eat_ident_ci("DESCRIBE") {
            self.parse_describe_query()
        } else {
            Err(self.err("expected SELECT, ASK, CONSTRUCT, or DESCRIBE"))
        }
    }

    fn parse_update_body(&mut self) -> Result<GraphUpdate, ParseError> {
        self.parse_prologue()?;
        let mut operations = Vec::new();
        loop {
            if *self.cur() == Token::Eof {
                break;
            }
            operations.push(self.parse_update_operation()?);
            if !self.eat_punct(';') {
                break;
            }
            self.parse_prologue()?;
        }
        Ok(GraphUpdate { operations })
    }

    // --- SELECT / ASK / CONSTRUCT / DESCRIBE -----------------------------------

    fn parse_select_query(&mut self) -> Result<Query, ParseError> {
        let distinct = self.eat_ident_ci("DISTINCT");
        let reduced = !distinct && self.eat_ident_ci("REDUCED");

        enum Item {
            Var(Variable),
            Bound(Expression, Variable),
            Agg(AggregateExpression, Variable),
            Star,
        }
        let mut items = Vec::new();
        if self.eat_punct('*') {
            items.push(Item::Star);
        } else {
            loop {
                match self.cur().clone() {
                    Token::Variable(name) => {
                        self.bump();
                        items.push(Item::Var(Variable::new(name)));
                    }
                    Token::Punct('(') => {
                        self.bump();
                        if let Some(agg) = self.try_parse_aggregate()? {
                            self.expect_ident_ci("AS")?;
                            let var = self.expect_variable()?;
                            self.expect_punct(')')?;
                            items.push(Item::Agg(agg, var));
                        } else {
                            let expr = self.parse_expression()?;
                            self.expect_ident_ci("AS")?;
                            let var = self.expect_variable()?;
                            self.expect_punct(')')?;
                            items.push(Item::Bound(expr, var));
                        }
                    }
                    _ => break,
                }
            }
        }
        self.skip_dataset_clauses()?;
        self.expect_ident_ci("WHERE")?;
        let where_pattern = self.parse_group_graph_pattern()?;

        let group_by = self.parse_optional_group_clause()?;
        let mut aggregates: Vec<(Variable, AggregateExpression)> =
            items.iter().filter_map(|it| if let Item::Agg(a, v) = it { Some((v.clone(), a.clone())) } else { None }).collect();
        let has_aggregation = !aggregates.is_empty() || group_by.is_some();

        let mut pattern = where_pattern;
        if has_aggregation {
            pattern = GraphPattern::Group { inner: Box::new(pattern), by: group_by.unwrap_or_default(), aggregates: std::mem::take(&mut aggregates) };
        }

        if let Some(having) = self.parse_optional_having_clause()? {
            pattern = GraphPattern::Filter(having, Box::new(pattern));
        }

        for it in &items {
            if let Item::Bound(expr, var) = it {
                pattern = GraphPattern::Extend(Box::new(pattern), var.clone(), expr.clone());
            }
        }

        if let Some(order) = self.parse_optional_order_clause()? {
            pattern = GraphPattern::OrderBy(Box::new(pattern), order);
        }

        let project_vars: Vec<Variable> = if items.iter().any(|i| matches!(i, Item::Star)) {
            let mut out = Vec::new();
            pattern.visible_variables(&mut out);
            out
        } else {
            items
                .iter()
                .map(|it| match it {
                    Item::Var(v) | Item::Bound(_, v) | Item::Agg(_, v) => v.clone(),
                    Item::Star => unreachable!(),
                })
                .collect()
        };
        pattern = GraphPattern::Project(Box::new(pattern), project_vars);

        if distinct {
            pattern = GraphPattern::Distinct(Box::new(pattern));
        } else if reduced {
            pattern = GraphPattern::Reduced(Box::new(pattern));
        }

        let (offset, length) = self.parse_optional_limit_offset()?;
        if offset != 0 || length.is_some() {
            pattern = GraphPattern::Slice { inner: Box::new(pattern), offset, length };
        }

        Ok(Query::Select { pattern: Rc::new(pattern) })
    }

    fn parse_ask_query(&mut self) -> Result<Query, ParseError> {
        self.skip_dataset_clauses()?;
        self.expect_ident_ci("WHERE")?;
        let pattern = self.parse_group_graph_pattern()?;
        Ok(Query::Ask { pattern: Rc::new(pattern) })
    }

    fn parse_construct_query(&mut self) -> Result<Query, ParseError> {
        self.expect_punct('{')?;
        let template = self.parse_construct_template()?;
        self.expect_punct('}')?;
        self.skip_dataset_clauses()?;
        self.expect_ident_ci("WHERE")?;
        let pattern = self.parse_group_graph_pattern()?;
        let order = self.parse_optional_order_clause()?;
        let (offset, length) = self.parse_optional_limit_offset()?;
        let mut pattern = pattern;
        if let Some(order) = order {
            pattern = GraphPattern::OrderBy(Box::new(pattern), order);
        }
        if offset != 0 || length.is_some() {
            pattern = GraphPattern::Slice { inner: Box::new(pattern), offset, length };
        }
        Ok(Query::Construct { template, pattern: Rc::new(pattern) })
    }

    fn parse_describe_query(&mut self) -> Result<Query, ParseError> {
        let mut terms = Vec::new();
        if self.eat_punct('*') {
            // DESCRIBE * resolves to every variable visible after WHERE, computed below.
        } else {
            loop {
                match self.cur().clone() {
                    Token::Variable(name) => {
                        self.bump();
                        terms.push(TermOrVariable::Variable(Variable::new(name)));
                    }
                    Token::Iri(_) | Token::PrefixedName(_, _) => {
                        let term = self.parse_iri_term()?;
                        terms.push(TermOrVariable::Term(term));
                    }
                    _ => break,
                }
            }
        }
        self.skip_dataset_clauses()?;
        let pattern = if self.eat_ident_ci("WHERE") {
            self.parse_group_graph_pattern()?
        } else {
            GraphPattern::Empty
        };
        if terms.is_empty() {
            let mut vars = Vec::new();
            pattern.visible_variables(&mut vars);
            terms = vars.into_iter().map(TermOrVariable::Variable).collect();
        }
        Ok(Query::Describe { terms, pattern: Rc::new(pattern) })
    }

    fn skip_dataset_clauses(&mut self) -> Result<(), ParseError> {
        while self.eat_ident_ci("FROM") {
            let _ = self.eat_ident_ci("NAMED");
            self.expect_iri_literal()?;
        }
        Ok(())
    }

    // --- solution modifiers ----------------------------------------------------

    fn parse_optional_group_clause(&mut self) -> Result<Option<Vec<Expression>>, ParseError> {
        if !self.eat_ident_ci("GROUP") {
            return Ok(None);
        }
        self.expect_ident_ci("BY")?;
        let mut conditions = Vec::new();
        loop {
            match self.cur().clone() {
                Token::Variable(name) => {
                    self.bump();
                    conditions.push(Expression::Variable(Variable::new(name)));
                }
                Token::Punct('(') => {
                    self.bump();
                    let expr = self.parse_expression()?;
                    if self.eat_ident_ci("AS") {
                        let _var = self.expect_variable()?;
                    }
                    self.expect_punct(')')?;
                    conditions.push(expr);
                }
                _ => break,
            }
        }
        Ok(Some(conditions))
    }

    fn parse_optional_having_clause(&mut self) -> Result<Option<Expression>, ParseError> {
        if !self.eat_ident_ci("HAVING") {
            return Ok(None);
        }
        self.expect_punct('(')?;
        let expr = self.parse_expression()?;
        self.expect_punct(')')?;
        Ok(Some(expr))
    }

    fn parse_optional_order_clause(&mut self) -> Result<Option<Vec<OrderComparator>>, ParseError> {
        if !self.eat_ident_ci("ORDER") {
            return Ok(None);
        }
        self.expect_ident_ci("BY")?;
        let mut out = Vec::new();
        loop {
            let descending = if self.eat_ident_ci("DESC") {
                true
            } else {
                self.eat_ident_ci("ASC");
                false
            };
            let expr = if *self.cur() == Token::Punct('(') {
                self.bump();
                let e = self.parse_expression()?;
                self.expect_punct(')')?;
                e
            } else if let Token::Variable(name) = self.cur().clone() {
                self.bump();
                Expression::Variable(Variable::new(name))
            } else {
                break;
            };
            out.push(OrderComparator { expression: expr, descending });
        }
        if out.is_empty() {
            return Err(self.err("ORDER BY requires at least one condition"));
        }
        Ok(Some(out))
    }

    fn parse_optional_limit_offset(&mut self) -> Result<(usize, Option<usize>), ParseError> {
        let mut offset = 0usize;
        let mut length = None;
        for _ in 0..2 {
            if self.eat_ident_ci("LIMIT") {
                length = Some(self.expect_integer()?);
            } else if self.eat_ident_ci("OFFSET") {
                offset = self.expect_integer()?;
            }
        }
        Ok((offset, length))
    }

    fn expect_integer(&mut self) -> Result<usize, ParseError> {
        match self.bump() {
            Token::Numeric(s) => s.parse::<usize>().map_err(|_| self.err("expected a non-negative integer")),
            other => Err(self.err(format!("expected an integer, found {other:?}"))),
        }
    }

    fn expect_variable(&mut self) -> Result<Variable, ParseError> {
        match self.bump() {
            Token::Variable(name) => Ok(Variable::new(name)),
            other => Err(self.err(format!("expected a variable, found {other:?}"))),
        }
    }

    // --- aggregates --------------------------------------------------------

    fn try_parse_aggregate(&mut self) -> Result<Option<AggregateExpression>, ParseError> {
        let name = match self.cur().clone() {
            Token::Ident(s) => s,
            _ => return Ok(None),
        };
        let upper = name.to_ascii_uppercase();
        let is_agg = matches!(upper.as_str(), "COUNT" | "SUM" | "MIN" | "MAX" | "AVG" | "SAMPLE" | "GROUP_CONCAT");
        if !is_agg {
            return Ok(None);
        }
        self.bump();
        self.expect_punct('(')?;
        let distinct = self.eat_ident_ci("DISTINCT");
        let result = match upper.as_str() {
            "COUNT" => {
                let expr = if self.eat_punct('*') { None } else { Some(Box::new(self.parse_expression()?)) };
                AggregateExpression::Count { expr, distinct }
            }
            "SUM" => AggregateExpression::Sum { expr: Box::new(self.parse_expression()?), distinct },
            "MIN" => AggregateExpression::Min { expr: Box::new(self.parse_expression()?), distinct },
            "MAX" => AggregateExpression::Max { expr: Box::new(self.parse_expression()?), distinct },
            "AVG" => AggregateExpression::Avg { expr: Box::new(self.parse_expression()?), distinct },
            "SAMPLE" => AggregateExpression::Sample { expr: Box::new(self.parse_expression()?), distinct },
            "GROUP_CONCAT" => {
                let expr = Box::new(self.parse_expression()?);
                let separator = if self.eat_punct(';') {
                    self.expect_ident_ci("SEPARATOR")?;
                    self.expect_punct('=')?;
                    Some(self.expect_string_literal()?)
                } else {
                    None
                };
                AggregateExpression::GroupConcat { expr, distinct, separator }
            }
            _ => unreachable!(),
        };
        self.expect_punct(')')?;
        Ok(Some(result))
    }

    fn expect_string_literal(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Token::String(s) => Ok(s),
            other => Err(self.err(format!("expected a string literal, found {other:?}"))),
        }
    }

    // --- group graph pattern -------------------------------------------------

    fn parse_group_graph_pattern(&mut self) -> Result<GraphPattern, ParseError> {
        self.enter()?;
        self.expect_punct('{')?;
        let result = self.parse_group_graph_pattern_sub();
        self.exit();
        let pattern = result?;
        self.expect_punct('}')?;
        Ok(pattern)
    }

    fn parse_group_graph_pattern_sub(&mut self) -> Result<GraphPattern, ParseError> {
        let mut pattern = GraphPattern::Empty;
        loop {
            if *self.cur() == Token::Punct('}') || *self.cur() == Token::Eof {
                break;
            }
            if self.eat_ident_ci("OPTIONAL") {
                let inner = self.parse_group_graph_pattern()?;
                pattern = GraphPattern::LeftJoin(Box::new(pattern), Box::new(inner), None);
            } else if self.eat_ident_ci("MINUS") {
                let inner = self.parse_group_graph_pattern()?;
                pattern = GraphPattern::Minus(Box::new(pattern), Box::new(inner));
            } else if self.eat_ident_ci("FILTER") {
                let expr = self.parse_filter_constraint()?;
                pattern = GraphPattern::Filter(expr, Box::new(pattern));
            } else if self.eat_ident_ci("BIND") {
                self.expect_punct('(')?;
                let expr = self.parse_expression()?;
                self.expect_ident_ci("AS")?;
                let var = self.expect_variable()?;
                self.expect_punct(')')?;
                pattern = GraphPattern::Extend(Box::new(pattern), var, expr);
            } else if self.eat_ident_ci("VALUES") {
                let values = self.parse_values_clause()?;
                pattern = pattern.join(values);
            } else if self.eat_ident_ci("GRAPH") {
                let term = self.parse_var_or_term()?;
                let inner = self.parse_group_graph_pattern()?;
                pattern = pattern.join(GraphPattern::Graph(term, Box::new(inner)));
            } else if *self.cur() == Token::Punct('{') {
                let inner = self.parse_group_graph_pattern()?;
                let inner = self.maybe_parse_union_tail(inner)?;
                pattern = pattern.join(inner);
            } else {
                let block = self.parse_triples_block()?;
                pattern = pattern.join(block);
            }
            self.eat_punct('.');
        }
        Ok(pattern)
    }

    fn maybe_parse_union_tail(&mut self, first: GraphPattern) -> Result<GraphPattern, ParseError> {
        let mut acc = first;
        while self.eat_ident_ci("UNION") {
            let next = self.parse_group_graph_pattern()?;
            acc = GraphPattern::Union(Box::new(acc), Box::new(next));
        }
        Ok(acc)
    }

    fn parse_filter_constraint(&mut self) -> Result<Expression, ParseError> {
        if *self.cur() == Token::Punct('(') {
            self.bump();
            let e = self.parse_expression()?;
            self.expect_punct(')')?;
            Ok(e)
        } else {
            self.parse_builtin_or_function_call()
        }
    }

    fn parse_values_clause(&mut self) -> Result<GraphPattern, ParseError> {
        let mut variables = Vec::new();
        if self.eat_punct('(') {
            loop {
                match self.cur().clone() {
                    Token::Variable(name) => {
                        self.bump();
                        variables.push(Variable::new(name));
                    }
                    Token::Punct(')') => {
                        self.bump();
                        break;
                    }
                    other => return Err(self.err(format!("expected a variable in VALUES header, found {other:?}"))),
                }
            }
        } else {
            variables.push(self.expect_variable()?);
        }
        self.expect_punct('{')?;
        let mut rows = Vec::new();
        loop {
            if self.eat_punct('(') {
                let mut row = Vec::new();
                loop {
                    if self.eat_punct(')') {
                        break;
                    }
                    row.push(self.parse_values_cell()?);
                }
                rows.push(row);
            } else if variables.len() == 1 {
                if *self.cur() == Token::Punct('}') {
                    break;
                }
                rows.push(vec![self.parse_values_cell()?]);
            } else {
                break;
            }
        }
        self.expect_punct('}')?;
        Ok(GraphPattern::Values { variables, rows })
    }

    fn parse_values_cell(&mut self) -> Result<Option<Term>, ParseError> {
        if self.eat_ident_ci("UNDEF") {
            return Ok(None);
        }
        Ok(Some(self.parse_rdf_term()?))
    }

    // --- triples / paths ----------------------------------------------------

    fn parse_triples_block(&mut self) -> Result<GraphPattern, ParseError> {
        let mut pattern = GraphPattern::Empty;
        loop {
            let subject = self.parse_var_or_term()?;
            pattern = pattern.join(self.parse_predicate_object_list(subject)?);
            if *self.cur() != Token::Punct('.') {
                break;
            }
            // Peek past '.': if what follows cannot start a triple, stop (caller consumes '.').
            if !self.next_starts_triples_block() {
                break;
            }
            self.bump();
        }
        Ok(pattern)
    }

    fn next_starts_triples_block(&self) -> bool {
        matches!(
            self.tokens.get(self.pos + 1).map(|t| &t.token),
            Some(Token::Iri(_))
                | Some(Token::PrefixedName(_, _))
                | Some(Token::Variable(_))
                | Some(Token::BlankNode(_))
                | Some(Token::Punct('['))
        )
    }

    fn parse_predicate_object_list(&mut self, subject: TermOrVariable) -> Result<GraphPattern, ParseError> {
        let mut pattern = GraphPattern::Empty;
        loop {
            let path = self.parse_path()?;
            pattern = pattern.join(self.parse_object_list(subject.clone(), path)?);
            if !self.eat_punct(';') {
                break;
            }
            if matches!(self.cur(), Token::Punct('.') | Token::Punct('}')) {
                break;
            }
        }
        Ok(pattern)
    }

    fn parse_object_list(&mut self, subject: TermOrVariable, path: PropertyPath) -> Result<GraphPattern, ParseError> {
        let mut pattern = GraphPattern::Empty;
        loop {
            let object = self.parse_var_or_term()?;
            pattern = pattern.join(self.make_pattern(subject.clone(), path.clone(), object));
            if !self.eat_punct(',') {
                break;
            }
        }
        Ok(pattern)
    }

    fn make_pattern(&self, subject: TermOrVariable, path: PropertyPath, object: TermOrVariable) -> GraphPattern {
        if let PropertyPath::Predicate(iri) = &path {
            GraphPattern::Bgp(vec![TriplePattern { subject, predicate: TermOrVariable::Term(Term::named_node(iri.clone())), object }])
        } else {
            GraphPattern::Path(PathPattern { subject, path, object })
        }
    }

    fn parse_path(&mut self) -> Result<PropertyPath, ParseError> {
        self.parse_path_alternative()
    }

    fn parse_path_alternative(&mut self) -> Result<PropertyPath, ParseError> {
        let mut left = self.parse_path_sequence()?;
        while self.eat_punct('|') {
            let right = self.parse_path_sequence()?;
            left = PropertyPath::Alternative(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_path_sequence(&mut self) -> Result<PropertyPath, ParseError> {
        let mut left = self.parse_path_elt_or_inverse()?;
        while self.eat_punct('/') {
            let right = self.parse_path_elt_or_inverse()?;
            left = PropertyPath::Sequence(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_path_elt_or_inverse(&mut self) -> Result<PropertyPath, ParseError> {
        let inverse = self.eat_punct('^');
        let base = self.parse_path_primary()?;
        let base = self.parse_path_postfix(base)?;
        Ok(if inverse { PropertyPath::Inverse(Box::new(base)) } else { base })
    }

    fn parse_path_postfix(&mut self, base: PropertyPath) -> Result<PropertyPath, ParseError> {
        if self.eat_punct('?') {
            Ok(PropertyPath::ZeroOrOne(Box::new(base)))
        } else if self.eat_punct('+') {
            Ok(PropertyPath::OneOrMore(Box::new(base)))
        } else if self.eat_punct('*') {
            Ok(PropertyPath::ZeroOrMore(Box::new(base)))
        } else {
            Ok(base)
        }
    }

    fn parse_path_primary(&mut self) -> Result<PropertyPath, ParseError> {
        if self.eat_punct('(') {
            let inner = self.parse_path_alternative()?;
            self.expect_punct(')')?;
            return Ok(inner);
        }
        if self.eat_punct('!') {
            return self.parse_negated_path_set();
        }
        if self.ident_is("a") {
            self.bump();
            return Ok(PropertyPath::Predicate(RDF_TYPE.to_string()));
        }
        let iri = self.parse_iri_text()?;
        Ok(PropertyPath::Predicate(iri))
    }

    fn parse_negated_path_set(&mut self) -> Result<PropertyPath, ParseError> {
        if self.eat_punct('(') {
            let mut items = Vec::new();
            loop {
                items.push(self.parse_negated_path_item()?);
                if !self.eat_punct('|') {
                    break;
                }
            }
            self.expect_punct(')')?;
            Ok(PropertyPath::NegatedSet(items))
        } else {
            Ok(PropertyPath::NegatedSet(vec![self.parse_negated_path_item()?]))
        }
    }

    fn parse_negated_path_item(&mut self) -> Result<NegatedPathItem, ParseError> {
        let inverse = self.eat_punct('^');
        let predicate = if self.ident_is("a") {
            self.bump();
            RDF_TYPE.to_string()
        } else {
            self.parse_iri_text()?
        };
        Ok(NegatedPathItem { predicate, inverse })
    }

    fn parse_iri_text(&mut self) -> Result<String, ParseError> {
        match self.bump() {
            Token::Iri(iri) => Ok(self.resolve_iri(iri)),
            Token::PrefixedName(prefix, local) => self.resolve_prefixed(&prefix, &local),
            other => Err(self.err(format!("expected an IRI or prefixed name, found {other:?}"))),
        }
    }

    fn parse_iri_term(&mut self) -> Result<Term, ParseError> {
        Ok(Term::named_node(self.parse_iri_text()?))
    }

    fn parse_var_or_term(&mut self) -> Result<TermOrVariable, ParseError> {
        match self.cur().clone() {
            Token::Variable(name) => {
                self.bump();
                Ok(TermOrVariable::Variable(Variable::new(name)))
            }
            Token::Punct('[') => {
                self.bump();
                self.expect_punct(']')?;
                self.blank_counter += 1;
                Ok(TermOrVariable::Term(Term::blank_node(format!("anon{}", self.blank_counter))))
            }
            _ => Ok(TermOrVariable::Term(self.parse_rdf_term()?)),
        }
    }

    fn parse_rdf_term(&mut self) -> Result<Term, ParseError> {
        match self.bump() {
            Token::Iri(iri) => Ok(Term::named_node(self.resolve_iri(iri))),
            Token::PrefixedName(prefix, local) => Ok(Term::named_node(self.resolve_prefixed(&prefix, &local)?)),
            Token::BlankNode(label) => Ok(Term::blank_node(label)),
            Token::String(value) => self.parse_literal_suffix(value),
            Token::Numeric(raw) => Ok(term_from_numeric_lexical(&raw)),
            Token::Ident(word) if word.eq_ignore_ascii_case("true") => {
                Ok(Term::TypedLiteral { value: "true".to_string(), datatype: rdfkit_model::term::XSD_BOOLEAN.to_string() })
            }
            Token::Ident(word) if word.eq_ignore_ascii_case("false") => {
                Ok(Term::TypedLiteral { value: "false".to_string(), datatype: rdfkit_model::term::XSD_BOOLEAN.to_string() })
            }
            other => Err(self.err(format!("expected an RDF term, found {other:?}"))),
        }
    }

    fn parse_literal_suffix(&mut self, value: String) -> Result<Term, ParseError> {
        if let Token::LangTag(lang) = self.cur().clone() {
            self.bump();
            return Ok(Term::LangLiteral { value, language: lang });
        }
        if *self.cur() == Token::Punct('^') {
            let save = self.pos;
            self.bump();
            if *self.cur() == Token::Punct('^') {
                self.bump();
                let datatype = self.parse_iri_text()?;
                return Ok(Term::TypedLiteral { value, datatype });
            }
            self.pos = save;
        }
        Ok(Term::SimpleLiteral(value))
    }

    // --- construct template ---------------------------------------------------

    fn parse_construct_template(&mut self) -> Result<ConstructTemplate, ParseError> {
        let mut triples = Vec::new();
        while *self.cur() != Token::Punct('}') {
            let subject = self.parse_var_or_term()?;
            loop {
                let predicate = self.parse_iri_term_or_var()?;
                loop {
                    let object = self.parse_var_or_term()?;
                    triples.push(TriplePattern { subject: subject.clone(), predicate: predicate.clone(), object });
                    if !self.eat_punct(',') {
                        break;
                    }
                }
                if !self.eat_punct(';') {
                    break;
                }
            }
            if !self.eat_punct('.') {
                break;
            }
        }
        Ok(triples)
    }

    fn parse_iri_term_or_var(&mut self) -> Result<TermOrVariable, ParseError> {
        if let Token::Variable(name) = self.cur().clone() {
            self.bump();
            return Ok(TermOrVariable::Variable(Variable::new(name)));
        }
        if self.ident_is("a") {
            self.bump();
            return Ok(TermOrVariable::Term(Term::named_node(RDF_TYPE)));
        }
        Ok(TermOrVariable::Term(self.parse_iri_term()?))
    }

    // --- expressions ------------------------------------------------------

    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.enter()?;
        let result = self.parse_conditional_or();
        self.exit();
        result
    }

    fn parse_conditional_or(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_conditional_and()?;
        while *self.cur() == Token::Op("||") {
            self.bump();
            let right = self.parse_conditional_and()?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_conditional_and(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_relational()?;
        while *self.cur() == Token::Op("&&") {
            self.bump();
            let right = self.parse_relational()?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_additive()?;
        let ctor: Option<fn(Box<Expression>, Box<Expression>) -> Expression> = match self.cur().clone() {
            Token::Punct('=') => {
                self.bump();
                Some(Expression::Equal)
            }
            Token::Op("!=") => {
                self.bump();
                Some(Expression::NotEqual)
            }
            Token::Punct('<') => {
                self.bump();
                Some(Expression::Less)
            }
            Token::Punct('>') => {
                self.bump();
                Some(Expression::Greater)
            }
            Token::Op("<=") => {
                self.bump();
                Some(Expression::LessOrEqual)
            }
            Token::Op(">=") => {
                self.bump();
                Some(Expression::GreaterOrEqual)
            }
            _ => None,
        };
        if let Some(ctor) = ctor {
            let right = self.parse_additive()?;
            return Ok(ctor(Box::new(left), Box::new(right)));
        }
        if self.eat_ident_ci("IN") {
            let list = self.parse_expression_list()?;
            return Ok(Expression::In(Box::new(left), list));
        }
        if self.ident_is("NOT") && self.peek_is_ident_at(1, "IN") {
            self.bump();
            self.bump();
            let list = self.parse_expression_list()?;
            return Ok(Expression::Not(Box::new(Expression::In(Box::new(left), list))));
        }
        Ok(left)
    }

    fn peek_is_ident_at(&self, offset: usize, keyword: &str) -> bool {
        matches!(self.tokens.get(self.pos + offset).map(|t| &t.token), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    fn parse_expression_list(&mut self) -> Result<Vec<Expression>, ParseError> {
        self.expect_punct('(')?;
        let mut out = Vec::new();
        if !self.eat_punct(')') {
            loop {
                out.push(self.parse_expression()?);
                if !self.eat_punct(',') {
                    break;
                }
            }
            self.expect_punct(')')?;
        }
        Ok(out)
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            if self.eat_punct('+') {
                let right = self.parse_multiplicative()?;
                left = Expression::Add(Box::new(left), Box::new(right));
            } else if *self.cur() == Token::Punct('-') {
                self.bump();
                let right = self.parse_multiplicative()?;
                left = Expression::Subtract(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            if self.eat_punct('*') {
                let right = self.parse_unary()?;
                left = Expression::Multiply(Box::new(left), Box::new(right));
            } else if self.eat_punct('/') {
                let right = self.parse_unary()?;
                left = Expression::Divide(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        if self.eat_punct('!') {
            return Ok(Expression::Not(Box::new(self.parse_unary()?)));
        }
        if *self.cur() == Token::Punct('+') {
            self.bump();
            return Ok(Expression::UnaryPlus(Box::new(self.parse_unary()?)));
        }
        if *self.cur() == Token::Punct('-') {
            self.bump();
            return Ok(Expression::UnaryMinus(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        if self.eat_punct('(') {
            let e = self.parse_expression()?;
            self.expect_punct(')')?;
            return Ok(e);
        }
        if self.eat_ident_ci("EXISTS") {
            let pattern = self.parse_group_graph_pattern()?;
            return Ok(Expression::Exists(Rc::new(pattern)));
        }
        if self.ident_is("NOT") && self.peek_is_ident_at(1, "EXISTS") {
            self.bump();
            self.bump();
            let pattern = self.parse_group_graph_pattern()?;
            return Ok(Expression::NotExists(Rc::new(pattern)));
        }
        if self.ident_is("IF") {
            self.bump();
            self.expect_punct('(')?;
            let cond = self.parse_expression()?;
            self.expect_punct(',')?;
            let then_e = self.parse_expression()?;
            self.expect_punct(',')?;
            let else_e = self.parse_expression()?;
            self.expect_punct(')')?;
            return Ok(Expression::If(Box::new(cond), Box::new(then_e), Box::new(else_e)));
        }
        if let Token::Variable(name) = self.cur().clone() {
            self.bump();
            return Ok(Expression::Variable(Variable::new(name)));
        }
        if matches!(self.cur(), Token::Ident(_)) {
            return self.parse_builtin_or_function_call();
        }
        Ok(Expression::Literal(self.parse_rdf_term()?))
    }

    fn parse_builtin_or_function_call(&mut self) -> Result<Expression, ParseError> {
        let name = match self.bump() {
            Token::Ident(s) => s,
            other => return Err(self.err(format!("expected a function name, found {other:?}"))),
        };
        let upper = name.to_ascii_uppercase();
        if upper == "BOUND" {
            self.expect_punct('(')?;
            let var = self.expect_variable()?;
            self.expect_punct(')')?;
            return Ok(Expression::Bound(var));
        }
        if upper == "COALESCE" {
            return Ok(Expression::Coalesce(self.parse_expression_list()?));
        }
        if upper == "SAMETERM" {
            self.expect_punct('(')?;
            let a = self.parse_expression()?;
            self.expect_punct(',')?;
            let b = self.parse_expression()?;
            self.expect_punct(')')?;
            return Ok(Expression::SameTerm(Box::new(a), Box::new(b)));
        }
        if upper == "LANGMATCHES" {
            self.expect_punct('(')?;
            let a = self.parse_expression()?;
            self.expect_punct(',')?;
            let b = self.parse_expression()?;
            self.expect_punct(')')?;
            return Ok(Expression::FunctionCall(Function::LangMatches, vec![a, b]));
        }
        if upper == "REGEX" {
            self.expect_punct('(')?;
            let text = self.parse_expression()?;
            self.expect_punct(',')?;
            let pattern = self.parse_expression()?;
            let flags = if self.eat_punct(',') { Some(Box::new(self.parse_expression()?)) } else { None };
            self.expect_punct(')')?;
            return Ok(Expression::Regex { text: Box::new(text), pattern: Box::new(pattern), flags });
        }
        if upper == "SUBSTR" {
            self.expect_punct('(')?;
            let args = self.parse_rest_of_arg_list()?;
            return Ok(Expression::FunctionCall(Function::SubStr, args));
        }
        if upper == "REPLACE" {
            self.expect_punct('(')?;
            let args = self.parse_rest_of_arg_list()?;
            return Ok(Expression::FunctionCall(Function::Replace, args));
        }
        let func = match upper.as_str() {
            "STR" => Function::Str,
            "LANG" => Function::Lang,
            "DATATYPE" => Function::Datatype,
            "ISIRI" | "ISURI" => Function::IsIri,
            "ISBLANK" => Function::IsBlank,
            "ISLITERAL" => Function::IsLiteral,
            "ISNUMERIC" => Function::IsNumeric,
            "ABS" => Function::Abs,
            "CEIL" => Function::Ceil,
            "FLOOR" => Function::Floor,
            "ROUND" => Function::Round,
            "CONCAT" => Function::Concat,
            "STRLEN" => Function::StrLen,
            "UCASE" => Function::UCase,
            "LCASE" => Function::LCase,
            "CONTAINS" => Function::Contains,
            "STRSTARTS" => Function::StrStarts,
            "STRENDS" => Function::StrEnds,
            "STRBEFORE" => Function::StrBefore,
            "STRAFTER" => Function::StrAfter,
            "ENCODE_FOR_URI" => Function::Encode,
            "YEAR" => Function::Year,
            "MONTH" => Function::Month,
            "DAY" => Function::Day,
            "HOURS" => Function::Hours,
            "MINUTES" => Function::Minutes,
            "SECONDS" => Function::Seconds,
            "NOW" => Function::Now,
            "UUID" => Function::Uuid,
            "STRUUID" => Function::StrUuid,
            "RAND" => Function::Rand,
            "STRDT" => Function::StrDt,
            "STRLANG" => Function::StrLang,
            "MD5" => Function::Md5,
            "SHA1" => Function::Sha1,
            "SHA256" => Function::Sha256,
            other_name => return Err(self.err(format!("unknown function {other_name:?}"))),
        };
        self.expect_punct('(')?;
        let args = self.parse_rest_of_arg_list()?;
        Ok(Expression::FunctionCall(func, args))
    }

    fn parse_rest_of_arg_list(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut out = Vec::new();
        if self.eat_punct(')') {
            return Ok(out);
        }
        loop {
            out.push(self.parse_expression()?);
            if !self.eat_punct(',') {
                break;
            }
        }
        self.expect_punct(')')?;
        Ok(out)
    }

    // --- updates --------------------------------------------------------------

    fn parse_update_operation(&mut self) -> Result<UpdateOperation, ParseError> {
        if self.eat_ident_ci("LOAD") {
            let silent = self.eat_ident_ci("SILENT");
            let source = self.expect_iri_literal()?;
            if self.eat_ident_ci("INTO") {
                self.expect_ident_ci("GRAPH")?;
                self.expect_iri_literal()?;
            }
            return Ok(UpdateOperation::Load { source, silent });
        }
        if self.eat_ident_ci("CLEAR") {
            let silent = self.eat_ident_ci("SILENT");
            if self.eat_ident_ci("GRAPH") {
                self.expect_iri_literal()?;
            } else {
                let _ = self.eat_ident_ci("DEFAULT") || self.eat_ident_ci("NAMED") || self.eat_ident_ci("ALL");
            }
            return Ok(UpdateOperation::Clear { silent });
        }
        if self.eat_ident_ci("INSERT") {
            if self.eat_ident_ci("DATA") {
                let triples = self.parse_quad_data()?;
                return Ok(UpdateOperation::InsertData(triples));
            }
            let insert = self.parse_quad_pattern()?;
            self.skip_using_clauses()?;
            self.expect_ident_ci("WHERE")?;
            let pattern = self.parse_group_graph_pattern()?;
            return Ok(UpdateOperation::DeleteInsertWhere { delete: Vec::new(), insert, pattern: Rc::new(pattern) });
        }
        if self.eat_ident_ci("DELETE") {
            if self.eat_ident_ci("DATA") {
                let triples = self.parse_quad_data()?;
                return Ok(UpdateOperation::DeleteData(triples));
            }
            if self.eat_ident_ci("WHERE") {
                let triples = self.parse_quad_pattern()?;
                return Ok(UpdateOperation::DeleteInsertWhere {
                    delete: triples.clone(),
                    insert: Vec::new(),
                    pattern: Rc::new(GraphPattern::Bgp(triples)),
                });
            }
            let delete = self.parse_quad_pattern()?;
            let insert = if self.eat_ident_ci("INSERT") { self.parse_quad_pattern()? } else { Vec::new() };
            self.skip_using_clauses()?;
            self.expect_ident_ci("WHERE")?;
            let pattern = self.parse_group_graph_pattern()?;
            return Ok(UpdateOperation::DeleteInsertWhere { delete, insert, pattern: Rc::new(pattern) });
        }
        if self.eat_ident_ci("WITH") {
            self.expect_iri_literal()?;
            let delete = if self.eat_ident_ci("DELETE") { self.parse_quad_pattern()? } else { Vec::new() };
            let insert = if self.eat_ident_ci("INSERT") { self.parse_quad_pattern()? } else { Vec::new() };
            self.skip_using_clauses()?;
            self.expect_ident_ci("WHERE")?;
            let pattern = self.parse_group_graph_pattern()?;
            return Ok(UpdateOperation::DeleteInsertWhere { delete, insert, pattern: Rc::new(pattern) });
        }
        Err(self.err("expected LOAD, CLEAR, INSERT, DELETE, or WITH"))
    }

    fn skip_using_clauses(&mut self) -> Result<(), ParseError> {
        while self.eat_ident_ci("USING") {
            let _ = self.eat_ident_ci("NAMED");
            self.expect_iri_literal()?;
        }
        Ok(())
    }

    fn parse_quad_data(&mut self) -> Result<Vec<TriplePattern>, ParseError> {
        self.expect_punct('{')?;
        let pattern = self.parse_triples_block()?;
        self.expect_punct('}')?;
        Ok(flatten_bgp(pattern))
    }

    fn parse_quad_pattern(&mut self) -> Result<Vec<TriplePattern>, ParseError> {
        self.expect_punct('{')?;
        let pattern = if *self.cur() == Token::Punct('}') { GraphPattern::Empty } else { self.parse_triples_block()? };
        self.expect_punct('}')?;
        Ok(flatten_bgp(pattern))
    }
}

fn flatten_bgp(pattern: GraphPattern) -> Vec<TriplePattern> {
    match pattern {
        GraphPattern::Empty => Vec::new(),
        GraphPattern::Bgp(triples) => triples,
        GraphPattern::Join(a, b) => {
            let mut out = flatten_bgp(*a);
            out.extend(flatten_bgp(*b));
            out
        }
        other => panic!("update data block contained a non-ground pattern: {other:?}"),
    }
}

/// Builds a [`Term::Numeric`] from a raw numeric lexical form, classifying it as integer,
/// decimal, or double the way the XSD mapping requires.
pub fn term_from_numeric_lexical(raw: &str) -> Term {
    use rdfkit_model::term::NumericLiteral;
    if raw.contains('e') || raw.contains('E') {
        let v: f64 = raw.parse().unwrap_or(f64::NAN);
        return Term::Numeric(NumericLiteral::Double(v));
    }
    if let Some((whole, frac)) = raw.split_once('.') {
        let scaled = decimal_lexical_to_scaled(whole, frac);
        return Term::Numeric(NumericLiteral::Decimal(scaled));
    }
    match raw.parse::<i64>() {
        Ok(v) => Term::Numeric(NumericLiteral::Integer(v)),
        Err(_) => Term::Numeric(NumericLiteral::Double(raw.parse().unwrap_or(f64::NAN))),
    }
}

fn decimal_lexical_to_scaled(whole: &str, frac: &str) -> i64 {
    use rdfkit_model::term::DECIMAL_SCALE;
    let negative = whole.starts_with('-');
    let whole_abs = whole.trim_start_matches(['-', '+']);
    let whole_val: i64 = whole_abs.parse().unwrap_or(0);
    let frac_digits = 9usize.min(frac.len());
    let frac_str = &frac[..frac_digits];
    let frac_val: i64 = if frac_str.is_empty() { 0 } else { frac_str.parse().unwrap_or(0) };
    let scale_for_frac = 10i64.pow(9 - frac_digits as u32);
    let magnitude = whole_val * DECIMAL_SCALE + frac_val * scale_for_frac;
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_select() {
        let q = parse_query("SELECT ?o WHERE { <urn:a> <urn:p> ?o }").unwrap();
        match q {
            Query::Select { pattern } => {
                let mut vars = Vec::new();
                pattern.visible_variables(&mut vars);
                assert!(vars.iter().any(|v| v.as_str() == "o"));
            }
            _ => panic!("expected SELECT"),
        }
    }

    #[test]
    fn parses_prefixed_names_and_optional() {
        let q = parse_query(
            "PREFIX ex: <http://example.com/> SELECT ?n ?e WHERE { ?x ex:name ?n OPTIONAL { ?x ex:email ?e } }",
        )
        .unwrap();
        assert!(matches!(q, Query::Select { .. }));
    }

    #[test]
    fn parses_property_path_plus() {
        let q = parse_query("SELECT ?x WHERE { <urn:a> <urn:sub>+ ?x }").unwrap();
        assert!(matches!(q, Query::Select { .. }));
    }

    #[test]
    fn rejects_undefined_prefix() {
        let err = parse_query("SELECT ?x WHERE { ?x ex:p ?y }").unwrap_err();
        assert!(err.message.contains("undefined prefix"));
    }

    #[test]
    fn parses_insert_data_update() {
        let u = parse_update("INSERT DATA { <urn:a> <urn:p> <urn:b> }").unwrap();
        assert_eq!(u.operations.len(), 1);
        assert!(matches!(u.operations[0], UpdateOperation::InsertData(_)));
    }

    #[test]
    fn parses_delete_insert_where() {
        let u = parse_update(
            "DELETE { ?x <urn:p> ?y } INSERT { ?x <urn:q> ?y } WHERE { ?x <urn:p> ?y }",
        )
        .unwrap();
        assert_eq!(u.operations.len(), 1);
        assert!(matches!(u.operations[0], UpdateOperation::DeleteInsertWhere { .. }));
    }

    #[test]
    fn numeric_lexical_classification() {
        use rdfkit_model::term::NumericLiteral;
        assert_eq!(term_from_numeric_lexical("42"), Term::Numeric(NumericLiteral::Integer(42)));
        assert!(matches!(term_from_numeric_lexical("3.5"), Term::Numeric(NumericLiteral::Decimal(_))));
        assert!(matches!(term_from_numeric_lexical("1.0e10"), Term::Numeric(NumericLiteral::Double(_))));
    }
}
