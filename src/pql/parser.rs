// SPDX-License-Identifier: PMPL-1.0-or-later

//! PQL query parser
//!
//! Malformed text fails immediately with a query syntax error. Undeclared
//! synonyms and ill-typed attribute references are only recorded on the
//! returned [`Query`]; the evaluator raises them so that BOOLEAN queries
//! can still answer `FALSE`.

use crate::error::{SpaError, SpaResult};
use crate::pql::query::{
    Clause, ClauseParam, DesignEntity, Element, PatternExpr, Query, Selection,
};
use crate::simple::expression::parse_expression_str;
use crate::types::{AttributeType, EntityType, Relation};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?:(?P<string>"[^"]*")|(?P<word>prog_line|stmt#|[A-Za-z][A-Za-z0-9]*\*?)|(?P<integer>[0-9]+)|(?P<symbol>[(),;<>=_.]))"#,
    )
    .expect("valid pql token regex")
});

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").expect("valid pql name regex"));

/// Settings that change which queries are accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryParserConfig {
    /// Allow the interprocedural `NextBip`/`AffectsBip` relations
    pub enable_bip: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum QueryToken {
    Word(String),
    Str(String),
    Integer(String),
    Symbol(char),
}

impl QueryToken {
    fn describe(&self) -> String {
        match self {
            QueryToken::Word(w) => w.clone(),
            QueryToken::Str(s) => format!("\"{}\"", s),
            QueryToken::Integer(i) => i.clone(),
            QueryToken::Symbol(c) => c.to_string(),
        }
    }
}

fn tokenise_query(text: &str) -> SpaResult<Vec<QueryToken>> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let captures = TOKEN_RE.captures(rest).ok_or_else(|| {
            SpaError::query_syntax(format!(
                "unexpected character near '{}'",
                rest.chars().take(16).collect::<String>()
            ))
        })?;
        let token = if let Some(m) = captures.name("string") {
            QueryToken::Str(m.as_str().trim_matches('"').trim().to_string())
        } else if let Some(m) = captures.name("word") {
            QueryToken::Word(m.as_str().to_string())
        } else if let Some(m) = captures.name("integer") {
            QueryToken::Integer(m.as_str().to_string())
        } else {
            let symbol = captures
                .name("symbol")
                .and_then(|m| m.as_str().chars().next())
                .ok_or_else(|| SpaError::query_syntax("empty token"))?;
            QueryToken::Symbol(symbol)
        };
        let consumed = captures.get(0).map_or(0, |m| m.end());
        rest = rest[consumed..].trim_start();
        tokens.push(token);
    }
    Ok(tokens)
}

/// Parse PQL text into a [`Query`]
pub fn parse_query(text: &str, config: &QueryParserConfig) -> SpaResult<Query> {
    let tokens = tokenise_query(text)?;
    let mut parser = QueryParser {
        tokens,
        position: 0,
        config: *config,
        declarations: BTreeMap::new(),
        declaration_order: Vec::new(),
        semantic_error: None,
    };
    parser.parse()
}

struct QueryParser {
    tokens: Vec<QueryToken>,
    position: usize,
    config: QueryParserConfig,
    declarations: BTreeMap<String, DesignEntity>,
    declaration_order: Vec<DesignEntity>,
    semantic_error: Option<String>,
}

impl QueryParser {
    fn parse(&mut self) -> SpaResult<Query> {
        while !self.peek_word("Select") {
            if self.peek().is_none() {
                return Err(SpaError::query_syntax("missing Select clause"));
            }
            self.parse_declaration()?;
        }
        self.expect_word("Select")?;
        let selection = self.parse_selection()?;

        let mut clauses = Vec::new();
        while let Some(token) = self.next() {
            match token {
                QueryToken::Word(w) if w == "such" => {
                    self.expect_word("that")?;
                    self.parse_chain(&mut clauses, Self::parse_relation)?;
                }
                QueryToken::Word(w) if w == "pattern" => {
                    self.parse_chain(&mut clauses, Self::parse_pattern)?;
                }
                QueryToken::Word(w) if w == "with" => {
                    self.parse_chain(&mut clauses, Self::parse_with)?;
                }
                other => {
                    return Err(SpaError::query_syntax(format!(
                        "expected such that, pattern or with but found '{}'",
                        other.describe()
                    )))
                }
            }
        }

        Ok(Query {
            declarations: std::mem::take(&mut self.declaration_order),
            selection,
            clauses,
            semantic_error: self.semantic_error.take(),
        })
    }

    fn parse_declaration(&mut self) -> SpaResult<()> {
        let keyword = self.expect_name()?;
        let entity = EntityType::from_keyword(&keyword).ok_or_else(|| {
            SpaError::query_syntax(format!("unknown design entity '{}'", keyword))
        })?;
        loop {
            let synonym = self.expect_name()?;
            if self.declarations.contains_key(&synonym) {
                self.defer(format!("synonym '{}' declared more than once", synonym));
            } else {
                let declared = DesignEntity::new(entity, synonym.clone());
                self.declaration_order.push(declared.clone());
                self.declarations.insert(synonym, declared);
            }
            if self.eat_symbol(';') {
                return Ok(());
            }
            self.expect_symbol(',')?;
        }
    }

    fn parse_selection(&mut self) -> SpaResult<Selection> {
        if self.peek_word("BOOLEAN") && !self.declarations.contains_key("BOOLEAN") {
            self.position += 1;
            return Ok(Selection::Boolean);
        }
        if self.eat_symbol('<') {
            let mut elements = vec![self.parse_element()?];
            while self.eat_symbol(',') {
                elements.push(self.parse_element()?);
            }
            self.expect_symbol('>')?;
            return Ok(Selection::Elements(elements));
        }
        Ok(Selection::Elements(vec![self.parse_element()?]))
    }

    fn parse_element(&mut self) -> SpaResult<Element> {
        let entity = self.synonym()?;
        let attribute = if self.eat_symbol('.') {
            Some(self.parse_attribute(&entity)?)
        } else {
            None
        };
        Ok(Element { entity, attribute })
    }

    fn parse_attribute(&mut self, entity: &DesignEntity) -> SpaResult<AttributeType> {
        let name = self.expect_name()?;
        let attribute = AttributeType::from_name(&name)
            .ok_or_else(|| SpaError::query_syntax(format!("unknown attribute '{}'", name)))?;
        if !attribute.applies_to(entity.entity) {
            self.defer(format!(
                "attribute {} does not apply to {} '{}'",
                attribute.name(),
                entity.entity,
                entity.synonym
            ));
        }
        Ok(attribute)
    }

    /// Parse one clause, then any further ones joined by `and`
    fn parse_chain(
        &mut self,
        clauses: &mut Vec<Clause>,
        parse_one: fn(&mut Self) -> SpaResult<Clause>,
    ) -> SpaResult<()> {
        clauses.push(parse_one(self)?);
        while self.peek_word("and") {
            self.position += 1;
            clauses.push(parse_one(self)?);
        }
        Ok(())
    }

    fn parse_relation(&mut self) -> SpaResult<Clause> {
        let name = self.expect_name()?;
        let relation = Relation::from_name(&name)
            .ok_or_else(|| SpaError::query_syntax(format!("unknown relation '{}'", name)))?;
        if relation.is_bip() && !self.config.enable_bip {
            return Err(SpaError::configuration(format!(
                "relation {} is disabled; set SPA_ENABLE_BIP to enable it",
                relation
            )));
        }
        self.expect_symbol('(')?;
        let lhs = self.parse_reference()?;
        self.expect_symbol(',')?;
        let rhs = self.parse_reference()?;
        self.expect_symbol(')')?;
        Ok(Clause::SuchThat { relation, lhs, rhs })
    }

    /// `_`, an integer, a quoted name, or a synonym
    fn parse_reference(&mut self) -> SpaResult<ClauseParam> {
        match self.peek().cloned() {
            Some(QueryToken::Symbol('_')) => {
                self.position += 1;
                Ok(ClauseParam::Wildcard)
            }
            Some(QueryToken::Integer(value)) => {
                self.position += 1;
                let index = value.parse::<usize>().map_err(|_| {
                    SpaError::query_syntax(format!("statement number {} out of range", value))
                })?;
                Ok(ClauseParam::Index(index))
            }
            Some(QueryToken::Str(value)) => {
                self.position += 1;
                Ok(ClauseParam::Name(self.checked_name(value)?))
            }
            Some(QueryToken::Word(_)) => Ok(ClauseParam::Entity(self.synonym()?)),
            other => Err(self.unexpected("a clause argument", other.as_ref())),
        }
    }

    fn parse_pattern(&mut self) -> SpaResult<Clause> {
        let entity = self.synonym()?;
        self.expect_symbol('(')?;
        let lhs = self.parse_reference()?;
        if matches!(lhs, ClauseParam::Index(_)) {
            return Err(SpaError::query_syntax(
                "pattern variable must be a synonym, name or wildcard",
            ));
        }
        self.expect_symbol(',')?;
        let rhs = self.parse_pattern_expression()?;

        let mut arity = 2;
        if self.eat_symbol(',') {
            self.expect_symbol('_')?;
            arity = 3;
        }
        self.expect_symbol(')')?;

        match (entity.entity, arity) {
            (EntityType::Assign, 2) | (EntityType::While, 2) | (EntityType::If, 3) => {}
            (kind, _) => self.defer(format!(
                "pattern with {} arguments is not valid for {} '{}'",
                arity, kind, entity.synonym
            )),
        }
        if entity.entity != EntityType::Assign && rhs != ClauseParam::Wildcard {
            self.defer(format!(
                "only assignment patterns may constrain an expression, not '{}'",
                entity.synonym
            ));
        }
        Ok(Clause::Pattern { entity, lhs, rhs })
    }

    /// `_`, `"expr"` or `_"expr"_`
    fn parse_pattern_expression(&mut self) -> SpaResult<ClauseParam> {
        let partial = self.eat_symbol('_');
        let expression = match self.peek().cloned() {
            Some(QueryToken::Str(text)) => {
                self.position += 1;
                text
            }
            _ if partial => return Ok(ClauseParam::Wildcard),
            other => return Err(self.unexpected("a pattern expression", other.as_ref())),
        };
        if partial {
            self.expect_symbol('_')?;
        }
        let parsed = parse_expression_str(&expression).map_err(|err| {
            SpaError::query_syntax(format!("invalid pattern expression \"{}\": {}", expression, err))
        })?;
        Ok(ClauseParam::Expr(PatternExpr {
            partial,
            rpn: parsed.rpn_values(),
        }))
    }

    fn parse_with(&mut self) -> SpaResult<Clause> {
        let (lhs, lhs_attribute) = self.parse_with_reference()?;
        self.expect_symbol('=')?;
        let (rhs, rhs_attribute) = self.parse_with_reference()?;
        Ok(Clause::With {
            lhs,
            lhs_attribute,
            rhs,
            rhs_attribute,
        })
    }

    fn parse_with_reference(&mut self) -> SpaResult<(ClauseParam, Option<AttributeType>)> {
        match self.peek().cloned() {
            Some(QueryToken::Word(_)) => {
                let entity = self.synonym()?;
                let attribute = if self.eat_symbol('.') {
                    Some(self.parse_attribute(&entity)?)
                } else {
                    if entity.entity != EntityType::ProgLine {
                        self.defer(format!(
                            "'{}' needs an attribute in a with clause",
                            entity.synonym
                        ));
                    }
                    None
                };
                Ok((ClauseParam::Entity(entity), attribute))
            }
            Some(QueryToken::Symbol('_')) => Err(SpaError::query_syntax(
                "wildcards are not allowed in with clauses",
            )),
            _ => Ok((self.parse_reference()?, None)),
        }
    }

    /// Resolve a synonym, recording a deferred error if it was never declared
    fn synonym(&mut self) -> SpaResult<DesignEntity> {
        let name = self.expect_name()?;
        match self.declarations.get(&name) {
            Some(entity) => Ok(entity.clone()),
            None => {
                self.defer(format!("synonym '{}' is not declared", name));
                Ok(DesignEntity::new(EntityType::Stmt, name))
            }
        }
    }

    fn checked_name(&self, value: String) -> SpaResult<String> {
        if NAME_RE.is_match(&value) {
            Ok(value)
        } else {
            Err(SpaError::query_syntax(format!("invalid name \"{}\"", value)))
        }
    }

    fn defer(&mut self, message: String) {
        if self.semantic_error.is_none() {
            self.semantic_error = Some(message);
        }
    }

    fn peek(&self) -> Option<&QueryToken> {
        self.tokens.get(self.position)
    }

    fn next(&mut self) -> Option<QueryToken> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn peek_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(QueryToken::Word(w)) if w == word)
    }

    fn eat_symbol(&mut self, symbol: char) -> bool {
        if self.peek() == Some(&QueryToken::Symbol(symbol)) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> SpaResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            let found = self.peek().cloned();
            Err(self.unexpected(&format!("'{}'", symbol), found.as_ref()))
        }
    }

    fn expect_word(&mut self, word: &str) -> SpaResult<()> {
        if self.peek_word(word) {
            self.position += 1;
            Ok(())
        } else {
            let found = self.peek().cloned();
            Err(self.unexpected(&format!("'{}'", word), found.as_ref()))
        }
    }

    fn expect_name(&mut self) -> SpaResult<String> {
        match self.next() {
            Some(QueryToken::Word(word)) => Ok(word),
            other => Err(self.unexpected("a name", other.as_ref())),
        }
    }

    fn unexpected(&self, expected: &str, found: Option<&QueryToken>) -> SpaError {
        match found {
            Some(token) => SpaError::query_syntax(format!(
                "expected {} but found '{}'",
                expected,
                token.describe()
            )),
            None => SpaError::query_syntax(format!("expected {} but the query ended", expected)),
        }
    }
}
