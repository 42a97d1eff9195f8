// SPDX-License-Identifier: PMPL-1.0-or-later

//! Query evaluation against a read-only knowledge base
//!
//! Each clause either fails, which empties the whole query, or contributes
//! a [`ResultTable`] of the bindings it allows. The tables are merged once
//! every clause has passed and the selection is read off the merged tables.

use crate::error::{ErrorKind, SpaError, SpaResult};
use crate::pkb::KnowledgeBase;
use crate::pql::optimizer::{self, OptimizerSettings};
use crate::pql::query::{Clause, ClauseParam, DesignEntity, Element, Query, Selection};
use crate::pql::result::QueryResult;
use crate::pql::table::{Database, ResultTable};
use crate::types::{ArgumentDomain, AttributeType, EntityType, Relation, TableElement};
use std::collections::BTreeSet;
use tracing::debug;

type Pair = (TableElement, TableElement);

/// Evaluate with every optimizer toggle on (`optimize`) or off
pub fn evaluate_query<K>(query: &Query, kb: &K, optimize: bool) -> SpaResult<QueryResult>
where
    K: KnowledgeBase + ?Sized,
{
    evaluate_with_settings(query, kb, &OptimizerSettings::from_flag(optimize))
}

/// Evaluate under explicit optimizer settings
///
/// A semantic error in a BOOLEAN query answers FALSE instead of failing.
pub fn evaluate_with_settings<K>(
    query: &Query,
    kb: &K,
    settings: &OptimizerSettings,
) -> SpaResult<QueryResult>
where
    K: KnowledgeBase + ?Sized,
{
    match evaluate_checked(query, kb, settings) {
        Err(err) if err.kind() == ErrorKind::Semantic && query.is_boolean() => {
            debug!(%err, "semantic error in boolean query");
            Ok(QueryResult::Boolean(false))
        }
        other => other,
    }
}

fn evaluate_checked<K>(
    query: &Query,
    kb: &K,
    settings: &OptimizerSettings,
) -> SpaResult<QueryResult>
where
    K: KnowledgeBase + ?Sized,
{
    if let Some(message) = &query.semantic_error {
        return Err(SpaError::semantic(message.clone()));
    }
    for clause in &query.clauses {
        validate_clause(clause)?;
    }

    let clauses = optimizer::rewrite(&query.clauses, settings);
    let mut evaluator = Evaluator {
        kb,
        database: Database::new(),
    };

    for clause in &clauses {
        let holds = evaluator.evaluate_clause(clause)?;
        debug!(
            %clause,
            holds,
            height = evaluator.database.last().map_or(0, ResultTable::height),
            "evaluated clause"
        );
        if !holds {
            return Ok(QueryResult::empty(&query.selection));
        }
    }

    let database = std::mem::take(&mut evaluator.database);
    let tables = if settings.group_before_merge {
        optimizer::group_tables(database, settings.sort_before_bfs)
    } else {
        optimizer::merge_all(database)
    };
    if tables.iter().any(ResultTable::is_empty) {
        debug!("a merged table has no rows");
        return Ok(QueryResult::empty(&query.selection));
    }

    evaluator.select(&query.selection, &tables)
}

fn validate_clause(clause: &Clause) -> SpaResult<()> {
    match clause {
        Clause::SuchThat { relation, lhs, rhs } => {
            validate_argument(*relation, lhs, relation.lhs_domain())?;
            validate_argument(*relation, rhs, relation.rhs_domain())
        }
        Clause::Pattern { entity, lhs, rhs } => {
            if !matches!(
                entity.entity,
                EntityType::Assign | EntityType::While | EntityType::If
            ) {
                return Err(SpaError::semantic(format!(
                    "pattern synonym '{}' must be an assign, while or if",
                    entity.synonym
                )));
            }
            let lhs_valid = match lhs {
                ClauseParam::Entity(variable) => variable.entity == EntityType::Variable,
                ClauseParam::Name(_) | ClauseParam::Wildcard => true,
                ClauseParam::Index(_) | ClauseParam::Expr(_) => false,
            };
            let rhs_valid = match rhs {
                ClauseParam::Wildcard => true,
                ClauseParam::Expr(_) => entity.entity == EntityType::Assign,
                _ => false,
            };
            if lhs_valid && rhs_valid {
                Ok(())
            } else {
                Err(SpaError::semantic(format!("invalid {}", clause)))
            }
        }
        Clause::With {
            lhs,
            lhs_attribute,
            rhs,
            rhs_attribute,
        } => {
            if with_side_is_name(lhs, *lhs_attribute)? != with_side_is_name(rhs, *rhs_attribute)? {
                return Err(SpaError::semantic(format!(
                    "{} compares a name with an integer",
                    clause
                )));
            }
            Ok(())
        }
    }
}

fn validate_argument(relation: Relation, param: &ClauseParam, domain: ArgumentDomain) -> SpaResult<()> {
    let valid = match param {
        ClauseParam::Entity(entity) => domain.accepts(entity.entity),
        ClauseParam::Name(_) => domain.accepts_name(),
        ClauseParam::Index(_) => domain.accepts_index(),
        // `Uses(_, v)` cannot tell statements from procedures
        ClauseParam::Wildcard => Relation::wildcard_entity(domain).is_some(),
        ClauseParam::Expr(_) => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SpaError::semantic(format!(
            "'{}' is not a valid argument of {}",
            param, relation
        )))
    }
}

fn with_side_is_name(param: &ClauseParam, attribute: Option<AttributeType>) -> SpaResult<bool> {
    match (param, attribute) {
        (ClauseParam::Name(_), None) => Ok(true),
        (ClauseParam::Index(_), None) => Ok(false),
        (ClauseParam::Entity(entity), Some(attribute)) if attribute.applies_to(entity.entity) => {
            Ok(attribute.is_name())
        }
        (ClauseParam::Entity(entity), None) if entity.entity == EntityType::ProgLine => Ok(false),
        _ => Err(SpaError::semantic(format!(
            "'{}' cannot be compared in a with clause",
            param
        ))),
    }
}

/// Value of `attribute` for one binding of a synonym of type `entity`
pub fn project_attribute<K>(
    kb: &K,
    entity: EntityType,
    attribute: Option<AttributeType>,
    value: &TableElement,
) -> SpaResult<TableElement>
where
    K: KnowledgeBase + ?Sized,
{
    let stmt = || {
        value
            .as_stmt()
            .ok_or_else(|| SpaError::semantic(format!("'{}' is not a statement number", value)))
    };
    let found = |name: Option<&str>, what: &str| -> SpaResult<TableElement> {
        name.map(TableElement::name).ok_or_else(|| {
            SpaError::semantic(format!("statement {} has no {}", value, what))
        })
    };

    match (attribute, entity) {
        (Some(AttributeType::ProcName), EntityType::Call) => {
            found(kb.called_procedure(stmt()?), "called procedure")
        }
        (Some(AttributeType::VarName), EntityType::Read) => {
            found(kb.read_variable(stmt()?), "read variable")
        }
        (Some(AttributeType::VarName), EntityType::Print) => {
            found(kb.printed_variable(stmt()?), "printed variable")
        }
        // Constants compare numerically with statement numbers and literals
        (Some(AttributeType::Value), EntityType::Constant) => Ok(value
            .as_name()
            .and_then(|literal| literal.parse::<usize>().ok())
            .map_or_else(|| value.clone(), TableElement::Stmt)),
        _ => Ok(value.clone()),
    }
}

struct Evaluator<'a, K: KnowledgeBase + ?Sized> {
    kb: &'a K,
    database: Database,
}

impl<'a, K: KnowledgeBase + ?Sized> Evaluator<'a, K> {
    fn evaluate_clause(&mut self, clause: &Clause) -> SpaResult<bool> {
        match clause {
            Clause::SuchThat { relation, lhs, rhs } => Ok(self.such_that(*relation, lhs, rhs)),
            Clause::Pattern { entity, lhs, rhs } => Ok(self.pattern(entity, lhs, rhs)),
            Clause::With {
                lhs,
                lhs_attribute,
                rhs,
                rhs_attribute,
            } => self.with(lhs, *lhs_attribute, rhs, *rhs_attribute),
        }
    }

    fn such_that(&mut self, relation: Relation, lhs: &ClauseParam, rhs: &ClauseParam) -> bool {
        if relation.is_irreflexive() && lhs == rhs && *lhs != ClauseParam::Wildcard {
            return false;
        }

        let lhs_fallback = Relation::wildcard_entity(relation.lhs_domain());
        let rhs_fallback = Relation::wildcard_entity(relation.rhs_domain());

        if *lhs == ClauseParam::Wildcard && *rhs == ClauseParam::Wildcard {
            return self.any_pair(relation, lhs_fallback, rhs_fallback);
        }

        let kb = self.kb;
        let holding: Vec<Pair> = self
            .candidate_pairs(lhs, lhs_fallback, rhs, rhs_fallback)
            .into_iter()
            .filter(|(l, r)| kb.holds(relation, l, r))
            .collect();
        self.bind(lhs, rhs, holding)
    }

    /// Pairwise search over the relation's natural domains
    fn any_pair(&self, relation: Relation, lhs: Option<EntityType>, rhs: Option<EntityType>) -> bool {
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return false;
        };
        if self.kb.relation_size(relation) == 0 {
            return false;
        }
        let right = self.kb.entities(rhs);
        self.kb
            .entities(lhs)
            .iter()
            .any(|l| right.iter().any(|r| self.kb.holds(relation, l, r)))
    }

    fn pattern(&mut self, entity: &DesignEntity, lhs: &ClauseParam, rhs: &ClauseParam) -> bool {
        let statement = ClauseParam::Entity(entity.clone());
        let pairs = self.candidate_pairs(&statement, None, lhs, Some(EntityType::Variable));
        let kb = self.kb;

        let matching: Vec<Pair> = if entity.entity == EntityType::Assign {
            pairs
                .into_iter()
                .filter(|(s, v)| kb.holds(Relation::Modifies, s, v))
                .filter(|(s, _)| match rhs {
                    ClauseParam::Expr(expr) => s
                        .as_stmt()
                        .and_then(|n| kb.assign_rpn(n))
                        .is_some_and(|rpn| expr.matches(rpn)),
                    _ => true,
                })
                .collect()
        } else {
            pairs
                .into_iter()
                .filter(|(s, v)| {
                    let condition = s
                        .as_stmt()
                        .map(|n| kb.condition_variables(n))
                        .unwrap_or_default();
                    v.as_name()
                        .is_some_and(|name| condition.iter().any(|c| c == name))
                })
                .collect()
        };
        self.bind(&statement, lhs, matching)
    }

    fn with(
        &mut self,
        lhs: &ClauseParam,
        lhs_attribute: Option<AttributeType>,
        rhs: &ClauseParam,
        rhs_attribute: Option<AttributeType>,
    ) -> SpaResult<bool> {
        if lhs == rhs && lhs_attribute == rhs_attribute {
            return Ok(!self.resolve(lhs, None).is_empty());
        }

        let mut matching = Vec::new();
        for (l, r) in self.candidate_pairs(lhs, None, rhs, None) {
            let left = self.attribute_value(lhs, lhs_attribute, &l)?;
            let right = self.attribute_value(rhs, rhs_attribute, &r)?;
            if left == right {
                matching.push((l, r));
            }
        }
        Ok(self.bind(lhs, rhs, matching))
    }

    fn attribute_value(
        &self,
        param: &ClauseParam,
        attribute: Option<AttributeType>,
        value: &TableElement,
    ) -> SpaResult<TableElement> {
        match param.entity() {
            Some(entity) => project_attribute(self.kb, entity.entity, attribute, value),
            None => Ok(value.clone()),
        }
    }

    /// Candidate values for one argument: the bindings an earlier clause
    /// produced, or the whole domain from the knowledge base
    fn resolve(&self, param: &ClauseParam, fallback: Option<EntityType>) -> Vec<TableElement> {
        match param {
            ClauseParam::Entity(entity) => {
                match self.database.iter().find(|t| t.has(&entity.synonym)) {
                    Some(table) => table.distinct(&entity.synonym),
                    None => self.kb.entities(entity.entity),
                }
            }
            ClauseParam::Name(name) => vec![TableElement::name(name)],
            ClauseParam::Index(index) => vec![TableElement::Stmt(*index)],
            ClauseParam::Wildcard => fallback.map(|e| self.kb.entities(e)).unwrap_or_default(),
            ClauseParam::Expr(_) => Vec::new(),
        }
    }

    fn candidate_pairs(
        &self,
        lhs: &ClauseParam,
        lhs_fallback: Option<EntityType>,
        rhs: &ClauseParam,
        rhs_fallback: Option<EntityType>,
    ) -> Vec<Pair> {
        if let (Some(l), Some(r)) = (lhs.synonym(), rhs.synonym()) {
            if l == r {
                return self
                    .resolve(lhs, lhs_fallback)
                    .into_iter()
                    .map(|v| (v.clone(), v))
                    .collect();
            }
            if let Some(pairs) = self.joint_pairs(l, r) {
                return pairs;
            }
        }

        let right = self.resolve(rhs, rhs_fallback);
        self.resolve(lhs, lhs_fallback)
            .into_iter()
            .flat_map(|l| right.iter().map(move |r| (l.clone(), r.clone())))
            .collect()
    }

    /// Reuse a table that already binds both synonyms together
    fn joint_pairs(&self, lhs: &str, rhs: &str) -> Option<Vec<Pair>> {
        let table = self.database.iter().find(|t| t.has(lhs) && t.has(rhs))?;
        let joint = table.project(&[lhs.to_string(), rhs.to_string()]);
        Some(
            joint
                .rows()
                .filter_map(|row| Some((row.get(lhs)?.clone(), row.get(rhs)?.clone())))
                .collect(),
        )
    }

    /// Record the bindings of whichever arguments are synonyms
    fn bind(&mut self, lhs: &ClauseParam, rhs: &ClauseParam, pairs: Vec<Pair>) -> bool {
        if pairs.is_empty() {
            return false;
        }

        let table = match (lhs.synonym(), rhs.synonym()) {
            (Some(l), Some(r)) if l == r => Some(single(l, pairs.into_iter().map(|(v, _)| v))),
            (Some(l), Some(r)) => {
                let unique: BTreeSet<Pair> = pairs.into_iter().collect();
                Some(ResultTable::pair(l, r, unique))
            }
            (Some(l), None) => Some(single(l, pairs.into_iter().map(|(v, _)| v))),
            (None, Some(r)) => Some(single(r, pairs.into_iter().map(|(_, v)| v))),
            (None, None) => None,
        };
        if let Some(table) = table {
            self.database.push(table);
        }
        true
    }

    fn select(&self, selection: &Selection, tables: &[ResultTable]) -> SpaResult<QueryResult> {
        let elements = match selection {
            Selection::Boolean => return Ok(QueryResult::Boolean(true)),
            Selection::Elements(elements) => elements,
        };

        if let [element] = elements.as_slice() {
            return self.select_single(element, tables);
        }

        let mut synonyms: Vec<String> = Vec::new();
        for element in elements {
            if !synonyms.contains(&element.entity.synonym) {
                synonyms.push(element.entity.synonym.clone());
            }
        }

        let mut combined = ResultTable::new();
        for table in tables {
            let wanted: Vec<String> = synonyms.iter().filter(|s| table.has(s)).cloned().collect();
            if !wanted.is_empty() {
                combined = combined.cross_join(&table.project(&wanted));
            }
        }
        for element in elements {
            let synonym = &element.entity.synonym;
            if !combined.has(synonym) {
                let domain = self.kb.entities(element.entity.entity);
                combined = combined.cross_join(&ResultTable::single(synonym, domain));
            }
        }

        let mut rows: BTreeSet<Vec<String>> = BTreeSet::new();
        for row in combined.rows() {
            let mut line = Vec::with_capacity(elements.len());
            for element in elements {
                let Some(value) = row.get(&element.entity.synonym) else {
                    continue;
                };
                line.push(self.output(element, value)?);
            }
            rows.insert(line);
        }
        Ok(QueryResult::Tuples(rows.into_iter().collect()))
    }

    fn select_single(&self, element: &Element, tables: &[ResultTable]) -> SpaResult<QueryResult> {
        let synonym = &element.entity.synonym;
        let values = match tables.iter().find(|t| t.has(synonym)) {
            Some(table) => table.distinct(synonym),
            None => self.kb.entities(element.entity.entity),
        };

        if element.yields_statements() {
            return Ok(QueryResult::Stmts(
                values.iter().filter_map(TableElement::as_stmt).collect(),
            ));
        }
        let names = values
            .iter()
            .map(|value| self.output(element, value))
            .collect::<SpaResult<_>>()?;
        Ok(QueryResult::Names(names))
    }

    /// Printed form of one selected binding; constants keep their literal spelling
    fn output(&self, element: &Element, value: &TableElement) -> SpaResult<String> {
        if element.entity.entity == EntityType::Constant {
            return Ok(value.to_string());
        }
        project_attribute(self.kb, element.entity.entity, element.attribute, value)
            .map(|projected| projected.to_string())
    }
}

fn single(synonym: &str, values: impl Iterator<Item = TableElement>) -> ResultTable {
    let unique: BTreeSet<TableElement> = values.collect();
    ResultTable::single(synonym, unique.into_iter().collect())
}
