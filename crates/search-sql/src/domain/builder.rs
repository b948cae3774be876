//! Classification of search parameters into domain nodes.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::error::{SearchError, SearchResult};
use crate::range::{date_bounds, decimal_bounds, is_integer_literal};
use crate::registry::{SearchParameterRegistry, ValueType};
use crate::schema::ValueTable;
use crate::terminology::{CodeSetExpander, unversioned};
use crate::types::{
    CanonicalValue, IncludeDirective, IncludeType, ReverseChainTarget, ReverseChainedParameter,
    SearchModifier, SearchParamType, SearchParameter, SearchPrefix, SearchQuery, SearchValue,
    SortDirective, WHOLE_SYSTEM_TYPE, WILDCARD_TYPE,
};

use super::node::{
    CanonicalMatch, CanonicalNode, ChainHop, ChainTarget, ChainedNode, CompositeComponent,
    CompositeNode, DateNode, IdNode, IncludeNode, InclusionNode, LastUpdatedNode, LocationNode,
    MissingNode, NumberNode, QuantityNode, RangeValue, ReferenceMatch, ReferenceNode,
    ReverseChainFilter, ReverseChainNode, SearchNode, SortColumn, SortNode, StringMatch,
    StringNode, TagNode, TokenMatch, TokenNode,
};
use super::values::{
    missing_flag, parse_near, parse_quantity, parse_token, type_list, validate_type_name,
};
use super::{DomainScope, SearchDomain};

const LOCATION_TYPE: &str = "Location";

/// Builds a [`SearchDomain`] from a parsed [`SearchQuery`].
///
/// Parameters are classified in this order, the first match winning:
///
/// 1. `_id` and `_lastUpdated`, by code
/// 2. any parameter with the `:missing` modifier
/// 3. `near` (or any special parameter) on Location
/// 4. `_tag`, `_security` and `_profile`, by code
/// 5. reference parameters: chained, inclusion criterion, or plain
/// 6. dispatch on the parameter type
pub struct DomainBuilder<'a> {
    registry: &'a SearchParameterRegistry,
    config: &'a SearchConfig,
    code_sets: Option<&'a dyn CodeSetExpander>,
}

impl<'a> DomainBuilder<'a> {
    /// Creates a builder over a registry snapshot.
    pub fn new(registry: &'a SearchParameterRegistry, config: &'a SearchConfig) -> Self {
        Self {
            registry,
            config,
            code_sets: None,
        }
    }

    /// Sets the value set expander used for `:in` and `:not-in`.
    pub fn with_code_sets(mut self, code_sets: Option<&'a dyn CodeSetExpander>) -> Self {
        self.code_sets = code_sets;
        self
    }

    /// Builds the domain for a query.
    ///
    /// Returns `Ok(None)` when the query can match nothing: a parameter
    /// requested as both missing and present, or a whole-system search with
    /// no resource types in scope.
    pub fn build(&self, query: &SearchQuery) -> SearchResult<Option<SearchDomain>> {
        let whole_system = query.is_whole_system();
        let root_type = if whole_system {
            WHOLE_SYSTEM_TYPE
        } else {
            validate_type_name(&query.resource_type)?;
            query.resource_type.as_str()
        };

        let mut type_filter: Option<Vec<String>> = None;
        let mut missing: HashMap<&str, bool> = HashMap::new();
        let mut nodes = Vec::with_capacity(query.parameters.len() + query.sort.len());

        for param in &query.parameters {
            if param.name == "_type" {
                if !whole_system {
                    return Err(SearchError::InvalidRequest {
                        message: "_type is only supported for whole-system search".to_string(),
                    });
                }
                let types = type_list(param);
                type_filter = Some(match type_filter {
                    Some(previous) => previous.into_iter().filter(|t| types.contains(t)).collect(),
                    None => types,
                });
                continue;
            }

            if param.modifier == Some(SearchModifier::Missing) {
                let conflict = match missing_flag(param)? {
                    Some(flag) => missing
                        .insert(param.name.as_str(), flag)
                        .is_some_and(|previous| previous != flag),
                    None => true,
                };
                if conflict {
                    warn!(
                        "Parameter '{}' requested as both missing and present, search matches nothing",
                        param.name
                    );
                    return Ok(None);
                }
            }

            nodes.push(self.build_parameter(root_type, param)?);
        }

        for has in &query.reverse_chains {
            nodes.push(SearchNode::ReverseChained(self.build_reverse_chain(has)?));
        }

        for sort in &query.sort {
            nodes.push(SearchNode::Sort(self.build_sort(root_type, whole_system, sort)?));
        }

        let scope = if whole_system {
            let types = self.whole_system_types(type_filter)?;
            if types.is_empty() {
                debug!("Whole-system search has no resource types in scope");
                return Ok(None);
            }
            DomainScope::WholeSystem(types)
        } else {
            DomainScope::Type(root_type.to_string())
        };

        Ok(Some(SearchDomain { scope, nodes }))
    }

    /// Resolves an include directive into one node per target type.
    ///
    /// A revinclude whose target type is not the searched type yields no
    /// nodes.
    pub fn build_include(
        &self,
        query: &SearchQuery,
        directive: &IncludeDirective,
    ) -> SearchResult<Vec<IncludeNode>> {
        validate_type_name(&directive.source_type)?;
        let definition = self
            .registry
            .get_param(&directive.source_type, &directive.search_param)
            .ok_or_else(|| SearchError::UnknownParameter {
                param: directive.search_param.clone(),
                resource_type: directive.source_type.clone(),
            })?;
        if definition.param_type != SearchParamType::Reference {
            return Err(SearchError::NonReferenceChainLink {
                param: directive.search_param.clone(),
                param_type: definition.param_type,
            });
        }

        let targets: Vec<String> = match directive.include_type {
            IncludeType::Include => match directive.target_type.as_deref() {
                None | Some(WILDCARD_TYPE) => definition.targets().to_vec(),
                Some(t) => vec![t.to_string()],
            },
            IncludeType::Revinclude => {
                let target = match (&directive.target_type, query.is_whole_system()) {
                    (Some(t), _) => t.clone(),
                    (None, false) => query.resource_type.clone(),
                    (None, true) => {
                        return Err(SearchError::InvalidRequest {
                            message: "_revinclude on a whole-system search needs a target type"
                                .to_string(),
                        });
                    }
                };
                let searched = query.is_whole_system() || target == query.resource_type;
                let reachable =
                    definition.targets().is_empty() || definition.targets().contains(&target);
                if !searched || !reachable {
                    return Ok(Vec::new());
                }
                vec![target]
            }
        };

        if targets.is_empty() {
            return Err(SearchError::UnresolvedChainTarget {
                param: directive.search_param.clone(),
                resource_type: directive.source_type.clone(),
            });
        }

        targets
            .into_iter()
            .map(|target_type| {
                validate_type_name(&target_type)?;
                Ok(IncludeNode {
                    include_type: directive.include_type,
                    source_type: directive.source_type.clone(),
                    code: directive.search_param.clone(),
                    target_type,
                })
            })
            .collect()
    }

    /// Classifies one parameter evaluated against `resource_type`.
    pub fn build_parameter(
        &self,
        resource_type: &str,
        param: &SearchParameter,
    ) -> SearchResult<SearchNode> {
        if param.inclusion_criterion && param.terminal_values().is_empty() {
            return Err(SearchError::EmptyInclusionCriterion {
                param: param.chain_display(),
            });
        }
        if param.values.is_empty() && !param.is_chained() {
            return Err(SearchError::InvalidRequest {
                message: format!("parameter '{}' has no values", param.name),
            });
        }

        match param.name.as_str() {
            "_id" => return self.build_id(param),
            "_lastUpdated" => return self.build_last_updated(param),
            _ => {}
        }

        if param.modifier == Some(SearchModifier::Missing) {
            return self.build_missing(resource_type, param);
        }

        if resource_type == LOCATION_TYPE
            && (param.param_type == SearchParamType::Special || param.name == "near")
        {
            return self.build_location(param);
        }

        match param.name.as_str() {
            "_tag" | "_security" => return self.build_tag(param),
            "_profile" => return self.build_canonical(param),
            _ => {}
        }

        if param.param_type == SearchParamType::Reference {
            if param.is_chained() {
                return self.build_chain(resource_type, param);
            }
            if param.inclusion_criterion {
                return self.build_inclusion(param);
            }
            return self.build_reference(resource_type, param);
        }

        if param.is_chained() {
            return Err(SearchError::NonReferenceChainLink {
                param: param.name.clone(),
                param_type: param.param_type,
            });
        }

        match param.param_type {
            SearchParamType::String => self.build_string(param),
            SearchParamType::Uri => self.build_uri(param),
            SearchParamType::Number => self.build_number(resource_type, param),
            SearchParamType::Date => self.build_date(param),
            SearchParamType::Token => self.build_token(param),
            SearchParamType::Quantity => self.build_quantity(resource_type, param),
            SearchParamType::Composite => self.build_composite(resource_type, param),
            SearchParamType::Reference => self.build_reference(resource_type, param),
            SearchParamType::Special => Err(SearchError::UnsupportedParameterType {
                param: param.name.clone(),
                param_type: param.param_type,
            }),
        }
    }

    fn build_id(&self, param: &SearchParameter) -> SearchResult<SearchNode> {
        if let Some(modifier) = &param.modifier {
            return Err(unsupported_modifier(modifier, SearchParamType::Token));
        }
        require_eq(param)?;
        Ok(SearchNode::Id(IdNode {
            ids: param.values.iter().map(|v| v.value.clone()).collect(),
        }))
    }

    fn build_last_updated(&self, param: &SearchParameter) -> SearchResult<SearchNode> {
        if let Some(modifier) = &param.modifier {
            return Err(unsupported_modifier(modifier, SearchParamType::Date));
        }
        Ok(SearchNode::LastUpdated(LastUpdatedNode {
            values: date_values(param)?,
        }))
    }

    fn build_missing(
        &self,
        resource_type: &str,
        param: &SearchParameter,
    ) -> SearchResult<SearchNode> {
        let missing = missing_flag(param)?.ok_or_else(|| {
            SearchError::invalid_value(
                &param.name,
                "true,false",
                "missing cannot be both true and false",
            )
        })?;

        let (code, table) = match param.name.as_str() {
            "_tag" => (param.name.clone(), ValueTable::Tags),
            "_security" => (param.name.clone(), ValueTable::Security),
            "_profile" => (param.name.clone(), ValueTable::Profiles),
            _ => match param.param_type {
                SearchParamType::Token | SearchParamType::Reference => {
                    (param.name.clone(), ValueTable::TokenRefs)
                }
                SearchParamType::Composite => {
                    let first = self
                        .registry
                        .components(resource_type, &param.name)
                        .into_iter()
                        .next()
                        .ok_or_else(|| SearchError::InvalidComposite {
                            param: param.name.clone(),
                            message: "no registered components".to_string(),
                        })?;
                    let table = match first.param_type {
                        SearchParamType::Token | SearchParamType::Reference => {
                            Some(ValueTable::TokenRefs)
                        }
                        other => ValueTable::for_type(other),
                    }
                    .ok_or_else(|| SearchError::InvalidComposite {
                        param: param.name.clone(),
                        message: "nested composite components are not supported".to_string(),
                    })?;
                    (first.code.clone(), table)
                }
                other => {
                    let table = ValueTable::for_type(other).ok_or_else(|| {
                        SearchError::UnsupportedParameterType {
                            param: param.name.clone(),
                            param_type: other,
                        }
                    })?;
                    (param.name.clone(), table)
                }
            },
        };

        Ok(SearchNode::Missing(MissingNode {
            code,
            table,
            missing,
        }))
    }

    fn build_location(&self, param: &SearchParameter) -> SearchResult<SearchNode> {
        if let Some(modifier) = &param.modifier {
            return Err(unsupported_modifier(modifier, SearchParamType::Special));
        }
        require_eq(param)?;
        let boxes = param
            .values
            .iter()
            .map(|v| parse_near(&param.name, &v.value))
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(SearchNode::Location(LocationNode {
            code: param.name.clone(),
            boxes,
        }))
    }

    fn build_tag(&self, param: &SearchParameter) -> SearchResult<SearchNode> {
        let (negated, values) = match &param.modifier {
            None => (false, token_values(param)?),
            Some(SearchModifier::Not) => (true, token_values(param)?),
            Some(SearchModifier::In) => (false, self.expand_code_sets(param)?),
            Some(SearchModifier::NotIn) => (true, self.expand_code_sets(param)?),
            Some(modifier) => return Err(unsupported_modifier(modifier, SearchParamType::Token)),
        };
        require_eq(param)?;
        let table = if param.name == "_security" {
            ValueTable::Security
        } else {
            ValueTable::Tags
        };
        Ok(SearchNode::Tag(TagNode {
            code: param.name.clone(),
            table,
            negated,
            values,
        }))
    }

    fn build_canonical(&self, param: &SearchParameter) -> SearchResult<SearchNode> {
        let match_kind = match &param.modifier {
            None => CanonicalMatch::Exact,
            Some(SearchModifier::Above) => CanonicalMatch::Above,
            Some(SearchModifier::Below) => CanonicalMatch::Below,
            Some(modifier) => return Err(unsupported_modifier(modifier, SearchParamType::Uri)),
        };
        require_eq(param)?;
        let values = param
            .values
            .iter()
            .map(|v| CanonicalValue::parse(&v.value))
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(SearchNode::Canonical(CanonicalNode {
            code: param.name.clone(),
            match_kind,
            values,
        }))
    }

    fn build_chain(&self, resource_type: &str, param: &SearchParameter) -> SearchResult<SearchNode> {
        let depth = param.chain.len();
        if depth > self.config.max_chain_depth {
            return Err(SearchError::ChainTooDeep {
                depth,
                max: self.config.max_chain_depth,
            });
        }

        let mut hops = Vec::with_capacity(depth);
        let mut source_type = resource_type.to_string();
        let mut link = param;

        for (index, next) in param.chain.iter().enumerate() {
            let last_hop = index + 1 == depth;
            let target = self.chain_target(&source_type, link, last_hop, param)?;
            hops.push(ChainHop {
                code: link.name.clone(),
                target: target.clone(),
            });

            source_type = match target {
                ChainTarget::Type(t) => t,
                ChainTarget::Wildcard(_) => WHOLE_SYSTEM_TYPE.to_string(),
            };

            if !last_hop {
                if next.param_type != SearchParamType::Reference {
                    return Err(SearchError::NonReferenceChainLink {
                        param: next.name.clone(),
                        param_type: next.param_type,
                    });
                }
                link = next;
            }
        }

        let Some(last) = param.chain.last() else {
            return Err(SearchError::InvalidRequest {
                message: format!("parameter '{}' has an empty chain", param.name),
            });
        };
        if last.is_chained() {
            return Err(SearchError::InvalidRequest {
                message: format!("chain '{}' has a nested chain", param.chain_display()),
            });
        }

        let mut terminal = last.clone();
        terminal.inclusion_criterion = false;
        let terminal = self.build_parameter(&source_type, &terminal)?;

        Ok(SearchNode::Chained(ChainedNode {
            display: param.chain_display(),
            hops,
            terminal: Box::new(terminal),
            inclusion: param.inclusion_criterion,
        }))
    }

    /// Target type of a chain link: the `:Type` modifier, else the single
    /// registered target. `*` expands to every registered type and is only
    /// accepted on the last reference.
    fn chain_target(
        &self,
        source_type: &str,
        link: &SearchParameter,
        last_hop: bool,
        outer: &SearchParameter,
    ) -> SearchResult<ChainTarget> {
        match link.type_modifier() {
            Some(WILDCARD_TYPE) => {
                if !last_hop {
                    return Err(SearchError::MisplacedWildcard {
                        chain: outer.chain_display(),
                    });
                }
                let types = self.registry.resource_types();
                if types.is_empty() {
                    return Err(SearchError::UnresolvedChainTarget {
                        param: link.name.clone(),
                        resource_type: source_type.to_string(),
                    });
                }
                Ok(ChainTarget::Wildcard(types))
            }
            Some(t) => {
                validate_type_name(t)?;
                Ok(ChainTarget::Type(t.to_string()))
            }
            None => match self.reference_targets(source_type, &link.name).as_slice() {
                [single] => Ok(ChainTarget::Type(single.clone())),
                _ => Err(SearchError::UnresolvedChainTarget {
                    param: link.name.clone(),
                    resource_type: source_type.to_string(),
                }),
            },
        }
    }

    fn build_inclusion(&self, param: &SearchParameter) -> SearchResult<SearchNode> {
        require_eq(param)?;
        let references = param
            .values
            .iter()
            .map(|v| {
                if v.value.split_once('/').is_some_and(|(t, id)| !t.is_empty() && !id.is_empty()) {
                    Ok(v.value.clone())
                } else {
                    Err(SearchError::invalid_value(
                        &param.name,
                        &v.value,
                        "inclusion criteria need a Type/id reference",
                    ))
                }
            })
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(SearchNode::Inclusion(InclusionNode {
            code: param.name.clone(),
            references,
        }))
    }

    fn build_reference(
        &self,
        resource_type: &str,
        param: &SearchParameter,
    ) -> SearchResult<SearchNode> {
        match &param.modifier {
            None | Some(SearchModifier::Type(_)) => {}
            Some(SearchModifier::Identifier) => {
                require_eq(param)?;
                return Ok(SearchNode::Token(TokenNode {
                    code: format!("{}:identifier", param.name),
                    negated: false,
                    values: token_values(param)?,
                }));
            }
            Some(modifier) => {
                return Err(unsupported_modifier(modifier, SearchParamType::Reference));
            }
        }
        require_eq(param)?;
        if let Some(t) = param.type_modifier() {
            validate_type_name(t)?;
        }

        let values = param
            .values
            .iter()
            .map(|v| self.reference_match(resource_type, param, &v.value))
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(SearchNode::Reference(ReferenceNode {
            code: param.name.clone(),
            values,
        }))
    }

    fn reference_match(
        &self,
        resource_type: &str,
        param: &SearchParameter,
        value: &str,
    ) -> SearchResult<ReferenceMatch> {
        let invalid = |message: &str| SearchError::invalid_value(&param.name, value, message);
        let value = value.trim();
        if value.is_empty() {
            return Err(invalid("empty reference"));
        }
        if value.contains("://") || value.starts_with("urn:") {
            return Ok(ReferenceMatch::Exact(vec![value.to_string()]));
        }

        let (path, version) = match value.split_once("/_history/") {
            Some((path, version)) => {
                let version = version
                    .parse::<i64>()
                    .map_err(|_| invalid("version must be an integer"))?;
                (path, Some(version))
            }
            None => (value, None),
        };

        let reference = match path.split_once('/') {
            Some((t, id)) => {
                if param.type_modifier().is_some_and(|m| m != t) {
                    return Err(invalid("reference type does not match the type modifier"));
                }
                if t.is_empty() || id.is_empty() || id.contains('/') {
                    return Err(invalid("expected Type/id"));
                }
                path.to_string()
            }
            None => {
                let targets = match param.type_modifier() {
                    Some(t) => vec![t.to_string()],
                    None => self.reference_targets(resource_type, &param.name),
                };
                match (targets.as_slice(), version) {
                    ([], None) => return Ok(ReferenceMatch::Suffix(path.to_string())),
                    ([single], _) => format!("{}/{}", single, path),
                    (_, None) => {
                        return Ok(ReferenceMatch::Exact(
                            targets.iter().map(|t| format!("{}/{}", t, path)).collect(),
                        ));
                    }
                    (_, Some(_)) => {
                        return Err(invalid("a versioned reference needs a single target type"));
                    }
                }
            }
        };

        Ok(match version {
            Some(version) => ReferenceMatch::Versioned { reference, version },
            None => ReferenceMatch::Exact(vec![reference]),
        })
    }

    fn build_string(&self, param: &SearchParameter) -> SearchResult<SearchNode> {
        let match_kind = match &param.modifier {
            None => StringMatch::StartsWith,
            Some(SearchModifier::Exact) => StringMatch::Exact,
            Some(SearchModifier::Contains) => StringMatch::Contains,
            Some(modifier) => return Err(unsupported_modifier(modifier, SearchParamType::String)),
        };
        require_eq(param)?;
        Ok(string_node(&param.name, match_kind, &param.values))
    }

    fn build_uri(&self, param: &SearchParameter) -> SearchResult<SearchNode> {
        let match_kind = match &param.modifier {
            None => StringMatch::Exact,
            Some(SearchModifier::Above) => StringMatch::Above,
            Some(SearchModifier::Below) => StringMatch::Below,
            Some(modifier) => return Err(unsupported_modifier(modifier, SearchParamType::Uri)),
        };
        require_eq(param)?;
        Ok(string_node(&param.name, match_kind, &param.values))
    }

    fn build_number(&self, resource_type: &str, param: &SearchParameter) -> SearchResult<SearchNode> {
        if let Some(modifier) = &param.modifier {
            return Err(unsupported_modifier(modifier, SearchParamType::Number));
        }
        let declared = self.value_type(resource_type, &param.name);
        let integer = match declared {
            Some(ValueType::Integer) => true,
            Some(_) => false,
            None => param.values.iter().all(|v| is_integer_literal(&v.value)),
        };

        let values = param
            .values
            .iter()
            .map(|v| {
                if integer && v.prefix.is_range_only() {
                    return Err(SearchError::UnsupportedPrefix {
                        prefix: v.prefix,
                        param: param.name.clone(),
                        reason: "range comparisons need a parameter with a range type".to_string(),
                    });
                }
                Ok(RangeValue {
                    prefix: v.prefix,
                    bounds: decimal_bounds(&param.name, &v.value)?,
                })
            })
            .collect::<SearchResult<Vec<_>>>()?;

        Ok(SearchNode::Number(NumberNode {
            code: param.name.clone(),
            range: declared.is_some_and(|t| t.is_range()),
            values,
        }))
    }

    fn build_date(&self, param: &SearchParameter) -> SearchResult<SearchNode> {
        if let Some(modifier) = &param.modifier {
            return Err(unsupported_modifier(modifier, SearchParamType::Date));
        }
        Ok(SearchNode::Date(DateNode {
            code: param.name.clone(),
            values: date_values(param)?,
        }))
    }

    fn build_token(&self, param: &SearchParameter) -> SearchResult<SearchNode> {
        let (negated, values) = match &param.modifier {
            None => (false, token_values(param)?),
            Some(SearchModifier::Not) => (true, token_values(param)?),
            Some(SearchModifier::In) => (false, self.expand_code_sets(param)?),
            Some(SearchModifier::NotIn) => (true, self.expand_code_sets(param)?),
            Some(SearchModifier::Text) => {
                require_eq(param)?;
                return Ok(string_node(
                    &format!("{}:text", param.name),
                    StringMatch::StartsWith,
                    &param.values,
                ));
            }
            Some(modifier) => return Err(unsupported_modifier(modifier, SearchParamType::Token)),
        };
        require_eq(param)?;
        Ok(SearchNode::Token(TokenNode {
            code: param.name.clone(),
            negated,
            values,
        }))
    }

    /// Expands every value of a `:in` or `:not-in` parameter into one code
    /// set per code system.
    fn expand_code_sets(&self, param: &SearchParameter) -> SearchResult<Vec<TokenMatch>> {
        let expander = self.code_sets.ok_or_else(|| SearchError::InvalidRequest {
            message: format!(
                "'{}:{}' needs a value set expander",
                param.name,
                param.modifier.as_ref().map(ToString::to_string).unwrap_or_default()
            ),
        })?;

        let mut values = Vec::new();
        for value in &param.values {
            let sets = expander
                .expand(&value.value)?
                .ok_or_else(|| SearchError::UnknownValueSet {
                    param: param.name.clone(),
                    url: value.value.clone(),
                })?;
            values.extend(
                sets.into_iter()
                    .filter(|(_, codes)| !codes.is_empty())
                    .map(|(system, codes)| TokenMatch::CodeSet {
                        system: unversioned(&system).to_string(),
                        codes: codes.into_iter().collect(),
                    }),
            );
        }

        if values.is_empty() {
            debug!("Value sets of '{}' expand to no codes", param.name);
            values.push(TokenMatch::CodeSet {
                system: String::new(),
                codes: Vec::new(),
            });
        }
        Ok(values)
    }

    fn build_quantity(
        &self,
        resource_type: &str,
        param: &SearchParameter,
    ) -> SearchResult<SearchNode> {
        if let Some(modifier) = &param.modifier {
            return Err(unsupported_modifier(modifier, SearchParamType::Quantity));
        }
        let values = param
            .values
            .iter()
            .map(|v| parse_quantity(&param.name, v))
            .collect::<SearchResult<Vec<_>>>()?;
        Ok(SearchNode::Quantity(QuantityNode {
            code: param.name.clone(),
            range: self
                .value_type(resource_type, &param.name)
                .is_some_and(|t| t.is_range()),
            values,
        }))
    }

    fn build_composite(
        &self,
        resource_type: &str,
        param: &SearchParameter,
    ) -> SearchResult<SearchNode> {
        if let Some(modifier) = &param.modifier {
            return Err(unsupported_modifier(modifier, SearchParamType::Composite));
        }
        let invalid = |message: String| SearchError::InvalidComposite {
            param: param.name.clone(),
            message,
        };

        let mut values = Vec::with_capacity(param.values.len());
        for value in &param.values {
            let mut components = Vec::new();
            for component in self.composite_components(resource_type, param, value)? {
                if component.param_type == SearchParamType::Composite {
                    return Err(invalid(format!(
                        "component '{}' is itself a composite",
                        component.name
                    )));
                }
                if component.is_chained() || component.modifier.is_some() {
                    return Err(invalid(format!(
                        "component '{}' cannot be chained or modified",
                        component.name
                    )));
                }
                let node = self.build_parameter(resource_type, &component)?;
                match node {
                    SearchNode::String(_)
                    | SearchNode::Number(_)
                    | SearchNode::Date(_)
                    | SearchNode::Token(_)
                    | SearchNode::Quantity(_)
                    | SearchNode::Reference(_) => components.push(CompositeComponent { node }),
                    other => {
                        return Err(invalid(format!(
                            "component '{}' resolves to an unsupported {} filter",
                            component.name,
                            other.kind()
                        )));
                    }
                }
            }
            values.push(components);
        }

        Ok(SearchNode::Composite(CompositeNode {
            code: param.name.clone(),
            values,
        }))
    }

    /// Components of one composite value: those supplied by the parser, or
    /// the `$`-separated value split along the registered definition.
    fn composite_components(
        &self,
        resource_type: &str,
        param: &SearchParameter,
        value: &SearchValue,
    ) -> SearchResult<Vec<SearchParameter>> {
        if !value.components.is_empty() {
            return Ok(value.components.clone());
        }

        let definitions = self.registry.components(resource_type, &param.name);
        let parts: Vec<&str> = value.value.split('$').collect();
        if definitions.is_empty() {
            return Err(SearchError::InvalidComposite {
                param: param.name.clone(),
                message: "no registered components".to_string(),
            });
        }
        if definitions.len() != parts.len() {
            return Err(SearchError::InvalidComposite {
                param: param.name.clone(),
                message: format!(
                    "expected {} components, found {}",
                    definitions.len(),
                    parts.len()
                ),
            });
        }

        Ok(definitions
            .iter()
            .zip(parts)
            .map(|(definition, part)| {
                let value = match definition.param_type {
                    SearchParamType::Number | SearchParamType::Date | SearchParamType::Quantity => {
                        SearchValue::parse(part)
                    }
                    _ => SearchValue::eq(part),
                };
                SearchParameter::new(definition.code.clone(), definition.param_type).with_value(value)
            })
            .collect())
    }

    fn build_reverse_chain(&self, has: &ReverseChainedParameter) -> SearchResult<ReverseChainNode> {
        let depth = has.depth();
        if depth > self.config.max_chain_depth {
            return Err(SearchError::ChainTooDeep {
                depth,
                max: self.config.max_chain_depth,
            });
        }
        self.reverse_link(has)
    }

    fn reverse_link(&self, has: &ReverseChainedParameter) -> SearchResult<ReverseChainNode> {
        validate_type_name(&has.source_type)?;
        if let Some(definition) = self
            .registry
            .get_param(&has.source_type, &has.reference_param)
        {
            if definition.param_type != SearchParamType::Reference {
                return Err(SearchError::NonReferenceChainLink {
                    param: has.reference_param.clone(),
                    param_type: definition.param_type,
                });
            }
        }

        let filter = match &has.target {
            ReverseChainTarget::Parameter(param) => {
                let node = self.build_parameter(&has.source_type, param)?;
                if node.is_inclusion() {
                    return Err(SearchError::InvalidRequest {
                        message: "inclusion criteria cannot appear inside _has".to_string(),
                    });
                }
                ReverseChainFilter::Node(Box::new(node))
            }
            ReverseChainTarget::Nested(inner) => {
                ReverseChainFilter::Nested(Box::new(self.reverse_link(inner)?))
            }
        };

        Ok(ReverseChainNode {
            source_type: has.source_type.clone(),
            reference_code: has.reference_param.clone(),
            filter,
        })
    }

    fn build_sort(
        &self,
        resource_type: &str,
        whole_system: bool,
        directive: &SortDirective,
    ) -> SearchResult<SortNode> {
        let code = directive.parameter.clone();
        let column = match code.as_str() {
            "" => {
                return Err(SearchError::InvalidRequest {
                    message: "empty _sort parameter".to_string(),
                });
            }
            "_id" => SortColumn::LogicalId,
            "_lastUpdated" => SortColumn::LastUpdated,
            _ => {
                let definition = self.registry.get_param(resource_type, &code).ok_or_else(|| {
                    SearchError::UnknownParameter {
                        param: code.clone(),
                        resource_type: resource_type.to_string(),
                    }
                })?;
                if whole_system {
                    return Err(SearchError::UnsupportedSort {
                        param: code,
                        param_type: definition.param_type,
                    });
                }
                let range = definition.value_type.is_some_and(|t| t.is_range());
                let (table, ascending, descending) = match definition.param_type {
                    SearchParamType::String | SearchParamType::Uri => {
                        (ValueTable::Strings, "STR_VALUE", "STR_VALUE")
                    }
                    SearchParamType::Date => (ValueTable::Dates, "DATE_START", "DATE_END"),
                    SearchParamType::Token | SearchParamType::Reference => {
                        (ValueTable::TokenValues, "TOKEN_VALUE", "TOKEN_VALUE")
                    }
                    SearchParamType::Number if range => {
                        (ValueTable::Numbers, "NUMBER_VALUE_LOW", "NUMBER_VALUE_HIGH")
                    }
                    SearchParamType::Number => (ValueTable::Numbers, "NUMBER_VALUE", "NUMBER_VALUE"),
                    SearchParamType::Quantity if range => (
                        ValueTable::Quantities,
                        "QUANTITY_VALUE_LOW",
                        "QUANTITY_VALUE_HIGH",
                    ),
                    SearchParamType::Quantity => {
                        (ValueTable::Quantities, "QUANTITY_VALUE", "QUANTITY_VALUE")
                    }
                    param_type @ (SearchParamType::Composite | SearchParamType::Special) => {
                        return Err(SearchError::UnsupportedSort { param: code, param_type });
                    }
                };
                SortColumn::Value {
                    table,
                    ascending,
                    descending,
                }
            }
        };

        Ok(SortNode {
            code,
            direction: directive.direction,
            column,
        })
    }

    /// Resource types searched by a whole-system query.
    fn whole_system_types(&self, filter: Option<Vec<String>>) -> SearchResult<Vec<String>> {
        let base = if self.config.whole_system_types.is_empty() {
            self.registry.resource_types()
        } else {
            self.config.whole_system_types.clone()
        };

        let Some(filter) = filter else {
            return Ok(base);
        };
        for t in &filter {
            validate_type_name(t)?;
            if !self.registry.has_resource_type(t) {
                return Err(SearchError::invalid_value("_type", t, "unknown resource type"));
            }
        }
        Ok(base.into_iter().filter(|t| filter.contains(t)).collect())
    }

    fn reference_targets(&self, resource_type: &str, code: &str) -> Vec<String> {
        self.registry
            .get_param(resource_type, code)
            .map(|p| p.targets().to_vec())
            .unwrap_or_default()
    }

    fn value_type(&self, resource_type: &str, code: &str) -> Option<ValueType> {
        self.registry
            .get_param(resource_type, code)
            .and_then(|p| p.value_type)
    }
}

fn unsupported_modifier(modifier: &SearchModifier, param_type: SearchParamType) -> SearchError {
    SearchError::UnsupportedModifier {
        modifier: modifier.clone(),
        param_type,
    }
}

/// Prefixes only apply to ordered types.
fn require_eq(param: &SearchParameter) -> SearchResult<()> {
    match param.values.iter().find(|v| v.prefix != SearchPrefix::Eq) {
        Some(value) => Err(SearchError::UnsupportedPrefix {
            prefix: value.prefix,
            param: param.name.clone(),
            reason: "prefixes apply to number, date and quantity parameters".to_string(),
        }),
        None => Ok(()),
    }
}

fn string_node(code: &str, match_kind: StringMatch, values: &[SearchValue]) -> SearchNode {
    SearchNode::String(StringNode {
        code: code.to_string(),
        match_kind,
        values: values.iter().map(|v| v.value.clone()).collect(),
    })
}

fn token_values(param: &SearchParameter) -> SearchResult<Vec<TokenMatch>> {
    param
        .values
        .iter()
        .map(|v| parse_token(&param.name, &v.value))
        .collect()
}

fn date_values(
    param: &SearchParameter,
) -> SearchResult<Vec<RangeValue<chrono::NaiveDateTime>>> {
    param
        .values
        .iter()
        .map(|v| {
            Ok(RangeValue {
                prefix: v.prefix,
                bounds: date_bounds(&param.name, &v.value)?,
            })
        })
        .collect()
}
