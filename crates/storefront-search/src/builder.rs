//! Translation of untrusted list parameters into a validated query.
//!
//! Sort and search fields are checked against the resource's whitelists and
//! silently fall back (or are dropped) when unknown. Structural problems such
//! as malformed `filters` JSON or non-numeric pagination are reported as
//! [`QueryError::InvalidParameter`] before anything touches the cache or the
//! datastore.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use storefront_storage::{Condition, FindQuery, MatchMode, SortDirection, SortSpec};
use thiserror::Error;

use crate::params::ListParams;
use crate::schema::ResourceSchema;
use crate::whitelist::resolve_field;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 5;
pub const DEFAULT_MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown resource: {0}")]
    UnknownResource(String),
    #[error("Invalid value for {param}: {message}")]
    InvalidParameter { param: String, message: String },
}

impl QueryError {
    fn invalid(param: &str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.to_string(),
            message: message.into(),
        }
    }
}

/// How client-supplied `filters` field names are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPolicy {
    /// Every field is applied as given (admin-trusted input).
    Trusted,
    /// Only fields the schema declares are applied; others are dropped.
    #[default]
    Whitelisted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,
    #[serde(default)]
    pub filter_policy: FilterPolicy,
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

fn default_max_per_page() -> u32 {
    DEFAULT_MAX_PER_PAGE
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
            filter_policy: FilterPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchClause {
    pub field: String,
    pub mode: MatchMode,
    pub term: String,
}

/// A fully validated list query for one resource.
///
/// Serializes deterministically (filters are kept in a sorted map), which is
/// what cache keys are derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub resource: String,
    pub filters: BTreeMap<String, Value>,
    pub search: Option<SearchClause>,
    pub sort: SortSpec,
    pub page: u32,
    pub per_page: u32,
}

impl QueryDescriptor {
    pub fn skip(&self) -> u64 {
        u64::from(self.per_page) * u64::from(self.page.saturating_sub(1))
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }

    /// Filter and search conditions, without pagination.
    pub fn conditions(&self) -> Vec<Condition> {
        let mut conditions: Vec<Condition> = self
            .filters
            .iter()
            .map(|(field, value)| Condition::eq(field.clone(), value.clone()))
            .collect();
        if let Some(search) = &self.search {
            conditions.push(Condition::text(
                search.field.clone(),
                search.mode,
                search.term.clone(),
            ));
        }
        conditions
    }

    pub fn find_query(&self) -> FindQuery {
        FindQuery::new(self.conditions())
            .with_sort(self.sort.clone())
            .with_window(self.skip(), self.limit())
    }

    /// `ceil(total / per_page)`; zero when there is nothing to show.
    pub fn pages_for(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.per_page))
    }
}

/// The unpaginated twin of a descriptor, used for the total.
#[derive(Debug, Clone, PartialEq)]
pub struct CountQuery {
    pub resource: String,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub descriptor: QueryDescriptor,
    pub count: CountQuery,
}

pub struct QueryBuilder {
    config: QueryConfig,
}

impl QueryBuilder {
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn build(
        &self,
        schema: &ResourceSchema,
        params: &ListParams,
    ) -> Result<BuiltQuery, QueryError> {
        let page = parse_positive("page", params.page.as_deref(), DEFAULT_PAGE)?;
        let per_page = parse_positive(
            "perPage",
            params.per_page.as_deref(),
            self.config.default_per_page,
        )?;
        if per_page > self.config.max_per_page {
            return Err(QueryError::invalid(
                "perPage",
                format!("exceeds maximum of {}", self.config.max_per_page),
            ));
        }

        let filters = self.parse_filters(schema, params.filters.as_deref())?;

        let sort_field = resolve_field(
            non_blank(params.sort_field.as_deref()),
            &schema.sortable_fields,
            &schema.default_sort,
        );
        let sort = SortSpec {
            field: sort_field.to_string(),
            direction: parse_direction(params.sort_order.as_deref()),
        };

        let search = build_search(schema, params);

        let descriptor = QueryDescriptor {
            resource: schema.name.clone(),
            filters,
            search,
            sort,
            page,
            per_page,
        };
        let count = CountQuery {
            resource: schema.name.clone(),
            conditions: descriptor.conditions(),
        };
        Ok(BuiltQuery { descriptor, count })
    }

    fn parse_filters(
        &self,
        schema: &ResourceSchema,
        raw: Option<&str>,
    ) -> Result<BTreeMap<String, Value>, QueryError> {
        let Some(raw) = non_blank(raw) else {
            return Ok(BTreeMap::new());
        };
        let parsed: Value = serde_json::from_str(raw)
            .map_err(|e| QueryError::invalid("filters", format!("malformed JSON: {e}")))?;
        let Value::Object(map) = parsed else {
            return Err(QueryError::invalid("filters", "expected a JSON object"));
        };

        let mut filters = BTreeMap::new();
        for (field, value) in map {
            if field.is_empty() || field.starts_with('$') || field.contains('.') {
                return Err(QueryError::invalid(
                    "filters",
                    format!("field name '{field}' is not allowed"),
                ));
            }
            if matches!(value, Value::Array(_) | Value::Object(_)) {
                return Err(QueryError::invalid(
                    "filters",
                    format!("value for '{field}' must be a scalar"),
                ));
            }
            if self.config.filter_policy == FilterPolicy::Whitelisted
                && !schema.accepts_filter(&field)
            {
                tracing::debug!(resource = %schema.name, field = %field, "dropping undeclared filter");
                continue;
            }
            filters.insert(field, value);
        }
        Ok(filters)
    }
}

fn build_search(schema: &ResourceSchema, params: &ListParams) -> Option<SearchClause> {
    let term = non_blank(params.search.as_deref())?.trim();
    let field = params.search_field.as_deref()?;
    if !schema.searchable_fields.contains(field) {
        return None;
    }
    let mode = match non_blank(params.search_type.as_deref()) {
        None => MatchMode::Contains,
        Some(raw) => MatchMode::parse(raw.trim()).unwrap_or_else(|| {
            tracing::debug!(search_type = %raw, "unrecognized search type, using contains");
            MatchMode::Contains
        }),
    };
    Some(SearchClause {
        field: field.to_string(),
        mode,
        term: term.to_string(),
    })
}

fn parse_direction(raw: Option<&str>) -> SortDirection {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("desc" | "descending" | "-1") => SortDirection::Desc,
        _ => SortDirection::Asc,
    }
}

fn parse_positive(param: &str, raw: Option<&str>, default: u32) -> Result<u32, QueryError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(default);
    };
    match raw.trim().parse::<u32>() {
        Ok(0) => Err(QueryError::invalid(param, "must be >= 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(QueryError::invalid(param, "must be a positive integer")),
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn products() -> ResourceSchema {
        ResourceSchema::new("products")
            .searchable(&["name", "description"])
            .sortable(&["name", "price"])
            .filterable(&["status"])
            .relation("brand", "brands")
    }

    fn build(params: ListParams) -> Result<BuiltQuery, QueryError> {
        QueryBuilder::new(QueryConfig::default()).build(&products(), &params)
    }

    #[test]
    fn defaults_apply() {
        let built = build(ListParams::default()).unwrap();
        let d = &built.descriptor;
        assert_eq!(d.page, 1);
        assert_eq!(d.per_page, 5);
        assert_eq!(d.sort, SortSpec::ascending("createdAt"));
        assert!(d.search.is_none());
        assert!(d.filters.is_empty());
        assert_eq!(d.skip(), 0);
        assert_eq!(d.limit(), 5);
        assert!(built.count.conditions.is_empty());
    }

    #[test]
    fn unknown_sort_field_falls_back_to_created_at() {
        for field in ["status", "password", "$natural", ""] {
            let built = build(ListParams::default().sort(field, "desc")).unwrap();
            assert_eq!(built.descriptor.sort, SortSpec::descending("createdAt"));
        }
        let built = build(ListParams::default().sort("price", "desc")).unwrap();
        assert_eq!(built.descriptor.sort, SortSpec::descending("price"));
    }

    #[test]
    fn sort_order_spellings() {
        for (raw, expected) in [
            ("asc", SortDirection::Asc),
            ("ASC", SortDirection::Asc),
            ("1", SortDirection::Asc),
            ("desc", SortDirection::Desc),
            ("Descending", SortDirection::Desc),
            ("-1", SortDirection::Desc),
            ("sideways", SortDirection::Asc),
        ] {
            let built = build(ListParams::default().sort("name", raw)).unwrap();
            assert_eq!(built.descriptor.sort.direction, expected, "{raw}");
        }
    }

    #[test]
    fn search_requires_term_and_whitelisted_field() {
        let built = build(ListParams::default().search("status", "paid")).unwrap();
        assert!(built.descriptor.search.is_none());

        let built = build(ListParams::default().search("name", "   ")).unwrap();
        assert!(built.descriptor.search.is_none());

        let mut params = ListParams::default();
        params.search = Some("lamp".into());
        let built = build(params).unwrap();
        assert!(built.descriptor.search.is_none());

        let built = build(ListParams::default().search("name", " lamp ")).unwrap();
        assert_eq!(
            built.descriptor.search,
            Some(SearchClause {
                field: "name".into(),
                mode: MatchMode::Contains,
                term: "lamp".into(),
            })
        );
    }

    #[test]
    fn search_modes() {
        let built = build(
            ListParams::default()
                .search("name", "Desk Lamp")
                .search_type("exact"),
        )
        .unwrap();
        assert_eq!(
            built.count.conditions,
            vec![Condition::eq("name", "Desk Lamp")]
        );

        let built = build(
            ListParams::default()
                .search("name", "Desk")
                .search_type("startsWith"),
        )
        .unwrap();
        assert_eq!(
            built.count.conditions,
            vec![Condition::text("name", MatchMode::StartsWith, "Desk")]
        );

        let built = build(
            ListParams::default()
                .search("name", "Desk")
                .search_type("regex"),
        )
        .unwrap();
        assert_eq!(built.descriptor.search.unwrap().mode, MatchMode::Contains);
    }

    #[test]
    fn pagination_window() {
        let built = build(ListParams::default().page("3").per_page("5")).unwrap();
        assert_eq!(built.descriptor.skip(), 10);
        assert_eq!(built.descriptor.limit(), 5);
        assert_eq!(built.descriptor.pages_for(12), 3);
        assert_eq!(built.descriptor.pages_for(10), 2);
        assert_eq!(built.descriptor.pages_for(0), 0);

        let find = built.descriptor.find_query();
        assert_eq!(find.skip, 10);
        assert_eq!(find.limit, Some(5));
    }

    #[test]
    fn invalid_pagination_is_rejected() {
        for (page, per_page, param) in [
            ("0", "5", "page"),
            ("abc", "5", "page"),
            ("-2", "5", "page"),
            ("1", "0", "perPage"),
            ("1", "1.5", "perPage"),
            ("1", "101", "perPage"),
        ] {
            let err = build(ListParams::default().page(page).per_page(per_page)).unwrap_err();
            assert!(
                matches!(&err, QueryError::InvalidParameter { param: p, .. } if p == param),
                "{page}/{per_page}: {err}"
            );
        }
    }

    #[test]
    fn filters_become_equality_conditions() {
        let built = build(ListParams::default().filters(r#"{"status":"active","brand":"b1"}"#))
            .unwrap();
        assert_eq!(
            built.count.conditions,
            vec![Condition::eq("brand", "b1"), Condition::eq("status", "active")]
        );
    }

    #[test]
    fn malformed_filters_are_client_errors() {
        for raw in [r#"{"status":"#, "[1,2]", "\"status\"", r#"{"status":{"$ne":"x"}}"#] {
            let err = build(ListParams::default().filters(raw)).unwrap_err();
            assert!(
                matches!(&err, QueryError::InvalidParameter { param, .. } if param == "filters"),
                "{raw}: {err}"
            );
        }
        for raw in [r#"{"$where":"1"}"#, r#"{"brand.name":"x"}"#] {
            assert!(build(ListParams::default().filters(raw)).is_err(), "{raw}");
        }
    }

    #[test]
    fn filter_policy_controls_undeclared_fields() {
        let raw = r#"{"status":"active","internalNote":"x"}"#;

        let built = build(ListParams::default().filters(raw)).unwrap();
        assert_eq!(built.descriptor.filters.len(), 1);
        assert!(built.descriptor.filters.contains_key("status"));

        let trusted = QueryConfig {
            filter_policy: FilterPolicy::Trusted,
            ..QueryConfig::default()
        };
        let built = QueryBuilder::new(trusted)
            .build(&products(), &ListParams::default().filters(raw))
            .unwrap();
        assert_eq!(built.descriptor.filters.get("internalNote"), Some(&json!("x")));
    }

    #[test]
    fn descriptor_serialization_is_order_independent() {
        let a = build(ListParams::default().filters(r#"{"status":"a","brand":"b"}"#)).unwrap();
        let b = build(ListParams::default().filters(r#"{"brand":"b","status":"a"}"#)).unwrap();
        assert_eq!(
            serde_json::to_string(&a.descriptor).unwrap(),
            serde_json::to_string(&b.descriptor).unwrap()
        );
    }
}
