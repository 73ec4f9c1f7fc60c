use serde::Deserialize;

/// Raw list parameters exactly as they arrive in the query string.
///
/// Everything is kept as an optional string so that malformed numbers are
/// reported by the query builder as validation errors instead of being
/// rejected by the extractor with a framework-specific message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub search: Option<String>,
    pub search_field: Option<String>,
    pub search_type: Option<String>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
    /// JSON object of field → exact value.
    pub filters: Option<String>,
}

impl ListParams {
    pub fn page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn per_page(mut self, per_page: impl Into<String>) -> Self {
        self.per_page = Some(per_page.into());
        self
    }

    pub fn search(mut self, field: impl Into<String>, term: impl Into<String>) -> Self {
        self.search_field = Some(field.into());
        self.search = Some(term.into());
        self
    }

    pub fn search_type(mut self, mode: impl Into<String>) -> Self {
        self.search_type = Some(mode.into());
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: impl Into<String>) -> Self {
        self.sort_field = Some(field.into());
        self.sort_order = Some(order.into());
        self
    }

    pub fn filters(mut self, json: impl Into<String>) -> Self {
        self.filters = Some(json.into());
        self
    }
}
