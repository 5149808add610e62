//! # Paged Query Engine
//!
//! Filter, sort and page specifications over a closed set of fields per
//! entity.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Paged Query Pipeline                              │
//! │                                                                         │
//! │  raw input (FilterSpec, SortSpec, PageSpec, category id)               │
//! │       │                                                                 │
//! │       ▼  PagedQuery::parse      ← allow-list check, fails fast         │
//! │  PagedQuery<F>                                                          │
//! │       │                                                                 │
//! │       ├──────────────► paginate()           (in-memory, this module)   │
//! │       └──────────────► bazaar_db::query     (SQL composer)             │
//! │                                                                         │
//! │  1. category pre-filter (exact)                                        │
//! │  2. field filter (substring / exact / date range)                      │
//! │  3. total_items over the filtered set                                  │
//! │  4. sort (field, direction), ties by id ascending                      │
//! │  5. slice [(page-1)*n, page*n)                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both evaluators read the same field enums, and case folding is ASCII in
//! both (`to_ascii_lowercase` here, SQLite's built-in `lower()` there), so a
//! query returns the same rows whichever storage answers it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::{Category, HasId, Product};
use crate::{DEFAULT_ITEMS_PER_PAGE, MAX_ITEMS_PER_PAGE, MIN_ITEMS_PER_PAGE};

// =============================================================================
// Raw Inputs
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(ValidationError::NotAllowed {
                field: "sort_direction".to_string(),
                allowed: vec!["asc".to_string(), "desc".to_string()],
            }),
        }
    }
}

/// Caller-supplied filter: a field name and a query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FilterSpec {
    pub field: String,
    pub query: String,
}

impl FilterSpec {
    pub fn new(field: impl Into<String>, query: impl Into<String>) -> Self {
        FilterSpec {
            field: field.into(),
            query: query.into(),
        }
    }
}

/// Caller-supplied sort: a field name and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        SortSpec {
            field: field.into(),
            direction,
        }
    }
}

/// Page number (1-based) and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PageSpec {
    pub page: u32,
    pub items_per_page: u32,
}

impl PageSpec {
    /// Creates a validated page spec.
    ///
    /// ## Example
    /// ```rust
    /// use bazaar_core::query::PageSpec;
    ///
    /// assert!(PageSpec::new(1, 10).is_ok());
    /// assert!(PageSpec::new(0, 10).is_err());
    /// assert!(PageSpec::new(1, 4).is_err());
    /// assert!(PageSpec::new(1, 51).is_err());
    /// ```
    pub fn new(page: u32, items_per_page: u32) -> Result<Self, ValidationError> {
        let spec = PageSpec {
            page,
            items_per_page,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.page < 1 {
            return Err(ValidationError::OutOfRange {
                field: "page".to_string(),
                min: 1,
                max: u32::MAX as i64,
            });
        }

        if !(MIN_ITEMS_PER_PAGE..=MAX_ITEMS_PER_PAGE).contains(&self.items_per_page) {
            return Err(ValidationError::OutOfRange {
                field: "items_per_page".to_string(),
                min: MIN_ITEMS_PER_PAGE as i64,
                max: MAX_ITEMS_PER_PAGE as i64,
            });
        }

        Ok(())
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.items_per_page as u64
    }

    /// Number of pages needed for `total` items.
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(self.items_per_page as u64)
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        PageSpec {
            page: 1,
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

// =============================================================================
// Field Allow-Lists
// =============================================================================

/// How a filterable field compares against a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Case-insensitive substring.
    Contains,
    /// Case-insensitive equality.
    Exact,
    /// A single `YYYY-MM-DD` date or an inclusive `from..to` range.
    DateRange,
}

/// A closed set of fields an entity exposes to filtering and sorting.
pub trait QueryField: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every field in the set.
    const FIELDS: &'static [Self];

    /// Public name, matched case-insensitively.
    fn name(&self) -> &'static str;

    /// `None` when the field cannot be filtered on.
    fn filter_mode(&self) -> Option<FilterMode>;

    fn sortable(&self) -> bool;

    fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::FIELDS
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    fn filterable_names() -> Vec<String> {
        Self::FIELDS
            .iter()
            .filter(|f| f.filter_mode().is_some())
            .map(|f| f.name().to_string())
            .collect()
    }

    fn sortable_names() -> Vec<String> {
        Self::FIELDS
            .iter()
            .filter(|f| f.sortable())
            .map(|f| f.name().to_string())
            .collect()
    }
}

/// Product fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductField {
    Title,
    Description,
    DescriptionShort,
    Label,
    ReleaseDate,
    Price,
}

impl QueryField for ProductField {
    const FIELDS: &'static [Self] = &[
        ProductField::Title,
        ProductField::Description,
        ProductField::DescriptionShort,
        ProductField::Label,
        ProductField::ReleaseDate,
        ProductField::Price,
    ];

    fn name(&self) -> &'static str {
        match self {
            ProductField::Title => "title",
            ProductField::Description => "description",
            ProductField::DescriptionShort => "description_short",
            ProductField::Label => "label",
            ProductField::ReleaseDate => "release_date",
            ProductField::Price => "price",
        }
    }

    fn filter_mode(&self) -> Option<FilterMode> {
        match self {
            ProductField::Title | ProductField::Description | ProductField::DescriptionShort => {
                Some(FilterMode::Contains)
            }
            ProductField::Label => Some(FilterMode::Exact),
            ProductField::ReleaseDate => Some(FilterMode::DateRange),
            ProductField::Price => None,
        }
    }

    fn sortable(&self) -> bool {
        matches!(
            self,
            ProductField::Title
                | ProductField::Label
                | ProductField::ReleaseDate
                | ProductField::Price
        )
    }
}

/// Category fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryField {
    Title,
}

impl QueryField for CategoryField {
    const FIELDS: &'static [Self] = &[CategoryField::Title];

    fn name(&self) -> &'static str {
        match self {
            CategoryField::Title => "title",
        }
    }

    fn filter_mode(&self) -> Option<FilterMode> {
        Some(FilterMode::Contains)
    }

    fn sortable(&self) -> bool {
        true
    }
}

// =============================================================================
// Parsed Query
// =============================================================================

/// A filter value already normalized for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    /// Lowercased needle.
    Contains(String),
    /// Lowercased value.
    Equals(String),
    /// Inclusive bounds.
    DateRange(NaiveDate, NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter<F> {
    pub field: F,
    pub value: FilterValue,
}

/// A validated query over the fields `F`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedQuery<F> {
    pub category_id: Option<String>,
    pub filter: Option<FieldFilter<F>>,
    pub sort: F,
    pub direction: SortDirection,
    pub page: PageSpec,
}

fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ValidationError::invalid_format("release_date", "expected YYYY-MM-DD or YYYY-MM-DD..YYYY-MM-DD")
    })
}

fn parse_filter_value(mode: FilterMode, query: &str) -> Result<FilterValue, ValidationError> {
    match mode {
        FilterMode::Contains => Ok(FilterValue::Contains(query.to_ascii_lowercase())),
        FilterMode::Exact => Ok(FilterValue::Equals(query.trim().to_ascii_lowercase())),
        FilterMode::DateRange => {
            let (from, to) = match query.split_once("..") {
                Some((from, to)) => (parse_date(from)?, parse_date(to)?),
                None => {
                    let day = parse_date(query)?;
                    (day, day)
                }
            };

            if from > to {
                return Err(ValidationError::invalid_format(
                    "release_date",
                    "range start is after range end",
                ));
            }

            Ok(FilterValue::DateRange(from, to))
        }
    }
}

impl<F: QueryField> PagedQuery<F> {
    /// Validates raw input against the allow-list of `F`.
    ///
    /// `default_sort` is used when `sort` is `None`. An empty filter query
    /// means "no filter", but its field must still be a filterable one.
    pub fn parse(
        filter: Option<&FilterSpec>,
        sort: Option<&SortSpec>,
        page: PageSpec,
        category_id: Option<&str>,
        default_sort: (F, SortDirection),
    ) -> Result<Self, ValidationError> {
        page.validate()?;

        let filter = match filter {
            Some(spec) => {
                let field = F::from_name(&spec.field)
                    .and_then(|f| f.filter_mode().map(|mode| (f, mode)))
                    .ok_or_else(|| ValidationError::NotAllowed {
                        field: "filter_field".to_string(),
                        allowed: F::filterable_names(),
                    })?;

                if spec.query.trim().is_empty() {
                    None
                } else {
                    Some(FieldFilter {
                        field: field.0,
                        value: parse_filter_value(field.1, &spec.query)?,
                    })
                }
            }
            None => None,
        };

        let (sort, direction) = match sort {
            Some(spec) => {
                let field = F::from_name(&spec.field)
                    .filter(|f| f.sortable())
                    .ok_or_else(|| ValidationError::NotAllowed {
                        field: "sort_field".to_string(),
                        allowed: F::sortable_names(),
                    })?;
                (field, spec.direction)
            }
            None => default_sort,
        };

        let category_id = match category_id.map(str::trim) {
            Some("") | None => None,
            Some(id) => Some(id.to_string()),
        };

        Ok(PagedQuery {
            category_id,
            filter,
            sort,
            direction,
            page,
        })
    }
}

// =============================================================================
// Result Page
// =============================================================================

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub items_per_page: u32,
    pub page_count: u64,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, spec: PageSpec, total_items: u64) -> Self {
        Page {
            items,
            page: spec.page,
            items_per_page: spec.items_per_page,
            page_count: spec.page_count(total_items),
            total_items,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            items_per_page: self.items_per_page,
            page_count: self.page_count,
            total_items: self.total_items,
        }
    }
}

// =============================================================================
// In-Memory Evaluation
// =============================================================================

/// The value an entity exposes for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Date(NaiveDate),
    Cents(i64),
}

/// An entity the paged query engine can evaluate.
pub trait Pageable: HasId {
    type Field: QueryField;

    const DEFAULT_SORT: (Self::Field, SortDirection);

    fn value(&self, field: Self::Field) -> FieldValue<'_>;

    /// Category the entity is filed under, if the entity has one.
    fn category_id(&self) -> Option<&str> {
        None
    }

    /// Whether the entity type supports the category pre-filter.
    fn has_category() -> bool {
        false
    }
}

impl Pageable for Product {
    type Field = ProductField;

    const DEFAULT_SORT: (ProductField, SortDirection) = (ProductField::Title, SortDirection::Asc);

    fn value(&self, field: ProductField) -> FieldValue<'_> {
        match field {
            ProductField::Title => FieldValue::Text(&self.title),
            ProductField::Description => FieldValue::Text(&self.description),
            ProductField::DescriptionShort => FieldValue::Text(&self.description_short),
            ProductField::Label => FieldValue::Text(&self.label),
            ProductField::ReleaseDate => FieldValue::Date(self.release_date),
            ProductField::Price => FieldValue::Cents(self.price_cents),
        }
    }

    fn category_id(&self) -> Option<&str> {
        Some(&self.category_id)
    }

    fn has_category() -> bool {
        true
    }
}

impl Pageable for Category {
    type Field = CategoryField;

    const DEFAULT_SORT: (CategoryField, SortDirection) = (CategoryField::Title, SortDirection::Asc);

    fn value(&self, field: CategoryField) -> FieldValue<'_> {
        match field {
            CategoryField::Title => FieldValue::Text(&self.title),
        }
    }
}

impl FilterValue {
    /// Whether `value` satisfies this filter.
    pub fn matches(&self, value: FieldValue<'_>) -> bool {
        match (self, value) {
            (FilterValue::Contains(needle), FieldValue::Text(text)) => {
                text.to_ascii_lowercase().contains(needle.as_str())
            }
            (FilterValue::Equals(expected), FieldValue::Text(text)) => {
                text.eq_ignore_ascii_case(expected)
            }
            (FilterValue::DateRange(from, to), FieldValue::Date(day)) => {
                *from <= day && day <= *to
            }
            _ => false,
        }
    }
}

/// Parses raw input with `T`'s allow-list and default sort.
pub fn parse_for<T: Pageable>(
    filter: Option<&FilterSpec>,
    sort: Option<&SortSpec>,
    page: PageSpec,
    category_id: Option<&str>,
) -> Result<PagedQuery<T::Field>, ValidationError> {
    let query = PagedQuery::parse(filter, sort, page, category_id, T::DEFAULT_SORT)?;

    if query.category_id.is_some() && !T::has_category() {
        return Err(ValidationError::NotAllowed {
            field: "category_id".to_string(),
            allowed: Vec::new(),
        });
    }

    Ok(query)
}

/// Runs `query` over an in-memory collection.
///
/// ## Example
/// ```rust
/// use bazaar_core::query::{paginate, parse_for, PageSpec};
/// use bazaar_core::Category;
///
/// let items: Vec<Category> = ["Jazz", "Blues", "Soul"]
///     .iter()
///     .enumerate()
///     .map(|(i, t)| Category { id: i.to_string(), title: t.to_string() })
///     .collect();
///
/// let query = parse_for::<Category>(None, None, PageSpec::new(1, 5).unwrap(), None).unwrap();
/// let page = paginate(items, &query);
///
/// assert_eq!(page.total_items, 3);
/// assert_eq!(page.items[0].title, "Blues");
/// ```
pub fn paginate<T: Pageable>(items: Vec<T>, query: &PagedQuery<T::Field>) -> Page<T> {
    let mut matching: Vec<T> = items
        .into_iter()
        .filter(|item| match &query.category_id {
            Some(id) => item.category_id() == Some(id.as_str()),
            None => true,
        })
        .filter(|item| match &query.filter {
            Some(filter) => filter.value.matches(item.value(filter.field)),
            None => true,
        })
        .collect();

    let total_items = matching.len() as u64;

    matching.sort_by(|a, b| {
        let primary = a.value(query.sort).cmp(&b.value(query.sort));
        let primary = match query.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        match primary {
            Ordering::Equal => a.id().cmp(b.id()),
            other => other,
        }
    });

    let items = matching
        .into_iter()
        .skip(query.page.offset() as usize)
        .take(query.page.items_per_page as usize)
        .collect();

    Page::new(items, query.page, total_items)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, category: &str, title: &str, label: &str, date: &str, cents: i64) -> Product {
        Product {
            id: id.to_string(),
            category_id: category.to_string(),
            user_id: "seller".to_string(),
            image_id: format!("img-{id}"),
            title: title.to_string(),
            description: format!("{title} on vinyl"),
            description_short: "LP".to_string(),
            label: label.to_string(),
            release_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            price_cents: cents,
        }
    }

    fn catalog() -> Vec<Product> {
        vec![
            product("p1", "jazz", "Kind of Blue", "Columbia", "1959-08-17", 1999),
            product("p2", "jazz", "Blue Train", "Blue Note", "1958-01-01", 2499),
            product("p3", "jazz", "A Love Supreme", "Impulse!", "1965-01-01", 2199),
            product("p4", "rock", "Abbey Road", "Apple", "1969-09-26", 1899),
            product("p5", "rock", "Blue Lines", "Wild Bunch", "1991-04-08", 1599),
        ]
    }

    fn page(n: u32) -> PageSpec {
        PageSpec::new(1, n).unwrap()
    }

    #[test]
    fn test_page_count_is_ceiling() {
        for n in MIN_ITEMS_PER_PAGE..=MAX_ITEMS_PER_PAGE {
            let spec = page(n);
            for total in 0..=200u64 {
                let expected = (total + n as u64 - 1) / n as u64;
                assert_eq!(spec.page_count(total), expected, "total={total} n={n}");
            }
        }
    }

    #[test]
    fn test_contains_filter_is_case_insensitive() {
        let filter = FilterSpec::new("TITLE", "BLUE");
        let query = parse_for::<Product>(Some(&filter), None, page(10), None).unwrap();
        let result = paginate(catalog(), &query);

        assert_eq!(result.total_items, 3);
        for item in &result.items {
            assert!(item.title.to_ascii_lowercase().contains("blue"));
        }
    }

    #[test]
    fn test_label_is_exact_match() {
        let filter = FilterSpec::new("label", "blue note");
        let query = parse_for::<Product>(Some(&filter), None, page(10), None).unwrap();
        let result = paginate(catalog(), &query);

        assert_eq!(result.total_items, 1);
        assert_eq!(result.items[0].id, "p2");

        // Substring of a label is not a match.
        let filter = FilterSpec::new("label", "blue");
        let query = parse_for::<Product>(Some(&filter), None, page(10), None).unwrap();
        assert_eq!(paginate(catalog(), &query).total_items, 0);
    }

    #[test]
    fn test_release_date_range() {
        let filter = FilterSpec::new("release_date", "1958-01-01..1965-01-01");
        let query = parse_for::<Product>(Some(&filter), None, page(10), None).unwrap();
        let result = paginate(catalog(), &query);
        assert_eq!(result.total_items, 3);

        let filter = FilterSpec::new("release_date", "1969-09-26");
        let query = parse_for::<Product>(Some(&filter), None, page(10), None).unwrap();
        assert_eq!(paginate(catalog(), &query).items[0].id, "p4");

        let filter = FilterSpec::new("release_date", "last year");
        assert!(parse_for::<Product>(Some(&filter), None, page(10), None).is_err());

        let filter = FilterSpec::new("release_date", "1970-01-01..1960-01-01");
        assert!(parse_for::<Product>(Some(&filter), None, page(10), None).is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let filter = FilterSpec::new("user_id", "seller");
        assert!(matches!(
            parse_for::<Product>(Some(&filter), None, page(10), None),
            Err(ValidationError::NotAllowed { .. })
        ));

        // Price sorts but does not filter.
        let filter = FilterSpec::new("price", "10");
        assert!(parse_for::<Product>(Some(&filter), None, page(10), None).is_err());

        // Description filters but does not sort.
        let sort = SortSpec::new("description", SortDirection::Asc);
        assert!(parse_for::<Product>(None, Some(&sort), page(10), None).is_err());
    }

    #[test]
    fn test_empty_query_means_no_filter() {
        let filter = FilterSpec::new("title", "  ");
        let query = parse_for::<Product>(Some(&filter), None, page(10), None).unwrap();
        assert!(query.filter.is_none());
        assert_eq!(paginate(catalog(), &query).total_items, 5);
    }

    #[test]
    fn test_sort_and_slice() {
        let sort = SortSpec::new("price", SortDirection::Desc);
        let spec = PageSpec::new(2, 5).unwrap();
        let query = parse_for::<Product>(None, Some(&sort), spec, None).unwrap();
        let result = paginate(catalog(), &query);

        assert_eq!(result.total_items, 5);
        assert_eq!(result.page_count, 1);
        assert!(result.items.is_empty());

        let query = parse_for::<Product>(None, Some(&sort), page(5), None).unwrap();
        let ids: Vec<_> = paginate(catalog(), &query)
            .items
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p2", "p3", "p1", "p4", "p5"]);
    }

    #[test]
    fn test_ties_broken_by_id() {
        let mut items = catalog();
        for item in &mut items {
            item.label = "Same".to_string();
        }
        let sort = SortSpec::new("label", SortDirection::Desc);
        let query = parse_for::<Product>(None, Some(&sort), page(5), None).unwrap();
        let ids: Vec<_> = paginate(items, &query).items.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3", "p4", "p5"]);
    }

    #[test]
    fn test_category_prefilter() {
        let query = parse_for::<Product>(None, None, page(5), Some("rock")).unwrap();
        let result = paginate(catalog(), &query);
        assert_eq!(result.total_items, 2);
        assert_eq!(result.items[0].title, "Abbey Road");

        // Categories have no category of their own.
        assert!(parse_for::<Category>(None, None, page(5), Some("rock")).is_err());
    }

    #[test]
    fn test_page_spec_bounds() {
        assert!(PageSpec::new(1, MIN_ITEMS_PER_PAGE).is_ok());
        assert!(PageSpec::new(1, MAX_ITEMS_PER_PAGE).is_ok());
        assert!(PageSpec::new(0, 10).is_err());
        assert_eq!(PageSpec::default().items_per_page, DEFAULT_ITEMS_PER_PAGE);
        assert_eq!(PageSpec::new(3, 10).unwrap().offset(), 20);
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert_eq!("asc".parse::<SortDirection>().unwrap(), SortDirection::Asc);
        assert!("up".parse::<SortDirection>().is_err());
    }
}
