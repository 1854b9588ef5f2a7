//! Listing filters: page/page-size/sort validation and result metadata

use serde::{Deserialize, Serialize};

use crate::{
    config::ListingConfig,
    error::{AppResult, FieldErrors},
};

pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;
const DESCENDING_MARKER: char = '-';

/// Permitted sort keys for one listing, each mapped to the SQL column it orders by
#[derive(Debug, Clone, Copy)]
pub struct SortSafelist {
    entries: &'static [(&'static str, &'static str)],
}

impl SortSafelist {
    pub const fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self { entries }
    }

    pub fn column(&self, key: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, column)| *column)
    }
}

pub const BOOK_SORT: SortSafelist = SortSafelist::new(&[
    ("id", "b.id"),
    ("title", "b.title"),
    ("year", "b.year"),
    ("available", "b.available"),
    ("author", "a.name"),
]);

pub const AUTHOR_SORT: SortSafelist = SortSafelist::new(&[
    ("id", "a.id"),
    ("name", "a.name"),
    ("popularity", "a.popularity"),
]);

pub const USER_SORT: SortSafelist = SortSafelist::new(&[
    ("id", "u.id"),
    ("name", "u.name"),
    ("email", "u.email"),
]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
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

/// Raw, unvalidated listing parameters as received from a caller
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort: Option<String>,
}

impl ListParams {
    pub fn new(page: i64, page_size: i64, sort: impl Into<String>) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
            sort: Some(sort.into()),
        }
    }
}

/// Validated listing filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    sort_column: &'static str,
    sort_direction: SortDirection,
}

impl Filters {
    /// Validate `params` against `safelist`, reporting every violated field
    pub fn from_params(
        params: &ListParams,
        safelist: &SortSafelist,
        listing: &ListingConfig,
    ) -> AppResult<Self> {
        let page = params.page.unwrap_or(1);
        let page_size = params.page_size.unwrap_or(listing.default_page_size);
        let sort = params.sort.clone().unwrap_or_else(|| "id".to_string());

        let mut errors = FieldErrors::new();
        errors.check(page > 0, "page", "must be greater than zero");
        errors.check(page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        errors.check(page_size > 0, "page_size", "must be greater than zero");
        errors.check(
            page_size <= MAX_PAGE_SIZE,
            "page_size",
            "must be a maximum of 100",
        );

        let (key, sort_direction) = match sort.strip_prefix(DESCENDING_MARKER) {
            Some(key) => (key, SortDirection::Desc),
            None => (sort.as_str(), SortDirection::Asc),
        };
        let sort_column = safelist.column(key);
        errors.check(sort_column.is_some(), "sort", "invalid sort value");

        errors.into_result()?;

        Ok(Self {
            page,
            page_size,
            sort_column: sort_column.unwrap_or_default(),
            sort,
            sort_direction,
        })
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    /// SQL column to order by; always drawn from the safelist
    pub fn sort_column(&self) -> &'static str {
        self.sort_column
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    /// `ORDER BY` body with `tiebreak` appended so paging is deterministic
    pub fn order_by(&self, tiebreak: &str) -> String {
        if self.sort_column == tiebreak {
            format!("{} {}", self.sort_column, self.sort_direction.as_sql())
        } else {
            format!(
                "{} {}, {} ASC",
                self.sort_column,
                self.sort_direction.as_sql(),
                tiebreak
            )
        }
    }

    pub fn metadata(&self, total_records: i64) -> Metadata {
        Metadata::calculate(total_records, self.page, self.page_size)
    }
}

/// Pagination summary for one listing call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

impl Metadata {
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        let last_page = if total_records <= 0 || page_size <= 0 {
            0
        } else {
            (total_records + page_size - 1) / page_size
        };

        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page,
            total_records: total_records.max(0),
        }
    }
}

/// One page of a listing together with its metadata
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub metadata: Metadata,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, metadata: Metadata) -> Self {
        Self { metadata, data }
    }
}
