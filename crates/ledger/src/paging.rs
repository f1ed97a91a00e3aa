//! Pagination and sorting for list calls.

use sea_orm::Order;
use serde::{Deserialize, Serialize};

use crate::{LedgerError, ResultLedger};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE: u64 = 10_000_000;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Requested page, size and optional sort key (`-` prefix for descending).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
    pub sort: Option<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            sort: None,
        }
    }
}

impl PageRequest {
    pub fn validate(&self) -> ResultLedger<()> {
        if !(1..=MAX_PAGE).contains(&self.page) {
            return Err(LedgerError::invalid_input(
                "page",
                format!("must be between 1 and {MAX_PAGE}"),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(LedgerError::invalid_input(
                "page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        Ok(())
    }

    /// Zero-based page index, as sea-orm's paginator expects it.
    pub(crate) fn index(&self) -> u64 {
        self.page - 1
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub current_page: u64,
    pub page_size: u64,
    pub first_page: u64,
    pub last_page: u64,
    pub total_records: u64,
}

impl PageMetadata {
    /// An empty result set carries all-zero metadata.
    pub fn new(total_records: u64, page: u64, page_size: u64) -> Self {
        if total_records == 0 {
            return Self::default();
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: total_records.div_ceil(page_size),
            total_records,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// A column a list call may be sorted by.
pub trait SortColumn: Sized + Copy {
    const DEFAULT: Self;

    fn from_key(key: &str) -> Option<Self>;
}

/// Parses `key` or `-key` against the column allow-list.
pub fn parse_sort<C: SortColumn>(sort: Option<&str>) -> ResultLedger<(C, SortDirection)> {
    let Some(raw) = sort.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok((C::DEFAULT, SortDirection::Asc));
    };
    let (key, direction) = match raw.strip_prefix('-') {
        Some(key) => (key, SortDirection::Desc),
        None => (raw, SortDirection::Asc),
    };
    C::from_key(key)
        .map(|column| (column, direction))
        .ok_or_else(|| LedgerError::invalid_input("sort", format!("unsupported sort key: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Fruit {
        Id,
        Name,
    }

    impl SortColumn for Fruit {
        const DEFAULT: Self = Fruit::Id;

        fn from_key(key: &str) -> Option<Self> {
            match key {
                "id" => Some(Self::Id),
                "name" => Some(Self::Name),
                _ => None,
            }
        }
    }

    #[test]
    fn sort_defaults_and_prefix() {
        assert_eq!(
            parse_sort::<Fruit>(None).unwrap(),
            (Fruit::Id, SortDirection::Asc)
        );
        assert_eq!(
            parse_sort::<Fruit>(Some("-name")).unwrap(),
            (Fruit::Name, SortDirection::Desc)
        );
        assert_eq!(
            parse_sort::<Fruit>(Some("name")).unwrap(),
            (Fruit::Name, SortDirection::Asc)
        );
    }

    #[test]
    fn unknown_sort_key_is_invalid_input() {
        let err = parse_sort::<Fruit>(Some("-color")).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { ref field, .. } if field == "sort"));
    }

    #[test]
    fn page_bounds() {
        assert!(PageRequest::default().validate().is_ok());
        let zero = PageRequest {
            page: 0,
            ..PageRequest::default()
        };
        assert!(zero.validate().is_err());
        let huge = PageRequest {
            page_size: 101,
            ..PageRequest::default()
        };
        assert!(huge.validate().is_err());
    }

    #[test]
    fn metadata_rounds_last_page_up() {
        let meta = PageMetadata::new(41, 2, 20);
        assert_eq!(meta.last_page, 3);
        assert_eq!(meta.first_page, 1);
        assert_eq!(PageMetadata::new(0, 1, 20), PageMetadata::default());
    }
}
