//! Page-number pagination
//!
//! `?page=N&page_size=M` with `{count, next, previous, results}` bodies.
//! Links are relative and keep every other query parameter.

use crate::config::ServerSection;
use crate::error::{AppError, AppResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct Paginator {
    page: i64,
    page_size: i64,
    path: String,
    query: BTreeMap<String, String>,
}

impl Paginator {
    pub fn from_query(
        path: &str,
        query: &HashMap<String, String>,
        server: &ServerSection,
    ) -> AppResult<Self> {
        let page = match query.get("page") {
            None => 1,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(n) if n >= 1 => n,
                _ => return Err(AppError::InvalidPage),
            },
        };

        let default_size = i64::from(server.page_size);
        let max_size = i64::from(server.max_page_size);
        let page_size = query
            .get("page_size")
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|size| *size > 0)
            .map(|size| size.min(max_size))
            .unwrap_or(default_size);

        let query = query
            .iter()
            .filter(|(key, _)| key.as_str() != "page")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            page,
            page_size,
            path: path.to_string(),
            query,
        })
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    fn link(&self, page: i64) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.query {
            serializer.append_pair(key, value);
        }
        if page > 1 {
            serializer.append_pair("page", &page.to_string());
        }
        let query = serializer.finish();
        if query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, query)
        }
    }

    /// Check the page exists for `count` rows, then fetch it with
    /// `(limit, offset)`
    pub fn paginate<T, F>(&self, count: i64, fetch: F) -> AppResult<Page<T>>
    where
        F: FnOnce(i64, i64) -> AppResult<Vec<T>>,
    {
        let num_pages = ((count + self.page_size - 1) / self.page_size).max(1);
        if self.page > num_pages {
            return Err(AppError::InvalidPage);
        }

        let results = fetch(self.page_size, (self.page - 1) * self.page_size)?;
        Ok(Page {
            count,
            next: (self.page < num_pages).then(|| self.link(self.page + 1)),
            previous: (self.page > 1).then(|| self.link(self.page - 1)),
            results,
        })
    }

    /// Paginate rows that are already in memory
    pub fn paginate_vec<T>(&self, rows: Vec<T>) -> AppResult<Page<T>> {
        let count = rows.len() as i64;
        self.paginate(count, |limit, offset| {
            Ok(rows
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ServerSection {
        ServerSection::default()
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_first_page_links() {
        let paginator =
            Paginator::from_query("/api/orders/my-orders/", &query(&[]), &server()).unwrap();
        let page = paginator
            .paginate(25, |limit, offset| {
                assert_eq!((limit, offset), (10, 0));
                Ok(vec![1, 2, 3])
            })
            .unwrap();
        assert_eq!(page.count, 25);
        assert_eq!(page.next.as_deref(), Some("/api/orders/my-orders/?page=2"));
        assert!(page.previous.is_none());
    }

    #[test]
    fn test_middle_page_keeps_filters() {
        let paginator = Paginator::from_query(
            "/api/menu/admin/items/",
            &query(&[("page", "2"), ("status", "archived")]),
            &server(),
        )
        .unwrap();
        let page = paginator.paginate_vec((0..30).collect::<Vec<_>>()).unwrap();
        assert_eq!(page.results, (10..20).collect::<Vec<_>>());
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/menu/admin/items/?status=archived")
        );
        assert_eq!(
            page.next.as_deref(),
            Some("/api/menu/admin/items/?status=archived&page=3")
        );
    }

    #[test]
    fn test_out_of_range_page_is_invalid() {
        let paginator =
            Paginator::from_query("/x/", &query(&[("page", "4")]), &server()).unwrap();
        assert!(matches!(
            paginator.paginate_vec(vec![1; 30]),
            Err(AppError::InvalidPage)
        ));
        assert!(matches!(
            Paginator::from_query("/x/", &query(&[("page", "zero")]), &server()),
            Err(AppError::InvalidPage)
        ));
    }

    #[test]
    fn test_empty_first_page_is_valid() {
        let paginator = Paginator::from_query("/x/", &query(&[]), &server()).unwrap();
        let page = paginator.paginate_vec(Vec::<i32>::new()).unwrap();
        assert_eq!(page.count, 0);
        assert!(page.next.is_none());
    }

    #[test]
    fn test_page_size_is_capped() {
        let paginator =
            Paginator::from_query("/x/", &query(&[("page_size", "1000")]), &server()).unwrap();
        assert_eq!(paginator.page_size(), 100);
    }
}
