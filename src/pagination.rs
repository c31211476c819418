use serde::Serialize;

/// Which page to fetch, and the path used to build page links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u64,
    pub per_page: u64,
    pub path: String,
}

impl PageRequest {
    #[must_use]
    pub fn new(page: u64, per_page: u64, path: impl Into<String>) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
            path: path.into(),
        }
    }

    /// Number of rows to skip before this page starts.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// A length-aware page of results.
///
/// The field names match the envelope front-end data tables expect:
///
/// ```json
/// {
///   "current_page": 2, "data": [...],
///   "first_page_url": "/users?page=1", "from": 11,
///   "last_page": 5, "last_page_url": "/users?page=5",
///   "next_page_url": "/users?page=3", "path": "/users",
///   "per_page": 10, "prev_page_url": "/users?page=1",
///   "to": 20, "total": 42
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub current_page: u64,
    pub data: Vec<T>,
    pub first_page_url: String,
    /// 1-based position of the first item on this page, `None` when empty
    pub from: Option<u64>,
    pub last_page: u64,
    pub last_page_url: String,
    pub next_page_url: Option<String>,
    pub path: String,
    pub per_page: u64,
    pub prev_page_url: Option<String>,
    /// 1-based position of the last item on this page, `None` when empty
    pub to: Option<u64>,
    pub total: u64,
}

fn page_url(path: &str, page: u64) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}page={page}")
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(data: Vec<T>, total: u64, request: &PageRequest) -> Self {
        let per_page = request.per_page.max(1);
        let current_page = request.page.max(1);
        let last_page = total.div_ceil(per_page).max(1);

        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let first = request.offset() + 1;
            (Some(first), Some(first + data.len() as u64 - 1))
        };

        let path = request.path.clone();
        Self {
            current_page,
            data,
            first_page_url: page_url(&path, 1),
            from,
            last_page,
            last_page_url: page_url(&path, last_page),
            next_page_url: (current_page < last_page).then(|| page_url(&path, current_page + 1)),
            prev_page_url: (current_page > 1).then(|| page_url(&path, current_page - 1)),
            path,
            per_page,
            to,
            total,
        }
    }

    /// Reshape the items while keeping every paging field.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> Page<U> {
        Page {
            current_page: self.current_page,
            data: f(self.data),
            first_page_url: self.first_page_url,
            from: self.from,
            last_page: self.last_page,
            last_page_url: self.last_page_url,
            next_page_url: self.next_page_url,
            path: self.path,
            per_page: self.per_page,
            prev_page_url: self.prev_page_url,
            to: self.to,
            total: self.total,
        }
    }
}
