use serde::Serialize;

pub(crate) const fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub(crate) struct PaginatedResponse<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total_count: i64,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

impl<T> PaginatedResponse<T> {
    /// `total_count` comes from the window count on the first row; an empty
    /// page past the end reports zero.
    pub(crate) fn from_rows<R>(
        rows: Vec<R>,
        skip: i64,
        limit: i64,
        split: impl Fn(R) -> (T, i64),
    ) -> Self {
        let mut total_count = 0;
        let items = rows
            .into_iter()
            .map(|row| {
                let (item, total) = split(row);
                total_count = total;
                item
            })
            .collect();
        Self { items, total_count, skip: skip.max(0), limit: limit.clamp(1, 1000) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_comes_from_rows() {
        let page = PaginatedResponse::from_rows(vec![("a", 7), ("b", 7)], 0, 5000, |row| row);
        assert_eq!(page.items, vec!["a", "b"]);
        assert_eq!(page.total_count, 7);
        assert_eq!(page.limit, 1000);

        let empty = PaginatedResponse::<&str>::from_rows(Vec::<(&str, i64)>::new(), 20, 10, |r| r);
        assert_eq!(empty.total_count, 0);
    }
}
