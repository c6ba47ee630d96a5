use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::Article;

/// Ordering applied to the visible list. One key is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    #[default]
    Name,
    NameDesc,
    Created,
    CreatedDesc,
    UpdatedDesc,
    LikesDesc,
    ViewsDesc,
}

impl SortOrder {
    pub const ALL: [SortOrder; 7] = [
        SortOrder::Name,
        SortOrder::NameDesc,
        SortOrder::Created,
        SortOrder::CreatedDesc,
        SortOrder::UpdatedDesc,
        SortOrder::LikesDesc,
        SortOrder::ViewsDesc,
    ];

    /// Persisted key.
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Name => "name",
            SortOrder::NameDesc => "name_desc",
            SortOrder::Created => "created",
            SortOrder::CreatedDesc => "created_desc",
            SortOrder::UpdatedDesc => "updated_desc",
            SortOrder::LikesDesc => "likes_desc",
            SortOrder::ViewsDesc => "views_desc",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortOrder::Name => "Name (A-Z)",
            SortOrder::NameDesc => "Name (Z-A)",
            SortOrder::Created => "Oldest first",
            SortOrder::CreatedDesc => "Newest first",
            SortOrder::UpdatedDesc => "Recently updated",
            SortOrder::LikesDesc => "Most liked",
            SortOrder::ViewsDesc => "Most viewed",
        }
    }

    /// Next key in menu order, wrapping around.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    /// Compare two articles under this key.
    pub fn compare(self, a: &Article, b: &Article) -> Ordering {
        match self {
            SortOrder::Name => cmp_name(a, b),
            SortOrder::NameDesc => cmp_name(b, a),
            // None < Some: missing timestamps sort as oldest
            SortOrder::Created => a.created_at.cmp(&b.created_at),
            SortOrder::CreatedDesc => b.created_at.cmp(&a.created_at),
            SortOrder::UpdatedDesc => b.modified_at.cmp(&a.modified_at),
            SortOrder::LikesDesc => b.like_count.cmp(&a.like_count),
            SortOrder::ViewsDesc => b.view_count.cmp(&a.view_count),
        }
    }
}

fn cmp_name(a: &Article, b: &Article) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort order: {0}")]
pub struct UnknownSortOrder(pub String);

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| UnknownSortOrder(s.to_string()))
    }
}

/// Stable sort: ties keep their incoming order.
pub fn sort_articles(articles: &mut [&Article], order: SortOrder) {
    articles.sort_by(|a, b| order.compare(a, b));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::test_support::article;
    use pretty_assertions::assert_eq;

    fn ids(list: &[&Article]) -> Vec<i64> {
        list.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_parse_round_trip_all_keys() {
        for order in SortOrder::ALL {
            assert_eq!(order.as_str().parse::<SortOrder>().unwrap(), order);
        }
        let err = "sideways".parse::<SortOrder>().unwrap_err();
        assert_eq!(err, UnknownSortOrder("sideways".into()));
        assert_eq!(err.to_string(), "unknown sort order: sideways");
    }

    #[test]
    fn test_name_is_case_insensitive() {
        let a = article(1, "beta", None);
        let b = article(2, "Alpha", None);
        let c = article(3, "Gamma", None);
        let mut list = vec![&a, &b, &c];
        sort_articles(&mut list, SortOrder::Name);
        assert_eq!(ids(&list), vec![2, 1, 3]);
        sort_articles(&mut list, SortOrder::NameDesc);
        assert_eq!(ids(&list), vec![3, 1, 2]);
    }

    #[test]
    fn test_missing_timestamps_sort_oldest() {
        let mut a = article(1, "a", None);
        a.created_at = Some(200);
        let b = article(2, "b", None);
        let mut c = article(3, "c", None);
        c.created_at = Some(100);

        let mut list = vec![&a, &b, &c];
        sort_articles(&mut list, SortOrder::Created);
        assert_eq!(ids(&list), vec![2, 3, 1]);
        sort_articles(&mut list, SortOrder::CreatedDesc);
        assert_eq!(ids(&list), vec![1, 3, 2]);
    }

    #[test]
    fn test_updated_desc() {
        let mut a = article(1, "a", None);
        a.modified_at = Some(5);
        let mut b = article(2, "b", None);
        b.modified_at = Some(9);
        let c = article(3, "c", None);
        let mut list = vec![&c, &a, &b];
        sort_articles(&mut list, SortOrder::UpdatedDesc);
        assert_eq!(ids(&list), vec![2, 1, 3]);
    }

    #[test]
    fn test_counts_desc_and_stable_ties() {
        let mut a = article(1, "a", None);
        a.like_count = 3;
        let b = article(2, "b", None);
        let c = article(3, "c", None);
        let mut d = article(4, "d", None);
        d.view_count = 7;

        let mut list = vec![&b, &a, &c];
        sort_articles(&mut list, SortOrder::LikesDesc);
        assert_eq!(ids(&list), vec![1, 2, 3]);

        let mut list = vec![&c, &b, &d];
        sort_articles(&mut list, SortOrder::ViewsDesc);
        assert_eq!(ids(&list), vec![4, 3, 2]);
    }

    #[test]
    fn test_next_wraps() {
        assert_eq!(SortOrder::Name.next(), SortOrder::NameDesc);
        assert_eq!(SortOrder::ViewsDesc.next(), SortOrder::Name);
    }
}
